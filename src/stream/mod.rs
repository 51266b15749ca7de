//! Subscriber-facing sample streams

mod subscription;

pub use subscription::SampleStream;
