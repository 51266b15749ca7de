//! Telemetry hub: socket lifecycle, decoding and sample publication.
//!
//! The hub is an explicitly constructed service object. Whatever hosts the
//! UDP socket and the streaming endpoint shares it by handle (`Arc`), and
//! there is no process-global instance.
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted --start()--> Listening
//!      \
//!       `---bind error---> Failed   (inert, no retry)
//! ```
//!
//! [`TelemetryHub::start`] is idempotent. The first call claims the start
//! guard before binding; every later call is a no-op that reports the
//! current state, including after a failed bind.
//!
//! ## Example
//!
//! ```rust,no_run
//! use flightdeck::TelemetryHub;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> flightdeck::Result<()> {
//!     let hub = TelemetryHub::new(1024);
//!     hub.start("0.0.0.0", 14550).await?;
//!
//!     let mut samples = hub.subscribe();
//!     while let Some(sample) = samples.next().await {
//!         println!("{} = {}", sample.topic, sample.value());
//!     }
//!     Ok(())
//! }
//! ```

mod emitter;

pub use emitter::{HubStats, SampleEmitter, StatsSnapshot};

use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::driver::Driver;
use crate::source::DatagramSource;
use crate::sources::UdpSource;
use crate::stream::SampleStream;
use crate::types::SamplePoint;
use crate::Result;

/// Hub lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum HubState {
    /// `start` has not completed yet
    NotStarted,
    /// Receive loop running
    Listening {
        /// Bound socket address, when the source has one
        #[serde(rename = "localAddr")]
        local_addr: Option<SocketAddr>,
    },
    /// Binding failed; the hub stays inert for the life of the process
    Failed {
        /// Why binding failed
        reason: String,
    },
}

/// Process-lifetime telemetry hub
pub struct TelemetryHub {
    emitter: Arc<SampleEmitter>,
    started: AtomicBool,
    state: watch::Sender<HubState>,
    cancel: CancellationToken,
}

impl TelemetryHub {
    /// Create a hub whose subscribers may each fall up to `capacity`
    /// samples behind before older samples are skipped.
    pub fn new(capacity: usize) -> Self {
        let (state, _) = watch::channel(HubState::NotStarted);
        Self {
            emitter: Arc::new(SampleEmitter::new(capacity)),
            started: AtomicBool::new(false),
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Bind the UDP socket on `host:port` and start decoding.
    ///
    /// Idempotent: only the first call binds. A bind failure is logged,
    /// returned, and leaves the hub in [`HubState::Failed`]; it is not
    /// retried. Later calls ignore their arguments and return the current
    /// state. A call that arrives while another is still binding waits for
    /// that bind to settle; if the binding call is dropped first, the
    /// waiting call takes over and binds itself.
    pub async fn start(&self, host: &str, port: u16) -> Result<HubState> {
        self.start_from(UdpSource::bind(host, port)).await
    }

    async fn start_from<S, F>(&self, bind: F) -> Result<HubState>
    where
        S: DatagramSource,
        F: Future<Output = Result<S>>,
    {
        let mut updates = self.state_updates();
        loop {
            if !self.claim_start() {
                break;
            }

            let state = updates.borrow_and_update().clone();
            if state != HubState::NotStarted {
                debug!("Hub already started, ignoring start request");
                return Ok(state);
            }

            debug!("Hub start in progress, waiting for it to settle");
            if updates.changed().await.is_err() {
                return Ok(self.state());
            }
        }

        let mut claim = StartClaim { hub: self, settled: false };
        let bound = bind.await;
        claim.settled = true;

        match bound {
            Ok(source) => Ok(self.launch(source)),
            Err(e) => {
                error!("Telemetry hub failed to start: {}", e);
                self.state.send_replace(HubState::Failed { reason: e.to_string() });
                Err(e)
            }
        }
    }

    /// Start decoding from an already constructed source.
    ///
    /// Shares the start guard with [`start`](Self::start). Never waits: if
    /// a bind is still in flight this returns [`HubState::NotStarted`].
    pub fn start_with<S>(&self, source: S) -> HubState
    where
        S: DatagramSource,
    {
        if self.claim_start() {
            debug!("Hub already started, ignoring source");
            return self.state();
        }
        self.launch(source)
    }

    /// Returns `true` when the hub was already started.
    fn claim_start(&self) -> bool {
        self.started.swap(true, Ordering::SeqCst)
    }

    fn launch<S>(&self, source: S) -> HubState
    where
        S: DatagramSource,
    {
        let state = HubState::Listening { local_addr: source.local_addr() };
        Driver::spawn(source, Arc::clone(&self.emitter), self.cancel.clone());
        info!(?state, "Telemetry hub listening");
        self.state.send_replace(state.clone());
        state
    }

    /// Current lifecycle state
    pub fn state(&self) -> HubState {
        self.state.borrow().clone()
    }

    /// Watch lifecycle changes
    pub fn state_updates(&self) -> watch::Receiver<HubState> {
        self.state.subscribe()
    }

    /// Socket address once listening on UDP
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.borrow() {
            HubState::Listening { local_addr } => *local_addr,
            _ => None,
        }
    }

    /// Decode a datagram synchronously and publish its samples.
    ///
    /// This is what the receive loop calls per datagram; it is public so
    /// datagrams from other transports can be injected.
    pub fn ingest(&self, datagram: &[u8], received_at_ms: i64) -> usize {
        self.emitter.ingest(datagram, received_at_ms)
    }

    /// Publish a single sample under `topic`
    pub fn emit_topic(&self, topic: impl Into<String>, point: SamplePoint) {
        self.emitter.emit_topic(topic, point);
    }

    /// Subscribe to every sample published from now on
    pub fn subscribe(&self) -> SampleStream {
        SampleStream::new(self.emitter.subscribe())
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.emitter.subscriber_count()
    }

    /// Pipeline counters
    pub fn stats(&self) -> StatsSnapshot {
        self.emitter.stats().snapshot()
    }
}

/// Start guard held across the bind; releases the guard if the bind is
/// abandoned so a waiting caller can take over
struct StartClaim<'a> {
    hub: &'a TelemetryHub,
    settled: bool,
}

impl Drop for StartClaim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Hub start abandoned before bind completed");
            self.hub.started.store(false, Ordering::SeqCst);
            self.hub.state.send_modify(|_| {});
        }
    }
}

impl Drop for TelemetryHub {
    fn drop(&mut self) {
        debug!("Dropping telemetry hub");
        self.cancel.cancel();
    }
}
