//! ULog file reader
//!
//! Parses the header and definitions section up front, then walks the data
//! section one message at a time.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use flightdeck::ulog::{LogMessage, UlogReader};
//!
//! fn count_records() -> flightdeck::Result<()> {
//!     let mut reader = UlogReader::open("flight.ulg")?;
//!     println!("{} formats defined", reader.formats().len());
//!
//!     while let Some(message) = reader.read_next_message()? {
//!         if let LogMessage::Data(record) = message {
//!             println!("{} @ {:?}", record.name, record.timestamp_us());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Truncation
//!
//! Loggers that lose power leave a partial final message. A truncated
//! message in the data section ends iteration with a warning; the same in
//! the definitions section means nothing can be decoded and is reported as
//! [`TelemetryError::Corrupted`].

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use super::format::{
    FieldDef, FieldValue, FileHeader, FILE_HEADER_SIZE, FlagBits, FormatDef, Formats, MessageType,
    RawMessage, message_at, read_key,
};
use crate::types::WireValue;
use crate::{Result, TelemetryError};

/// An active subscription (`A` message)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub msg_id: u16,
    pub multi_id: u8,
    /// Name of the format the data records follow
    pub name: String,
}

/// One decoded data record (`D` message)
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub msg_id: u16,
    pub multi_id: u8,
    pub name: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl DataRecord {
    /// Best available timestamp: `timestamp`, else `timestamp_sample`
    pub fn timestamp_us(&self) -> Option<u64> {
        self.field("timestamp").or_else(|| self.field("timestamp_sample")).and_then(FieldValue::as_u64)
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// A logged string (`L` or tagged `C` message)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedString {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<u16>,
    pub timestamp_us: u64,
    pub message: String,
}

/// Messages surfaced from the data section
#[derive(Debug, Clone, PartialEq)]
pub enum LogMessage {
    Data(DataRecord),
    Logged(LoggedString),
    /// Parameter changed in flight
    Parameter { name: String, value: FieldValue },
    /// Logger dropped data for this long
    Dropout { duration_ms: u16 },
}

/// Everything collected from the definitions section
#[derive(Debug, Default)]
struct Definitions {
    flags: Option<FlagBits>,
    formats: Formats,
    info: BTreeMap<String, FieldValue>,
    multi_info: BTreeMap<String, Vec<FieldValue>>,
    parameters: BTreeMap<String, FieldValue>,
    default_parameters: BTreeMap<String, FieldValue>,
}

impl Definitions {
    /// Apply a definition-type message. Also used for the occasional
    /// definition that appears in the data section.
    fn apply(&mut self, message_type: MessageType, body: &[u8]) -> Result<Option<LogMessage>> {
        match message_type {
            MessageType::FlagBits => {
                let flags = FlagBits::parse(body)?;
                if flags.has_appended_data() {
                    debug!(offsets = ?flags.appended_offsets, "ULog file has appended data");
                }
                self.flags = Some(flags);
            }
            MessageType::Format => {
                let text = std::str::from_utf8(body)
                    .map_err(|e| TelemetryError::parse_error("ULog format", e.to_string()))?;
                self.formats.insert(FormatDef::parse(text)?);
            }
            MessageType::Info => {
                let (key, value) = self.key_value(body, 0)?;
                self.info.insert(key, value);
            }
            MessageType::MultiInfo => {
                let (key, value) = self.key_value(body, 1)?;
                self.multi_info.entry(key).or_default().push(value);
            }
            MessageType::Parameter => {
                let (key, value) = self.key_value(body, 0)?;
                let previous = self.parameters.insert(key.clone(), value.clone());
                if previous.is_some_and(|p| p != value) {
                    return Ok(Some(LogMessage::Parameter { name: key, value }));
                }
            }
            MessageType::ParameterDefault => {
                let (key, value) = self.key_value(body, 1)?;
                self.default_parameters.insert(key, value);
            }
            _ => {}
        }
        Ok(None)
    }

    /// Decode a `type name` keyed value starting at `key_at`.
    fn key_value(&self, body: &[u8], key_at: usize) -> Result<(String, FieldValue)> {
        let (key, value_at) = read_key(body, key_at)?;
        let field = FieldDef::parse(key)?;
        let (value, _) = self.formats.decode_field(&field, body, value_at, 0)?;
        Ok((field.name, value))
    }
}

/// ULog file reader
pub struct UlogReader {
    data: Vec<u8>,
    path: PathBuf,
    position: usize,
    header: FileHeader,
    definitions: Definitions,
    subscriptions: HashMap<u16, Subscription>,
    data_start: usize,
    skipped: u64,
    truncated: bool,
}

impl UlogReader {
    /// Open a ULog file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(&path)
            .map_err(|e| TelemetryError::file_error(path.as_ref().to_path_buf(), e))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| TelemetryError::file_error(path.as_ref().to_path_buf(), e))?;

        Self::from_bytes_with_path(data, path.as_ref().to_path_buf())
    }

    /// Create a reader over an in-memory file
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::from_bytes_with_path(data.into(), PathBuf::from("<memory>"))
    }

    fn from_bytes_with_path(data: Vec<u8>, path: PathBuf) -> Result<Self> {
        let header = FileHeader::parse(&data)?;
        debug!(version = header.version, timestamp_us = header.timestamp_us, "Parsed ULog header");

        let mut definitions = Definitions::default();
        let mut position = FILE_HEADER_SIZE;

        loop {
            match message_at(&data, position) {
                RawMessage::End => break,
                RawMessage::Truncated { declared, available } => {
                    return Err(TelemetryError::corrupted(format!(
                        "definition message at offset {position} declares {declared} bytes but only {available} remain"
                    )));
                }
                RawMessage::Complete { message_type, body: (start, end), next } => {
                    if !message_type.is_definition() {
                        break;
                    }
                    if message_type == MessageType::FlagBits && position != FILE_HEADER_SIZE {
                        warn!("Ignoring flag bits message at offset {}", position);
                    } else {
                        definitions.apply(message_type, &data[start..end]).map_err(|e| match e {
                            TelemetryError::Corrupted { .. } => e,
                            other => TelemetryError::corrupted(format!(
                                "bad definition at offset {position}: {other}"
                            )),
                        })?;
                    }
                    position = next;
                }
            }
        }

        debug!(
            formats = definitions.formats.len(),
            info = definitions.info.len(),
            parameters = definitions.parameters.len(),
            data_start = position,
            "Parsed ULog definitions"
        );

        Ok(Self {
            data,
            path,
            position,
            header,
            definitions,
            subscriptions: HashMap::new(),
            data_start: position,
            skipped: 0,
            truncated: false,
        })
    }

    /// Read the next surfaced message from the data section.
    ///
    /// Subscriptions, sync markers and unknown message types are consumed
    /// internally. Returns `Ok(None)` at the end of the file or at a
    /// truncated final message.
    pub fn read_next_message(&mut self) -> Result<Option<LogMessage>> {
        loop {
            let (message_type, start, end) = match message_at(&self.data, self.position) {
                RawMessage::End => return Ok(None),
                RawMessage::Truncated { declared, available } => {
                    if !self.truncated {
                        warn!(
                            "ULog data truncated at offset {} ({} of {} bytes); stopping",
                            self.position, available, declared
                        );
                        self.truncated = true;
                    }
                    return Ok(None);
                }
                RawMessage::Complete { message_type, body: (start, end), next } => {
                    self.position = next;
                    (message_type, start, end)
                }
            };

            let body = &self.data[start..end];
            let result = match message_type {
                MessageType::AddSubscription => {
                    Self::subscribe(&mut self.subscriptions, &self.definitions.formats, body)
                        .map(|_| None)
                }
                MessageType::RemoveSubscription => u16::read_le(body, 0).map(|msg_id| {
                    self.subscriptions.remove(&msg_id);
                    None
                }),
                MessageType::Data => Self::data_record(&self.subscriptions, &self.definitions.formats, body)
                    .map(|record| record.map(LogMessage::Data)),
                MessageType::Logging => Self::logged_string(body, false).map(|s| Some(LogMessage::Logged(s))),
                MessageType::TaggedLogging => Self::logged_string(body, true).map(|s| Some(LogMessage::Logged(s))),
                MessageType::Dropout => u16::read_le(body, 0)
                    .map(|duration_ms| Some(LogMessage::Dropout { duration_ms })),
                MessageType::Sync => Ok(None),
                MessageType::Unknown(code) => {
                    trace!(code, "Skipping unknown ULog message type");
                    Ok(None)
                }
                definition => self.definitions.apply(definition, body),
            };

            match result {
                Ok(Some(message)) => return Ok(Some(message)),
                Ok(None) => {}
                Err(e) => {
                    self.skipped += 1;
                    warn!("Skipping ULog {:?} message at offset {}: {}", message_type, start, e);
                }
            }
        }
    }

    fn subscribe(
        subscriptions: &mut HashMap<u16, Subscription>,
        formats: &Formats,
        body: &[u8],
    ) -> Result<()> {
        let multi_id = u8::read_le(body, 0)?;
        let msg_id = u16::read_le(body, 1)?;
        let name = String::from_utf8_lossy(body.get(3..).unwrap_or_default()).into_owned();

        if formats.get(&name).is_none() {
            return Err(TelemetryError::parse_error(
                "ULog subscription",
                format!("subscription {msg_id} references unknown format '{name}'"),
            ));
        }

        trace!(msg_id, multi_id, %name, "Subscription added");
        subscriptions.insert(msg_id, Subscription { msg_id, multi_id, name });
        Ok(())
    }

    fn data_record(
        subscriptions: &HashMap<u16, Subscription>,
        formats: &Formats,
        body: &[u8],
    ) -> Result<Option<DataRecord>> {
        let msg_id = u16::read_le(body, 0)?;
        let Some(subscription) = subscriptions.get(&msg_id) else {
            trace!(msg_id, "Data for unknown subscription");
            return Ok(None);
        };

        let fields = formats.decode(&subscription.name, &body[2..])?;
        Ok(Some(DataRecord {
            msg_id,
            multi_id: subscription.multi_id,
            name: subscription.name.clone(),
            fields,
        }))
    }

    fn logged_string(body: &[u8], tagged: bool) -> Result<LoggedString> {
        let level = u8::read_le(body, 0)?;
        let (tag, timestamp_at) = if tagged { (Some(u16::read_le(body, 1)?), 3) } else { (None, 1) };
        let timestamp_us = u64::read_le(body, timestamp_at)?;
        let text = body.get(timestamp_at + 8..).unwrap_or_default();

        Ok(LoggedString {
            level: level_name(level).to_string(),
            tag,
            timestamp_us,
            message: String::from_utf8_lossy(text).trim_end_matches('\0').to_string(),
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn flags(&self) -> Option<&FlagBits> {
        self.definitions.flags.as_ref()
    }

    pub fn formats(&self) -> &Formats {
        &self.definitions.formats
    }

    pub fn info(&self) -> &BTreeMap<String, FieldValue> {
        &self.definitions.info
    }

    pub fn multi_info(&self) -> &BTreeMap<String, Vec<FieldValue>> {
        &self.definitions.multi_info
    }

    /// Current parameter values, including in-flight changes read so far
    pub fn parameters(&self) -> &BTreeMap<String, FieldValue> {
        &self.definitions.parameters
    }

    pub fn default_parameters(&self) -> &BTreeMap<String, FieldValue> {
        &self.definitions.default_parameters
    }

    pub fn subscription(&self, msg_id: u16) -> Option<&Subscription> {
        self.subscriptions.get(&msg_id)
    }

    /// Byte offset where the data section starts
    pub fn data_start(&self) -> usize {
        self.data_start
    }

    /// Data-section messages skipped because they failed to decode
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Whether iteration stopped at a truncated message
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn file_size(&self) -> usize {
        self.data.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Syslog-style names for the ASCII log levels PX4 writes
fn level_name(level: u8) -> &'static str {
    match level {
        b'0' => "EMERG",
        b'1' => "ALERT",
        b'2' => "CRIT",
        b'3' => "ERR",
        b'4' => "WARNING",
        b'5' => "NOTICE",
        b'6' => "INFO",
        b'7' => "DEBUG",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::UlogBuilder;

    fn attitude_log() -> UlogBuilder {
        UlogBuilder::new(1_000)
            .format("vehicle_attitude:uint64_t timestamp;float[4] q;uint8_t[4] _padding0;")
            .info("char[3] ver_hw", b"FMU")
            .parameter("int32_t SYS_AUTOSTART", &4001i32.to_le_bytes())
            .subscribe(0, 0, "vehicle_attitude")
    }

    fn attitude_payload(timestamp: u64) -> Vec<u8> {
        let mut payload = timestamp.to_le_bytes().to_vec();
        for v in [1.0f32, 0.0, 0.0, 0.0] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload
    }

    #[test]
    fn reads_definitions_and_data() {
        let data = attitude_log()
            .data(0, &attitude_payload(5_000))
            .logging(b'6', 6_000, "Armed")
            .data(0, &attitude_payload(7_000))
            .build();

        let mut reader = UlogReader::from_bytes(data).unwrap();
        assert_eq!(reader.header().timestamp_us, 1_000);
        assert_eq!(reader.info()["ver_hw"], FieldValue::Text("FMU".into()));
        assert_eq!(reader.parameters()["SYS_AUTOSTART"], FieldValue::Int(4001));

        let Some(LogMessage::Data(first)) = reader.read_next_message().unwrap() else {
            panic!("expected data record");
        };
        assert_eq!(first.name, "vehicle_attitude");
        assert_eq!(first.timestamp_us(), Some(5_000));
        assert!(first.field("_padding0").is_none());

        let Some(LogMessage::Logged(log)) = reader.read_next_message().unwrap() else {
            panic!("expected logged string");
        };
        assert_eq!(log.level, "INFO");
        assert_eq!(log.message, "Armed");

        assert!(matches!(reader.read_next_message().unwrap(), Some(LogMessage::Data(_))));
        assert!(reader.read_next_message().unwrap().is_none());
        assert!(!reader.is_truncated());
    }

    #[test]
    fn truncated_data_message_stops_iteration() {
        let mut data = attitude_log().data(0, &attitude_payload(5_000)).build();
        let complete = data.len();
        data.extend_from_slice(&30u16.to_le_bytes());
        data.push(b'D');
        data.extend_from_slice(&[0u8; 5]);

        let mut reader = UlogReader::from_bytes(data).unwrap();
        assert!(reader.read_next_message().unwrap().is_some());
        assert!(reader.read_next_message().unwrap().is_none());
        assert!(reader.is_truncated());
        assert!(reader.file_size() > complete);
    }

    #[test]
    fn truncated_definition_is_corrupted() {
        let mut data = UlogBuilder::new(0).format("a:uint8_t x;").build();
        data.extend_from_slice(&50u16.to_le_bytes());
        data.push(b'F');
        data.extend_from_slice(b"b:uint8");

        let err = UlogReader::from_bytes(data).err().expect("should fail");
        assert!(matches!(err, TelemetryError::Corrupted { .. }));
    }

    #[test]
    fn bad_magic_is_invalid() {
        let err = UlogReader::from_bytes(b"PK\x03\x04 zip archive".to_vec()).err().expect("should fail");
        assert!(matches!(err, TelemetryError::InvalidLog { .. }));
    }

    #[test]
    fn data_for_unknown_subscription_is_ignored() {
        let data = attitude_log()
            .data(9, &attitude_payload(1))
            .data(0, &attitude_payload(2))
            .build();

        let mut reader = UlogReader::from_bytes(data).unwrap();
        let Some(LogMessage::Data(record)) = reader.read_next_message().unwrap() else {
            panic!("expected data record");
        };
        assert_eq!(record.timestamp_us(), Some(2));
    }

    #[test]
    fn undecodable_records_are_skipped() {
        let data = attitude_log()
            .data(0, &[0u8; 6])
            .data(0, &attitude_payload(3))
            .dropout(120)
            .build();

        let mut reader = UlogReader::from_bytes(data).unwrap();
        assert!(matches!(reader.read_next_message().unwrap(), Some(LogMessage::Data(_))));
        assert_eq!(reader.skipped(), 1);
        assert_eq!(
            reader.read_next_message().unwrap(),
            Some(LogMessage::Dropout { duration_ms: 120 })
        );
    }

    #[test]
    fn tagged_logging_and_parameter_changes_surface() {
        let data = attitude_log()
            .tagged_logging(b'3', 77, 8_000, "Sensor fault")
            .parameter("int32_t SYS_AUTOSTART", &4001i32.to_le_bytes())
            .parameter("int32_t SYS_AUTOSTART", &4002i32.to_le_bytes())
            .build();

        let mut reader = UlogReader::from_bytes(data).unwrap();
        let Some(LogMessage::Logged(log)) = reader.read_next_message().unwrap() else {
            panic!("expected logged string");
        };
        assert_eq!(log.tag, Some(77));
        assert_eq!(log.level, "ERR");
        assert_eq!(log.timestamp_us, 8_000);

        // Re-announcing an unchanged value is not a change
        assert_eq!(
            reader.read_next_message().unwrap(),
            Some(LogMessage::Parameter { name: "SYS_AUTOSTART".into(), value: FieldValue::Int(4002) })
        );
        assert_eq!(reader.parameters()["SYS_AUTOSTART"], FieldValue::Int(4002));
    }

    #[test]
    fn unknown_incompat_flags_are_corrupted() {
        let data = UlogBuilder::new(0).flag_bits([0u8; 8], [0x02, 0, 0, 0, 0, 0, 0, 0]).build();
        let err = UlogReader::from_bytes(data).err().expect("should fail");
        assert!(matches!(err, TelemetryError::Corrupted { .. }));
    }

    #[test]
    fn open_reads_from_disk() {
        let data = attitude_log().data(0, &attitude_payload(5)).build();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &data).unwrap();

        let mut reader = UlogReader::open(file.path()).unwrap();
        assert_eq!(reader.path(), file.path());
        assert!(reader.read_next_message().unwrap().is_some());

        let missing = UlogReader::open("/nonexistent/flight.ulg").err().expect("should fail");
        assert!(matches!(missing, TelemetryError::File { .. }));
    }
}
