//! ULog file format structures and parsing
//!
//! Defines the binary structures used in PX4's ULog flight-log format and
//! decodes message payloads against their self-described formats.
//!
//! ## ULog File Structure
//!
//! 1. **File Header** (16 bytes) - magic, version byte, start timestamp
//! 2. **Definitions Section** - flag bits, formats, info and parameters
//! 3. **Data Section** - subscriptions, data records, logged strings, sync
//!    and dropout markers
//!
//! Every message after the header starts with a 3-byte header: `u16`
//! payload size followed by a `u8` ASCII type code.
//!
//! ## Value Encoding
//!
//! All scalars are little-endian. Formats are declared as text, e.g.
//! `vehicle_attitude:uint64_t timestamp;float[4] q;uint8_t[4] _padding0;`,
//! and may nest other formats by name.

use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use tracing::trace;

use crate::types::WireValue;
use crate::{Result, TelemetryError};

/// File magic: `ULog` followed by `01 12 35`
pub const ULOG_MAGIC: [u8; 7] = [0x55, 0x4C, 0x6F, 0x67, 0x01, 0x12, 0x35];

/// Size of the file header in bytes
pub const FILE_HEADER_SIZE: usize = 16;

/// Size of every message header (`u16` size + `u8` type)
pub const MESSAGE_HEADER_SIZE: usize = 3;

/// Incompatible flag bit 0 of byte 0: data appended after the first write
pub const INCOMPAT_DATA_APPENDED: u8 = 0x01;

const FLAG_BITS_SIZE: usize = 40;
const MAX_NESTING_DEPTH: usize = 16;

/// ULog file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u8,
    /// Logging start time in microseconds
    pub timestamp_us: u64,
}

impl FileHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        trace!("Reading ULog header ({} bytes)", FILE_HEADER_SIZE);

        if data.len() < ULOG_MAGIC.len() || data[..ULOG_MAGIC.len()] != ULOG_MAGIC {
            return Err(TelemetryError::invalid_log("missing ULog magic bytes"));
        }
        if data.len() < FILE_HEADER_SIZE {
            return Err(TelemetryError::corrupted(format!(
                "file header needs {} bytes, file has {}",
                FILE_HEADER_SIZE,
                data.len()
            )));
        }

        Ok(Self { version: data[7], timestamp_us: u64::read_le(data, 8)? })
    }
}

/// Flag bits message (`B`), only valid as the first message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagBits {
    pub compat_flags: [u8; 8],
    pub incompat_flags: [u8; 8],
    pub appended_offsets: [u64; 3],
}

impl FlagBits {
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < FLAG_BITS_SIZE {
            return Err(TelemetryError::corrupted(format!(
                "flag bits message has {} bytes, expected {}",
                body.len(),
                FLAG_BITS_SIZE
            )));
        }

        let mut flags = Self::default();
        flags.compat_flags.copy_from_slice(&body[0..8]);
        flags.incompat_flags.copy_from_slice(&body[8..16]);
        for (i, offset) in flags.appended_offsets.iter_mut().enumerate() {
            *offset = u64::read_le(body, 16 + i * 8)?;
        }

        // Unknown incompatible bits mean the file cannot be read safely
        let unknown = flags.incompat_flags[0] & !INCOMPAT_DATA_APPENDED != 0
            || flags.incompat_flags[1..].iter().any(|b| *b != 0);
        if unknown {
            return Err(TelemetryError::corrupted(format!(
                "unknown incompatible flag bits {:02x?}",
                flags.incompat_flags
            )));
        }

        Ok(flags)
    }

    pub fn has_appended_data(&self) -> bool {
        self.incompat_flags[0] & INCOMPAT_DATA_APPENDED != 0
    }
}

/// Message type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    FlagBits,
    Format,
    Info,
    MultiInfo,
    Parameter,
    ParameterDefault,
    AddSubscription,
    RemoveSubscription,
    Data,
    Logging,
    TaggedLogging,
    Sync,
    Dropout,
    Unknown(u8),
}

impl From<u8> for MessageType {
    fn from(code: u8) -> Self {
        match code {
            b'B' => MessageType::FlagBits,
            b'F' => MessageType::Format,
            b'I' => MessageType::Info,
            b'M' => MessageType::MultiInfo,
            b'P' => MessageType::Parameter,
            b'Q' => MessageType::ParameterDefault,
            b'A' => MessageType::AddSubscription,
            b'R' => MessageType::RemoveSubscription,
            b'D' => MessageType::Data,
            b'L' => MessageType::Logging,
            b'C' => MessageType::TaggedLogging,
            b'S' => MessageType::Sync,
            b'O' => MessageType::Dropout,
            other => MessageType::Unknown(other),
        }
    }
}

impl MessageType {
    /// Whether this type belongs in the definitions section
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            MessageType::FlagBits
                | MessageType::Format
                | MessageType::Info
                | MessageType::MultiInfo
                | MessageType::Parameter
                | MessageType::ParameterDefault
        )
    }
}

/// Location of one message inside the file buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawMessage {
    /// A complete message; `body` is the byte range of its payload
    Complete { message_type: MessageType, body: (usize, usize), next: usize },
    /// Header or body runs past the end of the buffer
    Truncated { declared: usize, available: usize },
    /// Clean end of buffer
    End,
}

/// Locate the message starting at `position`.
pub fn message_at(data: &[u8], position: usize) -> RawMessage {
    let available = data.len().saturating_sub(position);
    if available == 0 {
        return RawMessage::End;
    }
    if available < MESSAGE_HEADER_SIZE {
        return RawMessage::Truncated { declared: MESSAGE_HEADER_SIZE, available };
    }

    let size = u16::from_le_bytes([data[position], data[position + 1]]) as usize;
    let message_type = MessageType::from(data[position + 2]);
    let start = position + MESSAGE_HEADER_SIZE;
    let end = start + size;
    if end > data.len() {
        return RawMessage::Truncated {
            declared: size,
            available: available - MESSAGE_HEADER_SIZE,
        };
    }

    RawMessage::Complete { message_type, body: (start, end), next: end }
}

/// Primitive field types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Bool,
    Char,
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "int8_t" => ScalarType::Int8,
            "uint8_t" => ScalarType::UInt8,
            "int16_t" => ScalarType::Int16,
            "uint16_t" => ScalarType::UInt16,
            "int32_t" => ScalarType::Int32,
            "uint32_t" => ScalarType::UInt32,
            "int64_t" => ScalarType::Int64,
            "uint64_t" => ScalarType::UInt64,
            "float" => ScalarType::Float,
            "double" => ScalarType::Double,
            "bool" => ScalarType::Bool,
            "char" => ScalarType::Char,
            _ => return None,
        })
    }

    pub fn size(&self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 | ScalarType::Bool | ScalarType::Char => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Double => 8,
        }
    }

    pub fn read(&self, data: &[u8], offset: usize) -> Result<FieldValue> {
        Ok(match self {
            ScalarType::Int8 => FieldValue::Int(i8::read_le(data, offset)?.into()),
            ScalarType::UInt8 => FieldValue::Int(u8::read_le(data, offset)?.into()),
            ScalarType::Int16 => FieldValue::Int(i16::read_le(data, offset)?.into()),
            ScalarType::UInt16 => FieldValue::Int(u16::read_le(data, offset)?.into()),
            ScalarType::Int32 => FieldValue::Int(i32::read_le(data, offset)?.into()),
            ScalarType::UInt32 => FieldValue::Int(u32::read_le(data, offset)?.into()),
            ScalarType::Int64 => FieldValue::Int64(i64::read_le(data, offset)?),
            ScalarType::UInt64 => FieldValue::UInt64(u64::read_le(data, offset)?),
            ScalarType::Float => FieldValue::Float(f32::read_le(data, offset)?.into()),
            ScalarType::Double => FieldValue::Float(f64::read_le(data, offset)?),
            ScalarType::Bool => FieldValue::Bool(u8::read_le(data, offset)? != 0),
            ScalarType::Char => {
                FieldValue::Text(char::from(u8::read_le(data, offset)?).to_string())
            }
        })
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Any integer up to 32 bits wide
    Int(i64),
    Int64(i64),
    UInt64(u64),
    Float(f64),
    Bool(bool),
    /// `char` or `char[N]`, NUL-terminated
    Text(String),
    Array(Vec<FieldValue>),
    /// Nested format, padding removed
    Struct(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// JSON form. 64-bit integers become strings so no precision is lost in
    /// JavaScript clients.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Int(v) => Value::from(*v),
            FieldValue::Int64(v) => Value::String(v.to_string()),
            FieldValue::UInt64(v) => Value::String(v.to_string()),
            FieldValue::Float(v) => Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::Bool(v) => Value::Bool(*v),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Array(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::Struct(fields) => Value::Object(fields_to_json(fields)),
        }
    }

    /// Interpret as an unsigned timestamp, if integral and non-negative
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Int(v) | FieldValue::Int64(v) => u64::try_from(*v).ok(),
            FieldValue::UInt64(v) => Some(*v),
            _ => None,
        }
    }
}

/// Convert decoded fields into a JSON object
pub fn fields_to_json(fields: &[(String, FieldValue)]) -> Map<String, Value> {
    fields.iter().map(|(name, value)| (name.clone(), value.to_json())).collect()
}

/// Base type of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldBase {
    Scalar(ScalarType),
    /// Another format, referenced by name
    Nested(String),
}

/// One `type name` declaration inside a format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// Declared type text, e.g. `float[4]`
    pub type_name: String,
    pub base: FieldBase,
    pub array_len: Option<usize>,
}

impl FieldDef {
    /// Parse a declaration such as `uint64_t timestamp` or `float[4] q`
    pub fn parse(declaration: &str) -> Result<Self> {
        let declaration = declaration.trim();
        let (type_name, name) = declaration.split_once(' ').ok_or_else(|| {
            TelemetryError::parse_error("ULog field", format!("expected 'type name', got '{declaration}'"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(TelemetryError::parse_error(
                "ULog field",
                format!("missing field name in '{declaration}'"),
            ));
        }

        let (base_name, array_len) = match type_name.split_once('[') {
            Some((base, rest)) => {
                let len = rest
                    .strip_suffix(']')
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| {
                        TelemetryError::parse_error(
                            "ULog field",
                            format!("bad array length in '{type_name}'"),
                        )
                    })?;
                (base, Some(len))
            }
            None => (type_name, None),
        };

        let base = match ScalarType::from_name(base_name) {
            Some(scalar) => FieldBase::Scalar(scalar),
            None => FieldBase::Nested(base_name.to_string()),
        };

        Ok(Self { name: name.to_string(), type_name: type_name.to_string(), base, array_len })
    }

    /// Padding occupies bytes but never appears in output
    pub fn is_padding(&self) -> bool {
        self.name.starts_with("_padding")
    }
}

/// A format definition (`F` message)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl FormatDef {
    /// Parse `name:type field;type field;...`
    pub fn parse(text: &str) -> Result<Self> {
        let (name, body) = text.split_once(':').ok_or_else(|| {
            TelemetryError::parse_error("ULog format", format!("missing ':' separator in '{text}'"))
        })?;

        let fields = body
            .split(';')
            .filter(|decl| !decl.trim().is_empty())
            .map(FieldDef::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { name: name.trim().to_string(), fields })
    }

    /// Fields that appear in output
    pub fn visible_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_padding())
    }
}

/// Registry of format definitions, keyed by name
#[derive(Debug, Clone, Default)]
pub struct Formats {
    formats: HashMap<String, FormatDef>,
}

impl Formats {
    pub fn insert(&mut self, format: FormatDef) {
        trace!(name = %format.name, fields = format.fields.len(), "Format defined");
        self.formats.insert(format.name.clone(), format);
    }

    pub fn get(&self, name: &str) -> Option<&FormatDef> {
        self.formats.get(name)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Encoded size of a format, padding included
    pub fn size_of(&self, name: &str) -> Result<usize> {
        self.format_size(name, 0)
    }

    fn format_size(&self, name: &str, depth: usize) -> Result<usize> {
        let format = self.lookup(name, depth)?;
        format.fields.iter().try_fold(0usize, |total, field| {
            total.checked_add(self.field_size(field, depth)?).ok_or_else(|| size_overflow(name))
        })
    }

    /// Decode a payload against the named format.
    ///
    /// Trailing padding may be absent from the payload; any other field
    /// that runs past the end is a [`TelemetryError::Memory`] error.
    pub fn decode(&self, name: &str, payload: &[u8]) -> Result<Vec<(String, FieldValue)>> {
        self.decode_format(name, payload, 0, 0).map(|(fields, _)| fields)
    }

    fn decode_format(
        &self,
        name: &str,
        data: &[u8],
        mut offset: usize,
        depth: usize,
    ) -> Result<(Vec<(String, FieldValue)>, usize)> {
        let format = self.lookup(name, depth)?;
        let mut fields = Vec::with_capacity(format.fields.len());

        for field in &format.fields {
            if field.is_padding() {
                offset = offset
                    .checked_add(self.field_size(field, depth)?)
                    .ok_or_else(|| size_overflow(name))?;
                continue;
            }
            let (value, next) = self.decode_field(field, data, offset, depth)?;
            fields.push((field.name.clone(), value));
            offset = next;
        }

        Ok((fields, offset))
    }

    /// Decode a single declared field at `offset`; returns the value and
    /// the offset just past it.
    pub fn decode_field(
        &self,
        field: &FieldDef,
        data: &[u8],
        offset: usize,
        depth: usize,
    ) -> Result<(FieldValue, usize)> {
        match (&field.base, field.array_len) {
            (FieldBase::Scalar(ScalarType::Char), Some(len)) => {
                let bytes = offset
                    .checked_add(len)
                    .and_then(|end| data.get(offset..end))
                    .ok_or_else(|| TelemetryError::memory_access_error(offset))?;
                let text = bytes.split(|b| *b == 0).next().unwrap_or_default();
                Ok((FieldValue::Text(String::from_utf8_lossy(text).into_owned()), offset + len))
            }
            (base, Some(len)) => {
                // Declared lengths come from the file; never allocate more
                // elements than the remaining bytes can hold
                let remaining = data.len().saturating_sub(offset);
                let fits = match self.element_size(base, depth)? {
                    0 => len <= remaining,
                    size => len <= remaining / size,
                };
                if !fits {
                    return Err(TelemetryError::memory_access_error(offset));
                }

                let mut items = Vec::with_capacity(len);
                let mut offset = offset;
                for _ in 0..len {
                    let (item, next) = self.decode_element(base, data, offset, depth)?;
                    items.push(item);
                    offset = next;
                }
                Ok((FieldValue::Array(items), offset))
            }
            (base, None) => self.decode_element(base, data, offset, depth),
        }
    }

    fn decode_element(
        &self,
        base: &FieldBase,
        data: &[u8],
        offset: usize,
        depth: usize,
    ) -> Result<(FieldValue, usize)> {
        match base {
            FieldBase::Scalar(scalar) => Ok((scalar.read(data, offset)?, offset + scalar.size())),
            FieldBase::Nested(name) => {
                let (fields, next) = self.decode_format(name, data, offset, depth + 1)?;
                Ok((FieldValue::Struct(fields), next))
            }
        }
    }

    fn element_size(&self, base: &FieldBase, depth: usize) -> Result<usize> {
        match base {
            FieldBase::Scalar(scalar) => Ok(scalar.size()),
            FieldBase::Nested(name) => self.format_size(name, depth + 1),
        }
    }

    fn field_size(&self, field: &FieldDef, depth: usize) -> Result<usize> {
        self.element_size(&field.base, depth)?
            .checked_mul(field.array_len.unwrap_or(1))
            .ok_or_else(|| size_overflow(&field.type_name))
    }

    fn lookup(&self, name: &str, depth: usize) -> Result<&FormatDef> {
        if depth > MAX_NESTING_DEPTH {
            return Err(TelemetryError::parse_error(
                "ULog format",
                format!("nesting deeper than {MAX_NESTING_DEPTH} levels at '{name}'"),
            ));
        }
        self.formats.get(name).ok_or_else(|| {
            TelemetryError::parse_error("ULog format", format!("unknown format '{name}'"))
        })
    }
}

fn size_overflow(name: &str) -> TelemetryError {
    TelemetryError::parse_error("ULog format", format!("size of '{name}' overflows"))
}

/// Read a `u8`-length-prefixed key from the start of `body`.
///
/// Returns the key text and the offset of the value that follows it.
pub fn read_key(body: &[u8], offset: usize) -> Result<(&str, usize)> {
    let len = u8::read_le(body, offset)? as usize;
    let start = offset + 1;
    let key = body
        .get(start..start + len)
        .ok_or_else(|| TelemetryError::memory_access_error(start))?;
    let key = std::str::from_utf8(key)
        .map_err(|e| TelemetryError::parse_error("ULog key", e.to_string()))?;
    Ok((key, start + len))
}
