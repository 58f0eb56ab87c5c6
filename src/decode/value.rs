//! Runtime values produced by schema-driven decoding.

/// Payload stored outside the object, e.g. in a `.resS` file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StreamingPointer {
    pub path: String,
    pub offset: u64,
    pub size: u64,
}

impl StreamingPointer {
    pub fn new(path: impl Into<String>, offset: u64, size: u64) -> Self {
        Self { path: path.into(), offset, size }
    }

    /// True when the pointer actually refers to external bytes.
    #[inline]
    pub fn is_external(&self) -> bool {
        !self.path.is_empty() && self.size > 0
    }
}

/// One decoded field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    /// Fields in schema order.
    Record(Vec<(String, Value)>),
    /// Flat byte buffer, left unread; `offset` is relative to the object start.
    Blob { offset: u64, len: u64 },
    StreamingInfo(StreamingPointer),
    /// Fixed-size field the decoder does not interpret.
    Skipped { size: u32 },
}

impl Value {
    /// Field of a record by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, accepting either signedness when it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Unsigned value, accepting non-negative signed integers.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Byte range of a typeless buffer, relative to the object start.
    pub fn as_blob(&self) -> Option<(u64, u64)> {
        match self {
            Value::Blob { offset, len } => Some((*offset, *len)),
            _ => None,
        }
    }

    pub fn as_streaming_info(&self) -> Option<&StreamingPointer> {
        match self {
            Value::StreamingInfo(p) => Some(p),
            _ => None,
        }
    }

    /// Interpret a `StreamedResource`-shaped record (source, offset, size).
    pub fn as_streamed_resource(&self) -> Option<StreamingPointer> {
        let source = self.field("m_Source")?.as_str()?;
        let offset = self.field("m_Offset")?.as_u64()?;
        let size = self.field("m_Size")?.as_u64()?;
        Some(StreamingPointer::new(source, offset, size))
    }
}
