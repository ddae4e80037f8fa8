//! Message definitions and the serialized message decoder.
//!
//! Connection records embed the full text definition of their message type,
//! including every nested type after a `MSG: pkg/Type` separator. That is
//! enough to decode any message without a local type registry.

use super::time::RosTime;
use super::BagError;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Primitive {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Time,
    Duration,
}

impl Primitive {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Primitive::Bool,
            "int8" | "byte" => Primitive::Int8,
            "uint8" | "char" => Primitive::UInt8,
            "int16" => Primitive::Int16,
            "uint16" => Primitive::UInt16,
            "int32" => Primitive::Int32,
            "uint32" => Primitive::UInt32,
            "int64" => Primitive::Int64,
            "uint64" => Primitive::UInt64,
            "float32" => Primitive::Float32,
            "float64" => Primitive::Float64,
            "string" => Primitive::String,
            "time" => Primitive::Time,
            "duration" => Primitive::Duration,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldType {
    Primitive(Primitive),
    Complex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayLen {
    Dynamic,
    Fixed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    ty: FieldType,
    array: Option<ArrayLen>,
}

/// A decoded message value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Time(RosTime),
    Duration { sec: i32, nsec: i32 },
    Array(Vec<Value>),
    Message(Vec<(String, Value)>),
}

impl Value {
    /// Looks up a field of a decoded message.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Message(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::UInt(u) => Some(*u != 0),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Time(t) => write!(f, "{}", t),
            Value::Duration { sec, nsec } => write!(f, "{}s{}ns", sec, nsec),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Message(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Parsed message definition for one root type and its dependencies.
#[derive(Debug, Clone)]
pub struct Schema {
    root: String,
    types: HashMap<String, Vec<Field>>,
}

fn package_of(type_name: &str) -> &str {
    type_name.split_once('/').map(|(pkg, _)| pkg).unwrap_or("")
}

fn resolve_type(raw: &str, package: &str) -> FieldType {
    if let Some(p) = Primitive::from_name(raw) {
        return FieldType::Primitive(p);
    }
    if raw == "Header" {
        return FieldType::Complex("std_msgs/Header".to_string());
    }
    if raw.contains('/') || package.is_empty() {
        FieldType::Complex(raw.to_string())
    } else {
        FieldType::Complex(format!("{}/{}", package, raw))
    }
}

fn parse_field_line(line: &str, package: &str) -> Result<Option<Field>, BagError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (type_token, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| BagError::InvalidDefinition(format!("malformed line '{}'", line)))?;

    let before_comment = rest.split('#').next().unwrap_or("");

    // Constants (`int32 MODE_IDLE=0`) carry no wire data.
    if before_comment.contains('=') {
        return Ok(None);
    }

    let name = Some(before_comment.trim())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| BagError::InvalidDefinition(format!("missing field name in '{}'", line)))?;

    let (base, array) = match type_token.split_once('[') {
        Some((base, suffix)) => {
            let len = suffix.trim_end_matches(']');
            let array = if len.is_empty() {
                ArrayLen::Dynamic
            } else {
                ArrayLen::Fixed(len.parse().map_err(|_| {
                    BagError::InvalidDefinition(format!("bad array length in '{}'", line))
                })?)
            };
            (base, Some(array))
        }
        None => (type_token, None),
    };

    Ok(Some(Field {
        name: name.to_string(),
        ty: resolve_type(base, package),
        array,
    }))
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| c == '=')
}

impl Schema {
    pub fn parse(root_type: &str, definition: &str) -> Result<Self, BagError> {
        let mut types: HashMap<String, Vec<Field>> = HashMap::new();
        let mut current_type = root_type.to_string();
        let mut current_fields = Vec::new();

        for line in definition.lines() {
            if is_separator(line) {
                types.insert(
                    std::mem::take(&mut current_type),
                    std::mem::take(&mut current_fields),
                );
                continue;
            }
            if let Some(name) = line.trim().strip_prefix("MSG:") {
                current_type = name.trim().to_string();
                continue;
            }
            let package = package_of(&current_type).to_string();
            if let Some(field) = parse_field_line(line, &package)? {
                current_fields.push(field);
            }
        }
        types.insert(current_type, current_fields);

        Ok(Self {
            root: root_type.to_string(),
            types,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn decode(&self, data: &[u8]) -> Result<Value, BagError> {
        let mut cursor = Decoder { data, pos: 0 };
        self.decode_complex(&self.root, &mut cursor)
    }

    fn decode_complex(&self, type_name: &str, cursor: &mut Decoder<'_>) -> Result<Value, BagError> {
        let fields = self
            .types
            .get(type_name)
            .ok_or_else(|| BagError::UnknownType(type_name.to_string()))?;

        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            let value = match field.array {
                None => self.decode_single(&field.ty, cursor)?,
                Some(len) => {
                    let count = match len {
                        ArrayLen::Fixed(n) => n,
                        ArrayLen::Dynamic => cursor.u32()? as usize,
                    };
                    let mut items = Vec::with_capacity(count.min(cursor.remaining()));
                    for _ in 0..count {
                        items.push(self.decode_single(&field.ty, cursor)?);
                    }
                    Value::Array(items)
                }
            };
            values.push((field.name.clone(), value));
        }
        Ok(Value::Message(values))
    }

    fn decode_single(&self, ty: &FieldType, cursor: &mut Decoder<'_>) -> Result<Value, BagError> {
        match ty {
            FieldType::Complex(name) => self.decode_complex(name, cursor),
            FieldType::Primitive(p) => cursor.primitive(*p),
        }
    }
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BagError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or(BagError::TruncatedMessage)?;
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BagError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, BagError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn primitive(&mut self, p: Primitive) -> Result<Value, BagError> {
        Ok(match p {
            Primitive::Bool => Value::Bool(self.array::<1>()?[0] != 0),
            Primitive::Int8 => Value::Int(i8::from_le_bytes(self.array()?) as i64),
            Primitive::UInt8 => Value::UInt(self.array::<1>()?[0] as u64),
            Primitive::Int16 => Value::Int(i16::from_le_bytes(self.array()?) as i64),
            Primitive::UInt16 => Value::UInt(u16::from_le_bytes(self.array()?) as u64),
            Primitive::Int32 => Value::Int(i32::from_le_bytes(self.array()?) as i64),
            Primitive::UInt32 => Value::UInt(self.u32()? as u64),
            Primitive::Int64 => Value::Int(i64::from_le_bytes(self.array()?)),
            Primitive::UInt64 => Value::UInt(u64::from_le_bytes(self.array()?)),
            Primitive::Float32 => Value::Float(f32::from_le_bytes(self.array()?) as f64),
            Primitive::Float64 => Value::Float(f64::from_le_bytes(self.array()?)),
            Primitive::String => {
                let len = self.u32()? as usize;
                Value::String(String::from_utf8_lossy(self.take(len)?).into_owned())
            }
            Primitive::Time => Value::Time(RosTime::from_bytes(self.array()?)),
            Primitive::Duration => Value::Duration {
                sec: i32::from_le_bytes(self.array()?),
                nsec: i32::from_le_bytes(self.array()?),
            },
        })
    }
}

/// Serializes a `std_msgs/String` payload.
pub fn encode_string_message(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + text.len());
    out.extend_from_slice(&(text.len() as u32).to_le_bytes());
    out.extend_from_slice(text.as_bytes());
    out
}
