//! Attribute reflection.
//!
//! An [`AttributeDescription`] names one field of a component, where it
//! lives inside the packed struct, and how an editor may present it. The
//! generic serializer and the property grid both walk these descriptions
//! instead of knowing concrete component types.
//!
//! An attribute's byte span runs from its offset to the next attribute's
//! offset (or to the end of the struct for the last one). Vector types
//! derive their element count from that span; `Char` spans hold
//! NUL-padded text.
//!
//! Reading then writing a span restores it bit for bit. Ids are carried as
//! their hash, and char spans that are not clean text fall back to raw bytes.

use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SerializeError;
use crate::string_id::{StringId, StringRegistry};

/// The storage type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    /// One byte, zero is `false`.
    Bool,
    /// NUL-padded UTF-8 text filling the attribute span.
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    VectorInt32,
    VectorInt64,
    VectorUInt8,
    VectorUInt32,
    VectorUInt64,
    VectorFloat32,
    VectorFloat64,
    /// Four `f32` in `x, y, z, w` order.
    Quat,
    /// A [`StringId`], serialised as its hash plus the text when known.
    StringId,
    /// Opaque bytes, or a payload handled by the component's custom codec.
    Custom,
}

impl AttributeType {
    /// Size in bytes of one element, or `None` for span-sized types
    /// (`Char`, `Custom`).
    #[must_use]
    pub const fn element_size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 | Self::VectorUInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32
            | Self::UInt32
            | Self::Float32
            | Self::StringId
            | Self::VectorInt32
            | Self::VectorUInt32
            | Self::VectorFloat32 => Some(4),
            Self::Int64
            | Self::UInt64
            | Self::Float64
            | Self::VectorInt64
            | Self::VectorUInt64
            | Self::VectorFloat64 => Some(8),
            Self::Quat => Some(16),
            Self::Char | Self::Custom => None,
        }
    }

    /// Returns `true` for the `Vector*` family.
    #[must_use]
    pub const fn is_vector(self) -> bool {
        matches!(
            self,
            Self::VectorInt32
                | Self::VectorInt64
                | Self::VectorUInt8
                | Self::VectorUInt32
                | Self::VectorUInt64
                | Self::VectorFloat32
                | Self::VectorFloat64
        )
    }

    /// Returns `true` if min/max ranges apply to this type.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(
            self,
            Self::Bool | Self::Char | Self::StringId | Self::Custom | Self::Quat
        )
    }
}

/// Reflection metadata for one component field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescription {
    /// Storage type.
    pub ty: AttributeType,
    /// Byte offset from the start of the component struct.
    pub offset: usize,
    /// Field name, unique within the component.
    pub name: String,
    /// Lower bound for editing and validation.
    pub min: Option<f64>,
    /// Upper bound for editing and validation.
    pub max: Option<f64>,
    /// Editor drag step.
    pub step: Option<f32>,
    /// Enumerated choices (e.g. script or mesh names).
    pub options: Vec<String>,
}

impl AttributeDescription {
    /// Describe a field of type `ty` at `offset`.
    #[must_use]
    pub fn new(ty: AttributeType, offset: usize, name: impl Into<String>) -> Self {
        Self {
            ty,
            offset,
            name: name.into(),
            min: None,
            max: None,
            step: None,
            options: Vec::new(),
        }
    }

    /// Set the inclusive editing range.
    #[must_use]
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Set the editor drag step.
    #[must_use]
    pub fn step(mut self, step: f32) -> Self {
        self.step = Some(step);
        self
    }

    /// Set the enumerated choices.
    #[must_use]
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    Text(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    VecI32(Vec<i32>),
    VecI64(Vec<i64>),
    VecU8(Vec<u8>),
    VecU32(Vec<u32>),
    VecU64(Vec<u64>),
    VecF32(Vec<f32>),
    VecF64(Vec<f64>),
    Quat([f32; 4]),
    /// A [`StringId`] hash. `text` re-interns the string on load, so
    /// `as_str` keeps working after a registry reset.
    StringId { id: u32, text: Option<String> },
    Custom(Vec<u8>),
}

fn read_scalar<T: Pod>(span: &[u8]) -> T {
    bytemuck::pod_read_unaligned(&span[..std::mem::size_of::<T>()])
}

fn read_vector<T: Pod>(span: &[u8]) -> Vec<T> {
    span.chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

fn write_scalar<T: Pod>(span: &mut [u8], value: T) {
    let bytes = bytemuck::bytes_of(&value);
    span[..bytes.len()].copy_from_slice(bytes);
}

/// The text of a NUL-padded span, or `None` if the bytes are not valid
/// UTF-8 followed only by padding.
fn padded_text(span: &[u8]) -> Option<&str> {
    let end = span.iter().position(|&b| b == 0).unwrap_or(span.len());
    if span[end..].iter().any(|&b| b != 0) {
        return None;
    }
    std::str::from_utf8(&span[..end]).ok()
}

fn write_vector<T: Pod>(span: &mut [u8], values: &[T]) -> bool {
    let bytes: &[u8] = bytemuck::cast_slice(values);
    if bytes.len() != span.len() {
        return false;
    }
    span.copy_from_slice(bytes);
    true
}

impl AttributeValue {
    /// Decode the bytes of an attribute span.
    ///
    /// The span must be at least [`AttributeType::element_size`] long; the
    /// registry checks this when the component is registered.
    ///
    /// A `Char` span that is not clean padded text reads as
    /// [`AttributeValue::VecU8`] holding the whole span.
    #[must_use]
    pub fn read(ty: AttributeType, span: &[u8]) -> Self {
        match ty {
            AttributeType::Bool => Self::Bool(span[0] != 0),
            AttributeType::Char => match padded_text(span) {
                Some(text) => Self::Text(text.to_string()),
                None => Self::VecU8(span.to_vec()),
            },
            AttributeType::Int8 => Self::I8(read_scalar(span)),
            AttributeType::Int16 => Self::I16(read_scalar(span)),
            AttributeType::Int32 => Self::I32(read_scalar(span)),
            AttributeType::Int64 => Self::I64(read_scalar(span)),
            AttributeType::UInt8 => Self::U8(read_scalar(span)),
            AttributeType::UInt16 => Self::U16(read_scalar(span)),
            AttributeType::UInt32 => Self::U32(read_scalar(span)),
            AttributeType::UInt64 => Self::U64(read_scalar(span)),
            AttributeType::Float32 => Self::F32(read_scalar(span)),
            AttributeType::Float64 => Self::F64(read_scalar(span)),
            AttributeType::VectorInt32 => Self::VecI32(read_vector(span)),
            AttributeType::VectorInt64 => Self::VecI64(read_vector(span)),
            AttributeType::VectorUInt8 => Self::VecU8(span.to_vec()),
            AttributeType::VectorUInt32 => Self::VecU32(read_vector(span)),
            AttributeType::VectorUInt64 => Self::VecU64(read_vector(span)),
            AttributeType::VectorFloat32 => Self::VecF32(read_vector(span)),
            AttributeType::VectorFloat64 => Self::VecF64(read_vector(span)),
            AttributeType::Quat => Self::Quat(read_scalar(span)),
            AttributeType::StringId => {
                let id: StringId = read_scalar(span);
                Self::StringId {
                    id: id.id(),
                    text: StringRegistry::global().lookup(id).map(|t| t.to_string()),
                }
            }
            AttributeType::Custom => Self::Custom(span.to_vec()),
        }
    }

    /// Encode this value into an attribute span of type `ty`.
    ///
    /// # Errors
    ///
    /// - [`SerializeError::TypeMismatch`] if the value's variant does not
    ///   match `ty`, or a vector's length does not match the span.
    /// - [`SerializeError::InvalidValue`] for text that does not fit its
    ///   span or contains NUL.
    pub fn write(&self, ty: AttributeType, name: &str, span: &mut [u8]) -> Result<(), SerializeError> {
        let ok = match (ty, self) {
            (AttributeType::Bool, Self::Bool(v)) => {
                span[0] = u8::from(*v);
                true
            }
            (AttributeType::Char, Self::Text(text)) => {
                if text.len() > span.len() || text.contains('\0') {
                    return Err(SerializeError::InvalidValue {
                        attribute: name.to_string(),
                        reason: format!("text must be at most {} bytes without NUL", span.len()),
                    });
                }
                span.fill(0);
                span[..text.len()].copy_from_slice(text.as_bytes());
                true
            }
            (AttributeType::Char, Self::VecU8(raw)) => write_vector(span, raw.as_slice()),
            (AttributeType::Int8, Self::I8(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::Int16, Self::I16(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::Int32, Self::I32(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::Int64, Self::I64(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::UInt8, Self::U8(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::UInt16, Self::U16(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::UInt32, Self::U32(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::UInt64, Self::U64(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::Float32, Self::F32(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::Float64, Self::F64(v)) => {
                write_scalar(span, *v);
                true
            }
            (AttributeType::VectorInt32, Self::VecI32(v)) => write_vector(span, v.as_slice()),
            (AttributeType::VectorInt64, Self::VecI64(v)) => write_vector(span, v.as_slice()),
            (AttributeType::VectorUInt8, Self::VecU8(v)) => write_vector(span, v.as_slice()),
            (AttributeType::VectorUInt32, Self::VecU32(v)) => write_vector(span, v.as_slice()),
            (AttributeType::VectorUInt64, Self::VecU64(v)) => write_vector(span, v.as_slice()),
            (AttributeType::VectorFloat32, Self::VecF32(v)) => write_vector(span, v.as_slice()),
            (AttributeType::VectorFloat64, Self::VecF64(v)) => write_vector(span, v.as_slice()),
            (AttributeType::Quat, Self::Quat(q)) => {
                write_scalar(span, *q);
                true
            }
            (AttributeType::StringId, Self::StringId { id, text }) => {
                if let Some(text) = text {
                    if StringId::hash(text).id() != *id {
                        warn!(attribute = name, id, text = %text, "string id text does not match its hash");
                    } else if let Err(e) = StringRegistry::global().intern(text) {
                        warn!(attribute = name, %e, "string id text not restored");
                    }
                }
                write_scalar(span, StringId(*id));
                true
            }
            (AttributeType::Custom, Self::Custom(bytes)) => write_vector(span, bytes.as_slice()),
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(SerializeError::TypeMismatch {
                attribute: name.to_string(),
                expected: ty,
            })
        }
    }

    /// Numeric components of this value as `f64`, for range validation.
    #[must_use]
    pub fn numeric(&self) -> Vec<f64> {
        match self {
            Self::I8(v) => vec![f64::from(*v)],
            Self::I16(v) => vec![f64::from(*v)],
            Self::I32(v) => vec![f64::from(*v)],
            Self::I64(v) => vec![*v as f64],
            Self::U8(v) => vec![f64::from(*v)],
            Self::U16(v) => vec![f64::from(*v)],
            Self::U32(v) => vec![f64::from(*v)],
            Self::U64(v) => vec![*v as f64],
            Self::F32(v) => vec![f64::from(*v)],
            Self::F64(v) => vec![*v],
            Self::VecI32(v) => v.iter().map(|x| f64::from(*x)).collect(),
            Self::VecI64(v) => v.iter().map(|x| *x as f64).collect(),
            Self::VecU8(v) => v.iter().map(|x| f64::from(*x)).collect(),
            Self::VecU32(v) => v.iter().map(|x| f64::from(*x)).collect(),
            Self::VecU64(v) => v.iter().map(|x| *x as f64).collect(),
            Self::VecF32(v) => v.iter().map(|x| f64::from(*x)).collect(),
            Self::VecF64(v) => v.clone(),
            Self::Bool(_)
            | Self::Text(_)
            | Self::Quat(_)
            | Self::StringId { .. }
            | Self::Custom(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes() {
        assert_eq!(AttributeType::Float32.element_size(), Some(4));
        assert_eq!(AttributeType::VectorFloat64.element_size(), Some(8));
        assert_eq!(AttributeType::Quat.element_size(), Some(16));
        assert_eq!(AttributeType::Char.element_size(), None);
        assert!(AttributeType::VectorUInt32.is_vector());
        assert!(!AttributeType::Quat.is_numeric());
    }

    #[test]
    fn test_vector_round_trip_is_bit_exact() {
        let mut span = [0u8; 12];
        let value = AttributeValue::VecF32(vec![1.5, -0.0, f32::MIN_POSITIVE]);
        value.write(AttributeType::VectorFloat32, "position", &mut span).unwrap();
        assert_eq!(AttributeValue::read(AttributeType::VectorFloat32, &span), value);
    }

    #[test]
    fn test_char_text_is_nul_padded() {
        let mut span = [0xAAu8; 8];
        AttributeValue::Text("arm".into())
            .write(AttributeType::Char, "name", &mut span)
            .unwrap();
        assert_eq!(&span, b"arm\0\0\0\0\0");
        assert_eq!(
            AttributeValue::read(AttributeType::Char, &span),
            AttributeValue::Text("arm".into())
        );
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let mut span = [0u8; 4];
        let err = AttributeValue::Bool(true)
            .write(AttributeType::Float32, "mass", &mut span)
            .unwrap_err();
        assert!(matches!(
            err,
            SerializeError::TypeMismatch { expected: AttributeType::Float32, .. }
        ));
        assert_eq!(span, [0u8; 4]);
    }

    #[test]
    fn test_vector_length_mismatch_is_reported() {
        let mut span = [0u8; 8];
        let result = AttributeValue::VecF32(vec![1.0, 2.0, 3.0]).write(
            AttributeType::VectorFloat32,
            "offset",
            &mut span,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_string_id_text_is_reinterned() {
        let hash = StringId::hash("attribute_test_script");
        let mut span = [0u8; 4];
        AttributeValue::StringId {
            id: hash.id(),
            text: Some("attribute_test_script".into()),
        }
        .write(AttributeType::StringId, "script", &mut span)
        .unwrap();
        let id: StringId = bytemuck::pod_read_unaligned(&span);
        assert_eq!(id, hash);
        assert_eq!(&*id.as_str(), "attribute_test_script");
        assert_eq!(
            AttributeValue::read(AttributeType::StringId, &span),
            AttributeValue::StringId {
                id: hash.id(),
                text: Some("attribute_test_script".into()),
            }
        );
    }

    #[test]
    fn test_uninterned_string_id_keeps_its_hash() {
        let id = StringId::hash("attribute_test_never_interned");
        let span = id.id().to_ne_bytes();
        let value = AttributeValue::read(AttributeType::StringId, &span);
        assert_eq!(value, AttributeValue::StringId { id: id.id(), text: None });

        let mut restored = [0u8; 4];
        value.write(AttributeType::StringId, "script", &mut restored).unwrap();
        assert_eq!(restored, span);
    }

    #[test]
    fn test_raw_char_bytes_round_trip() {
        for span in [[0xffu8, b'b', 0, 0], [b'a', 0, b'z', 0], [0xc3, 0x28, 0, 0]] {
            let value = AttributeValue::read(AttributeType::Char, &span);
            assert_eq!(value, AttributeValue::VecU8(span.to_vec()));
            let mut restored = [0u8; 4];
            value.write(AttributeType::Char, "name", &mut restored).unwrap();
            assert_eq!(restored, span);
        }
    }

    #[test]
    fn test_oversized_text_is_rejected() {
        let mut span = [7u8; 4];
        for text in ["toolong", "a\0b"] {
            let result = AttributeValue::Text(text.into()).write(AttributeType::Char, "name", &mut span);
            assert!(matches!(result, Err(SerializeError::InvalidValue { .. })));
        }
        assert_eq!(span, [7u8; 4]);
    }

    #[test]
    fn test_numeric_projection() {
        assert_eq!(AttributeValue::U16(7).numeric(), vec![7.0]);
        assert_eq!(AttributeValue::VecF32(vec![1.0, 2.0]).numeric(), vec![1.0, 2.0]);
        assert!(AttributeValue::Text("x".into()).numeric().is_empty());
    }
}
