//! Header decoder (Component C): given a schema and a reader, produces an
//! attribute bag plus the number of bytes actually consumed, tolerating
//! trailing unknown bytes when a header's declared length exceeds what its
//! schema accounts for.

use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::byte_reader::ByteReader;
use crate::error::AcqError;
use crate::schema::{FieldKind, FieldSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::I32(v) => Some(*v),
            FieldValue::I16(v) => Some(*v as i32),
            FieldValue::U16(v) => Some(*v as i32),
            FieldValue::U8(v) => Some(*v as i32),
            FieldValue::I8(v) => Some(*v as i32),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I64(v) => Some(*v),
            FieldValue::U32(v) => Some(*v as i64),
            _ => self.as_i32().map(|v| v as i64),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::U64(v) => Some(*v),
            FieldValue::U32(v) => Some(*v as u64),
            _ => self.as_i64().map(|v| v as u64),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F64(v) => Some(*v),
            FieldValue::F32(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// An attribute bag produced by decoding one header instance, plus any
/// bytes left over once the schema's fields were exhausted but the header's
/// declared length was not.
#[derive(Debug, Clone, Default)]
pub struct HeaderRecord {
    fields: HashMap<&'static str, FieldValue>,
    pub trailing_unknown: Vec<u8>,
    pub consumed: u64,
}

impl HeaderRecord {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(FieldValue::as_i32)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(FieldValue::as_u64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_f64)
    }

    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(FieldValue::as_bytes)
    }
}

fn read_field<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    spec: &FieldSpec,
) -> Result<FieldValue, AcqError> {
    Ok(match spec.kind {
        FieldKind::U8 => FieldValue::U8(reader.read_u8(spec.name)?),
        FieldKind::I8 => FieldValue::I8(reader.read_i8(spec.name)?),
        FieldKind::U16 => FieldValue::U16(reader.read_u16(spec.name)?),
        FieldKind::I16 => FieldValue::I16(reader.read_i16(spec.name)?),
        FieldKind::U32 => FieldValue::U32(reader.read_u32(spec.name)?),
        FieldKind::I32 => FieldValue::I32(reader.read_i32(spec.name)?),
        FieldKind::U64 => FieldValue::U64(reader.read_u64(spec.name)?),
        FieldKind::I64 => FieldValue::I64(reader.read_i64(spec.name)?),
        FieldKind::F32 => FieldValue::F32(reader.read_f32(spec.name)?),
        FieldKind::F64 => FieldValue::F64(reader.read_f64(spec.name)?),
        FieldKind::Fixed(n) => FieldValue::Bytes(reader.read_fixed(spec.name, n)?),
        FieldKind::PString { len_width } => {
            FieldValue::Bytes(reader.read_pstring(spec.name, len_width)?)
        }
    })
}

/// Decodes one header instance per `schema`, consuming exactly the fields
/// whose version range includes `revision`. If the caller knows the
/// header's own declared total length (most header kinds carry one as
/// their first field), pass it as `declared_length` so any trailing bytes
/// beyond the schema's fields are captured rather than left for the next
/// header to misinterpret.
pub fn decode_header<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    schema: &[FieldSpec],
    revision: i32,
    declared_length: Option<u64>,
) -> Result<HeaderRecord, AcqError> {
    let start = reader.tell()?;
    let mut fields = HashMap::new();

    for spec in schema {
        if !spec.applies_to(revision) {
            continue;
        }
        let value = read_field(reader, spec)?;
        fields.insert(spec.name, value);
    }

    let consumed_by_schema = reader.tell()? - start;
    let mut trailing_unknown = Vec::new();
    let mut consumed = consumed_by_schema;

    if let Some(declared) = declared_length {
        if declared > consumed_by_schema {
            let extra = declared - consumed_by_schema;
            trailing_unknown = reader.read_fixed("trailing_unknown", extra as usize)?;
            consumed = declared;
        }
    }

    Ok(HeaderRecord {
        fields,
        trailing_unknown,
        consumed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_reader::ByteOrder;
    use crate::schema::FieldSpec;
    use std::io::Cursor;

    #[test]
    fn decodes_fields_within_revision() {
        let schema = &[
            FieldSpec::new("a", FieldKind::I32, 30),
            FieldSpec::until("b_old", FieldKind::I16, 30, 39),
            FieldSpec::new("b_new", FieldKind::I32, 40),
        ];
        let mut data = Vec::new();
        data.extend_from_slice(&7i32.to_le_bytes());
        data.extend_from_slice(&99i32.to_le_bytes());
        let mut reader = ByteReader::new(Cursor::new(data), ByteOrder::Little);
        let record = decode_header(&mut reader, schema, 45, None).unwrap();
        assert_eq!(record.get_i32("a"), Some(7));
        assert_eq!(record.get_i32("b_old"), None);
        assert_eq!(record.get_i32("b_new"), Some(99));
    }

    #[test]
    fn trailing_bytes_retained_when_declared_length_longer() {
        let schema = &[FieldSpec::new("a", FieldKind::I16, 30)];
        let mut data = 1i16.to_le_bytes().to_vec();
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let mut reader = ByteReader::new(Cursor::new(data), ByteOrder::Little);
        let record = decode_header(&mut reader, schema, 30, Some(5)).unwrap();
        assert_eq!(record.get_i32("a"), Some(1));
        assert_eq!(record.trailing_unknown, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(record.consumed, 5);
    }
}
