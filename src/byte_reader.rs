//! Endian-aware primitive reads from a seekable byte source.
//!
//! The file's own byte order is only known after sniffing the first header
//! field (see [`crate::sniff_byte_order`]), so endianness here is a runtime
//! switch rather than a `byteorder::ByteOrder` type parameter chosen at
//! compile time.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::AcqError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// A cursor over a seekable byte source, with length-prefixed string reads
/// and bounded skips layered on top of `byteorder`'s primitive reads.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    order: ByteOrder,
}

impl<R: Read + Seek> ByteReader<R> {
    pub fn new(inner: R, order: ByteOrder) -> Self {
        ByteReader { inner, order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn tell(&mut self) -> Result<u64, AcqError> {
        Ok(self.inner.stream_position()?)
    }

    pub fn seek(&mut self, abs: u64) -> Result<(), AcqError> {
        self.inner
            .seek(SeekFrom::Start(abs))
            .map_err(AcqError::SeekError)?;
        Ok(())
    }

    pub fn skip(&mut self, n: u64) -> Result<(), AcqError> {
        self.inner
            .seek(SeekFrom::Current(n as i64))
            .map_err(AcqError::SeekError)?;
        Ok(())
    }

    fn wrap_field(field: &'static str, offset: u64, e: io::Error) -> AcqError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            AcqError::InsufficientData { field, offset }
        } else {
            AcqError::Io(e)
        }
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, AcqError> {
        let offset = self.tell()?;
        self.inner
            .read_u8()
            .map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_i8(&mut self, field: &'static str) -> Result<i8, AcqError> {
        let offset = self.tell()?;
        self.inner
            .read_i8()
            .map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_u16(&mut self, field: &'static str) -> Result<u16, AcqError> {
        let offset = self.tell()?;
        let r = match self.order {
            ByteOrder::Little => self.inner.read_u16::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_u16::<BigEndian>(),
        };
        r.map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_i16(&mut self, field: &'static str) -> Result<i16, AcqError> {
        let offset = self.tell()?;
        let r = match self.order {
            ByteOrder::Little => self.inner.read_i16::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_i16::<BigEndian>(),
        };
        r.map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, AcqError> {
        let offset = self.tell()?;
        let r = match self.order {
            ByteOrder::Little => self.inner.read_u32::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_u32::<BigEndian>(),
        };
        r.map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_i32(&mut self, field: &'static str) -> Result<i32, AcqError> {
        let offset = self.tell()?;
        let r = match self.order {
            ByteOrder::Little => self.inner.read_i32::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_i32::<BigEndian>(),
        };
        r.map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, AcqError> {
        let offset = self.tell()?;
        let r = match self.order {
            ByteOrder::Little => self.inner.read_u64::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_u64::<BigEndian>(),
        };
        r.map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_i64(&mut self, field: &'static str) -> Result<i64, AcqError> {
        let offset = self.tell()?;
        let r = match self.order {
            ByteOrder::Little => self.inner.read_i64::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_i64::<BigEndian>(),
        };
        r.map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_f32(&mut self, field: &'static str) -> Result<f32, AcqError> {
        let offset = self.tell()?;
        let r = match self.order {
            ByteOrder::Little => self.inner.read_f32::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_f32::<BigEndian>(),
        };
        r.map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_f64(&mut self, field: &'static str) -> Result<f64, AcqError> {
        let offset = self.tell()?;
        let r = match self.order {
            ByteOrder::Little => self.inner.read_f64::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_f64::<BigEndian>(),
        };
        r.map_err(|e| Self::wrap_field(field, offset, e))
    }

    pub fn read_fixed(&mut self, field: &'static str, n: usize) -> Result<Vec<u8>, AcqError> {
        let offset = self.tell()?;
        let mut buf = vec![0u8; n];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| Self::wrap_field(field, offset, e))?;
        Ok(buf)
    }

    /// Length-prefixed string; `len_width` is 1, 2, or 4 bytes.
    pub fn read_pstring(&mut self, field: &'static str, len_width: u8) -> Result<Vec<u8>, AcqError> {
        let len = match len_width {
            1 => self.read_u8(field)? as usize,
            2 => self.read_u16(field)? as usize,
            4 => self.read_u32(field)? as usize,
            other => panic!("unsupported pstring length width {other}"),
        };
        self.read_fixed(field, len)
    }
}

/// Spools a non-seekable stream into an in-memory seekable buffer.
pub fn spool_to_seekable(mut source: impl Read) -> io::Result<Cursor<Vec<u8>>> {
    let mut buf = Vec::new();
    source.read_to_end(&mut buf)?;
    Ok(Cursor::new(buf))
}

/// Tries both byte orders against the first field (the Graph Header's
/// `file_revision`, always the first i32 in the file) and returns whichever
/// order yields a value in `[min_revision, max_revision]`. Rewinds the
/// source to the start regardless of outcome.
pub fn sniff_byte_order<R: Read + Seek>(
    source: &mut R,
    min_revision: i32,
    max_revision: i32,
) -> Result<ByteOrder, AcqError> {
    source.seek(SeekFrom::Start(0)).map_err(AcqError::SeekError)?;
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf)?;
    source.seek(SeekFrom::Start(0)).map_err(AcqError::SeekError)?;

    let le = i32::from_le_bytes(buf);
    let be = i32::from_be_bytes(buf);

    if (min_revision..=max_revision).contains(&le) {
        Ok(ByteOrder::Little)
    } else if (min_revision..=max_revision).contains(&be) {
        Ok(ByteOrder::Big)
    } else {
        Err(AcqError::NoValidByteOrder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_little_endian() {
        let mut buf = Cursor::new(42i32.to_le_bytes().to_vec());
        assert_eq!(sniff_byte_order(&mut buf, 30, 200).unwrap(), ByteOrder::Little);
    }

    #[test]
    fn sniff_big_endian() {
        // 42 as big-endian bytes decodes to a huge number as little-endian,
        // out of the [30, 200] range, so big-endian must be picked.
        let mut buf = Cursor::new(42i32.to_be_bytes().to_vec());
        assert_eq!(sniff_byte_order(&mut buf, 30, 200).unwrap(), ByteOrder::Big);
    }

    #[test]
    fn sniff_neither_in_range() {
        let mut buf = Cursor::new(999_999i32.to_le_bytes().to_vec());
        assert!(sniff_byte_order(&mut buf, 30, 200).is_err());
    }

    #[test]
    fn read_primitives_little_endian() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&3.5f64.to_le_bytes());
        let mut r = ByteReader::new(Cursor::new(data), ByteOrder::Little);
        assert_eq!(r.read_u16("a").unwrap(), 1);
        assert_eq!(r.read_i32("b").unwrap(), 2);
        assert_eq!(r.read_f64("c").unwrap(), 3.5);
    }

    #[test]
    fn insufficient_data_reports_offset() {
        let mut r = ByteReader::new(Cursor::new(vec![0u8; 2]), ByteOrder::Little);
        let err = r.read_u32("some_field").unwrap_err();
        match err {
            AcqError::InsufficientData { field, offset } => {
                assert_eq!(field, "some_field");
                assert_eq!(offset, 0);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn pstring_reads_declared_length() {
        let mut data = vec![5u8];
        data.extend_from_slice(b"hello");
        let mut r = ByteReader::new(Cursor::new(data), ByteOrder::Little);
        let s = r.read_pstring("name", 1).unwrap();
        assert_eq!(s, b"hello");
    }
}
