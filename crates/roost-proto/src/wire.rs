//! Primitive jute field readers and writers.
//!
//! All integers are big-endian. Strings and byte buffers are prefixed with a
//! 4-byte signed length; a negative buffer length encodes the null buffer.

use bytes::{Buf, BufMut};

use crate::error::ProtoError;

fn ensure(buf: &impl Buf, needed: usize) -> Result<(), ProtoError> {
    if buf.remaining() < needed {
        return Err(ProtoError::Truncated { needed, have: buf.remaining() });
    }
    Ok(())
}

pub fn read_i32(buf: &mut impl Buf) -> Result<i32, ProtoError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn read_u32(buf: &mut impl Buf) -> Result<u32, ProtoError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

pub fn read_i64(buf: &mut impl Buf) -> Result<i64, ProtoError> {
    ensure(buf, 8)?;
    Ok(buf.get_i64())
}

pub fn read_bool(buf: &mut impl Buf) -> Result<bool, ProtoError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8() != 0)
}

/// Reads a length-prefixed byte buffer. A negative length is the null buffer
/// and decodes as empty.
pub fn read_buffer(buf: &mut impl Buf) -> Result<Vec<u8>, ProtoError> {
    let len = read_i32(buf)?;
    if len < 0 {
        return Ok(Vec::new());
    }
    let len = len as usize;
    ensure(buf, len)?;
    let mut value = vec![0_u8; len];
    buf.copy_to_slice(&mut value);
    Ok(value)
}

pub fn read_string(buf: &mut impl Buf) -> Result<String, ProtoError> {
    let len = read_i32(buf)?;
    if len < 0 {
        return Err(ProtoError::BadLength(len));
    }
    let len = len as usize;
    ensure(buf, len)?;
    let mut raw = vec![0_u8; len];
    buf.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|_| ProtoError::BadUtf8)
}

/// Reads a count-prefixed list of strings.
pub fn read_string_list(buf: &mut impl Buf) -> Result<Vec<String>, ProtoError> {
    let count = read_i32(buf)?;
    if count < 0 || (count as usize).saturating_mul(4) > buf.remaining() {
        return Err(ProtoError::BadLength(count));
    }
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        values.push(read_string(buf)?);
    }
    Ok(values)
}

pub fn write_string(buf: &mut impl BufMut, value: &str) {
    buf.put_i32(value.len() as i32);
    buf.put_slice(value.as_bytes());
}

pub fn write_buffer(buf: &mut impl BufMut, value: &[u8]) {
    buf.put_i32(value.len() as i32);
    buf.put_slice(value);
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::{
        read_buffer, read_i32, read_string, read_string_list, write_buffer,
        write_string,
    };
    use crate::error::ProtoError;

    #[test]
    fn string_round_trip() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "/roost/a");
        let mut frame = buf.freeze();
        assert_eq!(read_string(&mut frame).unwrap(), "/roost/a");
        assert_eq!(frame.len(), 0);
    }

    #[test]
    fn null_buffer_decodes_empty() {
        let mut buf = BytesMut::new();
        buf.put_i32(-1);
        let mut frame = buf.freeze();
        assert_eq!(read_buffer(&mut frame).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn truncated_field_is_reported() {
        let mut frame = &[0_u8, 0][..];
        let err = read_i32(&mut frame).unwrap_err();
        assert_eq!(err, ProtoError::Truncated { needed: 4, have: 2 });
    }

    #[test]
    fn string_list_rejects_absurd_count() {
        let mut buf = BytesMut::new();
        buf.put_i32(1_000_000);
        let mut frame = buf.freeze();
        let err = read_string_list(&mut frame).unwrap_err();
        assert_eq!(err, ProtoError::BadLength(1_000_000));
    }

    #[test]
    fn write_buffer_prefixes_length() {
        let mut buf = BytesMut::new();
        write_buffer(&mut buf, b"xy");
        assert_eq!(&buf[..], &[0, 0, 0, 2, b'x', b'y']);
    }
}
