//! Zero-copy views over inbound reply buffers

use crate::abi_marker::FuseAbiData;
use crate::kernel::fuse_out_header;

use std::mem;
use std::slice;

#[derive(Debug)]
pub struct Decoder<'b> {
    bytes: &'b [u8],
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("NotEnough")]
    NotEnough,

    #[error("AlignMismatch")]
    AlignMismatch,

    #[error("InvalidLength")]
    InvalidLength,
}

fn to_address<T: ?Sized>(ptr: *const T) -> usize {
    ptr as *const () as usize
}

impl<'b> Decoder<'b> {
    pub fn new(bytes: &'b [u8]) -> Self {
        Self { bytes }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    unsafe fn pop_bytes_unchecked(&mut self, len: usize) -> &'b [u8] {
        let bytes = self.bytes.get_unchecked(..len);
        self.bytes = self.bytes.get_unchecked(len..);
        bytes
    }

    pub(crate) fn fetch<T: FuseAbiData + Sized>(&mut self) -> Result<&'b T, DecodeError> {
        let ty_size: usize = mem::size_of::<T>();
        let ty_align: usize = mem::align_of::<T>();
        debug_assert!(ty_size > 0 && ty_size.wrapping_rem(ty_align) == 0);

        if self.bytes.len() < ty_size {
            return Err(DecodeError::NotEnough);
        }

        let addr = to_address(self.bytes);
        if addr.wrapping_rem(ty_align) != 0 {
            return Err(DecodeError::AlignMismatch);
        }

        unsafe {
            let bytes = self.pop_bytes_unchecked(ty_size);
            let ret = &*(bytes.as_ptr().cast());
            Ok(ret)
        }
    }

    pub fn fetch_all_bytes(&mut self) -> Result<&'b [u8], DecodeError> {
        unsafe {
            let bytes = self.bytes;
            self.bytes = slice::from_raw_parts(self.bytes.as_ptr(), 0);
            Ok(bytes)
        }
    }
}

/// A validated view of one inbound reply.
///
/// The declared length must satisfy
/// `header-size <= declared-length <= buffer-size`
/// before any field is trusted.
#[derive(Debug)]
pub struct FuseResponse<'b> {
    header: &'b fuse_out_header,
    body: &'b [u8],
}

impl<'b> FuseResponse<'b> {
    pub fn parse(buf: &'b [u8]) -> Result<Self, DecodeError> {
        let header_size = mem::size_of::<fuse_out_header>();
        if buf.len() < header_size {
            return Err(DecodeError::NotEnough);
        }

        let mut de = Decoder::new(buf);
        let header = de.fetch::<fuse_out_header>()?;

        let declared = header.len as usize;
        if declared < header_size || declared > buf.len() {
            return Err(DecodeError::InvalidLength);
        }

        let body = &buf[header_size..declared];
        Ok(Self { header, body })
    }

    pub fn unique(&self) -> u64 {
        self.header.unique
    }

    pub fn error(&self) -> i32 {
        self.header.error
    }

    pub fn body(&self) -> Decoder<'b> {
        Decoder::new(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::as_abi_bytes;

    use aligned_utils::bytes::AlignedBytes;

    fn response_bytes(header: fuse_out_header, body: &[u8]) -> AlignedBytes {
        let header_bytes = as_abi_bytes(&header);
        let mut buf = AlignedBytes::new_zeroed(header_bytes.len() + body.len(), 8);
        buf[..header_bytes.len()].copy_from_slice(header_bytes);
        buf[header_bytes.len()..].copy_from_slice(body);
        buf
    }

    #[test]
    fn decode_integer_ok() {
        let data = AlignedBytes::new_from_slice(&[1, 2, 3, 4], 16);
        let mut decoder = Decoder::new(&*data);

        let ret = decoder.fetch::<u32>().unwrap();
        assert_eq!(ret, &u32::from_ne_bytes([1, 2, 3, 4]));

        assert!(decoder.is_empty())
    }

    #[test]
    fn decode_integer_align_mismatch() {
        let data = AlignedBytes::new_from_slice(&[1, 2, 3, 4, 5], 16);
        let mut decoder = Decoder::new(&data[1..]);

        let ret = decoder.fetch::<u32>().unwrap_err();
        assert_eq!(ret, DecodeError::AlignMismatch);
    }

    #[test]
    fn decode_integer_not_enough() {
        let data = AlignedBytes::new_from_slice(&[1, 2, 3, 4], 16);
        let mut decoder = Decoder::new(&*data);

        let ret = decoder.fetch::<u64>().unwrap_err();
        assert_eq!(ret, DecodeError::NotEnough);
    }

    #[test]
    fn response_parse_ok() {
        let buf = response_bytes(
            fuse_out_header {
                len: 20,
                error: 0,
                unique: 7,
            },
            &[9, 9, 9, 9],
        );

        let rsp = FuseResponse::parse(&*buf).unwrap();
        assert_eq!(rsp.unique(), 7);
        assert_eq!(rsp.error(), 0);
        assert_eq!(rsp.body().fetch_all_bytes().unwrap(), &[9, 9, 9, 9]);
    }

    #[test]
    fn response_declared_length_out_of_range() {
        // declared length shorter than the header
        let buf = response_bytes(
            fuse_out_header {
                len: 8,
                error: 0,
                unique: 1,
            },
            &[],
        );
        let ret = FuseResponse::parse(&*buf).unwrap_err();
        assert_eq!(ret, DecodeError::InvalidLength);

        // declared length beyond the buffer
        let buf = response_bytes(
            fuse_out_header {
                len: 64,
                error: 0,
                unique: 1,
            },
            &[],
        );
        let ret = FuseResponse::parse(&*buf).unwrap_err();
        assert_eq!(ret, DecodeError::InvalidLength);
    }

    #[test]
    fn response_buffer_too_short() {
        let buf = AlignedBytes::new_zeroed(8, 8);
        let ret = FuseResponse::parse(&*buf).unwrap_err();
        assert_eq!(ret, DecodeError::NotEnough);
    }
}
