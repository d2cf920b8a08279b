//! Outbound request construction
//!
//! Requests are written into a caller-supplied buffer by byte copy,
//! so the buffer itself carries no alignment requirement.

use crate::abi_marker::FuseAbiData;
use crate::kernel::{fuse_in_header, FUSE_MIN_READ_BUFFER};

use std::mem;
use std::slice;

pub(crate) fn as_abi_bytes<T: FuseAbiData + Sized>(raw: &T) -> &[u8] {
    let ty_size = mem::size_of::<T>();
    unsafe { slice::from_raw_parts(raw as *const T as *const u8, ty_size) }
}

/// Builds one outbound request in place.
///
/// The header `len` field is zero until [`RequestBuilder::finish`]
/// patches in the accumulated length. A builder that was never begun
/// reports a length of zero.
#[derive(Debug)]
pub struct RequestBuilder<'b> {
    buf: &'b mut [u8],
    len: usize,
    limit: usize,
}

pub const REQUEST_HEADER_SIZE: usize = mem::size_of::<fuse_in_header>();

impl<'b> RequestBuilder<'b> {
    /// The caller must have checked the buffer against
    /// `FUSE_MIN_READ_BUFFER` already; the limit here only bounds
    /// what a single message may occupy.
    pub fn new(buf: &'b mut [u8]) -> Self {
        let limit = buf.len().min(FUSE_MIN_READ_BUFFER as usize);
        for b in &mut buf[..REQUEST_HEADER_SIZE.min(limit)] {
            *b = 0;
        }
        Self { buf, len: 0, limit }
    }

    pub fn begin(&mut self, opcode: u32, unique: u64, nodeid: u64, uid: u32, gid: u32, pid: u32) {
        debug_assert_eq!(self.len, 0);
        let header = fuse_in_header {
            len: 0,
            opcode,
            unique,
            nodeid,
            uid,
            gid,
            pid,
            padding: 0,
        };
        self.push(&header);
    }

    pub fn push<T: FuseAbiData + Sized>(&mut self, raw: &T) {
        self.push_bytes(as_abi_bytes(raw));
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let end = self.len.checked_add(bytes.len()).unwrap_or(usize::MAX);
        assert!(end <= self.limit, "request overflows the transact buffer");
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// Appends a NUL-terminated name.
    pub fn push_name(&mut self, name: &[u8]) {
        self.push_bytes(name);
        self.push_bytes(&[0]);
    }

    /// Room left for opcode body data in this message.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.len)
    }

    /// Patches the header length and returns the message size.
    pub fn finish(&mut self) -> usize {
        debug_assert!(self.len >= REQUEST_HEADER_SIZE);
        #[allow(clippy::cast_possible_truncation)]
        // bounded by FUSE_MIN_READ_BUFFER
        let len = self.len as u32;
        self.buf[..4].copy_from_slice(&len.to_ne_bytes());
        self.len
    }

    /// The length recorded in the header, zero if nothing was built.
    pub fn written(&self) -> usize {
        if self.len == 0 {
            return 0;
        }
        let mut raw = [0_u8; 4];
        raw.copy_from_slice(&self.buf[..4]);
        u32::from_ne_bytes(raw) as usize
    }
}
