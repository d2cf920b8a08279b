//! Per-opcode protocol exchanges
//!
//! Every opcode is a two-point coroutine: build-and-suspend, then
//! resume-with-reply-and-finish. The forget family never suspends; the
//! protocol defines those opcodes as notifications.

use crate::attr::attr_to_file_info;
use crate::context::{FuseContext, Payload, ResumePoint};
use crate::decode::FuseResponse;
use crate::encode::RequestBuilder;
use crate::errno::status_from_errno;
use crate::instance::FuseInstance;
use crate::kernel::fuse_opcode::*;
use crate::kernel::*;
use crate::provider::{AccessMask, NtStatus};

use std::mem;

use tracing::error;

fn begin_request(ctx: &FuseContext, req: &mut RequestBuilder<'_>, opcode: u32, nodeid: u64) {
    req.begin(opcode, ctx.token, nodeid, ctx.uid, ctx.gid, ctx.pid);
}

/// Finishes the operation with the reply's error mapped into the bound
/// result. Returns `true` when the reply carried an error.
fn take_reply_error(ctx: &mut FuseContext, rsp: &FuseResponse<'_>) -> bool {
    if rsp.error() == 0 {
        return false;
    }
    ctx.response.status = status_from_errno(rsp.error());
    true
}

pub(crate) fn send_init(ctx: &mut FuseContext, req: &mut RequestBuilder<'_>) -> bool {
    begin_request(ctx, req, FUSE_INIT, 0);
    req.push(&fuse_init_in {
        major: FUSE_KERNEL_VERSION,
        minor: FUSE_KERNEL_MINOR_VERSION,
        max_readahead: 0,
        flags: 0,
    });
    req.finish();
    ctx.resume = ResumePoint::AwaitReply;
    true
}

pub(crate) fn resume_init(
    ctx: &mut FuseContext,
    instance: &FuseInstance,
    rsp: &FuseResponse<'_>,
) -> bool {
    ctx.resume = ResumePoint::Done;

    if take_reply_error(ctx, rsp) {
        instance.gate().deny();
        return false;
    }

    match rsp.body().fetch::<fuse_init_out>() {
        Ok(out) => instance.gate().publish(out.major, out.minor),
        Err(err) => {
            error!(%err, "malformed handshake reply");
            instance.gate().deny();
        }
    }
    false
}

pub(crate) fn send_lookup(ctx: &mut FuseContext, req: &mut RequestBuilder<'_>) -> bool {
    if let Payload::Lookup { parent, ref name } = ctx.payload {
        begin_request(ctx, req, FUSE_LOOKUP, parent);
        req.push_name(name);
        req.finish();
    }
    ctx.resume = ResumePoint::AwaitReply;
    true
}

pub(crate) fn resume_lookup(
    ctx: &mut FuseContext,
    instance: &FuseInstance,
    rsp: &FuseResponse<'_>,
) -> bool {
    ctx.resume = ResumePoint::Done;

    if take_reply_error(ctx, rsp) {
        return false;
    }

    match rsp.body().fetch::<fuse_entry_out>() {
        Ok(entry) => {
            ctx.response.nodeid = entry.nodeid;
            attr_to_file_info(
                instance.volume_params(),
                &entry.attr,
                &mut ctx.response.file_info,
            );
            ctx.response.status = NtStatus::SUCCESS;
        }
        Err(err) => {
            error!(%err, "malformed lookup reply");
            ctx.response.status = NtStatus::IO_DEVICE_ERROR;
        }
    }
    false
}

pub(crate) fn send_getattr(ctx: &mut FuseContext, req: &mut RequestBuilder<'_>) -> bool {
    if let Payload::GetAttr { nodeid } = ctx.payload {
        begin_request(ctx, req, FUSE_GETATTR, nodeid);
        req.push(&fuse_getattr_in::default());
        req.finish();
    }
    ctx.resume = ResumePoint::AwaitReply;
    true
}

pub(crate) fn resume_getattr(
    ctx: &mut FuseContext,
    instance: &FuseInstance,
    rsp: &FuseResponse<'_>,
) -> bool {
    ctx.resume = ResumePoint::Done;

    if take_reply_error(ctx, rsp) {
        return false;
    }

    match rsp.body().fetch::<fuse_attr_out>() {
        Ok(out) => {
            attr_to_file_info(
                instance.volume_params(),
                &out.attr,
                &mut ctx.response.file_info,
            );
            ctx.response.status = NtStatus::SUCCESS;
        }
        Err(err) => {
            error!(%err, "malformed getattr reply");
            ctx.response.status = NtStatus::IO_DEVICE_ERROR;
        }
    }
    false
}

fn open_flags(access: AccessMask) -> u32 {
    const O_RDONLY: u32 = libc::O_RDONLY as u32;
    const O_WRONLY: u32 = libc::O_WRONLY as u32;
    const O_RDWR: u32 = libc::O_RDWR as u32;

    let rw = access & (AccessMask::FILE_READ_DATA | AccessMask::FILE_WRITE_DATA);
    if rw == AccessMask::FILE_READ_DATA | AccessMask::FILE_WRITE_DATA {
        O_RDWR
    } else if rw == AccessMask::FILE_WRITE_DATA {
        O_WRONLY
    } else {
        O_RDONLY
    }
}

pub(crate) fn send_open(ctx: &mut FuseContext, req: &mut RequestBuilder<'_>) -> bool {
    if let Payload::Open {
        nodeid,
        access,
        dir,
    } = ctx.payload
    {
        let opcode = if dir { FUSE_OPENDIR } else { FUSE_OPEN };
        begin_request(ctx, req, opcode, nodeid);
        req.push(&fuse_open_in {
            flags: open_flags(access),
            unused: 0,
        });
        req.finish();
    }
    ctx.resume = ResumePoint::AwaitReply;
    true
}

pub(crate) fn resume_open(ctx: &mut FuseContext, rsp: &FuseResponse<'_>) -> bool {
    ctx.resume = ResumePoint::Done;

    if take_reply_error(ctx, rsp) {
        return false;
    }

    match rsp.body().fetch::<fuse_open_out>() {
        Ok(out) => {
            ctx.response.fh = out.fh;
            ctx.response.open_flags = out.open_flags;
            ctx.response.status = NtStatus::SUCCESS;
        }
        Err(err) => {
            error!(%err, "malformed open reply");
            ctx.response.status = NtStatus::IO_DEVICE_ERROR;
        }
    }
    false
}

/// Builds one forget-class notification, draining entries from the
/// context's forget payload. Finishes immediately: neither opcode
/// expects a reply.
pub(crate) fn fill_forget(
    ctx: &mut FuseContext,
    instance: &FuseInstance,
    req: &mut RequestBuilder<'_>,
) -> bool {
    let batch_supported = matches!(
        instance.negotiated(),
        Some((_, minor)) if minor >= FUSE_KERNEL_MINOR_VERSION_BATCH_FORGET
    );

    if let Payload::Forget { ref mut list } = ctx.payload {
        if batch_supported && list.len() > 1 {
            fill_batch_forget(ctx.token, ctx.uid, ctx.gid, ctx.pid, list, req);
        } else if let Some(nodeid) = list.next() {
            req.begin(FUSE_FORGET, ctx.token, nodeid, ctx.uid, ctx.gid, ctx.pid);
            // one decrement per notification regardless of how many
            // lookups produced the reference
            req.push(&fuse_forget_in { nlookup: 1 });
            req.finish();
        }
    }
    false
}

fn fill_batch_forget(
    token: u64,
    uid: u32,
    gid: u32,
    pid: u32,
    list: &mut crate::cache::ForgetList,
    req: &mut RequestBuilder<'_>,
) {
    req.begin(FUSE_BATCH_FORGET, token, 0, uid, gid, pid);

    let entry_size = mem::size_of::<fuse_forget_one>();
    let capacity = req
        .remaining()
        .saturating_sub(mem::size_of::<fuse_batch_forget_in>())
        / entry_size;

    let count = list.len().min(capacity);
    #[allow(clippy::cast_possible_truncation)]
    // bounded by the message capacity
    let header = fuse_batch_forget_in {
        count: count as u32,
        dummy: 0,
    };
    req.push(&header);

    for _ in 0..count {
        let nodeid = match list.next() {
            Some(nodeid) => nodeid,
            None => break,
        };
        req.push(&fuse_forget_one { nodeid, nlookup: 1 });
    }
    req.finish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ForgetList;
    use crate::encode::REQUEST_HEADER_SIZE;

    #[test]
    fn open_flag_mapping() {
        assert_eq!(open_flags(AccessMask::FILE_READ_DATA), 0);
        assert_eq!(open_flags(AccessMask::FILE_WRITE_DATA), 1);
        assert_eq!(
            open_flags(AccessMask::FILE_READ_DATA | AccessMask::FILE_WRITE_DATA),
            2
        );
        assert_eq!(open_flags(AccessMask::empty()), 0);
    }

    #[test]
    fn batch_forget_respects_capacity() {
        // room for the headers plus exactly two entries
        let len = REQUEST_HEADER_SIZE
            + mem::size_of::<fuse_batch_forget_in>()
            + 2 * mem::size_of::<fuse_forget_one>();
        let mut buf = vec![0_u8; len];
        let mut req = RequestBuilder::new(&mut buf);

        let mut list = ForgetList::new(vec![10, 11, 12]);
        fill_batch_forget(1, 0, 0, 0, &mut list, &mut req);

        assert_eq!(req.written(), len);
        assert_eq!(list.len(), 1);
        assert_eq!(list.next(), Some(12));

        // count field of fuse_batch_forget_in
        let mut raw = [0_u8; 4];
        raw.copy_from_slice(&buf[REQUEST_HEADER_SIZE..REQUEST_HEADER_SIZE + 4]);
        assert_eq!(u32::from_ne_bytes(raw), 2);

        // first packed entry
        let base = REQUEST_HEADER_SIZE + mem::size_of::<fuse_batch_forget_in>();
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(&buf[base..base + 8]);
        assert_eq!(u64::from_ne_bytes(raw), 10);
    }
}
