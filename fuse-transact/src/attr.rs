//! Remote attribute record to framework metadata translation

use crate::kernel::fuse_attr;
use crate::provider::{
    FileInfo, VolumeParams, FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_REPARSE_POINT,
    IO_REPARSE_TAG_NFS, IO_REPARSE_TAG_SYMLINK,
};

/// 100ns intervals between 1601-01-01 and 1970-01-01
const UNIX_EPOCH_AS_FILETIME: u64 = 116_444_736_000_000_000;

/// Converts (unix seconds, nanoseconds) to 100ns intervals since 1601.
#[must_use]
pub fn unix_time_to_file_time(sec: u64, nsec: u32) -> u64 {
    sec.wrapping_mul(10_000_000)
        .wrapping_add(u64::from(nsec) / 100)
        .wrapping_add(UNIX_EPOCH_AS_FILETIME)
}

/// Translates a remote attribute record into the framework record.
///
/// The remote format carries no creation time; it is set equal to the
/// change time. Hard-link count and EA size are not tracked by this
/// subset and stay zero.
pub fn attr_to_file_info(volume: &VolumeParams, attr: &fuse_attr, info: &mut FileInfo) {
    let allocation_unit = volume.allocation_unit();

    match attr.mode & libc::S_IFMT {
        libc::S_IFDIR => {
            info.file_attributes = FILE_ATTRIBUTE_DIRECTORY;
            info.reparse_tag = 0;
        }
        libc::S_IFIFO | libc::S_IFCHR | libc::S_IFBLK | libc::S_IFSOCK => {
            info.file_attributes = FILE_ATTRIBUTE_REPARSE_POINT;
            info.reparse_tag = IO_REPARSE_TAG_NFS;
        }
        libc::S_IFLNK => {
            info.file_attributes = FILE_ATTRIBUTE_REPARSE_POINT;
            info.reparse_tag = IO_REPARSE_TAG_SYMLINK;
        }
        _ => {
            info.file_attributes = 0;
            info.reparse_tag = 0;
        }
    }

    info.file_size = attr.size;
    info.allocation_size = attr
        .size
        .wrapping_add(allocation_unit.wrapping_sub(1))
        / allocation_unit
        * allocation_unit;
    info.last_access_time = unix_time_to_file_time(attr.atime, attr.atimensec);
    info.last_write_time = unix_time_to_file_time(attr.mtime, attr.mtimensec);
    info.change_time = unix_time_to_file_time(attr.ctime, attr.ctimensec);
    info.creation_time = info.change_time;
    info.index_number = attr.ino;
    info.hard_links = 0;
    info.ea_size = 0;
}
