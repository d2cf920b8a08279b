//! errno to framework status translation
//!
//! Reply error codes arrive as negated errno values; the map accepts
//! either sign.

use crate::provider::NtStatus;

#[must_use]
pub fn status_from_errno(errno: i32) -> NtStatus {
    match errno.unsigned_abs() as i32 {
        0 => NtStatus::SUCCESS,
        libc::EPERM | libc::EACCES => NtStatus::ACCESS_DENIED,
        libc::ENOENT => NtStatus::OBJECT_NAME_NOT_FOUND,
        libc::EIO => NtStatus::IO_DEVICE_ERROR,
        libc::ENOMEM => NtStatus::INSUFFICIENT_RESOURCES,
        libc::EEXIST => NtStatus::OBJECT_NAME_COLLISION,
        libc::ENOTDIR => NtStatus::NOT_A_DIRECTORY,
        libc::EISDIR => NtStatus::FILE_IS_A_DIRECTORY,
        libc::EINVAL => NtStatus::INVALID_PARAMETER,
        libc::ENOSPC => NtStatus::DISK_FULL,
        libc::EROFS => NtStatus::MEDIA_WRITE_PROTECTED,
        libc::ENAMETOOLONG => NtStatus::OBJECT_NAME_INVALID,
        libc::ENOSYS => NtStatus::INVALID_DEVICE_REQUEST,
        libc::ENOTEMPTY => NtStatus::DIRECTORY_NOT_EMPTY,
        libc::EBUSY => NtStatus::DEVICE_BUSY,
        libc::ENOTSUP => NtStatus::NOT_SUPPORTED,
        _ => NtStatus::ACCESS_DENIED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(status_from_errno(0), NtStatus::SUCCESS);
        assert_eq!(
            status_from_errno(libc::ENOENT),
            NtStatus::OBJECT_NAME_NOT_FOUND
        );
        assert_eq!(status_from_errno(libc::EACCES), NtStatus::ACCESS_DENIED);
        assert_eq!(
            status_from_errno(libc::ENOSYS),
            NtStatus::INVALID_DEVICE_REQUEST
        );
    }

    #[test]
    fn wire_sign_is_ignored() {
        assert_eq!(
            status_from_errno(-libc::ENOENT),
            NtStatus::OBJECT_NAME_NOT_FOUND
        );
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(status_from_errno(9999), NtStatus::ACCESS_DENIED);
    }
}
