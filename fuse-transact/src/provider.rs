//! The host framework surface consumed by the engine
//!
//! The framework hands the engine one operation at a time and accepts one
//! finished result per operation. Everything here is a contract; the real
//! framework lives outside this crate.

use bitflags::bitflags;

/// Host framework status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const SUCCESS: Self = Self(0x0000_0000);
    pub const DEVICE_BUSY: Self = Self(0x8000_0011);
    pub const INVALID_PARAMETER: Self = Self(0xC000_000D);
    pub const INVALID_DEVICE_REQUEST: Self = Self(0xC000_0010);
    pub const END_OF_FILE: Self = Self(0xC000_0011);
    pub const ACCESS_DENIED: Self = Self(0xC000_0022);
    pub const BUFFER_TOO_SMALL: Self = Self(0xC000_0023);
    pub const OBJECT_NAME_INVALID: Self = Self(0xC000_0033);
    pub const OBJECT_NAME_NOT_FOUND: Self = Self(0xC000_0034);
    pub const OBJECT_NAME_COLLISION: Self = Self(0xC000_0035);
    pub const DISK_FULL: Self = Self(0xC000_007F);
    pub const INSUFFICIENT_RESOURCES: Self = Self(0xC000_009A);
    pub const MEDIA_WRITE_PROTECTED: Self = Self(0xC000_00A2);
    pub const FILE_IS_A_DIRECTORY: Self = Self(0xC000_00BA);
    pub const NOT_SUPPORTED: Self = Self(0xC000_00BB);
    pub const DIRECTORY_NOT_EMPTY: Self = Self(0xC000_0101);
    pub const NOT_A_DIRECTORY: Self = Self(0xC000_0103);
    pub const CANCELLED: Self = Self(0xC000_0120);
    pub const IO_DEVICE_ERROR: Self = Self(0xC000_0185);

    #[must_use]
    pub const fn is_success(self) -> bool {
        (self.0 as i32) >= 0
    }
}

/// `FILE_ATTRIBUTE_DIRECTORY`
pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0000_0010;
/// `FILE_ATTRIBUTE_REPARSE_POINT`
pub const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0000_0400;

/// Reparse tag for symbolic links
pub const IO_REPARSE_TAG_SYMLINK: u32 = 0xA000_000C;
/// Reparse tag for NFS-style special files (fifo/chr/blk/sock)
pub const IO_REPARSE_TAG_NFS: u32 = 0x8000_0014;

bitflags! {
    /// Requested access rights, as far as the engine cares about them.
    #[derive(Default)]
    pub struct AccessMask: u32 {
        const FILE_READ_DATA = 0x0001;
        const FILE_WRITE_DATA = 0x0002;
    }
}

/// Framework metadata record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub file_attributes: u32,
    pub reparse_tag: u32,
    pub file_size: u64,
    pub allocation_size: u64,
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub change_time: u64,
    pub index_number: u64,
    pub hard_links: u32,
    pub ea_size: u32,
}

/// Mounted volume geometry, fixed at mount time.
#[derive(Debug, Clone, Copy)]
pub struct VolumeParams {
    pub sector_size: u16,
    pub sectors_per_allocation_unit: u16,
}

impl VolumeParams {
    #[must_use]
    pub fn allocation_unit(&self) -> u64 {
        u64::from(self.sector_size) * u64::from(self.sectors_per_allocation_unit)
    }
}

/// One externally-driven operation fetched from the framework.
#[derive(Debug)]
pub struct ProviderRequest {
    /// Echoed back in the finished result so the framework can pair them.
    pub hint: u64,
    /// Caller identity, copied into every wire message of the operation.
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
    pub kind: RequestKind,
}

#[derive(Debug)]
pub enum RequestKind {
    Lookup { parent: u64, name: Vec<u8> },
    GetAttr { nodeid: u64 },
    Open { nodeid: u64, access: AccessMask },
    OpenDir { nodeid: u64 },
    /// Anything outside the translated subset. Resolved without
    /// a protocol round trip.
    Unsupported,
}

/// The finished result delivered back to the framework.
#[derive(Debug, Default)]
pub struct ProviderResponse {
    pub hint: u64,
    pub status: NtStatus,
    /// Remote node id, filled by lookup.
    pub nodeid: u64,
    /// Remote file handle, filled by open/opendir.
    pub fh: u64,
    pub open_flags: u32,
    pub file_info: FileInfo,
}

/// What the engine needs from the framework.
///
/// `next_request` may yield nothing when the framework has no work;
/// `deliver` failures abort the current channel exchange.
pub trait Provider: Send + Sync {
    fn next_request(&self) -> Result<Option<ProviderRequest>, NtStatus>;

    fn deliver(&self, response: ProviderResponse) -> Result<(), NtStatus>;
}
