//! Transaction multiplexer bridging a synchronous filesystem-provider
//! framework to a FUSE-style message protocol over one shared channel.
//!
//! Each channel exchange carries at most one inbound reply and at most
//! one outbound request; [`FuseInstance::transact`] is the pump that
//! interleaves many independent logical operations over those exchanges.

#![deny(clippy::all)]

// unsafe modules
mod abi_marker;
mod decode;
mod encode;

// safe modules
mod attr;
mod cache;
mod context;
mod errno;
mod instance;
mod ioq;
mod proto;
mod provider;
mod transact;

pub mod kernel;

pub use self::attr::{attr_to_file_info, unix_time_to_file_time};
pub use self::cache::{ForgetList, NodeCache};
pub use self::decode::{DecodeError, Decoder, FuseResponse};
pub use self::encode::{RequestBuilder, REQUEST_HEADER_SIZE};
pub use self::errno::status_from_errno;
pub use self::instance::{CancelToken, FuseInstance};
pub use self::provider::{
    AccessMask, FileInfo, NtStatus, Provider, ProviderRequest, ProviderResponse, RequestKind,
    VolumeParams, FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_REPARSE_POINT, IO_REPARSE_TAG_NFS,
    IO_REPARSE_TAG_SYMLINK,
};
pub use self::transact::TransactError;
