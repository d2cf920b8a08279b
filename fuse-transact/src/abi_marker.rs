mod sealed {
    pub trait Sealed {}
}

use self::sealed::Sealed;

use crate::kernel::*;

/// Marks a type as plain FUSE abi data.
///
/// # Safety
/// The type must be `#[repr(C)]`, contain no pointers
/// and be valid for any bit pattern that fits its layout.
pub unsafe trait FuseAbiData: Sealed {}

macro_rules! mark_abi_type {
    ($t: ident) => {
        impl Sealed for $t {}
        unsafe impl FuseAbiData for $t {}
    };
}

macro_rules! mark_sized_types {
    ($($t:ident,)+) => {
        $(
            mark_abi_type!($t);
        )+

        #[test]
        fn check_zst(){
            $(
                assert!(std::mem::size_of::<$t>() > 0);
            )+
        }

        #[test]
        fn max(){
            $(
                assert!(std::mem::size_of::<$t>() <= 256);
            )+
        }
    };
}

mark_sized_types!(
    u8,
    u16,
    u32,
    u64,
    i8,
    i16,
    i32,
    i64,
    fuse_attr,
    fuse_entry_out,
    fuse_forget_in,
    fuse_forget_one,
    fuse_batch_forget_in,
    fuse_getattr_in,
    fuse_attr_out,
    fuse_open_in,
    fuse_open_out,
    fuse_init_in,
    fuse_init_out,
    fuse_in_header,
    fuse_out_header,
);
