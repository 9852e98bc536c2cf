// Domain services
pub mod qr_codec;

pub use qr_codec::*;
