#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use denmat_core as core;

#[doc(inline)]
pub use denmat_linalg as linalg;
