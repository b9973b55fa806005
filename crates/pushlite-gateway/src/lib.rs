//! HTTP admission surface for pushlite.
pub mod gateway_push;

pub use gateway_push::*;
