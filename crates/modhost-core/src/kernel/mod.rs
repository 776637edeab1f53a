//! # Modhost Kernel
//!
//! Process-wide constants and the top-level [`Error`](error::Error) type that
//! every subsystem error converts into.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
