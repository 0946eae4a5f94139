#![doc = include_str!("../README.md")]

mod encode;
mod error;
mod format;
mod size;

pub use crate::encode::*;
pub use crate::error::*;
pub use crate::format::*;
pub use crate::size::*;
