#![doc = include_str!("../README.md")]

pub mod environment;
mod error;
mod host;
mod pipeline;
mod request;
mod sink;

pub use crate::error::*;
pub use crate::host::*;
pub use crate::pipeline::*;
pub use crate::request::*;
pub use crate::sink::*;
