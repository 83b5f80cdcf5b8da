#![doc = include_str!("../README.md")]

mod callback;
mod encoder;
mod error;

pub use crate::callback::*;
pub use crate::encoder::*;
pub use crate::error::*;

// Public re-export so handlers only need to depend on this crate.
pub use tributary;
