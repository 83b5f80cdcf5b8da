#![doc = include_str!("../README.md")]

mod binder;
mod callback;
mod composite;
mod encoder;
mod error;
mod payload;
mod producer;
mod stream;

#[cfg(test)]
mod testing;

pub use crate::binder::*;
pub use crate::callback::*;
pub use crate::composite::*;
pub use crate::encoder::*;
pub use crate::error::*;
pub use crate::payload::*;
pub use crate::producer::*;
pub use crate::stream::*;
