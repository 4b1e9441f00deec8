//! Core components for OxiFM.
//!
//! This crate provides the building blocks shared by the OxiFM index
//! crates:
//!
//! - [`BitReader`] / [`BitWriter`] - MSB-first bit-level I/O
//! - [`error`] - the `OxiFmError` taxonomy and `Result` alias

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitstream;
pub mod error;

pub use bitstream::{BitReader, BitWriter};
pub use error::{OxiFmError, Result};
