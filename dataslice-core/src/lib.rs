#![no_std]

//! Dataslice Core - Shape, Slice and Format Definitions
//!
//! This crate provides the pure definitions for lazy N-dimensional
//! dataset access: the slice model, the logical-to-physical slice
//! translation, the native file header format, and the capability
//! traits. No I/O happens here.

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod dtype;
pub mod error;
pub mod format;
#[cfg(feature = "alloc")]
pub mod shape;
#[cfg(feature = "alloc")]
pub mod slice;
pub mod traits;
#[cfg(feature = "alloc")]
pub mod translate;

pub use dtype::*;
pub use error::*;
pub use format::*;
#[cfg(feature = "alloc")]
pub use slice::*;
pub use traits::*;
#[cfg(feature = "alloc")]
pub use translate::*;
