//! Domain models for Songforge Core

pub mod common;
pub mod signal;
pub mod track;

pub use common::*;
pub use signal::*;
pub use track::*;
