// Utility functions
pub mod access;
pub mod error;

pub use error::*;
