//! Activity lifecycle on top of the storage layer.

pub mod dto;
pub mod entities;
pub mod errors;
pub mod service;
