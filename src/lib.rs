//! Command line time tracker. Activities are kept either in a human editable text file or in a
//! TimeWarrior data directory, with notes and tags stored next to them.
//!

pub mod cli;
pub mod config;
pub mod fs;
pub mod storage;
pub mod tracking;
pub mod utils;
