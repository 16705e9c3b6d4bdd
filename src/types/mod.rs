//! Type definitions

pub mod import;
pub mod remote;
pub mod rows;
