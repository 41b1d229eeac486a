//! Feature modules, one directory per capability

pub mod bridge;
pub mod flatten;
pub mod sandbox;
pub mod trace;
