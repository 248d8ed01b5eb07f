//! Infrastructure: ports and their adapters.

pub mod cache;
pub mod clock;
pub mod overlay_source;
pub mod persistence;
pub mod ports;
pub mod upstream;
