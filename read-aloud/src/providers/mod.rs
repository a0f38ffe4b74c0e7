//! Concrete speech engines.

pub mod host;
