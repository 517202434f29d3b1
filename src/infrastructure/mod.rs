//! Infrastructure layer: in-memory implementations of the backend and cache
//! ports plus provider doubles used by the simulator and the test suites.

pub mod in_memory;
pub mod providers;
