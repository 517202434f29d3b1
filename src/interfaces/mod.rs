//! Interface layer: external file formats consumed by the simulator binary.

pub mod scenario;
