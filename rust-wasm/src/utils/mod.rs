//! Utility functions
//!
//! - 6-connected component labelling
//! - SIMD-accelerated element-wise kernels (optional, with `simd` feature)

pub mod components;
pub mod simd_ops;

pub use components::*;
pub use simd_ops::*;
