//! Convolution and finite-difference kernels
//!
//! - Separable Gaussian smoothing in physical units
//! - Central-difference first derivatives

pub mod gaussian;

pub use gaussian::*;
