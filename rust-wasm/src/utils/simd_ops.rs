//! SIMD kernels for the element-wise pipeline stages
//!
//! With the `simd` feature these process four f64 lanes at a time (f64x4),
//! which maps onto SSE/AVX/NEON natively and onto 128-bit WASM SIMD as two
//! registers. Each SIMD kernel performs the same IEEE operations in the same
//! order as its scalar fallback, so results do not depend on the feature.

#[cfg(feature = "simd")]
use wide::{f64x4, CmpGe};

/// SIMD lane width (4 for f64x4)
#[cfg(feature = "simd")]
pub const SIMD_WIDTH: usize = 4;

#[cfg(not(feature = "simd"))]
pub const SIMD_WIDTH: usize = 1;

#[cfg(feature = "simd")]
#[inline]
fn load(s: &[f64], idx: usize) -> f64x4 {
    f64x4::from([s[idx], s[idx + 1], s[idx + 2], s[idx + 3]])
}

/// Per element, the operand with the larger absolute value; ties keep `a`
#[cfg(feature = "simd")]
pub fn max_abs_select(a: &[f64], b: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let chunks = n / SIMD_WIDTH;
    let mut out = Vec::with_capacity(n);

    for c in 0..chunks {
        let idx = c * SIMD_WIDTH;
        let va = load(a, idx);
        let vb = load(b, idx);
        let keep_a = va.abs().cmp_ge(vb.abs());
        out.extend_from_slice(keep_a.blend(va, vb).as_array_ref());
    }

    for i in chunks * SIMD_WIDTH..n {
        out.push(if a[i].abs() >= b[i].abs() { a[i] } else { b[i] });
    }

    out
}

#[cfg(not(feature = "simd"))]
pub fn max_abs_select(a: &[f64], b: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| if x.abs() >= y.abs() { x } else { y })
        .collect()
}

/// Unsharp combination: input + k * (input - blurred)
#[cfg(feature = "simd")]
pub fn unsharp_combine(input: &[f64], blurred: &[f64], k: f64) -> Vec<f64> {
    debug_assert_eq!(input.len(), blurred.len());
    let n = input.len();
    let chunks = n / SIMD_WIDTH;
    let vk = f64x4::splat(k);
    let mut out = Vec::with_capacity(n);

    for c in 0..chunks {
        let idx = c * SIMD_WIDTH;
        let vx = load(input, idx);
        let vg = load(blurred, idx);
        let result = vx + vk * (vx - vg);
        out.extend_from_slice(result.as_array_ref());
    }

    for i in chunks * SIMD_WIDTH..n {
        out.push(input[i] + k * (input[i] - blurred[i]));
    }

    out
}

#[cfg(not(feature = "simd"))]
pub fn unsharp_combine(input: &[f64], blurred: &[f64], k: f64) -> Vec<f64> {
    debug_assert_eq!(input.len(), blurred.len());
    input
        .iter()
        .zip(blurred.iter())
        .map(|(&x, &g)| x + k * (x - g))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_abs_select() {
        let a = vec![1.0, -5.0, 0.0, 2.0, -3.0, 7.0, -0.5];
        let b = vec![-2.0, 4.0, 0.0, -2.0, 3.0, 1.0, 0.25];

        let result = max_abs_select(&a, &b);
        assert_eq!(result, vec![-2.0, -5.0, 0.0, 2.0, -3.0, 7.0, -0.5]);
    }

    #[test]
    fn test_max_abs_select_ties_keep_first() {
        let a = vec![2.0, -2.0, 2.0, -2.0, 1.0];
        let b = vec![-2.0, 2.0, 2.0, -2.0, -1.0];
        assert_eq!(max_abs_select(&a, &b), a);
    }

    #[test]
    fn test_unsharp_combine() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let g = vec![1.0, 1.0, 1.0, 1.0, 1.0];

        let result = unsharp_combine(&x, &g, 10.0);
        let expected: Vec<f64> = x.iter().zip(g.iter()).map(|(a, b)| a + 10.0 * (a - b)).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_unsharp_combine_zero_k_is_identity() {
        let x = vec![1.5, -2.0, 3.25, 0.0, 9.0];
        let g = vec![0.0, 7.0, -1.0, 2.0, 4.0];
        assert_eq!(unsharp_combine(&x, &g, 0.0), x);
    }
}
