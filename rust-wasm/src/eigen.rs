//! Symmetric 3x3 eigenvalue solver
//!
//! Householder reduction to tridiagonal form followed by implicit QL
//! iteration (tred2/tql2 from EISPACK, as in JAMA). Only eigenvalues are
//! produced; their order is unspecified and callers impose their own.
//!
//! The QL loop is capped, so non-finite or pathological input yields `None`
//! instead of spinning forever.

/// Maximum QL sweeps per eigenvalue before giving up
const MAX_QL_ITERATIONS: usize = 30;

/// Symmetric 3x3 matrix stored as its six independent entries
///
/// | xx  xy  xz |
/// | xy  yy  yz |
/// | xz  yz  zz |
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SymmetricMatrix3 {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
}

impl SymmetricMatrix3 {
    pub fn trace(&self) -> f64 {
        self.xx + self.yy + self.zz
    }

    /// Frobenius norm of the full matrix; equals sqrt(sum of eigenvalue^2)
    pub fn frobenius_norm(&self) -> f64 {
        let diag = self.xx * self.xx + self.yy * self.yy + self.zz * self.zz;
        let off = self.xy * self.xy + self.xz * self.xz + self.yz * self.yz;
        (diag + 2.0 * off).sqrt()
    }

    /// Eigenvalues in unspecified order, or `None` if the solver did not converge
    pub fn eigenvalues(&self) -> Option<EigenTriple> {
        let entries = [self.xx, self.yy, self.zz, self.xy, self.xz, self.yz];
        if entries.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mut v = [
            [self.xx, self.xy, self.xz],
            [self.xy, self.yy, self.yz],
            [self.xz, self.yz, self.zz],
        ];
        let mut d = [0.0f64; 3];
        let mut e = [0.0f64; 3];

        tred2(&mut v, &mut d, &mut e);
        if !tql2(&mut d, &mut e) {
            return None;
        }

        Some(EigenTriple::new(d[0], d[1], d[2]))
    }
}

/// Three real eigenvalues of a symmetric matrix
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EigenTriple {
    pub values: [f64; 3],
}

/// Eigenvalues ordered so that |signed[0]| <= |signed[1]| <= |signed[2]|
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SortedEigenvalues {
    /// Signed eigenvalues (a1, a2, a3)
    pub signed: [f64; 3],
    /// Magnitudes (l1, l2, l3)
    pub magnitude: [f64; 3],
}

impl EigenTriple {
    pub fn new(e1: f64, e2: f64, e3: f64) -> Self {
        Self { values: [e1, e2, e3] }
    }

    /// Sort by ascending absolute value
    ///
    /// Three compare-and-swap steps on the (signed, magnitude) pairs.
    /// Equal magnitudes keep their input order.
    pub fn sort_by_magnitude(&self) -> SortedEigenvalues {
        let mut a = self.values;
        let mut l = [a[0].abs(), a[1].abs(), a[2].abs()];

        for &(lo, hi) in &[(1usize, 2usize), (0, 1), (1, 2)] {
            if l[lo] > l[hi] {
                l.swap(lo, hi);
                a.swap(lo, hi);
            }
        }

        SortedEigenvalues { signed: a, magnitude: l }
    }
}

/// Symmetric Householder reduction to tridiagonal form
///
/// On return `d` holds the diagonal and `e[1..]` the subdiagonal.
fn tred2(v: &mut [[f64; 3]; 3], d: &mut [f64; 3], e: &mut [f64; 3]) {
    const N: usize = 3;

    for j in 0..N {
        d[j] = v[N - 1][j];
    }

    for i in (1..N).rev() {
        // Scale to avoid under/overflow
        let mut scale = 0.0;
        let mut h = 0.0;

        for k in 0..i {
            scale += d[k].abs();
        }

        if scale == 0.0 {
            e[i] = d[i - 1];
            for j in 0..i {
                d[j] = v[i - 1][j];
                v[i][j] = 0.0;
                v[j][i] = 0.0;
            }
        } else {
            // Householder vector
            for k in 0..i {
                d[k] /= scale;
                h += d[k] * d[k];
            }

            let f = d[i - 1];
            let mut g = h.sqrt();
            if f > 0.0 {
                g = -g;
            }
            e[i] = scale * g;
            h -= f * g;
            d[i - 1] = f - g;

            for j in 0..i {
                e[j] = 0.0;
            }

            for j in 0..i {
                let f = d[j];
                v[j][i] = f;
                let mut g = e[j] + v[j][j] * f;
                for k in (j + 1)..i {
                    g += v[k][j] * d[k];
                    e[k] += v[k][j] * f;
                }
                e[j] = g;
            }

            let mut f = 0.0;
            for j in 0..i {
                e[j] /= h;
                f += e[j] * d[j];
            }

            let hh = f / (h + h);
            for j in 0..i {
                e[j] -= hh * d[j];
            }

            for j in 0..i {
                let f = d[j];
                let g = e[j];
                for k in j..i {
                    v[k][j] -= f * e[k] + g * d[k];
                }
                d[j] = v[i - 1][j];
                v[i][j] = 0.0;
            }
        }
        d[i] = h;
    }

    // Accumulate transformations; leaves the tridiagonal diagonal in the last row
    for i in 0..(N - 1) {
        v[N - 1][i] = v[i][i];
        v[i][i] = 1.0;
        let h = d[i + 1];
        if h != 0.0 {
            for k in 0..=i {
                d[k] = v[k][i + 1] / h;
            }
            for j in 0..=i {
                let mut g = 0.0;
                for k in 0..=i {
                    g += v[k][i + 1] * v[k][j];
                }
                for k in 0..=i {
                    v[k][j] -= g * d[k];
                }
            }
        }
        for k in 0..=i {
            v[k][i + 1] = 0.0;
        }
    }

    for j in 0..N {
        d[j] = v[N - 1][j];
        v[N - 1][j] = 0.0;
    }
    v[N - 1][N - 1] = 1.0;
    e[0] = 0.0;
}

/// Symmetric tridiagonal QL algorithm, eigenvalues only
///
/// Returns false when an eigenvalue fails to converge within
/// `MAX_QL_ITERATIONS` sweeps.
fn tql2(d: &mut [f64; 3], e: &mut [f64; 3]) -> bool {
    const N: usize = 3;

    for i in 1..N {
        e[i - 1] = e[i];
    }
    e[N - 1] = 0.0;

    let mut f: f64 = 0.0;
    let mut tst1: f64 = 0.0;
    let eps = f64::EPSILON;

    for l in 0..N {
        // Find small subdiagonal element
        tst1 = tst1.max(d[l].abs() + e[l].abs());
        let mut m = l;
        while m < N {
            if e[m].abs() <= eps * tst1 {
                break;
            }
            m += 1;
        }
        if m == N {
            return false;
        }

        if m > l {
            let mut iter = 0;
            loop {
                iter += 1;
                if iter > MAX_QL_ITERATIONS {
                    return false;
                }

                // Implicit shift
                let g = d[l];
                let mut p = (d[l + 1] - g) / (2.0 * e[l]);
                let mut r = p.hypot(1.0);
                if p < 0.0 {
                    r = -r;
                }
                d[l] = e[l] / (p + r);
                d[l + 1] = e[l] * (p + r);
                let dl1 = d[l + 1];
                let h = g - d[l];
                for i in (l + 2)..N {
                    d[i] -= h;
                }
                f += h;

                // Implicit QL transformation
                p = d[m];
                let mut c = 1.0;
                let mut c2 = c;
                let mut c3 = c;
                let el1 = e[l + 1];
                let mut s = 0.0;
                let mut s2 = 0.0;

                for i in (l..m).rev() {
                    c3 = c2;
                    c2 = c;
                    s2 = s;
                    let g = c * e[i];
                    let h = c * p;
                    r = p.hypot(e[i]);
                    e[i + 1] = s * r;
                    s = e[i] / r;
                    c = p / r;
                    p = c * d[i] - s * g;
                    d[i + 1] = h + s * (c * g + s * d[i]);
                }
                p = -s * s2 * c3 * el1 * e[l] / dl1;
                e[l] = s * p;
                d[l] = c * p;

                if !(e[l].abs() > eps * tst1) {
                    break;
                }
            }
        }
        d[l] += f;
        e[l] = 0.0;
    }

    d.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(t: EigenTriple) -> Vec<f64> {
        let mut v = t.values.to_vec();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v
    }

    #[test]
    fn test_eigenvalues_diagonal() {
        let m = SymmetricMatrix3 { xx: 1.0, yy: 2.0, zz: 3.0, ..Default::default() };
        let vals = sorted(m.eigenvalues().unwrap());

        assert!((vals[0] - 1.0).abs() < 1e-10);
        assert!((vals[1] - 2.0).abs() < 1e-10);
        assert!((vals[2] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_eigenvalues_identity() {
        let m = SymmetricMatrix3 { xx: 1.0, yy: 1.0, zz: 1.0, ..Default::default() };
        let t = m.eigenvalues().unwrap();

        for v in t.values {
            assert!((v - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_eigenvalues_zero_matrix() {
        let t = SymmetricMatrix3::default().eigenvalues().unwrap();
        assert_eq!(t.values, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_eigenvalues_full_matrix() {
        // | 2 1 0 |
        // | 1 2 0 |  eigenvalues 1, 3, 5
        // | 0 0 5 |
        let m = SymmetricMatrix3 {
            xx: 2.0, yy: 2.0, zz: 5.0,
            xy: 1.0, xz: 0.0, yz: 0.0,
        };
        let vals = sorted(m.eigenvalues().unwrap());

        assert!((vals[0] - 1.0).abs() < 1e-10);
        assert!((vals[1] - 3.0).abs() < 1e-10);
        assert!((vals[2] - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_eigenvalues_preserve_trace_and_norm() {
        let m = SymmetricMatrix3 {
            xx: -4.0, yy: 1.5, zz: 0.25,
            xy: 0.7, xz: -1.1, yz: 2.3,
        };
        let t = m.eigenvalues().unwrap();

        let sum: f64 = t.values.iter().sum();
        let sum_sq: f64 = t.values.iter().map(|v| v * v).sum();
        assert!((sum - m.trace()).abs() < 1e-10);
        assert!((sum_sq.sqrt() - m.frobenius_norm()).abs() < 1e-10);
    }

    #[test]
    fn test_non_finite_input_fails() {
        let m = SymmetricMatrix3 { xx: f64::NAN, ..Default::default() };
        assert!(m.eigenvalues().is_none());

        let m = SymmetricMatrix3 { xy: f64::INFINITY, ..Default::default() };
        assert!(m.eigenvalues().is_none());
    }

    #[test]
    fn test_sort_by_magnitude() {
        let s = EigenTriple::new(-3.0, 1.0, 2.0).sort_by_magnitude();
        assert_eq!(s.signed, [1.0, 2.0, -3.0]);
        assert_eq!(s.magnitude, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sort_is_axis_order_invariant() {
        let a = EigenTriple::new(1.0, 0.0, 0.0).sort_by_magnitude();
        let b = EigenTriple::new(0.0, 1.0, 0.0).sort_by_magnitude();
        let c = EigenTriple::new(0.0, 0.0, 1.0).sort_by_magnitude();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.signed, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sort_ties_keep_input_order() {
        let s = EigenTriple::new(2.0, -2.0, 1.0).sort_by_magnitude();
        assert_eq!(s.signed, [1.0, 2.0, -2.0]);
    }
}
