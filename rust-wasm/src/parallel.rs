//! Data-parallel voxel loops
//!
//! With the `parallel` feature (default) these run on the rayon global pool.
//! Without it (e.g. `wasm32` builds) they fall back to plain iterators with
//! identical results.
//!
//! Reductions go through fixed-size chunks whose partial results are
//! combined in index order, so floating-point sums do not depend on how
//! work was scheduled.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use std::ops::Range;

/// Voxels per reduction chunk
pub(crate) const CHUNK_SIZE: usize = 4096;

/// Map every element of a slice
pub(crate) fn map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        data.par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        data.iter().map(f).collect()
    }
}

/// Map two equally sized slices element-wise
pub(crate) fn zip_map<A, B, U, F>(a: &[A], b: &[B], f: F) -> Vec<U>
where
    A: Sync,
    B: Sync,
    U: Send,
    F: Fn(&A, &B) -> U + Sync + Send,
{
    debug_assert_eq!(a.len(), b.len());
    #[cfg(feature = "parallel")]
    {
        a.par_iter().zip(b.par_iter()).map(|(x, y)| f(x, y)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        a.iter().zip(b.iter()).map(|(x, y)| f(x, y)).collect()
    }
}

/// Evaluate `f` for every linear index in `0..n`
pub(crate) fn map_index<U, F>(n: usize, f: F) -> Vec<U>
where
    U: Send,
    F: Fn(usize) -> U + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        (0..n).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..n).map(f).collect()
    }
}

/// Evaluate `f` on consecutive index ranges of at most `CHUNK_SIZE`,
/// returning the partial results in range order
pub(crate) fn map_chunks<U, F>(len: usize, f: F) -> Vec<U>
where
    U: Send,
    F: Fn(Range<usize>) -> U + Sync + Send,
{
    let n_chunks = len.div_ceil(CHUNK_SIZE);
    map_index(n_chunks, |c| {
        let start = c * CHUNK_SIZE;
        f(start..(start + CHUNK_SIZE).min(len))
    })
}
