//! 6-connected component labelling on binary masks

use crate::volume::idx3d;

/// Collect the 6-connected component of foreground voxels containing `start`
fn flood_fill_component(
    mask: &[bool],
    visited: &mut [bool],
    start: usize,
    nx: usize, ny: usize, nz: usize,
) -> Vec<usize> {
    let mut component = Vec::new();
    let mut stack = vec![start];

    while let Some(idx) = stack.pop() {
        if visited[idx] || !mask[idx] {
            continue;
        }

        visited[idx] = true;
        component.push(idx);

        let k = idx / (nx * ny);
        let rem = idx % (nx * ny);
        let j = rem / nx;
        let i = rem % nx;

        let mut visit = |n: usize| {
            if !visited[n] && mask[n] {
                stack.push(n);
            }
        };

        if i > 0 { visit(idx3d(i - 1, j, k, nx, ny)); }
        if i + 1 < nx { visit(idx3d(i + 1, j, k, nx, ny)); }
        if j > 0 { visit(idx3d(i, j - 1, k, nx, ny)); }
        if j + 1 < ny { visit(idx3d(i, j + 1, k, nx, ny)); }
        if k > 0 { visit(idx3d(i, j, k - 1, nx, ny)); }
        if k + 1 < nz { visit(idx3d(i, j, k + 1, nx, ny)); }
    }

    component
}

/// Keep only the largest 6-connected foreground component
///
/// Among equally large components the first in scan order wins. An empty
/// foreground yields an all-false mask.
pub fn largest_component(mask: &[bool], nx: usize, ny: usize, nz: usize) -> Vec<bool> {
    let mut visited = vec![false; mask.len()];
    let mut best: Vec<usize> = Vec::new();

    for start in 0..mask.len() {
        if mask[start] && !visited[start] {
            let component = flood_fill_component(mask, &mut visited, start, nx, ny, nz);
            if component.len() > best.len() {
                best = component;
            }
        }
    }

    let mut result = vec![false; mask.len()];
    for idx in best {
        result[idx] = true;
    }
    result
}
