//! Windowed cepstral trajectory smoothing (§4.8 steps 1-5).
//!
//! For one sentence and one cepstral coefficient, builds the symmetric
//! pentadiagonal normal-equation system implied by a static + delta +
//! delta² trajectory model (mirroring `picocep.c`'s `makeWUWandWUm`, which
//! forms `W^T U W` / `W^T U m` without ever materializing the dense
//! window operator `W`) and solves it with a banded `LDL^T` factorization
//! built on the fixed-point primitives in [`super::fixedpoint`].
//!
//! This module's factorization recurrence is the textbook pentadiagonal
//! `LDL^T` (`d[j] = a0[j] - l1[j-1]^2 d[j-1] - l2[j-2]^2 d[j-2]`, etc.)
//! rather than `invMatrix`'s in-place index bookkeeping — same linear
//! algebra, same fixed-point division/multiplication building blocks,
//! cleaner row/column accounting. See `DESIGN.md`.

use super::fixedpoint::{div_pow, fixpt_mult, inv_diag_element};

/// Per-frame inputs for one coefficient: inverse variances and means for
/// each of the static/delta/delta² classes, already rescaled into the
/// codebook's `bigpow` fixed-point basis.
pub struct FrameCoeffs {
    pub ivar: [u32; 3],
    pub mean: [i32; 3],
}

/// Divides `value` by `pivot`, both in `bigpow` fixed-point basis,
/// rescaling the pivot first if it is too small to invert without
/// overflow (§4.8 step 4 "row rescale") and undoing that same rescale on
/// `value` before the multiply, so no scale state needs to be threaded
/// across rows.
fn divide_by_pivot(value: i32, pivot: i32, bigpow: u32, invpow: u32, double_dec: bool) -> i32 {
    debug_assert!(pivot > 0, "pentadiagonal pivots must stay positive");
    let (inv, rowscale) = inv_diag_element(pivot as u32, bigpow, invpow);
    let scaled = ((value as i64) << rowscale).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    super::fixedpoint::fixpt_div_via_inv(scaled, inv, bigpow, invpow, double_dec)
}

/// Builds the pentadiagonal normal-equation bands `(a0, a1, a2, b)` for one
/// coefficient over a sentence of `N` frames (§4.8 step 2). `a1[i]` is
/// `A[i][i+1]`, `a2[i]` is `A[i][i+2]`.
fn build_system(frames: &[FrameCoeffs], bigpow: u32, double_dec: bool) -> (Vec<i32>, Vec<i32>, Vec<i32>, Vec<i32>) {
    let n = frames.len();
    let mut a0 = vec![0i32; n];
    let mut a1 = vec![0i32; n.saturating_sub(1)];
    let mut a2 = vec![0i32; n.saturating_sub(2)];
    let mut b = vec![0i32; n];

    for (i, f) in frames.iter().enumerate() {
        // static: row i picks x[i] alone.
        a0[i] = a0[i].saturating_add(f.ivar[0] as i32);
        let um = fixpt_mult(f.ivar[0] as i32, f.mean[0], bigpow, double_dec).value;
        b[i] = b[i].saturating_add(um);

        // delta: forward difference `x[i+1] - x[i]`, weighted by frame i's
        // delta inverse variance. The last frame's tap falls outside
        // `0..n` and `apply_window` drops it, leaving a diagonal-only
        // regularization term there instead of an unpaired difference.
        if n >= 2 {
            let taps: &[(usize, i32)] = &[(0, -1), (1, 1)];
            apply_window(
                &mut a0, &mut a1, &mut a2, &mut b, i, n, taps, f.ivar[1], f.mean[1], bigpow, double_dec,
            );
        }

        // delta²: second difference over {i-1, i, i+1}, squared
        // coefficients {4, 16, 4} (§4.8 step 2). Truncated at the sentence
        // boundaries rather than dropped outright: the first frame has no
        // i-1 tap, so its window starts at i itself; `apply_window`'s own
        // upper-bound check drops the last frame's missing i+1 tap the
        // same way it already does for the delta window above.
        if i == 0 {
            let taps: &[(usize, i32)] = &[(0, -4), (1, 2)];
            apply_window(
                &mut a0, &mut a1, &mut a2, &mut b, 0, n, taps, f.ivar[2], f.mean[2], bigpow, double_dec,
            );
        } else {
            let taps: &[(usize, i32)] = &[(0, 2), (1, -4), (2, 2)];
            apply_window(
                &mut a0, &mut a1, &mut a2, &mut b, i - 1, n, taps, f.ivar[2], f.mean[2], bigpow, double_dec,
            );
        }
    }

    (a0, a1, a2, b)
}

/// Adds the outer-product contribution of one difference-operator row
/// (taps given as `(offset_from_base, coefficient)` pairs, `base` the
/// index of the first tap) to the pentadiagonal bands.
#[allow(clippy::too_many_arguments)]
fn apply_window(
    a0: &mut [i32],
    a1: &mut [i32],
    a2: &mut [i32],
    b: &mut [i32],
    base: usize,
    n: usize,
    taps: &[(usize, i32)],
    u: u32,
    mean: i32,
    bigpow: u32,
    double_dec: bool,
) {
    let u_mean = fixpt_mult(u as i32, mean, bigpow, double_dec).value;
    for &(off_a, coef_a) in taps {
        let idx_a = base + off_a;
        if idx_a >= n {
            continue;
        }
        a0[idx_a] = a0[idx_a].saturating_add((u as i64 * (coef_a * coef_a) as i64) as i32);
        b[idx_a] = b[idx_a].saturating_add(u_mean.saturating_mul(coef_a));
        for &(off_b, coef_b) in taps {
            let idx_b = base + off_b;
            if idx_b <= idx_a || idx_b >= n {
                continue;
            }
            let coef_prod = coef_a * coef_b;
            match idx_b - idx_a {
                1 => a1[idx_a] = a1[idx_a].saturating_add((u as i64 * coef_prod as i64) as i32),
                2 => a2[idx_a] = a2[idx_a].saturating_add((u as i64 * coef_prod as i64) as i32),
                _ => {}
            }
        }
    }
}

/// Solves the pentadiagonal system via banded `LDL^T` (§4.8 step 3).
fn solve_pentadiagonal(
    a0: &[i32],
    a1: &[i32],
    a2: &[i32],
    b: &[i32],
    bigpow: u32,
    invpow: u32,
    double_dec: bool,
) -> Vec<i32> {
    let n = a0.len();
    if n == 0 {
        return Vec::new();
    }
    let mut d = vec![0i32; n];
    let mut l1 = vec![0i32; n.saturating_sub(1)];
    let mut l2 = vec![0i32; n.saturating_sub(2)];

    for j in 0..n {
        let mut dj = a0[j];
        if j >= 1 {
            let term = fixpt_mult(l1[j - 1], l1[j - 1], bigpow, double_dec).value;
            let term = fixpt_mult(term, d[j - 1], bigpow, double_dec).value;
            dj = dj.saturating_sub(term);
        }
        if j >= 2 {
            let term = fixpt_mult(l2[j - 2], l2[j - 2], bigpow, double_dec).value;
            let term = fixpt_mult(term, d[j - 2], bigpow, double_dec).value;
            dj = dj.saturating_sub(term);
        }
        d[j] = dj.max(1); // positive-definite by construction; guard against fixed-point underflow to zero

        if j < n - 1 {
            let mut a1j = a1[j];
            if j >= 1 {
                let term = fixpt_mult(l2[j - 1], l1[j - 1], bigpow, double_dec).value;
                let term = fixpt_mult(term, d[j - 1], bigpow, double_dec).value;
                a1j = a1j.saturating_sub(term);
            }
            l1[j] = divide_by_pivot(a1j, d[j], bigpow, invpow, double_dec);
        }
        if j < n.saturating_sub(2) {
            l2[j] = divide_by_pivot(a2[j], d[j], bigpow, invpow, double_dec);
        }
    }

    let mut y = vec![0i32; n];
    for j in 0..n {
        let mut yj = b[j];
        if j >= 1 {
            yj = yj.saturating_sub(fixpt_mult(l1[j - 1], y[j - 1], bigpow, double_dec).value);
        }
        if j >= 2 {
            yj = yj.saturating_sub(fixpt_mult(l2[j - 2], y[j - 2], bigpow, double_dec).value);
        }
        y[j] = yj;
    }

    let mut z = vec![0i32; n];
    for j in 0..n {
        z[j] = divide_by_pivot(y[j], d[j], bigpow, invpow, double_dec);
    }

    let mut x = vec![0i32; n];
    for j in (0..n).rev() {
        let mut xj = z[j];
        if j < n - 1 {
            xj = xj.saturating_sub(fixpt_mult(l1[j], x[j + 1], bigpow, double_dec).value);
        }
        if j < n.saturating_sub(2) {
            xj = xj.saturating_sub(fixpt_mult(l2[j], x[j + 2], bigpow, double_dec).value);
        }
        x[j] = xj;
    }
    x
}

/// Direct fallback for windows shorter than four frames (§4.8 step 5):
/// each coefficient is `mean / ivar` at the static class, no smoothing.
fn solve_direct(frames: &[FrameCoeffs], bigpow: u32, invpow: u32, double_dec: bool) -> Vec<i32> {
    frames
        .iter()
        .map(|f| {
            let ivar = f.ivar[0].max(1);
            divide_by_pivot(f.mean[0], ivar as i32, bigpow, invpow, double_dec)
        })
        .collect()
}

/// Smooths one coefficient's trajectory over a sentence's frames (§4.8
/// steps 1-5 combined): dispatches to the direct fallback below four
/// frames, otherwise builds and solves the pentadiagonal system.
pub fn smooth_coefficient(
    frames: &[FrameCoeffs],
    bigpow: u32,
    invpow: u32,
    double_dec: bool,
) -> Vec<i32> {
    if frames.len() < 4 {
        return solve_direct(frames, bigpow, invpow, double_dec);
    }
    let (a0, a1, a2, b) = build_system(frames, bigpow, double_dec);
    solve_pentadiagonal(&a0, &a1, &a2, &b, bigpow, invpow, double_dec)
}

/// Rounds a `bigpow`-basis fixed-point value to a plain integer.
pub fn round_to_int(v: i32, bigpow: u32) -> i32 {
    div_pow(v as i64, bigpow) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(n: usize, mean: i32, ivar: u32) -> Vec<FrameCoeffs> {
        (0..n)
            .map(|_| FrameCoeffs {
                ivar: [ivar, ivar / 4, ivar / 16],
                mean: [mean, 0, 0],
            })
            .collect()
    }

    #[test]
    fn constant_trajectory_smooths_to_its_own_mean() {
        let bigpow = 8;
        let mean = 10 * (1 << bigpow);
        let frames = uniform(8, mean, 1 << bigpow);
        let out = smooth_coefficient(&frames, bigpow, 16, false);
        assert_eq!(out.len(), 8);
        for v in out {
            let rounded = round_to_int(v, bigpow);
            assert!((rounded - 10).abs() <= 1, "got {rounded}");
        }
    }

    #[test]
    fn short_window_uses_direct_fallback() {
        let bigpow = 8;
        let mean = 5 * (1 << bigpow);
        let frames = uniform(2, mean, 1 << bigpow);
        let out = smooth_coefficient(&frames, bigpow, 16, false);
        assert_eq!(out.len(), 2);
        assert_eq!(round_to_int(out[0], bigpow), 5);
    }
}
