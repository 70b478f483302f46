//! Fixed-point arithmetic primitives for the cepstral smoother.
//!
//! Grounded on `picocep.c`'s `picocep_fixptmult`/`picocep_fixptmultdouble`/
//! `picocep_fixptInvDiagEle` family (`examples/original_source/pico/lib/
//! picocep.c`): all quantities are 32-bit signed integers in an `S:M:N`
//! fixed-point representation, `N = bigpow` binary decimal digits. The
//! short/long multiplication dispatch and the "rescale a too-small pivot"
//! trick are preserved because §8 property 8 and §9's numerical-safety
//! note both depend on them, not just on the result value.

/// Highest set bit of `|x|`, 1-indexed; 0 for `x == 0`. Mirrors
/// `picocep_highestBitS`/`picocep_highestBitU`.
pub fn highest_bit(x: i32) -> u32 {
    if x == 0 {
        0
    } else {
        32 - x.unsigned_abs().leading_zeros()
    }
}

fn highest_bit_u(x: u32) -> u32 {
    if x == 0 {
        0
    } else {
        32 - x.leading_zeros()
    }
}

/// Divides by `1 << pow` with round-to-nearest, matching
/// `picocep_fixptdivpow`'s symmetric rounding.
pub fn div_pow(a: i64, pow: u32) -> i64 {
    if a == 0 || pow == 0 {
        return a;
    }
    let big = 1i64 << (pow - 1);
    if a > 0 {
        (a + big) >> pow
    } else {
        -((-a + big) >> pow)
    }
}

/// Result of a fixed-point multiplication: the value, which path was
/// taken, and whether the short path had to clip an overflowing product
/// (§4.8 Failure: "clipped value and raises a warning").
pub struct MultResult {
    pub value: i32,
    pub used_long_path: bool,
    pub clipped: bool,
}

/// `x * y`, both in `S:M:N` fixed point with `N = bigpow` (or `2*bigpow`
/// when `double_dec` — an operand that is itself the product of two
/// single-decimal values, e.g. a `fixptinv` intermediate).
///
/// Mirrors `picocep_fixptmult`: takes the short product path when the sum
/// of the operands' bit-widths is small enough for a 32-bit product to be
/// safe, otherwise decomposes each operand into high/low halves at
/// `bigpow` (`picocep_fixptmultdouble`) to avoid overflow.
pub fn fixpt_mult(x: i32, y: i32, bigpow: u32, double_dec: bool) -> MultResult {
    let multsz = highest_bit(x) + highest_bit(y);
    let pow = if double_dec { bigpow * 2 } else { bigpow };

    if multsz <= 30 {
        let product = x as i64 * y as i64;
        let divided = div_pow(product, pow);
        let (value, clipped) = clip_i32(divided);
        MultResult {
            value,
            used_long_path: false,
            clipped,
        }
    } else {
        let value = fixpt_mult_long(x, y, bigpow, double_dec);
        MultResult {
            value,
            used_long_path: true,
            clipped: false,
        }
    }
}

fn clip_i32(v: i64) -> (i32, bool) {
    if v > i32::MAX as i64 {
        (i32::MAX, true)
    } else if v < i32::MIN as i64 {
        (i32::MIN, true)
    } else {
        (v as i32, false)
    }
}

/// Splits `v` into `(high, low)` at the `bigpow` binary point: `v == high
/// << bigpow + low` with `low` the same sign as `v`.
fn split(v: i32, bigpow: u32) -> (i64, i64) {
    let v = v as i64;
    let high = if v >= 0 {
        v >> bigpow
    } else {
        -((-v) >> bigpow)
    };
    let low = v - (high << bigpow);
    (high, low)
}

/// Long-multiplication path (`picocep_fixptmultdouble`): decomposes both
/// operands and recombines so the product never needs more than 32 bits
/// of working precision per partial term.
fn fixpt_mult_long(x: i32, y: i32, bigpow: u32, double_dec: bool) -> i32 {
    let (a, b) = split(x, bigpow);
    let (c, d) = split(y, bigpow);

    let z = if double_dec {
        let e = a * d + b * c + div_pow(b * d, bigpow);
        a * c + div_pow(e, bigpow)
    } else {
        let f = a * c << bigpow;
        f + (a * d + b * c) + div_pow(b * d, bigpow)
    };
    clip_i32(z).0
}

/// Computes a reciprocal pivot `~= (1<<invpow) / d` for positive `d`,
/// rescaling the row by `2^rowscale` first if `d` is too small to give
/// `invpow` bits of quotient without overflow. Mirrors
/// `picocep_fixptInvDiagEle`: one hardware division for the integer part,
/// then a shift-and-compare loop for the remaining fractional bits — "one
/// division-like operation per row" (§4.8 step 3).
pub fn inv_diag_element(d: u32, bigpow: u32, invpow: u32) -> (u32, u32) {
    debug_assert!(d > 0, "pivot must be positive before inversion");
    let dlen = highest_bit_u(d);
    let rowscale = if invpow + bigpow > 30 + dlen {
        invpow + bigpow - 30 - dlen
    } else {
        0
    };
    let b = (d as u64) << rowscale;
    let mut r: u64 = 1u64 << invpow;
    let mut c: u64 = 0;
    let mut pow = bigpow;

    let h = r / b;
    if h > 0 {
        c += h << pow;
        r -= h * b;
    }
    if pow > 0 {
        pow -= 1;
        r <<= 1;
        while pow > 0 && r != 0 {
            if r >= b {
                c += 1u64 << pow;
                r -= b;
            }
            pow -= 1;
            r <<= 1;
        }
        if r != 0 {
            let f = r + (b >> 1);
            if f >= b {
                c += if f >= b + b { 2 } else { 1 };
            }
        }
    }
    (c as u32, rowscale)
}

/// Divides `a` by `b` given `b`'s precomputed reciprocal (`inv_diag_element`),
/// via multiplication (`picocep_fixptinv`): `a * invb` normalized from the
/// reciprocal's `invpow` basis back to `bigpow`.
pub fn fixpt_div_via_inv(a: i32, invb: u32, bigpow: u32, invpow: u32, double_dec: bool) -> i32 {
    let r = fixpt_mult(a, invb as i32, bigpow, double_dec);
    let normpow = if double_dec { bigpow * 3 } else { bigpow };
    if normpow < invpow {
        div_pow(r.value as i64, invpow - normpow) as i32
    } else {
        let shifted = (r.value as i64) << (normpow - invpow);
        clip_i32(shifted).0
    }
}
