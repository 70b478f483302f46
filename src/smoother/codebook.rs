//! PDF codebook layout (§4.8 "Codebook layout").
//!
//! A codebook is a flat array of `n x vecsize` bytes inside a voice's
//! `Updflfz`/`Updfmgc` knowledge base. This module reads that layout
//! directly out of the arena-backed byte range `crate::resource::KnowledgeBase`
//! points at — no copy, no owned `Vec`, matching the "knowledge bases are
//! read-only after load and shared freely" policy (§5).
//!
//! `numdeltas == 0xFF` selects the dense delta/delta² section (every
//! coefficient's delta and delta² mean stored outright); any other value
//! selects the sparse section, where only `numdeltas` entries are stored
//! — each a one-byte coefficient index (into the combined `[0, 2*ceporder)`
//! delta/delta² space) followed by its two-byte mean — and every
//! coefficient absent from that index list has an implicit zero mean
//! (`picocep.c`'s `getFromPdf`, the `numdeltas != 0xFF` branch). Inverse
//! variances are always stored dense in both layouts.

/// Which of the three per-coefficient classes a mean/inverse-variance
/// value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Static,
    Delta,
    Delta2,
}

const HEADER_LEN: usize = 8;
const DENSE: u8 = 0xFF;

/// A parsed view over one codebook's header fields plus its raw vector
/// bytes. Constructed once at voice assembly time per §4.4; read by every
/// smoothing pass over the voice's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct PdfCodebook<'a> {
    pub ceporder: u8,
    numvuv: u8,
    pub bigpow: u32,
    pub meanpow: u32,
    ivarpow: [u32; 3],
    numdeltas: u8,
    vecsize: usize,
    data: &'a [u8],
}

impl<'a> PdfCodebook<'a> {
    /// Parses a codebook from the raw knowledge-base byte range. `bytes[0..8]`
    /// is the header (`ceporder`, `numvuv`, `bigpow`, `meanpow`, three
    /// `ivarpow` exponents, `numdeltas`); the rest is vector data.
    pub fn parse(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let ceporder = bytes[0];
        let numvuv = bytes[1];
        let bigpow = bytes[2] as u32;
        let meanpow = bytes[3] as u32;
        let ivarpow = [bytes[4] as u32, bytes[5] as u32, bytes[6] as u32];
        let numdeltas = bytes[7];
        let data = &bytes[HEADER_LEN..];

        let co = ceporder as usize;
        let vecsize = if numdeltas == DENSE {
            (numvuv as usize) + co * 2 * 3 + co * 3
        } else {
            let nd = numdeltas as usize;
            (numvuv as usize) + co * 2 + nd * 3 + co * 3
        };
        if vecsize == 0 || data.len() < vecsize {
            return None;
        }
        Some(Self {
            ceporder,
            numvuv,
            bigpow,
            meanpow,
            ivarpow,
            numdeltas,
            vecsize,
            data,
        })
    }

    fn is_dense(&self) -> bool {
        self.numdeltas == DENSE
    }

    pub fn num_vectors(&self) -> usize {
        self.data.len() / self.vecsize
    }

    fn vector(&self, idx: usize) -> &'a [u8] {
        let start = idx * self.vecsize;
        &self.data[start..start + self.vecsize]
    }

    /// The voicing bit for vector `idx`'s leading byte, or `true` (always
    /// voiced) if this codebook carries no voicing byte at all.
    pub fn voicing(&self, idx: usize) -> bool {
        if self.numvuv == 0 {
            return true;
        }
        self.vector(idx)[0] & 1 != 0
    }

    fn voicing_bytes(&self) -> usize {
        self.numvuv.min(1) as usize
    }

    /// Dense-layout byte offset of the static/delta/delta² mean block.
    fn mean_offset(&self, class: Class) -> usize {
        let co = self.ceporder as usize;
        self.voicing_bytes()
            + match class {
                Class::Static => 0,
                Class::Delta => co * 2,
                Class::Delta2 => co * 4,
            }
    }

    /// Byte offset of the dense ivar section, after whichever mean layout
    /// (dense or sparse) the vector uses.
    fn ivar_offset(&self) -> usize {
        let co = self.ceporder as usize;
        if self.is_dense() {
            self.voicing_bytes() + co * 2 * 3
        } else {
            self.voicing_bytes() + co * 2 + (self.numdeltas as usize) * 3
        }
    }

    /// Sparse-layout index/value section: `numdeltas` one-byte coefficient
    /// indices (spanning delta then delta² coefficients, `[0, 2*ceporder)`)
    /// followed by `numdeltas` two-byte means, one per index.
    fn sparse_mean(&self, idx: usize, sparse_index: u8) -> i32 {
        let co = self.ceporder as usize;
        let nd = self.numdeltas as usize;
        let indices_off = self.voicing_bytes() + co * 2;
        let values_off = indices_off + nd;
        let v = self.vector(idx);
        for s in 0..nd {
            if v[indices_off + s] == sparse_index {
                let off = values_off + s * 2;
                return i16::from_le_bytes([v[off], v[off + 1]]) as i32;
            }
        }
        0
    }

    /// Raw `i16` static/delta/delta² mean for `coeff` of vector `idx`, in
    /// the codebook's `meanpow` fixed-point basis. Static means are always
    /// dense; delta/delta² means fall back to an implicit zero when the
    /// sparse index list carries no entry for `coeff`.
    pub fn mean(&self, idx: usize, coeff: usize, class: Class) -> i32 {
        if class == Class::Static {
            let v = self.vector(idx);
            let off = self.voicing_bytes() + coeff * 2;
            return i16::from_le_bytes([v[off], v[off + 1]]) as i32;
        }
        if self.is_dense() {
            let v = self.vector(idx);
            let off = self.mean_offset(class) + coeff * 2;
            return i16::from_le_bytes([v[off], v[off + 1]]) as i32;
        }
        let co = self.ceporder as usize;
        let sparse_index = match class {
            Class::Static => unreachable!(),
            Class::Delta => coeff as u8,
            Class::Delta2 => (co + coeff) as u8,
        };
        self.sparse_mean(idx, sparse_index)
    }

    /// Inverse variance for `coeff`/`class` of vector `idx`, expanded from
    /// its stored one-byte mantissa by the class's `ivarpow` exponent into
    /// the codebook's `bigpow` basis.
    pub fn ivar(&self, idx: usize, coeff: usize, class: Class) -> u32 {
        let v = self.vector(idx);
        let class_idx = match class {
            Class::Static => 0,
            Class::Delta => 1,
            Class::Delta2 => 2,
        };
        let off = self.ivar_offset() + coeff * 3 + class_idx;
        (v[off] as u32) << self.ivarpow[class_idx]
    }

    /// Rescales a raw value from `from_pow` binary-decimal digits to this
    /// codebook's working `bigpow` basis, rounding.
    pub fn to_bigpow(&self, raw: i32, from_pow: u32) -> i32 {
        rescale(raw, from_pow, self.bigpow)
    }
}

fn rescale(raw: i32, from_pow: u32, to_pow: u32) -> i32 {
    if to_pow >= from_pow {
        (raw as i64).wrapping_shl(to_pow - from_pow) as i32
    } else {
        crate::smoother::fixedpoint::div_pow(raw as i64, from_pow - to_pow) as i32
    }
}

/// Builds a minimal, well-formed dense-layout codebook image for tests:
/// one vector per `(mean, ivar)` pair, identical across static/delta/delta²
/// classes, no voicing byte.
#[cfg(test)]
pub fn test_codebook_bytes(ceporder: u8, bigpow: u8, meanpow: u8, ivarpow: u8, vectors: &[(i16, u8)]) -> Vec<u8> {
    let mut out = vec![ceporder, 1, bigpow, meanpow, ivarpow, ivarpow, ivarpow, DENSE];
    for &(mean, ivar) in vectors {
        out.push(1); // voiced
        for _ in 0..ceporder {
            out.extend_from_slice(&mean.to_le_bytes());
        }
        for _ in 0..ceporder {
            out.extend_from_slice(&mean.to_le_bytes());
        }
        for _ in 0..ceporder {
            out.extend_from_slice(&mean.to_le_bytes());
        }
        for _ in 0..ceporder {
            out.push(ivar);
            out.push(ivar);
            out.push(ivar);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_vector_codebook() {
        let bytes = test_codebook_bytes(2, 8, 8, 2, &[(100, 5)]);
        let cb = PdfCodebook::parse(&bytes).unwrap();
        assert_eq!(cb.num_vectors(), 1);
        assert_eq!(cb.mean(0, 0, Class::Static), 100);
        assert_eq!(cb.mean(0, 1, Class::Delta), 100);
        assert_eq!(cb.ivar(0, 0, Class::Static), 5u32 << 2);
        assert!(cb.voicing(0));
    }

    #[test]
    fn rejects_truncated_buffer() {
        let bytes = vec![2, 1, 8, 8, 2, 2, 2, 0, 1, 2, 3];
        assert!(PdfCodebook::parse(&bytes).is_none());
    }

    /// Sparse layout, `ceporder = 2`: only coefficient 1's delta mean and
    /// coefficient 0's delta² mean (sparse index `2 + 0 = 2`) are stored;
    /// every other delta/delta² mean must read back as zero.
    #[test]
    fn sparse_layout_defaults_missing_means_to_zero() {
        let ceporder: u8 = 2;
        let numdeltas: u8 = 2;
        let mut bytes = vec![ceporder, 0, 8, 8, 2, 2, 2, numdeltas];
        // static means (dense): co0=10, co1=20
        bytes.extend_from_slice(&10i16.to_le_bytes());
        bytes.extend_from_slice(&20i16.to_le_bytes());
        // sparse indices: coefficient 1's delta (index 1), coefficient 0's delta² (index ceporder+0=2)
        bytes.push(1);
        bytes.push(2);
        // sparse mean values, one per index above
        bytes.extend_from_slice(&77i16.to_le_bytes());
        bytes.extend_from_slice(&99i16.to_le_bytes());
        // dense ivars: static, delta, delta² per coefficient
        for _ in 0..ceporder {
            bytes.push(5);
            bytes.push(5);
            bytes.push(5);
        }

        let cb = PdfCodebook::parse(&bytes).unwrap();
        assert_eq!(cb.num_vectors(), 1);
        assert_eq!(cb.mean(0, 0, Class::Static), 10);
        assert_eq!(cb.mean(0, 1, Class::Static), 20);
        assert_eq!(cb.mean(0, 1, Class::Delta), 77);
        assert_eq!(cb.mean(0, 0, Class::Delta2), 99);
        // not present in the sparse index list -> implicit zero
        assert_eq!(cb.mean(0, 0, Class::Delta), 0);
        assert_eq!(cb.mean(0, 1, Class::Delta2), 0);
        assert_eq!(cb.ivar(0, 0, Class::Static), 5u32 << 2);
    }
}
