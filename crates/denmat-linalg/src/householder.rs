//! Elementary Householder reflectors.
//!
//! A reflector `H = I - τ·v·vᵀ` (with `v[0] = 1` by convention) annihilates
//! the tail of a vector: `H·x = [β, 0, …, 0]ᵀ`. Reflectors are the building
//! block of the QR factorization and are always applied implicitly as a
//! rank-1 update, never materialized as a matrix.

use std::ops::Range;

use denmat_core::Matrix;
use num_traits::Float;

/// Scratch-free conversion of a small count to the float type.
#[inline]
pub(crate) fn approx_count<T: Float>(n: usize) -> T {
    T::from(n).unwrap_or_else(T::max_value)
}

/// Generates a Householder reflector annihilating `x[1..]`.
///
/// On return `x[0]` holds `β = ±‖x‖` and `x[1..]` holds the reflector tail
/// (the head `v[0] = 1` is implicit). Returns `(τ, β)`; `τ = 0` means the
/// reflector is the identity, which happens for vectors of length `<= 1`
/// and for vectors whose tail is exactly zero.
///
/// Inputs with tiny norms are rescaled into `[min_positive/ε, max·ε]`
/// before the norm is formed, so denormal tails do not lose the direction.
pub fn householder<T: Float>(x: &mut [T]) -> (T, T) {
    let n = x.len();
    if n == 0 {
        return (T::zero(), T::zero());
    }
    let mut alpha = x[0];
    if n == 1 {
        return (T::zero(), alpha);
    }

    let mut xnorm = tail_norm(&x[1..]);
    if xnorm == T::zero() {
        return (T::zero(), alpha);
    }

    let safmin = T::min_positive_value() / T::epsilon();
    let rsafmn = safmin.recip();
    let mut scaled = 0;
    let mut beta = -alpha.signum() * alpha.hypot(xnorm);
    while beta.abs() < safmin && scaled < 20 {
        for v in x[1..].iter_mut() {
            *v = *v * rsafmn;
        }
        alpha = alpha * rsafmn;
        beta = beta * rsafmn;
        scaled += 1;
        xnorm = tail_norm(&x[1..]);
        beta = -alpha.signum() * alpha.hypot(xnorm);
    }

    let tau = (beta - alpha) / beta;
    let inv = (alpha - beta).recip();
    for v in x[1..].iter_mut() {
        *v = *v * inv;
    }
    for _ in 0..scaled {
        beta = beta * safmin;
    }
    x[0] = beta;
    (tau, beta)
}

fn tail_norm<T: Float>(tail: &[T]) -> T {
    let mut acc = T::zero();
    for &v in tail {
        acc = acc.hypot(v);
    }
    acc
}

/// Applies `H = I - τ·v·vᵀ` from the left to the columns `cols` of `a`,
/// restricted to rows `r0..r0 + v.len()`.
///
/// `v` is the full reflector including its unit head.
///
/// # Panics
///
/// Panics if the row or column range does not fit in `a`.
pub fn reflect_cols<T: Float>(a: &mut Matrix<T>, r0: usize, cols: Range<usize>, v: &[T], tau: T) {
    assert!(r0 + v.len() <= a.rows() && cols.end <= a.cols());
    if tau == T::zero() {
        return;
    }
    let stride = a.row_stride();
    let s = a.as_strided_slice_mut();
    for j in cols {
        let mut acc = T::zero();
        for (r, &vr) in v.iter().enumerate() {
            acc = acc + vr * s[(r0 + r) * stride + j];
        }
        let acc = acc * tau;
        for (r, &vr) in v.iter().enumerate() {
            let idx = (r0 + r) * stride + j;
            s[idx] = s[idx] - acc * vr;
        }
    }
}

/// Applies `H = I - τ·v·vᵀ` from the right to the rows `rows` of `a`,
/// restricted to columns `c0..c0 + v.len()`.
///
/// # Panics
///
/// Panics if the row or column range does not fit in `a`.
pub fn reflect_rows<T: Float>(a: &mut Matrix<T>, rows: Range<usize>, c0: usize, v: &[T], tau: T) {
    assert!(rows.end <= a.rows() && c0 + v.len() <= a.cols());
    if tau == T::zero() {
        return;
    }
    let stride = a.row_stride();
    let s = a.as_strided_slice_mut();
    for i in rows {
        let base = i * stride + c0;
        let mut acc = T::zero();
        for (c, &vc) in v.iter().enumerate() {
            acc = acc + vc * s[base + c];
        }
        let acc = acc * tau;
        for (c, &vc) in v.iter().enumerate() {
            s[base + c] = s[base + c] - acc * vc;
        }
    }
}

/// How packed reflectors are laid out in a factor matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectorLayout {
    /// Reflector `i` is stored below the diagonal of column `i`
    /// (QR convention).
    Columns,
    /// Reflector `i` is stored right of the diagonal of row `i`
    /// (LQ convention).
    Rows,
}

/// Builds the block `T` factor of the compact WY representation
/// `Q = I + V·T·Vᵀ` from `k` packed reflectors and their `τ` values.
///
/// `packed` holds the reflectors in the given layout with implicit unit
/// heads on the diagonal; only the sub/super-diagonal part is read. The
/// returned `T` is `k × k` upper triangular with `T[i][i] = -τ_i`, built
/// column by column from the reflectors' Gram matrix.
pub fn unpack_reflectors<T: Float>(
    packed: &Matrix<T>,
    taus: &[T],
    layout: ReflectorLayout,
) -> Matrix<T> {
    let k = taus.len();
    let len = match layout {
        ReflectorLayout::Columns => packed.rows(),
        ReflectorLayout::Rows => packed.cols(),
    };
    debug_assert!(k <= len);

    // entry r of reflector i (unit head at r == i)
    let v = |i: usize, r: usize| -> T {
        match layout {
            ReflectorLayout::Columns => packed[(r, i)],
            ReflectorLayout::Rows => packed[(i, r)],
        }
    };

    let mut t = Matrix::<T>::zeros(k, k);
    let mut g = vec![T::zero(); k];
    for i in 0..k {
        // Gram column: g[p] = v_p · v_i for p < i
        for (p, slot) in g[..i].iter_mut().enumerate() {
            let mut acc = v(p, i); // v_p[i] * v_i[i], the unit head of v_i
            for r in i + 1..len {
                acc = acc + v(p, r) * v(i, r);
            }
            *slot = acc;
        }
        // t[..i, i] = -τ_i · t[..i, ..i] · g
        for p in 0..i {
            let mut acc = T::zero();
            for (q, &gq) in g[..i].iter().enumerate().skip(p) {
                acc = acc + t[(p, q)] * gq;
            }
            t[(p, i)] = -taus[i] * acc;
        }
        t[(i, i)] = -taus[i];
    }
    t
}
