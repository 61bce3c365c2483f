// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Finite-field arithmetic GF(p^k) for MUB construction.
//!
//! Elements are encoded as integers in `0..p^k` whose base-p digits are the
//! coefficients of a polynomial over GF(p) (lowest degree first). Addition is
//! digit-wise modulo p; multiplication is polynomial multiplication reduced
//! by a monic irreducible polynomial of degree k.
//!
//! Two backends implement [`FiniteField`]:
//! - [`ExtendedField`] searches for an irreducible polynomial and supports
//!   any prime power (feature `extended-fields`).
//! - [`MinimalField`] carries a fixed table of reduction polynomials.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};

/// Arithmetic over a finite field of prime-power order.
pub trait FiniteField: Send + Sync {
    /// Characteristic p.
    fn characteristic(&self) -> u32;

    /// Extension degree k.
    fn degree(&self) -> u32;

    /// Field addition.
    fn add(&self, a: usize, b: usize) -> usize;

    /// Field multiplication.
    fn mul(&self, a: usize, b: usize) -> usize;

    /// Field order q = p^k.
    fn order(&self) -> usize {
        (self.characteristic() as usize).pow(self.degree())
    }

    /// Absolute trace Tr(a) = a + a^p + ... + a^(p^(k-1)), an element of GF(p).
    fn trace(&self, a: usize) -> u32 {
        let p = self.characteristic() as usize;
        let mut acc = 0;
        let mut frob = a;
        for _ in 0..self.degree() {
            acc = self.add(acc, frob);
            frob = self.pow(frob, p);
        }
        // The trace lies in the prime subfield, i.e. it is a constant polynomial.
        (acc % p) as u32
    }

    /// a^e by square-and-multiply.
    fn pow(&self, a: usize, mut e: usize) -> usize {
        let mut base = a;
        let mut result = 1;
        while e > 0 {
            if e & 1 == 1 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            e >>= 1;
        }
        result
    }

    /// Coordinates of `a` in the polynomial basis {1, x, ..., x^(k-1)}.
    fn digits(&self, a: usize) -> Vec<u32> {
        let p = self.characteristic() as usize;
        let mut rest = a;
        (0..self.degree())
            .map(|_| {
                let d = (rest % p) as u32;
                rest /= p;
                d
            })
            .collect()
    }

    /// Polynomial basis element x^j.
    fn basis_element(&self, j: u32) -> usize {
        (self.characteristic() as usize).pow(j)
    }
}

/// Field backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldBackendKind {
    /// Extended backend when compiled in, else minimal.
    #[default]
    Auto,
    /// General GF(p^k) via irreducible-polynomial search.
    Extended,
    /// Fixed table of small fields.
    Minimal,
}

/// Build the field GF(p^k) with the requested backend.
pub fn build_field(p: u32, k: u32, backend: FieldBackendKind) -> Result<Box<dyn FiniteField>> {
    match backend {
        FieldBackendKind::Minimal => Ok(Box::new(MinimalField::new(p, k)?)),
        FieldBackendKind::Extended => extended(p, k),
        FieldBackendKind::Auto => {
            if cfg!(feature = "extended-fields") {
                extended(p, k)
            } else {
                Ok(Box::new(MinimalField::new(p, k)?))
            }
        }
    }
}

#[cfg(feature = "extended-fields")]
fn extended(p: u32, k: u32) -> Result<Box<dyn FiniteField>> {
    Ok(Box::new(ExtendedField::new(p, k)?))
}

#[cfg(not(feature = "extended-fields"))]
fn extended(_p: u32, _k: u32) -> Result<Box<dyn FiniteField>> {
    Err(ConfigurationError::MethodUnavailable(
        "extended field backend not compiled in (feature `extended-fields`)".into(),
    )
    .into())
}

/// Factor n as p^k for prime p, if possible.
pub fn prime_power(n: usize) -> Option<(u32, u32)> {
    if n < 2 {
        return None;
    }
    let mut p = 2;
    while p * p <= n {
        if n % p == 0 {
            break;
        }
        p += 1;
    }
    if p * p > n {
        // n itself is prime
        return Some((n as u32, 1));
    }
    let mut rest = n;
    let mut k = 0;
    while rest % p == 0 {
        rest /= p;
        k += 1;
    }
    (rest == 1).then_some((p as u32, k))
}

/// Reduce a polynomial product (coefficient vector, low degree first) modulo
/// a monic `modulus` of degree k over GF(p).
fn reduce(mut coeffs: Vec<u32>, modulus: &[u32], p: u32) -> Vec<u32> {
    let k = modulus.len() - 1;
    for deg in (k..coeffs.len()).rev() {
        let lead = coeffs[deg] % p;
        if lead == 0 {
            continue;
        }
        for (i, &m) in modulus.iter().enumerate() {
            let idx = deg - k + i;
            coeffs[idx] = (coeffs[idx] + p * p - (lead * m) % p) % p;
        }
    }
    coeffs.truncate(k);
    coeffs
}

fn encode(coeffs: &[u32], p: u32) -> usize {
    coeffs
        .iter()
        .rev()
        .fold(0usize, |acc, &c| acc * p as usize + (c % p) as usize)
}

fn decode(mut a: usize, p: u32, k: u32) -> Vec<u32> {
    (0..k)
        .map(|_| {
            let d = (a % p as usize) as u32;
            a /= p as usize;
            d
        })
        .collect()
}

fn poly_mul_mod(a: usize, b: usize, modulus: &[u32], p: u32, k: u32) -> usize {
    let da = decode(a, p, k);
    let db = decode(b, p, k);
    let mut prod = vec![0u32; (2 * k as usize).saturating_sub(1).max(1)];
    for (i, &x) in da.iter().enumerate() {
        if x == 0 {
            continue;
        }
        for (j, &y) in db.iter().enumerate() {
            prod[i + j] = (prod[i + j] + x * y) % p;
        }
    }
    encode(&reduce(prod, modulus, p), p)
}

fn poly_add(a: usize, b: usize, p: u32, k: u32) -> usize {
    let da = decode(a, p, k);
    let db = decode(b, p, k);
    let sum: Vec<u32> = da.iter().zip(&db).map(|(x, y)| (x + y) % p).collect();
    encode(&sum, p)
}

/// Hand-rolled GF(p^k) for a short list of orders.
///
/// Supported: any prime (k = 1), GF(4) mod x²+x+1, GF(16) mod x⁴+x+1,
/// GF(9) mod x²+1.
#[derive(Debug, Clone)]
pub struct MinimalField {
    p: u32,
    k: u32,
    modulus: Vec<u32>,
}

impl MinimalField {
    /// Create the field, failing for orders outside the table.
    pub fn new(p: u32, k: u32) -> Result<Self> {
        let modulus = match (p, k) {
            (_, 1) if prime_power(p as usize) == Some((p, 1)) => vec![0, 1],
            (2, 2) => vec![1, 1, 1],
            (2, 4) => vec![1, 1, 0, 0, 1],
            (3, 2) => vec![1, 0, 1],
            _ => return Err(ConfigurationError::UnsupportedField { p, k }.into()),
        };
        Ok(Self { p, k, modulus })
    }
}

impl FiniteField for MinimalField {
    fn characteristic(&self) -> u32 {
        self.p
    }

    fn degree(&self) -> u32 {
        self.k
    }

    fn add(&self, a: usize, b: usize) -> usize {
        if self.k == 1 {
            return (a + b) % self.p as usize;
        }
        poly_add(a, b, self.p, self.k)
    }

    fn mul(&self, a: usize, b: usize) -> usize {
        if self.k == 1 {
            return (a * b) % self.p as usize;
        }
        poly_mul_mod(a, b, &self.modulus, self.p, self.k)
    }
}

/// Table-driven GF(p^k) for any prime power.
///
/// The reduction polynomial is the first monic irreducible of degree k in
/// increasing integer encoding; addition and multiplication tables are
/// precomputed.
#[cfg(feature = "extended-fields")]
#[derive(Debug, Clone)]
pub struct ExtendedField {
    p: u32,
    k: u32,
    modulus: Vec<u32>,
    add_table: Vec<usize>,
    mul_table: Vec<usize>,
}

#[cfg(feature = "extended-fields")]
impl ExtendedField {
    /// Largest field order for which tables are built.
    pub const MAX_ORDER: usize = 1024;

    /// Create the field, searching for a reduction polynomial.
    pub fn new(p: u32, k: u32) -> Result<Self> {
        if k == 0 || prime_power(p as usize) != Some((p, 1)) {
            return Err(ConfigurationError::UnsupportedField { p, k }.into());
        }
        let q = (p as usize).pow(k);
        if q > Self::MAX_ORDER {
            return Err(ConfigurationError::UnsupportedField { p, k }.into());
        }

        let modulus = find_irreducible(p, k)
            .ok_or(ConfigurationError::UnsupportedField { p, k })?;
        tracing::debug!(p, k, modulus = ?modulus, "Selected reduction polynomial");

        let mut add_table = vec![0; q * q];
        let mut mul_table = vec![0; q * q];
        for a in 0..q {
            for b in 0..q {
                add_table[a * q + b] = poly_add(a, b, p, k);
                mul_table[a * q + b] = if k == 1 {
                    (a * b) % p as usize
                } else {
                    poly_mul_mod(a, b, &modulus, p, k)
                };
            }
        }

        Ok(Self {
            p,
            k,
            modulus,
            add_table,
            mul_table,
        })
    }

    /// Reduction polynomial coefficients, lowest degree first.
    pub fn modulus(&self) -> &[u32] {
        &self.modulus
    }
}

#[cfg(feature = "extended-fields")]
impl FiniteField for ExtendedField {
    fn characteristic(&self) -> u32 {
        self.p
    }

    fn degree(&self) -> u32 {
        self.k
    }

    fn add(&self, a: usize, b: usize) -> usize {
        self.add_table[a * self.order() + b]
    }

    fn mul(&self, a: usize, b: usize) -> usize {
        self.mul_table[a * self.order() + b]
    }
}

/// First monic irreducible polynomial of degree k over GF(p).
#[cfg(feature = "extended-fields")]
fn find_irreducible(p: u32, k: u32) -> Option<Vec<u32>> {
    if k == 1 {
        return Some(vec![0, 1]);
    }
    let lower = (p as usize).pow(k);
    (0..lower)
        .map(|low| {
            let mut coeffs = decode(low, p, k);
            coeffs.push(1);
            coeffs
        })
        .find(|poly| is_irreducible(poly, p))
}

/// Trial division by every monic polynomial of degree 1..=deg/2.
#[cfg(feature = "extended-fields")]
fn is_irreducible(poly: &[u32], p: u32) -> bool {
    let n = poly.len() - 1;
    for deg in 1..=n / 2 {
        let count = (p as usize).pow(deg as u32);
        for low in 0..count {
            let mut divisor = decode(low, p, deg as u32);
            divisor.push(1);
            if reduce(poly.to_vec(), &divisor, p).iter().all(|&c| c == 0) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_power_detection() {
        assert_eq!(prime_power(2), Some((2, 1)));
        assert_eq!(prime_power(7), Some((7, 1)));
        assert_eq!(prime_power(8), Some((2, 3)));
        assert_eq!(prime_power(9), Some((3, 2)));
        assert_eq!(prime_power(25), Some((5, 2)));
        assert_eq!(prime_power(6), None);
        assert_eq!(prime_power(12), None);
        assert_eq!(prime_power(1), None);
    }

    #[test]
    fn test_minimal_field_rejects_unlisted_orders() {
        assert!(MinimalField::new(2, 3).is_err());
        assert!(MinimalField::new(5, 2).is_err());
        assert!(MinimalField::new(4, 1).is_err());
        assert!(MinimalField::new(5, 1).is_ok());
    }

    #[test]
    fn test_gf4_multiplication() {
        // x² = x + 1 in GF(4) mod x²+x+1; encoding: x = 2, x+1 = 3
        let f = MinimalField::new(2, 2).unwrap();
        assert_eq!(f.mul(2, 2), 3);
        assert_eq!(f.mul(2, 3), 1);
        assert_eq!(f.add(2, 3), 1);
    }

    #[test]
    fn test_gf9_has_no_zero_divisors() {
        let f = MinimalField::new(3, 2).unwrap();
        for a in 1..9 {
            for b in 1..9 {
                assert_ne!(f.mul(a, b), 0, "{} * {} = 0", a, b);
            }
        }
    }

    #[test]
    fn test_every_nonzero_element_has_inverse() {
        for (p, k) in [(2, 2), (2, 4), (3, 2), (7, 1)] {
            let f = MinimalField::new(p, k).unwrap();
            let q = f.order();
            for a in 1..q {
                assert!((1..q).any(|b| f.mul(a, b) == 1), "no inverse for {}", a);
            }
        }
    }

    #[test]
    fn test_trace_is_additive_and_onto() {
        let f = MinimalField::new(2, 4).unwrap();
        let q = f.order();
        for a in 0..q {
            for b in 0..q {
                let lhs = f.trace(f.add(a, b));
                let rhs = (f.trace(a) + f.trace(b)) % 2;
                assert_eq!(lhs, rhs);
            }
        }
        let ones = (0..q).filter(|&a| f.trace(a) == 1).count();
        assert_eq!(ones, q / 2);
    }

    #[test]
    fn test_digits_roundtrip_basis() {
        let f = MinimalField::new(3, 2).unwrap();
        assert_eq!(f.digits(f.basis_element(1)), vec![0, 1]);
        assert_eq!(f.digits(7), vec![1, 2]);
    }

    #[cfg(feature = "extended-fields")]
    #[test]
    fn test_extended_matches_minimal_tables() {
        for (p, k) in [(2, 2), (2, 4), (3, 2), (5, 1)] {
            let ext = ExtendedField::new(p, k).unwrap();
            let min = MinimalField::new(p, k).unwrap();
            for a in 0..ext.order() {
                for b in 0..ext.order() {
                    assert_eq!(ext.mul(a, b), min.mul(a, b));
                    assert_eq!(ext.add(a, b), min.add(a, b));
                }
            }
        }
    }

    #[cfg(feature = "extended-fields")]
    #[test]
    fn test_extended_gf8_and_gf27() {
        for (p, k) in [(2, 3), (3, 3), (5, 2)] {
            let f = ExtendedField::new(p, k).unwrap();
            let q = f.order();
            for a in 1..q {
                assert!((1..q).any(|b| f.mul(a, b) == 1));
            }
        }
    }

    #[test]
    fn test_build_field_minimal_backend() {
        let f = build_field(2, 2, FieldBackendKind::Minimal).unwrap();
        assert_eq!(f.order(), 4);
        assert!(build_field(2, 3, FieldBackendKind::Minimal).is_err());
    }
}
