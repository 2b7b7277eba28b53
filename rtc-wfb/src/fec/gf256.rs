//! GF(256) arithmetic over the Rijndael/QR-code field: primitive polynomial
//! 0x11D, generator 2. Backs the Cauchy Reed-Solomon FEC matrix math.

use std::sync::OnceLock;

const PRIMITIVE_POLY: u16 = 0x11D;
const GENERATOR: u8 = 2;

struct Tables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut exp = [0u8; 512];
        let mut log = [0u8; 256];
        let mut x: u16 = 1;
        for i in 0..255usize {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= PRIMITIVE_POLY;
            }
            let _ = GENERATOR;
        }
        // Duplicate the table so `exp[a + b]` never needs a modulo for the
        // sums this module actually produces (each input < 255).
        for i in 255..510 {
            exp[i] = exp[i - 255];
        }
        Tables { exp, log }
    })
}

/// Multiplies two field elements.
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = tables();
    let sum = t.log[a as usize] as usize + t.log[b as usize] as usize;
    t.exp[sum]
}

/// Multiplicative inverse. Panics on zero, which has none; callers must not
/// invert a zero matrix entry (the Cauchy construction guarantees this).
pub fn inv(a: u8) -> u8 {
    assert_ne!(a, 0, "gf256: attempted to invert zero");
    let t = tables();
    let log_a = t.log[a as usize] as usize;
    t.exp[255 - log_a]
}

pub fn div(a: u8, b: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    mul(a, inv(b))
}

/// Inverts a square matrix over GF(256) via Gauss-Jordan elimination with
/// partial pivoting. Returns `None` if the matrix is singular (should not
/// happen for a genuine Cauchy submatrix).
pub fn invert_matrix(matrix: &[Vec<u8>]) -> Option<Vec<Vec<u8>>> {
    let n = matrix.len();
    if n == 0 || matrix.iter().any(|row| row.len() != n) {
        return None;
    }

    let mut work: Vec<Vec<u8>> = matrix.to_vec();
    let mut inverse: Vec<Vec<u8>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1 } else { 0 }).collect())
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).find(|&r| work[r][col] != 0)?;
        work.swap(col, pivot_row);
        inverse.swap(col, pivot_row);

        let pivot_inv = inv(work[col][col]);
        for j in 0..n {
            work[col][j] = mul(work[col][j], pivot_inv);
            inverse[col][j] = mul(inverse[col][j], pivot_inv);
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[row][col];
            if factor == 0 {
                continue;
            }
            for j in 0..n {
                work[row][j] ^= mul(factor, work[col][j]);
                inverse[row][j] ^= mul(factor, inverse[col][j]);
            }
        }
    }

    Some(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_by_one_is_identity() {
        for a in 1..=255u8 {
            assert_eq!(mul(a, 1), a);
        }
    }

    #[test]
    fn mul_by_zero_is_zero() {
        assert_eq!(mul(123, 0), 0);
        assert_eq!(mul(0, 123), 0);
    }

    #[test]
    fn inverse_round_trips() {
        for a in 1..=255u8 {
            assert_eq!(mul(a, inv(a)), 1);
        }
    }

    #[test]
    fn invert_matrix_round_trips_identity() {
        let identity = vec![vec![1, 0], vec![0, 1]];
        let inverted = invert_matrix(&identity).unwrap();
        assert_eq!(inverted, identity);
    }

    #[test]
    fn invert_matrix_recovers_known_vector() {
        // A small Cauchy-style 2x2 matrix, nonsingular by construction.
        let matrix = vec![vec![inv(1), inv(2)], vec![inv(3), inv(4)]];
        let inverse = invert_matrix(&matrix).unwrap();

        // matrix * inverse == identity
        let mut product = vec![vec![0u8; 2]; 2];
        for i in 0..2 {
            for j in 0..2 {
                let mut acc = 0u8;
                for k in 0..2 {
                    acc ^= mul(matrix[i][k], inverse[k][j]);
                }
                product[i][j] = acc;
            }
        }
        assert_eq!(product, vec![vec![1, 0], vec![0, 1]]);
    }

    #[test]
    fn singular_matrix_returns_none() {
        let matrix = vec![vec![1, 1], vec![1, 1]];
        assert!(invert_matrix(&matrix).is_none());
    }
}
