//! Integer arithmetic helpers shared across the pipeline.

/// Greatest common divisor (Euclid).
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Least common multiple. `lcm(0, _) == 0`.
pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// Ceiling division.
pub fn div_ceil(a: u64, b: u64) -> u64 {
    debug_assert!(b != 0);
    a.div_ceil(b)
}

/// Floor division for signed operands (rounds toward negative infinity).
pub fn div_floor(a: i64, b: i64) -> i64 {
    debug_assert!(b != 0);
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q }
}

/// Mathematical modulo: result is always in `[0, b)`.
pub fn mod_neg(a: i64, b: u64) -> u64 {
    debug_assert!(b != 0);
    let b = b as i64;
    (((a % b) + b) % b) as u64
}
