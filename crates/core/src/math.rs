//! Fixed-point helpers shared by the backend model, router, and share accounting.

use alloy_primitives::U256;

pub use multivault_allocation::ONE_HUNDRED_PERCENT_BPS;

/// Rounding direction for share/asset conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingDirection {
    Up,
    Down,
}

/// `x * y / d` rounded in the given direction.
///
/// `d` must be non-zero; every caller divides by a quantity that carries a
/// virtual offset or a constant scale.
pub fn mul_div(x: U256, y: U256, d: U256, rounding: RoundingDirection) -> U256 {
    match rounding {
        RoundingDirection::Down => mul_div_down(x, y, d),
        RoundingDirection::Up => mul_div_up(x, y, d),
    }
}

/// `x * y / d` rounded down.
pub fn mul_div_down(x: U256, y: U256, d: U256) -> U256 {
    x * y / d
}

/// `x * y / d` rounded up.
pub fn mul_div_up(x: U256, y: U256, d: U256) -> U256 {
    let product = x * y;
    let quotient = product / d;
    if (product % d).is_zero() {
        quotient
    } else {
        quotient + U256::from(1u64)
    }
}

/// `amount * bps / 1_000_000` rounded in the given direction.
pub fn apply_bps(amount: U256, bps: u32, rounding: RoundingDirection) -> U256 {
    mul_div(
        amount,
        U256::from(bps),
        U256::from(ONE_HUNDRED_PERCENT_BPS),
        rounding,
    )
}

/// `amount` reduced by `bps` (floored), used for minimum-output bounds.
pub fn less_bps(amount: U256, bps: u32) -> U256 {
    let keep = ONE_HUNDRED_PERCENT_BPS.saturating_sub(bps);
    apply_bps(amount, keep, RoundingDirection::Down)
}

/// `x - y`, or zero when `y > x`.
pub fn zero_floor_sub(x: U256, y: U256) -> U256 {
    x.saturating_sub(y)
}

/// Absolute difference of two amounts.
pub fn abs_diff(x: U256, y: U256) -> U256 {
    if x >= y {
        x - y
    } else {
        y - x
    }
}

/// Smaller of two amounts.
pub fn min(x: U256, y: U256) -> U256 {
    if x < y {
        x
    } else {
        y
    }
}

/// `10^exp` as a U256.
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding() {
        let x = U256::from(10u64);
        let y = U256::from(3u64);
        let d = U256::from(4u64);
        assert_eq!(mul_div(x, y, d, RoundingDirection::Down), U256::from(7u64));
        assert_eq!(mul_div(x, y, d, RoundingDirection::Up), U256::from(8u64));
    }

    #[test]
    fn test_mul_div_up_exact() {
        let result = mul_div_up(U256::from(12u64), U256::from(2u64), U256::from(6u64));
        assert_eq!(result, U256::from(4u64));
    }

    #[test]
    fn test_apply_bps() {
        let amount = U256::from(1_000_000u64);
        assert_eq!(
            apply_bps(amount, 1_000, RoundingDirection::Down),
            U256::from(1_000u64)
        );
        assert_eq!(
            apply_bps(U256::from(1u64), 1_000, RoundingDirection::Up),
            U256::from(1u64)
        );
        assert_eq!(
            apply_bps(U256::from(1u64), 1_000, RoundingDirection::Down),
            U256::ZERO
        );
    }

    #[test]
    fn test_less_bps() {
        assert_eq!(less_bps(U256::from(1_000u64), 10_000), U256::from(990u64));
        assert_eq!(less_bps(U256::from(1_000u64), 0), U256::from(1_000u64));
    }

    #[test]
    fn test_abs_diff_and_min() {
        let a = U256::from(5u64);
        let b = U256::from(9u64);
        assert_eq!(abs_diff(a, b), U256::from(4u64));
        assert_eq!(abs_diff(b, a), U256::from(4u64));
        assert_eq!(min(a, b), a);
        assert_eq!(zero_floor_sub(a, b), U256::ZERO);
    }

    #[test]
    fn test_pow10() {
        assert_eq!(pow10(0), U256::from(1u64));
        assert_eq!(pow10(6), U256::from(1_000_000u64));
    }
}
