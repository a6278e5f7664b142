//! Conversions between raw on-chain integer amounts and float token amounts.

use std::str::FromStr;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, ToPrimitive};

/// Scales a raw integer amount string by `10^decimals`.
///
/// Chain explorers report balances as integer strings in the smallest
/// denomination (planck, satoshi, microalgo). The division happens in
/// exact decimal arithmetic before the final float conversion, so amounts
/// larger than an `f64` mantissa do not lose their integer part early.
pub fn scaled_to_f64(raw: &str, decimals: i64) -> Option<f64> {
    let digits = BigInt::from_str(raw).ok()?;
    BigDecimal::new(digits, decimals).to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_planck_to_dot() {
        assert_eq!(scaled_to_f64("123450000000", 10), Some(12.345));
    }

    #[test]
    fn zero_and_small_amounts() {
        assert_eq!(scaled_to_f64("0", 12), Some(0.0));
        assert_eq!(scaled_to_f64("1", 6), Some(0.000001));
    }

    #[test]
    fn rejects_non_integer_input() {
        assert_eq!(scaled_to_f64("12.5", 2), None);
        assert_eq!(scaled_to_f64("abc", 2), None);
    }

    #[test]
    fn survives_amounts_beyond_u64() {
        // 2^64 is about 1.8e19; a 24-decimals chain exceeds it routinely.
        let amount = scaled_to_f64("123456789000000000000000000", 24).unwrap();
        assert!((amount - 123.456789).abs() < 1e-9);
    }
}
