//! Overflow-checked arithmetic primitives.
//!
//! All exact-integer paths in the crate go through these helpers. An operation
//! whose result would leave the safe range returns [`None`], and the caller is
//! expected to abandon the derivation it was building rather than continue
//! with a wrapped value.

/// The largest magnitude any intermediate exact-integer value may reach.
///
/// The headroom below [`i64::MAX`] guarantees that a single further addition
/// of two in-range values cannot wrap before the check rejects it.
pub(crate) const MAX_SAFE_MAGNITUDE: i64 = i64::MAX / 4;

pub(crate) fn checked_add(lhs: i64, rhs: i64) -> Option<i64> {
    let sum = lhs.checked_add(rhs)?;
    in_safe_range(sum).then_some(sum)
}

pub(crate) fn checked_mul(lhs: i64, rhs: i64) -> Option<i64> {
    let product = lhs.checked_mul(rhs)?;
    in_safe_range(product).then_some(product)
}

/// Computes `multiplier * coefficient + accumulated` with both steps checked.
pub(crate) fn checked_mul_add(multiplier: i64, coefficient: i64, accumulated: i64) -> Option<i64> {
    checked_add(checked_mul(multiplier, coefficient)?, accumulated)
}

pub(crate) fn in_safe_range(value: i64) -> bool {
    value.unsigned_abs() <= MAX_SAFE_MAGNITUDE as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_beyond_the_safe_range_is_rejected() {
        assert_eq!(checked_add(MAX_SAFE_MAGNITUDE, 1), None);
        assert_eq!(checked_add(-MAX_SAFE_MAGNITUDE, -1), None);
        assert_eq!(
            checked_add(MAX_SAFE_MAGNITUDE - 1, 1),
            Some(MAX_SAFE_MAGNITUDE)
        );
    }

    #[test]
    fn multiplication_never_wraps() {
        assert_eq!(checked_mul(i64::MAX / 2, 3), None);
        assert_eq!(checked_mul(1 << 31, 1 << 31), None);
        assert_eq!(checked_mul(-7, 6), Some(-42));
    }

    #[test]
    fn mul_add_checks_both_steps() {
        assert_eq!(checked_mul_add(2, 3, 4), Some(10));
        assert_eq!(checked_mul_add(MAX_SAFE_MAGNITUDE, 2, 0), None);
        assert_eq!(checked_mul_add(1, MAX_SAFE_MAGNITUDE, 1), None);
    }
}
