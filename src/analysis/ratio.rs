/// Signed favorability of a rental-side value `r` against a listing-side
/// value `a` of the same kind (both counts, or both median prices).
///
/// Positive when rentals outnumber (or out-price) listings, negative when
/// listings do, zero when equal. The magnitude is the larger value divided by
/// the smaller one, except that a zero divisor is replaced by 1.
pub fn favorability_ratio(a: f64, r: f64) -> f64 {
    if a == r {
        0.0
    } else if r < a {
        let divisor = if r == 0.0 { r + 1.0 } else { r };
        a * (-1.0 / divisor)
    } else {
        let divisor = if a == 0.0 { a + 1.0 } else { a };
        r * (1.0 / divisor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_values_are_neutral() {
        for value in [0.0, 1.0, 3.5, 120.0, 1e6] {
            assert_eq!(favorability_ratio(value, value), 0.0);
        }
    }

    #[test]
    fn test_sign_follows_imbalance() {
        let values = [0.5, 1.0, 2.0, 7.0, 49.5, 800.0];
        for &a in &values {
            for &r in &values {
                let ratio = favorability_ratio(a, r);
                if r < a {
                    assert!(ratio < 0.0, "ratio({a}, {r}) = {ratio}");
                } else if r > a {
                    assert!(ratio > 0.0, "ratio({a}, {r}) = {ratio}");
                }
            }
        }
    }

    #[test]
    fn test_zero_divisor_becomes_one() {
        assert_eq!(favorability_ratio(5.0, 0.0), -5.0);
        assert_eq!(favorability_ratio(0.0, 5.0), 5.0);
    }

    #[test]
    fn test_magnitude_is_multiplicative_gap() {
        assert_eq!(favorability_ratio(3.0, 6.0), 2.0);
        assert_eq!(favorability_ratio(150.0, 120.0), -1.25);
        assert_eq!(favorability_ratio(2.0, 1.0), -2.0);
    }
}
