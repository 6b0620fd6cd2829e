/// Map a success percentage onto an attainment level.
///
/// Boundaries are asymmetric: 70 is level 3, exactly 50 is level 1 and
/// exactly 0 is level 0. Input is clamped to `[0, 100]`; NaN counts as 0.
pub fn classify(percentage: f64) -> u8 {
    let p = clamp(percentage, 0.0, 100.0);

    if p >= 70.0 {
        3
    } else if p > 50.0 {
        2
    } else if p > 0.0 {
        1
    } else {
        0
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn round1(value: f64) -> f64 {
    round_to(value, 1)
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// `f64::clamp` that maps NaN to the lower bound instead of passing it through.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_asymmetric_boundaries() {
        assert_eq!(classify(0.0), 0);
        assert_eq!(classify(0.5), 1);
        assert_eq!(classify(50.0), 1);
        assert_eq!(classify(50.0001), 2);
        assert_eq!(classify(69.99), 2);
        assert_eq!(classify(70.0), 3);
        assert_eq!(classify(100.0), 3);
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        assert_eq!(classify(-12.0), 0);
        assert_eq!(classify(250.0), 3);
        assert_eq!(classify(f64::NAN), 0);
    }

    #[test]
    fn classification_is_monotonic() {
        let mut previous = 0;
        for step in 0..=2000 {
            let level = classify(step as f64 * 0.05);
            assert!(level >= previous, "level dropped at {}", step as f64 * 0.05);
            previous = level;
        }
    }

    #[test]
    fn rounding_matches_decimal_literals() {
        assert_eq!(round2(0.3 * 2.5 + 0.7 * 2.0), 2.15);
        assert_eq!(round2(0.8 * 2.7 + 0.2 * 2.3), 2.62);
        assert_eq!(round1(23.0 / 10.0), 2.3);
        assert_eq!(round1(8.0 / 3.0), 2.7);
    }
}
