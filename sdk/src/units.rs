//! Native value units

/// One base unit expressed in von (1e18).
pub const BASE_VON: u128 = 1_000_000_000_000_000_000;

/// Render a von amount in base units without losing precision,
/// e.g. `1_500_000_000_000_000_000` becomes `"1.5"`.
pub fn format_base_units(von: u128) -> String {
    let whole = von / BASE_VON;
    let frac = von % BASE_VON;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:018}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Convert a floating von amount from configuration into an integer amount.
/// Negative and non-finite values clamp to zero.
pub fn von_from_f64(value: f64) -> u128 {
    if !value.is_finite() || value <= 0.0 {
        0
    } else {
        value as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_base_units() {
        assert_eq!(format_base_units(0), "0");
        assert_eq!(format_base_units(BASE_VON), "1");
        assert_eq!(format_base_units(BASE_VON * 3 / 2), "1.5");
        assert_eq!(format_base_units(1), "0.000000000000000001");
    }

    #[test]
    fn test_von_from_f64() {
        assert_eq!(von_from_f64(-1.0), 0);
        assert_eq!(von_from_f64(f64::NAN), 0);
        assert_eq!(von_from_f64(1e18), BASE_VON);
    }
}
