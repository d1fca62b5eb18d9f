//! Human-readable capacity formatting.

/// Units reachable from megabytes, in scaling order.
const UNITS: [&str; 3] = ["MB", "GB", "TB"];

/// Binary step between consecutive units.
const STEP: f64 = 1024.0;

/// Formats a megabyte count with one decimal, scaling up through GB and TB.
///
/// Scaling stops at TB, so very large values are reported as many terabytes.
///
/// ```
/// use macdisks_core::size::format_megabytes;
///
/// assert_eq!(format_megabytes(512), "512.0 MB");
/// assert_eq!(format_megabytes(2048), "2.0 GB");
/// ```
pub fn format_megabytes(megabytes: u64) -> String {
    let mut value = megabytes as f64;
    let mut unit = UNITS[0];

    for next in &UNITS[1..] {
        if value / STEP < 1.0 {
            break;
        }
        value /= STEP;
        unit = next;
    }

    format!("{:.1} {}", value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stays_in_megabytes_below_one_gigabyte() {
        assert_eq!(format_megabytes(0), "0.0 MB");
        assert_eq!(format_megabytes(1023), "1023.0 MB");
    }

    #[test]
    fn test_scales_at_each_boundary() {
        assert_eq!(format_megabytes(1024), "1.0 GB");
        assert_eq!(format_megabytes(1536), "1.5 GB");
        assert_eq!(format_megabytes(1024 * 1024), "1.0 TB");
    }

    #[test]
    fn test_caps_at_terabytes() {
        assert_eq!(format_megabytes(1024 * 1024 * 2048), "2048.0 TB");
    }

    #[test]
    fn test_preserves_magnitude_within_rounding() {
        for megs in [1_000u64, 2_048, 476_802, 3_815_447] {
            let text = format_megabytes(megs);
            let (number, unit) = text.split_once(' ').unwrap();
            let scale = match unit {
                "MB" => 1.0,
                "GB" => 1024.0,
                "TB" => 1024.0 * 1024.0,
                other => panic!("unexpected unit {other}"),
            };
            let back = number.parse::<f64>().unwrap() * scale;
            assert!((back - megs as f64).abs() <= 0.05 * scale, "{megs} -> {text}");
        }
    }
}
