/// Currency utility functions for handling Naira conversions
///
/// All monetary values in the database are stored in kobo (1 Naira = 100 kobo)
/// to avoid floating-point precision issues.

/// Convert Naira to kobo (multiply by 100)
pub fn naira_to_kobo(naira: f64) -> i64 {
    (naira * 100.0).round() as i64
}

/// Convert kobo to Naira (divide by 100)
pub fn kobo_to_naira(kobo: i64) -> f64 {
    kobo as f64 / 100.0
}

/// Format kobo as Naira string with 2 decimal places
pub fn format_kobo_as_naira(kobo: i64) -> String {
    format!("₦{:.2}", kobo_to_naira(kobo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naira_to_kobo() {
        assert_eq!(naira_to_kobo(5000.0), 500_000);
        assert_eq!(naira_to_kobo(0.5), 50);
        assert_eq!(naira_to_kobo(10.015), 1002);
    }

    #[test]
    fn test_kobo_to_naira() {
        assert_eq!(kobo_to_naira(500_000), 5000.0);
        assert_eq!(kobo_to_naira(50), 0.5);
    }

    #[test]
    fn test_round_trip() {
        assert_eq!(kobo_to_naira(naira_to_kobo(1234.56)), 1234.56);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_kobo_as_naira(500_050), "₦5000.50");
    }
}
