use crate::error::TradingError;

/// Convert an interval string like "1m", "2h" or "3d" into seconds.
///
/// Grammar: `<integer><unit>` with unit in {s, m, h, d, w, M, y}.
/// M is taken as 30 days and y as 365 days; these are accepted
/// approximations, not calendar-exact values.
pub fn interval_to_seconds(interval: &str) -> crate::Result<i64> {
    let Some(unit) = interval.chars().last() else {
        return Err(TradingError::InvalidInterval(interval.to_string()));
    };
    let number: i64 = interval[..interval.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| TradingError::InvalidInterval(interval.to_string()))?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 60 * 60 * 24,
        'w' => 60 * 60 * 24 * 7,
        'M' => 60 * 60 * 24 * 30,
        'y' => 60 * 60 * 24 * 365,
        _ => return Err(TradingError::InvalidInterval(interval.to_string())),
    };
    Ok(number * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_minutes_hours() {
        assert_eq!(interval_to_seconds("5s").unwrap(), 5);
        assert_eq!(interval_to_seconds("1m").unwrap(), 60);
        assert_eq!(interval_to_seconds("2h").unwrap(), 7200);
    }

    #[test]
    fn test_days_weeks_months_years() {
        assert_eq!(interval_to_seconds("3d").unwrap(), 259_200);
        assert_eq!(interval_to_seconds("1w").unwrap(), 604_800);
        assert_eq!(interval_to_seconds("1M").unwrap(), 2_592_000);
        assert_eq!(interval_to_seconds("1y").unwrap(), 31_536_000);
    }

    #[test]
    fn test_invalid_unit() {
        let err = interval_to_seconds("3x").unwrap_err();
        assert!(matches!(err, TradingError::InvalidInterval(i) if i == "3x"));
    }

    #[test]
    fn test_invalid_count() {
        assert!(interval_to_seconds("m").is_err());
        assert!(interval_to_seconds("").is_err());
        assert!(interval_to_seconds("1.5h").is_err());
    }
}
