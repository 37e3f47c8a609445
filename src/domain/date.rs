//! Granularity reduction for dates.

use crate::config::DateGranularity;
use once_cell::sync::Lazy;
use regex::Regex;

static WAREKI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(令和|平成|昭和|R|H|S)\s*(\d{1,2}|元)\s*年").expect("Valid wareki regex")
});

static YMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})[/.\-年]\s*(\d{1,2})[/.\-月]\s*(\d{1,2})\s*(?:日)?")
        .expect("Valid ymd regex")
});

pub const FULL_MASK: &str = "[DATE]";

/// Reduces a date to the configured precision.
///
/// Japanese era dates keep era and year regardless of precision. Gregorian
/// dates become `YYYY年` or `YYYY年M月`. Anything unparsable is fully masked.
pub fn date_granular(original: &str, granularity: DateGranularity) -> String {
    if granularity == DateGranularity::FullMask {
        return FULL_MASK.to_string();
    }
    let s = original.trim();

    if let Some(caps) = WAREKI.captures(s) {
        return format!("{}{}年", &caps[1], &caps[2]);
    }

    if let Some(caps) = YMD.captures(s) {
        let year = &caps[1];
        return match granularity {
            DateGranularity::Year => format!("{}年", year),
            _ => {
                let month: u32 = caps[2].parse().unwrap_or(0);
                format!("{}年{}月", year, month)
            }
        };
    }

    FULL_MASK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_only() {
        assert_eq!(date_granular("2024年4月1日", DateGranularity::Year), "2024年");
        assert_eq!(date_granular("2024/04/01", DateGranularity::Year), "2024年");
    }

    #[test]
    fn test_year_month_drops_leading_zero() {
        assert_eq!(date_granular("2024-04-01", DateGranularity::YearMonth), "2024年4月");
    }

    #[test]
    fn test_wareki_keeps_era_year() {
        assert_eq!(date_granular("令和5年4月1日", DateGranularity::YearMonth), "令和5年");
        assert_eq!(date_granular("平成 元 年", DateGranularity::Year), "平成元年");
    }

    #[test]
    fn test_unparsable_and_full_mask() {
        assert_eq!(date_granular("来月末", DateGranularity::Year), FULL_MASK);
        assert_eq!(date_granular("2024年4月1日", DateGranularity::FullMask), FULL_MASK);
    }
}
