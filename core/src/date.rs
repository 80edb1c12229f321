use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone};
use chrono_tz::Europe::Moscow;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::DateParseError;

lazy_static! {
    static ref DATE_RE: Regex =
        Regex::new(r"(\d+) ([а-яё]+) (\d+), (\d+):(\d+)").expect("valid regex");
}

/// Genitive month names keyed by their first three letters, zero-based.
const MONTHS: [(&str, u32); 12] = [
    ("янв", 0),
    ("фев", 1),
    ("мар", 2),
    ("апр", 3),
    ("мая", 4),
    ("июн", 5),
    ("июл", 6),
    ("авг", 7),
    ("сен", 8),
    ("окт", 9),
    ("ноя", 10),
    ("дек", 11),
];

pub fn month_index(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect();
    if prefix.chars().count() < 3 {
        return None;
    }
    MONTHS.iter().find(|(abbr, _)| *abbr == prefix).map(|(_, idx)| *idx)
}

/// Parse `"15 января 2022, 10:30"` as Moscow wall-clock time into epoch seconds.
///
/// Wall times skipped by a DST jump are moved forward by an hour; repeated
/// wall times resolve to the later (standard time) instant.
pub fn parse_russian_date(raw: &str) -> Result<i64, DateParseError> {
    let caps = DATE_RE
        .captures(raw)
        .ok_or_else(|| DateParseError::NoMatch(raw.to_string()))?;
    let num = |i: usize| -> Result<u32, DateParseError> {
        caps[i]
            .parse::<u32>()
            .map_err(|_| DateParseError::InvalidDate(raw.to_string()))
    };
    let day = num(1)?;
    let month = month_index(&caps[2]).ok_or_else(|| DateParseError::UnknownMonth(caps[2].to_string()))?;
    let year = i32::try_from(num(3)?).map_err(|_| DateParseError::InvalidDate(raw.to_string()))?;
    let (hour, minute) = (num(4)?, num(5)?);

    let naive = NaiveDate::from_ymd_opt(year, month + 1, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| DateParseError::InvalidDate(raw.to_string()))?;

    let resolved = match Moscow.from_local_datetime(&naive) {
        LocalResult::None => Moscow.from_local_datetime(&(naive + Duration::hours(1))).latest(),
        other => other.latest(),
    };
    resolved
        .map(|dt| dt.timestamp())
        .ok_or_else(|| DateParseError::InvalidDate(raw.to_string()))
}

/// Machine-readable `datetime` attribute, e.g. `2022-01-15T07:30:00Z`.
pub fn parse_instant(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw.trim()).ok().map(|dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moscow_winter_time() {
        assert_eq!(parse_russian_date("15 января 2022, 10:30"), Ok(1_642_231_800));
    }

    #[test]
    fn historical_offsets_come_from_tz_database() {
        // summer time, UTC+4
        assert_eq!(parse_russian_date("1 июля 2010, 12:00"), Ok(1_277_971_200));
        // permanent UTC+4 between 2011 and 2014
        assert_eq!(parse_russian_date("8 марта 2012, 18:15"), Ok(1_331_216_100));
    }

    #[test]
    fn skipped_wall_time_moves_forward() {
        // 02:00 jumped to 03:00 that night; 02:30 reads as 03:30 UTC+4
        assert_eq!(parse_russian_date("28 марта 2010, 02:30"), Ok(1_269_732_600));
    }

    #[test]
    fn surrounding_markup_is_ignored() {
        let raw = "\n  15 января 2022, 10:30 \n";
        assert_eq!(parse_russian_date(raw), Ok(1_642_231_800));
    }

    #[test]
    fn may_uses_genitive_form() {
        assert_eq!(month_index("мая"), Some(4));
        assert_eq!(month_index("май"), None);
        assert_eq!(month_index("декабря"), Some(11));
    }

    #[test]
    fn unknown_month_is_an_error() {
        assert_eq!(
            parse_russian_date("3 брюмера 2020, 09:00"),
            Err(DateParseError::UnknownMonth("брюмера".into()))
        );
    }

    #[test]
    fn garbage_does_not_match() {
        assert!(matches!(parse_russian_date("вчера"), Err(DateParseError::NoMatch(_))));
        assert!(matches!(
            parse_russian_date("31 февраля 2020, 10:00"),
            Err(DateParseError::InvalidDate(_))
        ));
    }

    #[test]
    fn iso_instant() {
        assert_eq!(parse_instant("2022-01-15T07:30:00Z"), Some(1_642_231_800));
        assert_eq!(parse_instant("2022-01-15T10:30:00+03:00"), Some(1_642_231_800));
        assert_eq!(parse_instant(""), None);
    }
}
