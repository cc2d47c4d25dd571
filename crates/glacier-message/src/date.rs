//! Lax RFC-5322 date parsing.
//!
//! Archive corpora go back to the eighties, so the parser accepts the whole
//! obsolete zoo: missing weekday, two-digit years, missing seconds,
//! alphabetic zones, and trailing comments. Anything it cannot make sense of
//! is a soft failure — the connectivity builder stores epoch 0 and counts it.

use chrono::NaiveDate;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse an RFC-5322 `Date:` value into Unix seconds.
///
/// Returns `None` for unparsable values and for dates outside the unsigned
/// 32-bit epoch range.
#[must_use]
pub fn parse_date_rfc5322_lax(value: &[u8]) -> Option<u32> {
    let text = strip_comments(value);
    let mut tokens = text.split_ascii_whitespace().peekable();

    // Optional "Mon," weekday, possibly without the comma.
    if let Some(first) = tokens.peek() {
        let weekday_shaped = first.ends_with(',')
            || (first.len() <= 9 && first.chars().all(|c| c.is_ascii_alphabetic()));
        if weekday_shaped && first.trim_end_matches(',').parse::<u32>().is_err() {
            tokens.next();
        }
    }

    let day: u32 = tokens.next()?.trim_end_matches(',').parse().ok()?;
    let month = month_number(tokens.next()?)?;
    let year = fix_year(tokens.next()?.parse().ok()?);
    let (hour, minute, second) = parse_time(tokens.next()?)?;
    let offset = tokens.next().map_or(0, zone_offset);

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let epoch = naive.and_utc().timestamp() - i64::from(offset);
    u32::try_from(epoch).ok()
}

/// Render an epoch as the `YYYY-MM` time-chart bucket.
#[must_use]
pub fn time_chart_bucket(epoch: u32) -> String {
    let date = chrono::DateTime::from_timestamp(i64::from(epoch), 0)
        .expect("u32 epochs are always in range");
    date.format("%Y-%m").to_string()
}

fn strip_comments(value: &[u8]) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0u32;
    for &b in value {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(char::from(b)),
            _ => {}
        }
    }
    out
}

fn month_number(token: &str) -> Option<u32> {
    let token = token.get(..3)?;
    MONTHS
        .iter()
        .position(|m| token.eq_ignore_ascii_case(m))
        .map(|p| p as u32 + 1)
}

fn fix_year(year: i32) -> i32 {
    match year {
        0..=49 => year + 2000,
        50..=999 => year + 1900,
        _ => year,
    }
}

fn parse_time(token: &str) -> Option<(u32, u32, u32)> {
    let mut parts = token.split(':');
    let hour = parts.next()?.parse().ok()?;
    let minute = parts.next()?.parse().ok()?;
    let second = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    Some((hour, minute, second))
}

/// Zone offset in seconds east of UTC; unknown zones read as UTC.
fn zone_offset(token: &str) -> i32 {
    if let Some(sign) = token.strip_prefix('+').map(|t| (1, t)).or_else(|| token.strip_prefix('-').map(|t| (-1, t))) {
        let (mul, digits) = sign;
        if digits.len() == 4 {
            if let Ok(hhmm) = digits.parse::<i32>() {
                return mul * ((hhmm / 100) * 3600 + (hhmm % 100) * 60);
            }
        }
        return 0;
    }
    match token.to_ascii_uppercase().as_str() {
        "EDT" => -4 * 3600,
        "EST" | "CDT" => -5 * 3600,
        "CST" | "MDT" => -6 * 3600,
        "MST" | "PDT" => -7 * 3600,
        "PST" => -8 * 3600,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_rfc5322_form() {
        // 2003-07-01 10:52:37 UTC is epoch 1057056757.
        assert_eq!(
            parse_date_rfc5322_lax(b"Tue, 1 Jul 2003 12:52:37 +0200"),
            Some(1057056757)
        );
    }

    #[test]
    fn weekday_is_optional() {
        assert_eq!(
            parse_date_rfc5322_lax(b"1 Jul 2003 12:52:37 +0200"),
            Some(1057056757)
        );
    }

    #[test]
    fn obsolete_two_digit_years_and_zones() {
        // 26 Jun 1992 04:00:00 GMT.
        let epoch = parse_date_rfc5322_lax(b"26 Jun 92 04:00:00 GMT").expect("parse");
        assert_eq!(time_chart_bucket(epoch), "1992-06");

        // EST is UTC-5.
        let est = parse_date_rfc5322_lax(b"26 Jun 92 04:00:00 EST").expect("parse");
        assert_eq!(est - epoch, 5 * 3600);
    }

    #[test]
    fn seconds_are_optional_and_comments_ignored() {
        assert_eq!(
            parse_date_rfc5322_lax(b"Tue, 1 Jul 2003 12:52 +0200 (CEST)"),
            Some(1057056720)
        );
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_date_rfc5322_lax(b""), None);
        assert_eq!(parse_date_rfc5322_lax(b"not a date at all"), None);
        assert_eq!(parse_date_rfc5322_lax(b"99 Foo 2003 99:99:99"), None);
    }

    #[test]
    fn pre_epoch_dates_are_rejected() {
        assert_eq!(parse_date_rfc5322_lax(b"1 Jan 1960 00:00:00 GMT"), None);
    }

    #[test]
    fn round_trips_through_chrono() {
        for &epoch in &[0u32, 1_000_000_000, 1_057_056_757] {
            let date = chrono::DateTime::from_timestamp(i64::from(epoch), 0).expect("in range");
            let formatted = date.format("%d %b %Y %H:%M:%S +0000").to_string();
            assert_eq!(parse_date_rfc5322_lax(formatted.as_bytes()), Some(epoch));
        }
    }
}
