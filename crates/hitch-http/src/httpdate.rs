//! HTTP date formatting and lenient parsing.

use chrono::{DateTime, NaiveDateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Formats `time` as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn fmt_http_date(time: DateTime<Utc>) -> String { time.format(IMF_FIXDATE).to_string() }

/// Parses IMF-fixdate, RFC 850, asctime and the dashed cookie form.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }

    const FORMATS: [&str; 5] = [
        "%A, %d-%b-%y %H:%M:%S GMT",
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%a, %d-%b-%y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
        "%a, %d %b %Y %H:%M:%S UTC",
    ];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
