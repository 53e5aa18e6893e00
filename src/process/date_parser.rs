use chrono::{NaiveDate, NaiveDateTime};

/// Try each chrono format in order; the first that parses wins.
///
/// Formats carrying a time of day are parsed as date-times and truncated to
/// the date.
pub fn parse_payment_date<S: AsRef<str>>(s: &str, formats: &[S]) -> Option<NaiveDate> {
    let s = s.trim();
    formats.iter().find_map(|fmt| {
        let fmt = fmt.as_ref();
        if has_time(fmt) {
            NaiveDateTime::parse_from_str(s, fmt).ok().map(|dt| dt.date())
        } else {
            NaiveDate::parse_from_str(s, fmt).ok()
        }
    })
}

fn has_time(fmt: &str) -> bool {
    ["%H", "%I", "%M", "%S", "%T", "%R"]
        .iter()
        .any(|spec| fmt.contains(spec))
}

/// Days since 1970-01-01, the Arrow `Date32` representation.
pub fn epoch_days(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}
