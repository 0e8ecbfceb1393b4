use time::{Date, Duration, Month, OffsetDateTime};

/// The same wall-clock instant one calendar month later.
///
/// The day is clamped to the length of the target month, so Jan 31 maps to
/// Feb 28 (or 29).
pub fn add_one_month(at: OffsetDateTime) -> OffsetDateTime {
    let (year, month) = match at.month() {
        Month::December => (at.year() + 1, Month::January),
        month => (at.year(), month.next()),
    };
    let day = at.day().min(time::util::days_in_year_month(year, month));
    match Date::from_calendar_date(year, month, day) {
        Ok(date) => at.replace_date(date),
        // Only reachable at the edge of the representable year range.
        Err(_) => at + Duration::days(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_plain_month() {
        assert_eq!(
            add_one_month(datetime!(2024-03-10 08:30 UTC)),
            datetime!(2024-04-10 08:30 UTC)
        );
    }

    #[test]
    fn test_clamps_to_month_end() {
        assert_eq!(
            add_one_month(datetime!(2024-01-31 00:00 UTC)),
            datetime!(2024-02-29 00:00 UTC)
        );
        assert_eq!(
            add_one_month(datetime!(2023-01-31 00:00 UTC)),
            datetime!(2023-02-28 00:00 UTC)
        );
        assert_eq!(
            add_one_month(datetime!(2024-05-31 00:00 UTC)),
            datetime!(2024-06-30 00:00 UTC)
        );
    }

    #[test]
    fn test_year_rollover() {
        assert_eq!(
            add_one_month(datetime!(2024-12-15 23:59 UTC)),
            datetime!(2025-01-15 23:59 UTC)
        );
    }
}
