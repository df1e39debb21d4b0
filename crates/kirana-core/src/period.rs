//! Reporting periods.
//!
//! Shops think in local calendar days; timestamps are stored in UTC.
//! A [`Period`] is a half-open UTC range `[start, end)` covering whole
//! shop-local days.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

/// Nepal Standard Time (UTC+05:45) in minutes.
pub const NEPAL_UTC_OFFSET_MINUTES: i32 = 345;

/// A half-open UTC time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    /// Covers the local days `from..=to`. Either bound may be open.
    ///
    /// Open bounds use the Unix epoch and the end of year 9999 so that the
    /// RFC 3339 text stored by SQLite still compares correctly.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use kirana_core::period::Period;
    ///
    /// let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    /// let p = Period::local_days(Some(day), Some(day), 345);
    /// assert_eq!(p.start.to_rfc3339(), "2024-03-14T18:15:00+00:00");
    /// assert_eq!(p.end.to_rfc3339(), "2024-03-15T18:15:00+00:00");
    /// ```
    pub fn local_days(from: Option<NaiveDate>, to: Option<NaiveDate>, offset_minutes: i32) -> Self {
        let start = from
            .map(|d| local_midnight(d, offset_minutes))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let end = to
            .and_then(|d| d.succ_opt())
            .map(|d| local_midnight(d, offset_minutes))
            .unwrap_or_else(far_future);
        Period { start, end }
    }

    /// The local day containing `now`.
    pub fn local_today(now: DateTime<Utc>, offset_minutes: i32) -> Self {
        let today = local_date(now, offset_minutes);
        Period::local_days(Some(today), Some(today), offset_minutes)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Calendar date of `at` in the shop's offset.
pub fn local_date(at: DateTime<Utc>, offset_minutes: i32) -> NaiveDate {
    (at + Duration::minutes(offset_minutes as i64)).date_naive()
}

fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn local_midnight(date: NaiveDate, offset_minutes: i32) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match FixedOffset::east_opt(offset_minutes * 60) {
        Some(offset) => offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
        None => Utc.from_utc_datetime(&naive),
    }
}
