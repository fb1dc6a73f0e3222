use chrono::{DateTime, Datelike, Month, Timelike, Utc};
use serde::Serialize;

/// Calendar features derived from a unix timestamp.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DateFeatures {
    pub date: DateTime<Utc>,
    pub month: u32,
    pub month_str: &'static str,
    pub year: i32,
    pub hour: u32,
    pub minute: u32,
    pub seconds: u32,
    /// ISO weekday, `1` is Monday.
    pub day_of_week: u32,
    pub is_weekend: bool,
}

impl DateFeatures {
    /// Derives features from unix seconds, interpreted as UTC.
    ///
    /// Returns `None` for timestamps that are not finite or out of range.
    pub fn from_unix(timestamp: f64) -> Option<Self> {
        if !timestamp.is_finite() {
            return None;
        }

        let secs = timestamp.floor();
        let nanos = ((timestamp - secs) * 1e9) as u32;
        let date = DateTime::from_timestamp(secs as i64, nanos)?;

        let month = date.month();
        let month_str = Month::try_from(u8::try_from(month).ok()?).ok()?.name();
        let day_of_week = date.weekday().number_from_monday();

        Some(Self {
            date,
            month,
            month_str,
            year: date.year(),
            hour: date.hour(),
            minute: date.minute(),
            seconds: date.second(),
            day_of_week,
            is_weekend: day_of_week >= 6,
        })
    }
}
