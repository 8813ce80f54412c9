//! Batch boundaries for daily / weekly / monthly email digests.
//! Boundaries fall at a fixed local hour: tomorrow, next Monday, or the
//! first of next month.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use wikiflow_core::config::NotificationConfig;
use wikiflow_core::types::Frequency;

/// When batched notifications become eligible for delivery.
#[derive(Debug, Clone, Copy)]
pub struct BatchSchedule {
    hour: u32,
    offset: FixedOffset,
}

impl BatchSchedule {
    pub fn new(hour: u32, offset: FixedOffset) -> Self {
        Self {
            hour: hour.min(23),
            offset,
        }
    }

    /// Build from config. An out-of-range UTC offset falls back to UTC.
    pub fn from_config(config: &NotificationConfig) -> Self {
        let offset = config
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "⚠️ Invalid utc_offset_minutes {}, using UTC for batch boundaries",
                    config.utc_offset_minutes
                );
                utc_offset()
            });
        Self::new(config.batch_hour, offset)
    }

    /// Next boundary after `now` for a batched frequency; `None` otherwise.
    pub fn next_boundary(&self, frequency: Frequency, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&self.offset).date_naive();
        let day = match frequency {
            Frequency::Daily => today.checked_add_days(Days::new(1))?,
            Frequency::Weekly => {
                // Monday rolls over to the following Monday.
                let ahead = 7 - u64::from(today.weekday().num_days_from_monday());
                today.checked_add_days(Days::new(ahead))?
            }
            Frequency::Monthly => first_of_next_month(today)?,
            Frequency::Each | Frequency::Never => return None,
        };
        let local = day.and_hms_opt(self.hour, 0, 0)?;
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Default for BatchSchedule {
    fn default() -> Self {
        Self::new(9, utc_offset())
    }
}

fn first_of_next_month(day: NaiveDate) -> Option<NaiveDate> {
    if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}
