// [libs/domain/sync-orchestrator/src/cron_spec.rs]
//! A minimal standard 5-field cron expression evaluator (`min hour dom mon
//! dow`). `ehr-domain-sync-orchestrator` has no need for seconds or the
//! vixie-cron extensions (`@daily`, `L`, `#`) — just enough to drive
//! `Schedule`'s `cronSpec` and `CLEANUP_SCHEDULE`.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CronSpecError {
    #[error("cron spec must have exactly 5 space-separated fields, got {0}")]
    WrongFieldCount(usize),
    #[error("invalid field {field:?} in cron spec: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    /// `None` means `*` (every value in range).
    allowed: Option<Vec<u32>>,
}

impl Field {
    fn matches(&self, value: u32) -> bool {
        match &self.allowed {
            None => true,
            Some(values) => values.contains(&value),
        }
    }

    fn parse(raw: &str, name: &'static str, min: u32, max: u32) -> Result<Self, CronSpecError> {
        if raw == "*" {
            return Ok(Field { allowed: None });
        }
        let mut values = Vec::new();
        for part in raw.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (
                    range,
                    step.parse::<u32>()
                        .map_err(|_| invalid(name, raw))?
                        .max(1),
                ),
                None => (part, 1),
            };
            let (lo, hi) = if range == "*" {
                (min, max)
            } else if let Some((a, b)) = range.split_once('-') {
                (a.parse().map_err(|_| invalid(name, raw))?, b.parse().map_err(|_| invalid(name, raw))?)
            } else {
                let v: u32 = range.parse().map_err(|_| invalid(name, raw))?;
                (v, v)
            };
            if lo > hi || hi > max || lo < min {
                return Err(invalid(name, raw));
            }
            let mut v = lo;
            while v <= hi {
                values.push(v);
                v += step;
            }
        }
        values.sort_unstable();
        values.dedup();
        Ok(Field { allowed: Some(values) })
    }
}

fn invalid(field: &'static str, value: &str) -> CronSpecError {
    CronSpecError::InvalidField { field, value: value.to_string() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    pub fn parse(spec: &str) -> Result<Self, CronSpecError> {
        let fields: Vec<&str> = spec.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronSpecError::WrongFieldCount(fields.len()));
        }
        Ok(Self {
            minute: Field::parse(fields[0], "minute", 0, 59)?,
            hour: Field::parse(fields[1], "hour", 0, 23)?,
            day_of_month: Field::parse(fields[2], "day_of_month", 1, 31)?,
            month: Field::parse(fields[3], "month", 1, 12)?,
            day_of_week: Field::parse(fields[4], "day_of_week", 0, 6)?,
        })
    }

    fn matches(&self, at: DateTime<Utc>) -> bool {
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day_of_month.matches(at.day())
            && self.month.matches(at.month())
            && self.day_of_week.matches(at.weekday().num_days_from_sunday())
    }

    /// The first whole minute strictly after `after` that satisfies every
    /// field, searched up to four years out so a malformed or
    /// never-satisfiable spec (e.g. Feb 30) fails fast instead of looping
    /// forever.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = (after + Duration::minutes(1))
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))?;
        let ceiling = after + Duration::days(366 * 4);
        while candidate < ceiling {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

/// Convenience wrapper for [`crate::orchestrator::SyncOrchestrator::schedule`]:
/// an unparseable spec simply never ticks rather than rejecting admission,
/// since the schedule row itself is still valid state to persist and
/// inspect.
pub fn next_tick_after(cron_spec: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    CronSchedule::parse(cron_spec).ok()?.next_after(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_minute() {
        let sched = CronSchedule::parse("* * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 30, 15).unwrap();
        let next = sched.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 10, 31, 0).unwrap());
    }

    #[test]
    fn daily_at_two_am() {
        let sched = CronSchedule::parse("0 2 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 0, 0).unwrap();
        let next = sched.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 5, 2, 0, 0).unwrap());
    }

    #[test]
    fn every_fifteen_minutes() {
        let sched = CronSchedule::parse("*/15 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 16, 0).unwrap();
        let next = sched.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(CronSchedule::parse("0 2 * *"), Err(CronSpecError::WrongFieldCount(4)));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(CronSchedule::parse("60 * * * *").is_err());
    }
}



