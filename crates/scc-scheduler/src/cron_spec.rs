//! Standard 5-field cron parsing, adapted to the 7-field expression the
//! `cron` crate expects (seconds prepended as `0`, year appended as `*`).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{SchedulerError, SchedulerResult};

#[derive(Clone)]
pub struct CronSpec {
    expr: String,
    schedule: cron::Schedule,
}

impl std::fmt::Debug for CronSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronSpec").field("expr", &self.expr).finish()
    }
}

impl CronSpec {
    /// Parse a standard 5-field cron expression (`min hour dom mon dow`).
    pub fn parse(expr: &str) -> SchedulerResult<Self> {
        let adapted = format!("0 {expr} *");
        let schedule = cron::Schedule::from_str(&adapted).map_err(|e| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expr: expr.to_string(),
            schedule,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Next scheduled instant strictly after `after`, evaluated in `tz` and
    /// returned in UTC.
    pub fn next_after(&self, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let after_local = after.with_timezone(&tz);
        let next_local = self.schedule.after(&after_local).next()?;
        Some(next_local.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub name: scc_models::TemplateName,
    pub cron: CronSpec,
    pub timezone: Tz,
}

impl ScheduleEntry {
    pub fn new(name: impl Into<scc_models::TemplateName>, cron_expr: &str) -> SchedulerResult<Self> {
        Ok(Self {
            name: name.into(),
            cron: CronSpec::parse(cron_expr)?,
            timezone: Tz::UTC,
        })
    }

    pub fn with_timezone(mut self, tz_name: &str) -> SchedulerResult<Self> {
        self.timezone = Tz::from_str(tz_name).map_err(|_| SchedulerError::InvalidTimezone(tz_name.to_string()))?;
        Ok(self)
    }

    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.next_after(self.timezone, after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_standard_five_field_expression() {
        let spec = CronSpec::parse("0 5 * * *").unwrap();
        assert_eq!(spec.as_str(), "0 5 * * *");
    }

    #[test]
    fn rejects_malformed_expression() {
        let err = CronSpec::parse("not a cron").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));
    }

    #[test]
    fn next_after_advances_to_the_next_matching_minute() {
        let spec = CronSpec::parse("0 5 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = spec.next_after(Tz::UTC, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 5, 0, 0).unwrap());
    }

    #[test]
    fn schedule_entry_defaults_to_utc() {
        let entry = ScheduleEntry::new("cleanup", "0 5 * * *").unwrap();
        assert_eq!(entry.timezone, Tz::UTC);
    }

    #[test]
    fn schedule_entry_rejects_unknown_timezone() {
        let err = ScheduleEntry::new("cleanup", "0 5 * * *").unwrap().with_timezone("Nowhere/Place").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTimezone(_)));
    }
}
