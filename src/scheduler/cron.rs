use std::fmt;
use std::str::FromStr;

use ::cron::Schedule;
use chrono::{DateTime, Utc};

use super::SchedulerError;

/// Quartz-style expression: `sec min hour day-of-month month day-of-week [year]`.
/// `?` ("no specific value") is read as `*`.
#[derive(Clone)]
pub struct CronExpression {
    source: String,
    schedule: Schedule,
}

impl CronExpression {
    pub fn parse(expr: &str) -> Result<Self, SchedulerError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if !(6..=7).contains(&fields.len()) {
            return Err(SchedulerError::InvalidCron {
                expression: expr.to_string(),
                reason: format!("expected 6 or 7 fields, found {}", fields.len()),
            });
        }
        let normalized = fields
            .iter()
            .map(|f| if *f == "?" { "*" } else { f })
            .collect::<Vec<_>>()
            .join(" ");
        let schedule = Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
            expression: expr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: expr.trim().to_string(),
            schedule,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(after).next()
    }
}

impl fmt::Debug for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronExpression").field(&self.source).finish()
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
