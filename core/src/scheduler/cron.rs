//! Cron expression evaluation in a task's own timezone (spec.md §4.3, §9
//! "Scheduler clock source"). Tasks are authored as standard 5-field cron
//! (`min hour day month weekday`); the `cron` crate's grammar additionally
//! wants a leading seconds field, so a 5-field expression is normalized to
//! six fields (seconds pinned to `0`) before parsing.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

fn normalize(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

fn parse(expr: &str) -> Result<Schedule, String> {
    Schedule::from_str(&normalize(expr)).map_err(|e| format!("invalid cron expression '{expr}': {e}"))
}

/// The next occurrence of `expr` strictly after `after`, evaluated in
/// `timezone` and returned back in UTC.
pub fn next_fire_after(expr: &str, timezone: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let schedule = parse(expr)?;
    let tz: Tz = timezone
        .parse()
        .map_err(|_| format!("unknown timezone: {timezone}"))?;
    let after_in_tz = after.with_timezone(&tz);
    schedule
        .after(&after_in_tz)
        .next()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| "cron schedule produced no upcoming occurrence".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_expression_is_accepted() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = next_fire_after("0 9 * * 1", "UTC", after).unwrap();
        assert_eq!(next.format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn evaluates_in_the_given_timezone() {
        // 09:00 Europe/Madrid is 08:00 UTC in winter (CET, UTC+1).
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = next_fire_after("0 9 * * *", "Europe/Madrid", after).unwrap();
        assert_eq!(next.format("%H:%M").to_string(), "08:00");
    }

    #[test]
    fn evaluates_across_a_dst_transition() {
        // 09:00 Europe/Madrid is 07:00 UTC in summer (CEST, UTC+2), one hour
        // earlier in UTC than the winter case above despite the identical
        // local wall-clock time.
        let after = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let next = next_fire_after("0 9 * * *", "Europe/Madrid", after).unwrap();
        assert_eq!(next.format("%H:%M").to_string(), "07:00");
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(next_fire_after("not a cron", "UTC", Utc::now()).is_err());
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert!(next_fire_after("0 9 * * *", "Narnia/Capital", Utc::now()).is_err());
    }

    #[test]
    fn next_occurrence_is_strictly_after_the_given_instant() {
        let at_nine = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let next = next_fire_after("0 9 * * *", "UTC", at_nine).unwrap();
        assert!(next > at_nine);
    }
}
