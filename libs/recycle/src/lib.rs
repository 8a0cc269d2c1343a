//! Recycling decision primitives.
//!
//! This library provides the pure decision logic for the fleet-recycling
//! watchdog. Key concepts:
//!
//! - **Maintenance window**: a recurring daily UTC interval, possibly
//!   wrapping past midnight, during which recycling is permitted.
//! - **Restart eligibility**: age and label bookkeeping deciding whether a
//!   running instance is due for recycling.
//! - **Operation budget**: admission control capping newly scheduled work
//!   against a global ceiling shared with in-flight lifecycle operations.
//!
//! # Invariants
//!
//! - Decisions are deterministic given the same inputs
//! - Allocation never schedules work past the operation ceiling
//! - Eligibility fails open on unparsable bookkeeping labels

use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use thiserror::Error;

/// Label recording the most recent recycling time as an epoch-seconds string.
///
/// This is the only state the watchdog ever writes; idempotency across
/// passes is derived entirely from it.
pub const LABEL_LAST_RESTARTED: &str = "last-restarted";

/// Maintenance window errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    /// Window text does not match `hh:mm-hh:mm`.
    #[error("expected hh:mm-hh:mm, got {0:?}")]
    Malformed(String),

    /// Hour field outside 0..=23.
    #[error("hour out of range: {0}")]
    HourOutOfRange(u8),

    /// Minute field outside 0..=59.
    #[error("minute out of range: {0}")]
    MinuteOutOfRange(u8),
}

/// A recurring daily UTC interval during which recycling is permitted.
///
/// The window may wrap past midnight (start later than end), e.g.
/// `23:00-01:00`. Endpoints are inclusive on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceWindow {
    start_hour: u8,
    start_minute: u8,
    end_hour: u8,
    end_minute: u8,
}

impl MaintenanceWindow {
    /// Returns true if `now` falls inside the window.
    ///
    /// Wrapping windows are mapped onto a shifted timeline: `23:00-01:00`
    /// becomes `23:00-25:00`, and a query point earlier than the start is
    /// shifted by +24h as well, so `00:30` compares as `24:30` (inside)
    /// while `22:59` stays unshifted (outside).
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let mut now = (now.hour(), now.minute());
        let start = (u32::from(self.start_hour), u32::from(self.start_minute));
        let mut end = (u32::from(self.end_hour), u32::from(self.end_minute));

        if start > end {
            end.0 += 24;
            if now < start {
                now.0 += 24;
            }
        }

        start <= now && now <= end
    }
}

impl FromStr for MaintenanceWindow {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| WindowError::Malformed(s.to_string()))?;
        let (start_hour, start_minute) = parse_clock(start, s)?;
        let (end_hour, end_minute) = parse_clock(end, s)?;

        Ok(Self {
            start_hour,
            start_minute,
            end_hour,
            end_minute,
        })
    }
}

/// Parse one `hh:mm` half of a window spec.
fn parse_clock(part: &str, full: &str) -> Result<(u8, u8), WindowError> {
    let (hour, minute) = part
        .split_once(':')
        .ok_or_else(|| WindowError::Malformed(full.to_string()))?;
    let hour: u8 = hour
        .parse()
        .map_err(|_| WindowError::Malformed(full.to_string()))?;
    let minute: u8 = minute
        .parse()
        .map_err(|_| WindowError::Malformed(full.to_string()))?;

    if hour > 23 {
        return Err(WindowError::HourOutOfRange(hour));
    }
    if minute > 59 {
        return Err(WindowError::MinuteOutOfRange(minute));
    }

    Ok((hour, minute))
}

/// Decide whether a running instance is due for recycling.
///
/// Rules, each a short-circuit "no":
///
/// 1. Outside the maintenance window, never restart.
/// 2. Instances younger than the age threshold are never restarted.
/// 3. A parsable `last-restarted` label newer than the cutoff blocks the
///    restart; an unparsable one does not (fail-open, so corrupted
///    bookkeeping cannot permanently pin an instance).
pub fn should_restart(
    in_window: bool,
    created_at: DateTime<Utc>,
    last_restarted: Option<&str>,
    now: DateTime<Utc>,
    age_threshold_hours: i64,
) -> bool {
    if !in_window {
        return false;
    }

    let cutoff = now - Duration::hours(age_threshold_hours);
    if created_at > cutoff {
        return false;
    }

    if let Some(raw) = last_restarted {
        let restarted_at = raw
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        if let Some(restarted_at) = restarted_at {
            if restarted_at > cutoff {
                return false;
            }
        }
    }

    true
}

/// The lifecycle transition scheduled for a worklist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Resume a stopped instance.
    Start,

    /// Preempt a running instance for recycling.
    Stop,
}

/// Result of a budget allocation.
#[derive(Debug)]
pub struct Allocation<T> {
    /// Ordered worklist, capped at the operation ceiling.
    pub worklist: Vec<(T, Transition)>,

    /// Number of operations postponed to a later pass.
    pub deferred: usize,
}

/// Allocate the operation budget across candidates.
///
/// Stopped candidates are ordered before running ones: resuming a stopped
/// instance is fully idle capacity loss and always outranks preempting a
/// running one. Within each group, scan order is preserved.
///
/// If the worklist plus `ops_in_flight` exceeds `ceiling`, the tail is
/// truncated so that at most `ceiling - ops_in_flight` entries remain
/// (none, if in-flight operations alone exhaust the budget). Truncated
/// operations are deferred to the next pass, never queued.
pub fn allocate<T>(
    stopped: Vec<T>,
    running: Vec<T>,
    ops_in_flight: usize,
    ceiling: usize,
) -> Allocation<T> {
    let mut worklist: Vec<(T, Transition)> = stopped
        .into_iter()
        .map(|instance| (instance, Transition::Start))
        .chain(running.into_iter().map(|instance| (instance, Transition::Stop)))
        .collect();

    let total = worklist.len() + ops_in_flight;
    if total <= ceiling {
        return Allocation {
            worklist,
            deferred: 0,
        };
    }

    let deferred = total - ceiling;
    worklist.truncate(ceiling.saturating_sub(ops_in_flight));

    Allocation { worklist, deferred }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, hour, minute, 0).unwrap()
    }

    fn window(spec: &str) -> MaintenanceWindow {
        spec.parse().unwrap()
    }

    #[test]
    fn test_window_parse() {
        let parsed = window("23:00-01:30");
        assert_eq!(
            parsed,
            MaintenanceWindow {
                start_hour: 23,
                start_minute: 0,
                end_hour: 1,
                end_minute: 30,
            }
        );

        // Single-digit fields are accepted
        assert_eq!(window("1:5-2:45"), window("01:05-02:45"));
    }

    #[test]
    fn test_window_parse_rejects_malformed() {
        for bad in ["", "09:00", "09-17", "09:00-17", "a:00-17:00", "09:00-17:xx"] {
            assert!(matches!(
                bad.parse::<MaintenanceWindow>(),
                Err(WindowError::Malformed(_))
            ));
        }
        assert_eq!(
            "24:00-01:00".parse::<MaintenanceWindow>(),
            Err(WindowError::HourOutOfRange(24))
        );
        assert_eq!(
            "09:00-17:60".parse::<MaintenanceWindow>(),
            Err(WindowError::MinuteOutOfRange(60))
        );
    }

    #[test]
    fn test_simple_window_inclusive_bounds() {
        let w = window("09:00-17:00");

        assert!(w.contains(at(9, 0)));
        assert!(w.contains(at(12, 0)));
        assert!(w.contains(at(17, 0)));

        assert!(!w.contains(at(8, 59)));
        assert!(!w.contains(at(17, 1)));
        assert!(!w.contains(at(18, 0)));
    }

    #[test]
    fn test_wrapping_window() {
        let w = window("23:00-01:00");

        assert!(w.contains(at(0, 30)));
        assert!(w.contains(at(23, 30)));
        assert!(w.contains(at(23, 0)));
        assert!(w.contains(at(1, 0)));

        assert!(!w.contains(at(22, 59)));
        assert!(!w.contains(at(1, 1)));
        assert!(!w.contains(at(12, 0)));
    }

    fn hours_ago(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
        now - Duration::hours(hours)
    }

    #[test]
    fn test_restart_requires_active_window() {
        let now = at(12, 0);
        assert!(!should_restart(false, hours_ago(now, 48), None, now, 24));
        assert!(should_restart(true, hours_ago(now, 48), None, now, 24));
    }

    #[test]
    fn test_young_instance_never_eligible() {
        let now = at(12, 0);
        assert!(!should_restart(true, hours_ago(now, 1), None, now, 24));
        // The cutoff itself is not "too young"
        assert!(should_restart(true, hours_ago(now, 24), None, now, 24));
    }

    #[test]
    fn test_recent_restart_blocks() {
        let now = at(12, 0);
        let recent = hours_ago(now, 2).timestamp().to_string();
        let stale = hours_ago(now, 72).timestamp().to_string();

        assert!(!should_restart(
            true,
            hours_ago(now, 48),
            Some(&recent),
            now,
            24
        ));
        assert!(should_restart(
            true,
            hours_ago(now, 48),
            Some(&stale),
            now,
            24
        ));
    }

    #[test]
    fn test_unparsable_restart_label_fails_open() {
        let now = at(12, 0);
        assert!(should_restart(
            true,
            hours_ago(now, 48),
            Some("not-a-timestamp"),
            now,
            24
        ));
    }

    #[test]
    fn test_allocate_under_ceiling_keeps_everything() {
        let allocation = allocate(vec!["s1"], vec!["r1", "r2"], 1, 10);

        assert_eq!(allocation.deferred, 0);
        assert_eq!(
            allocation.worklist,
            vec![
                ("s1", Transition::Start),
                ("r1", Transition::Stop),
                ("r2", Transition::Stop),
            ]
        );
    }

    #[test]
    fn test_allocate_truncates_running_before_stopped() {
        // ceiling=5, 2 in flight, 4 stopped + 3 running: only the stopped
        // group fits
        let allocation = allocate(vec!["s1", "s2", "s3", "s4"], vec!["r1", "r2", "r3"], 2, 5);

        assert_eq!(allocation.deferred, 4);
        assert_eq!(
            allocation.worklist,
            vec![
                ("s1", Transition::Start),
                ("s2", Transition::Start),
                ("s3", Transition::Start),
            ]
        );
    }

    #[test]
    fn test_allocate_exhausted_by_in_flight() {
        let allocation = allocate(vec!["s1", "s2"], vec!["r1"], 7, 5);

        assert!(allocation.worklist.is_empty());
        assert_eq!(allocation.deferred, 5);
    }

    #[test]
    fn test_allocate_respects_ceiling() {
        for in_flight in 0..5 {
            let allocation = allocate(
                vec!["s1", "s2", "s3"],
                vec!["r1", "r2", "r3", "r4"],
                in_flight,
                5,
            );
            assert!(allocation.worklist.len() + in_flight <= 5);
        }
    }
}
