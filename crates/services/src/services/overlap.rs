//! Global schedule overlap validation.
//!
//! Weekly class slots and the embedded sessions of active courses share one
//! weekly calendar; any new or updated time range is checked against both
//! sources before it is written.

use db::models::activity::Activity;
use db::models::schedule::ClassSchedule;
use sqlx::SqlitePool;
use thiserror::Error;
use utils::time::{format_hhmm_wrapped, parse_hhmm};

#[derive(Debug, Error)]
pub enum OverlapError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("hora inválida '{0}': se espera formato HH:MM")]
    InvalidTime(String),
}

/// The occupied slot a candidate range collided with, with display-ready
/// times. For course sessions that run past midnight the end shows the
/// wrapped clock time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConflict {
    pub name: String,
    pub day: String,
    pub start: String,
    pub end: String,
}

/// The row being edited, so a slot never conflicts with itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExcludeEntity {
    Schedule(i64),
    Activity(i64),
}

/// Day labels are compared case-insensitively and ignoring stray whitespace.
pub fn normalize_day(day: &str) -> String {
    day.trim().to_lowercase()
}

/// Half-open ranges `[start, end)`: touching boundaries do not overlap.
fn ranges_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    a_start < b_end && a_end > b_start
}

/// String-level entry point: parses the candidate times, then scans.
pub async fn check_global_overlap(
    pool: &SqlitePool,
    day: &str,
    start_time: &str,
    end_time: &str,
    exclude: Option<ExcludeEntity>,
) -> Result<Option<ScheduleConflict>, OverlapError> {
    let start = parse_hhmm(start_time)
        .ok_or_else(|| OverlapError::InvalidTime(start_time.to_string()))?;
    let end =
        parse_hhmm(end_time).ok_or_else(|| OverlapError::InvalidTime(end_time.to_string()))?;
    check_interval_overlap(pool, day, i64::from(start), i64::from(end), exclude).await
}

/// Scan every occupied slot on `day` for an overlap with
/// `[start_minute, end_minute)`. Class schedules are checked before course
/// sessions. Stored slots with unparseable times are skipped rather than
/// failing the whole check.
pub async fn check_interval_overlap(
    pool: &SqlitePool,
    day: &str,
    start_minute: i64,
    end_minute: i64,
    exclude: Option<ExcludeEntity>,
) -> Result<Option<ScheduleConflict>, OverlapError> {
    let day = normalize_day(day);

    for slot in ClassSchedule::find_active_slots(pool).await? {
        if matches!(exclude, Some(ExcludeEntity::Schedule(id)) if id == slot.id) {
            continue;
        }
        if normalize_day(&slot.day_of_week) != day {
            continue;
        }
        let (Some(slot_start), Some(slot_end)) =
            (parse_hhmm(&slot.start_time), parse_hhmm(&slot.end_time))
        else {
            continue;
        };
        if ranges_overlap(
            start_minute,
            end_minute,
            i64::from(slot_start),
            i64::from(slot_end),
        ) {
            return Ok(Some(ScheduleConflict {
                name: format!("Clase: {}", slot.display_name),
                day: slot.day_of_week,
                start: slot.start_time,
                end: slot.end_time,
            }));
        }
    }

    for course in Activity::find_active_courses(pool).await? {
        if matches!(exclude, Some(ExcludeEntity::Activity(id)) if id == course.id) {
            continue;
        }
        for session in course.parsed_sessions() {
            if normalize_day(&session.day) != day {
                continue;
            }
            let Some(session_start) = parse_hhmm(&session.time) else {
                continue;
            };
            let session_start = i64::from(session_start);
            // end stays unbounded so a session crossing midnight still
            // blocks the rest of its run on the start day; saturate so a
            // legacy row with an absurd duration cannot overflow
            let session_end = session_start.saturating_add(session.duration_minutes);
            if ranges_overlap(start_minute, end_minute, session_start, session_end) {
                return Ok(Some(ScheduleConflict {
                    name: format!("Curso: {}", course.title),
                    day: session.day.clone(),
                    start: session.time.clone(),
                    end: format_hhmm_wrapped(session_end),
                }));
            }
        }
    }

    Ok(None)
}
