use time::{Duration, PrimitiveDateTime};

pub(crate) fn duration_seconds_for(duration_minutes: i32) -> i64 {
    i64::from(duration_minutes.max(0)) * 60
}

/// Exam duration plus the student's extra minutes, in seconds.
pub(crate) fn allowance_seconds(exam_minutes: i32, extra_minutes: i32) -> i64 {
    duration_seconds_for(exam_minutes) + duration_seconds_for(extra_minutes)
}

pub(crate) fn deadline(started_at: PrimitiveDateTime, duration_seconds: i64) -> PrimitiveDateTime {
    started_at + Duration::seconds(duration_seconds)
}

/// Seconds left before the deadline, rounded up so zero means the deadline has
/// passed. Never negative.
pub(crate) fn remaining_seconds(
    started_at: PrimitiveDateTime,
    duration_seconds: i64,
    now: PrimitiveDateTime,
) -> i64 {
    let left = deadline(started_at, duration_seconds) - now;
    if !left.is_positive() {
        return 0;
    }
    left.whole_seconds() + i64::from(left.subsec_nanoseconds() > 0)
}
