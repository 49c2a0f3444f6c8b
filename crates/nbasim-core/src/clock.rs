//! Period clock conversion.
//!
//! The feed reports time as a countdown clock within a period
//! (`PT11M32.00S` means 11:32 left). The replay timeline instead counts
//! seconds elapsed since the nominal start of the recording, treating every
//! period as twelve minutes long:
//!
//! ```text
//! offset = 12*60*(period-1) + (12-minutes)*60 + (60-seconds) - 60
//! ```
//!
//! Overtime periods are shorter in reality, so their offsets start later
//! than the true elapsed time; ordering within the recording is unaffected.
//! A clock value at a period boundary may yield a negative offset, which
//! callers must tolerate.

use core::ops::Range;

/// Nominal period length in minutes.
const PERIOD_MINUTES: i64 = 12;

/// Seconds per minute.
const SECONDS_PER_MINUTE: i64 = 60;

/// Byte range holding the two minute digits.
const MINUTES_FIELD: Range<usize> = 2..4;

/// Byte range holding the two second digits.
const SECONDS_FIELD: Range<usize> = 5..7;

/// Errors that can occur while converting a period clock.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// The clock string does not carry two-digit minutes at `[2, 4)` and
    /// two-digit seconds at `[5, 7)`.
    #[error("malformed clock string: {clock:?}")]
    MalformedClockString {
        /// The offending clock string.
        clock: String,
    },

    /// Periods are 1-based; period 0 does not exist.
    #[error("invalid period: {period}")]
    InvalidPeriod {
        /// The offending period number.
        period: u32,
    },

    /// The offset does not fit in an `i64`.
    #[error("clock offset overflow")]
    Overflow,
}

/// Convert a period clock string and period number into seconds elapsed
/// since the nominal start of the recording.
///
/// # Errors
///
/// Returns [`ClockError::MalformedClockString`] if either field is missing
/// or not made of ASCII digits, and [`ClockError::InvalidPeriod`] for
/// period 0.
pub fn compute_offset(clock: &str, period: u32) -> Result<i64, ClockError> {
    let minutes = two_digit_field(clock, MINUTES_FIELD)?;
    let seconds = two_digit_field(clock, SECONDS_FIELD)?;

    let elapsed_periods = i64::from(period)
        .checked_sub(1)
        .filter(|p| *p >= 0)
        .ok_or(ClockError::InvalidPeriod { period })?;

    let period_start = PERIOD_MINUTES
        .checked_mul(SECONDS_PER_MINUTE)
        .and_then(|len| len.checked_mul(elapsed_periods));
    let minutes_elapsed = PERIOD_MINUTES
        .checked_sub(minutes)
        .and_then(|m| m.checked_mul(SECONDS_PER_MINUTE));
    let seconds_elapsed = SECONDS_PER_MINUTE.checked_sub(seconds);

    period_start
        .zip(minutes_elapsed)
        .and_then(|(start, m)| start.checked_add(m))
        .zip(seconds_elapsed)
        .and_then(|(acc, s)| acc.checked_add(s))
        .and_then(|acc| acc.checked_sub(SECONDS_PER_MINUTE))
        .ok_or(ClockError::Overflow)
}

/// Extract a two-digit decimal field at a fixed byte range.
fn two_digit_field(clock: &str, range: Range<usize>) -> Result<i64, ClockError> {
    let malformed = || ClockError::MalformedClockString {
        clock: clock.to_owned(),
    };

    let field = clock.get(range).ok_or_else(malformed)?;
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    field.parse::<i64>().map_err(|_err| malformed())
}
