//! Constants and helpers for the fixed (365, 24) model calendar.
//!
//! All hourly arrays in the model cover a non-leap year. Where input data has a 29 February, it is
//! dropped when the data is read.
use chrono::{Datelike, NaiveDate};

/// Number of days in a model year
pub const DAYS_IN_YEAR: usize = 365;

/// Number of hours in a day
pub const HOURS_IN_DAY: usize = 24;

/// Number of hours in a model year
pub const HOURS_IN_YEAR: usize = DAYS_IN_YEAR * HOURS_IN_DAY;

/// Zero-based day-of-year index of 29 February in a leap year
pub const LEAP_DAY_INDEX: usize = 59;

/// A non-leap year used to map day indices onto calendar dates
const REFERENCE_YEAR: i32 = 2015;

/// Whether `year` is a leap year in the Gregorian calendar
pub fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Get the zero-based month for a zero-based day of a non-leap year.
///
/// Days past the end of the year are assigned to December.
pub fn month_of_day(day: usize) -> usize {
    u32::try_from(day + 1)
        .ok()
        .and_then(|ordinal| NaiveDate::from_yo_opt(REFERENCE_YEAR, ordinal))
        .map_or(11, |date| date.month0() as usize)
}

/// The label for an hourly timestep in output files (e.g. "0_0" to "364_23")
pub fn timestep_label(day: usize, hour: usize) -> String {
    format!("{day}_{hour}")
}
