//! Timestamps for directory entries written by the installer.

use fatfs::{Date, DateTime, Time, TimeProvider};

#[cfg(feature = "chrono")]
use chrono::{Datelike, Timelike};

const MIN_YEAR: u16 = 1980;
const MAX_YEAR: u16 = 2107;

/// `TimeProvider` that always returns the same moment.
///
/// Used to build byte-identical flash images, and on targets without a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTimeProvider {
    date_time: DateTime,
}

/// 1980-01-01 00:00:00, the earliest FAT timestamp.
pub static DOS_EPOCH: FixedTimeProvider = FixedTimeProvider::from_parts(1980, 1, 1, 0, 0, 0);

impl FixedTimeProvider {
    /// Creates a provider for the given calendar moment.
    ///
    /// # Panics
    ///
    /// Panics if a field is outside the range FAT can store.
    #[must_use]
    pub const fn from_parts(year: u16, month: u16, day: u16, hour: u16, min: u16, sec: u16) -> Self {
        assert!(year >= MIN_YEAR && year <= MAX_YEAR, "year out of range");
        assert!(month >= 1 && month <= 12, "month out of range");
        assert!(day >= 1 && day <= 31, "day out of range");
        assert!(hour <= 23, "hour out of range");
        assert!(min <= 59, "min out of range");
        assert!(sec <= 59, "sec out of range");
        Self {
            date_time: DateTime {
                date: Date { year, month, day },
                time: Time {
                    hour,
                    min,
                    sec,
                    millis: 0,
                },
            },
        }
    }

    /// Creates a provider from a calendar timestamp, clamped to the FAT range.
    #[cfg(feature = "chrono")]
    #[must_use]
    pub fn from_naive(date_time: chrono::NaiveDateTime) -> Self {
        Self {
            date_time: dos_date_time(&date_time),
        }
    }

    /// The moment this provider reports.
    #[must_use]
    pub fn date_time(&self) -> DateTime {
        self.date_time
    }

    /// Moves the provider to the heap for the lifetime of the program.
    ///
    /// `fatfs` keeps `&'static` time providers, so runtime-built ones go
    /// through here.
    #[must_use]
    pub fn leak(self) -> &'static Self {
        Box::leak(Box::new(self))
    }
}

impl TimeProvider for FixedTimeProvider {
    fn get_current_date(&self) -> Date {
        self.date_time.date
    }

    fn get_current_date_time(&self) -> DateTime {
        self.date_time
    }
}

/// `TimeProvider` reading the local wall clock through `chrono`.
#[cfg(feature = "chrono")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockTimeProvider {
    _dummy: (),
}

/// Shared wall-clock provider.
#[cfg(feature = "chrono")]
pub static CLOCK: ClockTimeProvider = ClockTimeProvider { _dummy: () };

#[cfg(feature = "chrono")]
impl ClockTimeProvider {
    /// Creates a wall-clock provider.
    #[must_use]
    pub fn new() -> Self {
        Self { _dummy: () }
    }
}

#[cfg(feature = "chrono")]
impl TimeProvider for ClockTimeProvider {
    fn get_current_date(&self) -> Date {
        self.get_current_date_time().date
    }

    fn get_current_date_time(&self) -> DateTime {
        dos_date_time(&chrono::Local::now().naive_local())
    }
}

#[cfg(feature = "chrono")]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn dos_date_time(dt: &chrono::NaiveDateTime) -> DateTime {
    let year = dt.year().clamp(i32::from(MIN_YEAR), i32::from(MAX_YEAR)) as u16;
    // nanosecond() exceeds 999ms during a leap second
    let millis = (dt.nanosecond() / 1_000_000).min(999);
    DateTime {
        date: Date {
            year,
            month: dt.month() as u16, // [1, 12]
            day: dt.day() as u16,     // [1, 31]
        },
        time: Time {
            hour: dt.hour() as u16,
            min: dt.minute() as u16,
            sec: dt.second() as u16,
            millis: millis as u16,
        },
    }
}

/// Provider used when `MountOptions` does not name one.
#[cfg(feature = "chrono")]
pub fn default_time_provider() -> &'static dyn TimeProvider {
    &CLOCK
}

/// Provider used when `MountOptions` does not name one.
#[cfg(not(feature = "chrono"))]
pub fn default_time_provider() -> &'static dyn TimeProvider {
    &DOS_EPOCH
}
