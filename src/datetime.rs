//! Calendar time and BCD register conversion for the PCF8563 RTC.
//!
//! This module provides [`CalendarTime`], the normalized value exchanged with
//! callers and with the host clock, and the internal register image used for
//! the seven time-block registers.
//!
//! # Register Model
//!
//! The PCF8563 stores date and time in 7 consecutive registers:
//! - Seconds, Minutes, Hours, Days, Weekdays, Months, Years
//!
//! Every field is packed BCD. The years register only holds two digits; the
//! century flag in the months register selects 1900-1999 (clear) or
//! 2000-2099 (set). The top bit of the seconds register is the clock
//! integrity flag and is reported next to the decoded time, never inside it.
//!
//! # Error Handling
//!
//! Conversion errors are reported via [`CalendarTimeError`]. Encoding
//! validates every field before producing any register byte, and decoding
//! range-checks every field, so neither direction yields an out-of-range
//! value.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::{Days, Hours, Minutes, Months, Seconds, Weekdays, Years};

/// First year the century encoding can represent.
pub const MIN_YEAR: u16 = 1900;
/// Last year the century encoding can represent.
pub const MAX_YEAR: u16 = 2099;
/// First year of the span selected by the century flag.
const CENTURY_YEAR: u16 = 2000;

/// A wall-clock date and time as stored by the RTC.
///
/// All fields are plain binary values. `weekday` counts from Sunday (0) and is
/// stored as-is; it is not cross-checked against the date.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarTime {
    /// Seconds (0-59)
    pub second: u8,
    /// Minutes (0-59)
    pub minute: u8,
    /// Hours (0-23)
    pub hour: u8,
    /// Day of month (1-31)
    pub day: u8,
    /// Day of week (0-6, 0 = Sunday)
    pub weekday: u8,
    /// Month (1-12)
    pub month: u8,
    /// Year (1900-2099)
    pub year: u16,
}

impl CalendarTime {
    /// Checks every field against the bounds the device can store.
    ///
    /// # Returns
    /// * `Ok(())` if all fields are in range
    /// * `Err(CalendarTimeError)` naming the first violation found
    pub fn validate(&self) -> Result<(), CalendarTimeError> {
        if self.year < MIN_YEAR {
            error!("Year {} is too early! must be at least {}", self.year, MIN_YEAR);
            return Err(CalendarTimeError::InvalidDateTime);
        }
        if self.year > MAX_YEAR {
            error!("Year {} is too late! must be at most {}", self.year, MAX_YEAR);
            return Err(CalendarTimeError::InvalidDateTime);
        }
        let in_range = self.second <= 59
            && self.minute <= 59
            && self.hour <= 23
            && (1..=31).contains(&self.day)
            && self.weekday <= 6
            && (1..=12).contains(&self.month);
        if !in_range {
            error!("Calendar time out of range: {:?}", self);
            return Err(CalendarTimeError::InvalidDateTime);
        }
        Ok(())
    }

    /// Converts to a chrono `NaiveDateTime`, interpreted as UTC by callers.
    ///
    /// Fails with [`CalendarTimeError::InvalidDateTime`] when the fields are in
    /// range individually but do not form a real date (e.g. February 30).
    pub fn to_naive_datetime(&self) -> Result<NaiveDateTime, CalendarTimeError> {
        self.validate()?;
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .and_then(|d| {
            d.and_hms_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
            )
        })
        .ok_or(CalendarTimeError::InvalidDateTime)
    }

    /// Seconds since the Unix epoch, treating the fields as UTC.
    pub fn to_timestamp(&self) -> Result<i64, CalendarTimeError> {
        Ok(self.to_naive_datetime()?.and_utc().timestamp())
    }
}

impl TryFrom<&NaiveDateTime> for CalendarTime {
    type Error = CalendarTimeError;

    fn try_from(datetime: &NaiveDateTime) -> Result<Self, Self::Error> {
        let year = datetime.year();
        if !(i32::from(MIN_YEAR)..=i32::from(MAX_YEAR)).contains(&year) {
            error!("Year {} is outside {}-{}", year, MIN_YEAR, MAX_YEAR);
            return Err(CalendarTimeError::InvalidDateTime);
        }
        let narrow = |v: u32| u8::try_from(v).map_err(|_| CalendarTimeError::InvalidDateTime);
        let time = CalendarTime {
            second: narrow(datetime.second())?,
            minute: narrow(datetime.minute())?,
            hour: narrow(datetime.hour())?,
            day: narrow(datetime.day())?,
            weekday: narrow(datetime.weekday().num_days_from_sunday())?,
            month: narrow(datetime.month())?,
            year: u16::try_from(year).map_err(|_| CalendarTimeError::InvalidDateTime)?,
        };
        time.validate()?;
        Ok(time)
    }
}

/// A decoded time block together with the device's clock integrity status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeReading {
    /// The decoded date and time
    pub time: CalendarTime,
    /// `false` when the device reports that timekeeping may have been
    /// interrupted (e.g. by a power loss) since the time was last set
    pub integrity_ok: bool,
}

/// Internal representation of the PCF8563 time block.
///
/// This struct models the 7 time registers using strongly-typed bitfield
/// wrappers. It is produced and consumed once per bus transaction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct DeviceDateTime {
    seconds: Seconds,
    minutes: Minutes,
    hours: Hours,
    days: Days,
    weekdays: Weekdays,
    months: Months,
    years: Years,
}

impl DeviceDateTime {
    /// Splits a validated value into its BCD (ones, tens) digits.
    fn make_bcd(value: u8) -> (u8, u8) {
        (value % 10, value / 10)
    }

    /// Joins BCD digits and checks the result against `min..=max`.
    fn from_bcd(tens: u8, ones: u8, min: u8, max: u8) -> Result<u8, CalendarTimeError> {
        if ones > 9 {
            return Err(CalendarTimeError::InvalidDateTime);
        }
        let value = 10 * tens + ones;
        if value < min || value > max {
            return Err(CalendarTimeError::InvalidDateTime);
        }
        Ok(value)
    }

    /// Encodes a calendar time into register form.
    ///
    /// The clock integrity flag is always written clear; the century flag is
    /// set for years 2000 and later.
    pub(crate) fn from_calendar_time(time: &CalendarTime) -> Result<Self, CalendarTimeError> {
        time.validate()?;

        let mut seconds = Seconds::default();
        let (ones, tens) = Self::make_bcd(time.second);
        seconds.set_seconds(ones);
        seconds.set_ten_seconds(tens);

        let mut minutes = Minutes::default();
        let (ones, tens) = Self::make_bcd(time.minute);
        minutes.set_minutes(ones);
        minutes.set_ten_minutes(tens);

        let mut hours = Hours::default();
        let (ones, tens) = Self::make_bcd(time.hour);
        hours.set_hours(ones);
        hours.set_ten_hours(tens);

        let mut days = Days::default();
        let (ones, tens) = Self::make_bcd(time.day);
        days.set_days(ones);
        days.set_ten_days(tens);

        let mut weekdays = Weekdays::default();
        weekdays.set_weekday(time.weekday);

        let mut months = Months::default();
        let (ones, tens) = Self::make_bcd(time.month);
        months.set_month(ones);
        months.set_ten_month(tens);

        let century = time.year >= CENTURY_YEAR;
        let base = if century { CENTURY_YEAR } else { MIN_YEAR };
        months.set_century(century);
        let year_offset =
            u8::try_from(time.year - base).map_err(|_| CalendarTimeError::InvalidDateTime)?;
        let mut years = Years::default();
        let (ones, tens) = Self::make_bcd(year_offset);
        years.set_year(ones);
        years.set_ten_year(tens);

        Ok(DeviceDateTime {
            seconds,
            minutes,
            hours,
            days,
            weekdays,
            months,
            years,
        })
    }

    /// Decodes the register form, reporting the integrity flag separately.
    pub(crate) fn into_reading(self) -> Result<TimeReading, CalendarTimeError> {
        let second = Self::from_bcd(self.seconds.ten_seconds(), self.seconds.seconds(), 0, 59)?;
        let minute = Self::from_bcd(self.minutes.ten_minutes(), self.minutes.minutes(), 0, 59)?;
        let hour = Self::from_bcd(self.hours.ten_hours(), self.hours.hours(), 0, 23)?;
        let day = Self::from_bcd(self.days.ten_days(), self.days.days(), 1, 31)?;
        let weekday = self.weekdays.weekday();
        if weekday > 6 {
            return Err(CalendarTimeError::InvalidDateTime);
        }
        let month = Self::from_bcd(self.months.ten_month(), self.months.month(), 1, 12)?;
        let year_offset = Self::from_bcd(self.years.ten_year(), self.years.year(), 0, 99)?;
        let century_offset = if self.months.century() { 100 } else { 0 };
        let year = MIN_YEAR + u16::from(year_offset) + century_offset;

        Ok(TimeReading {
            time: CalendarTime {
                second,
                minute,
                hour,
                day,
                weekday,
                month,
                year,
            },
            integrity_ok: !self.seconds.integrity_lost(),
        })
    }
}

impl From<[u8; 7]> for DeviceDateTime {
    fn from(data: [u8; 7]) -> Self {
        DeviceDateTime {
            seconds: Seconds::from(data[0]),
            minutes: Minutes::from(data[1]),
            hours: Hours::from(data[2]),
            days: Days::from(data[3]),
            weekdays: Weekdays::from(data[4]),
            months: Months::from(data[5]),
            years: Years::from(data[6]),
        }
    }
}

impl From<&DeviceDateTime> for [u8; 7] {
    fn from(dt: &DeviceDateTime) -> [u8; 7] {
        [
            dt.seconds.into(),
            dt.minutes.into(),
            dt.hours.into(),
            dt.days.into(),
            dt.weekdays.into(),
            dt.months.into(),
            dt.years.into(),
        ]
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur during calendar time conversion or validation.
pub enum CalendarTimeError {
    /// A field (including the year) is out of range, a register is not
    /// valid BCD, or the date does not exist
    InvalidDateTime,
}
