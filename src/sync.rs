//! Host clock synchronization.
//!
//! The host's wall clock is reached through the [`HostClock`] trait, so the
//! driver stays `no_std` and never assumes a particular operating system.
//! All conversions are UTC; no timezone adjustment is applied in either
//! direction.

use chrono::NaiveDateTime;
use embedded_hal::i2c::I2c;

use crate::{CalendarTime, PCF8563Error, TimeReading, PCF8563};

/// Access to the host's wall clock.
pub trait HostClock {
    /// Error type returned by the host clock
    type Error;

    /// Returns the current host time in UTC.
    fn now_utc(&mut self) -> Result<NaiveDateTime, Self::Error>;

    /// Sets the host time from seconds since the Unix epoch (UTC).
    fn set_utc(&mut self, epoch_seconds: i64) -> Result<(), Self::Error>;
}

/// Errors returned by the synchronization operations.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncError<I2CE, CE> {
    /// The device side failed (bus, initialization or conversion)
    Device(PCF8563Error<I2CE>),
    /// The host clock could not be read or set
    HostClock(CE),
}

impl<I2CE, CE> From<PCF8563Error<I2CE>> for SyncError<I2CE, CE> {
    fn from(e: PCF8563Error<I2CE>) -> Self {
        SyncError::Device(e)
    }
}

/// Epoch seconds for a reading, or the conversion error as a device error.
pub(crate) fn reading_timestamp<I2CE>(reading: &TimeReading) -> Result<i64, PCF8563Error<I2CE>> {
    reading.time.to_timestamp().map_err(PCF8563Error::DateTime)
}

/// Host time as a calendar time, weekday taken from the host calendar.
pub(crate) fn host_calendar_time<I2CE>(
    now: &NaiveDateTime,
) -> Result<CalendarTime, PCF8563Error<I2CE>> {
    CalendarTime::try_from(now).map_err(PCF8563Error::DateTime)
}

impl<I2C: I2c> PCF8563<I2C> {
    /// Sets the host clock from the RTC.
    ///
    /// The host clock is only set when the read, the decode and the epoch
    /// conversion all succeed. A reading whose integrity flag is set is still
    /// applied; the returned [`TimeReading`] lets the caller react to it.
    ///
    /// # Returns
    /// * `Ok(TimeReading)` - the time that was applied to the host clock
    /// * `Err(SyncError)` on device or host clock failure
    pub fn sync_device_to_host_clock<C: HostClock>(
        &mut self,
        clock: &mut C,
    ) -> Result<TimeReading, SyncError<I2C::Error, C::Error>> {
        let reading = self.datetime()?;
        let timestamp = reading_timestamp(&reading)?;
        clock.set_utc(timestamp).map_err(SyncError::HostClock)?;
        debug!("PCF8563: host clock set to {}", timestamp);
        Ok(reading)
    }

    /// Sets the RTC from the host clock.
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(SyncError)` on device or host clock failure
    pub fn sync_host_clock_to_device<C: HostClock>(
        &mut self,
        clock: &mut C,
    ) -> Result<(), SyncError<I2C::Error, C::Error>> {
        let now = clock.now_utc().map_err(SyncError::HostClock)?;
        let time = host_calendar_time(&now)?;
        self.set_datetime(&time)?;
        debug!("PCF8563: device clock set to {:?}", time);
        Ok(())
    }
}
