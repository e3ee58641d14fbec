//! Async implementation of the PCF8563 driver.
//!
//! This module provides an async interface to the PCF8563 RTC device using
//! `embedded-hal-async` traits. It is only available when the `async` feature
//! is enabled. Every operation behaves exactly like its blocking counterpart
//! on [`crate::PCF8563`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pcf8563::asynch::PCF8563;
//!
//! // Initialize device
//! let mut rtc = PCF8563::new(i2c, 0x51);
//!
//! // Configure asynchronously
//! rtc.ensure_initialized(0).await?;
//!
//! // Get current date/time asynchronously
//! let reading = rtc.datetime().await?;
//! ```

use chrono::NaiveDateTime;
use embedded_hal_async::i2c::I2c;
use paste::paste;

use crate::bus::{burst_fits, burst_frame};
use crate::datetime::DeviceDateTime;
use crate::sync::{host_calendar_time, reading_timestamp};
use crate::{
    CalendarTime, ClkoutControl, Config, Control1, Control2, HostClock, InitState, PCF8563Error,
    RegAddr, SyncError, TimeReading, DEFAULT_ADDRESS, TIME_BLOCK_LEN,
};

/// PCF8563 Real-Time Clock async driver.
///
/// This struct provides the async interface to the PCF8563 RTC device.
/// It supports async I2C operations through the `embedded-hal-async` traits.
pub struct PCF8563<I2C> {
    i2c: I2C,
    address: u8,
    config: Config,
    state: InitState,
}

impl<I2C> PCF8563<I2C> {
    /// Creates a new PCF8563 async driver instance.
    ///
    /// # Arguments
    /// * `i2c` - The async I2C bus implementation
    /// * `address` - The I2C address of the device (typically 0x51)
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self::with_config(i2c, address, Config::default())
    }

    /// Creates a new driver for the device at [`DEFAULT_ADDRESS`].
    pub fn new_default(i2c: I2C) -> Self {
        Self::new(i2c, DEFAULT_ADDRESS)
    }

    /// Creates a new driver with an explicit configuration.
    pub fn with_config(i2c: I2C, address: u8, config: Config) -> Self {
        Self {
            i2c,
            address,
            config,
            state: InitState::Uninitialized,
        }
    }

    /// Returns `true` once the control registers have been configured.
    pub fn is_initialized(&self) -> bool {
        self.state == InitState::Ready
    }

    /// The current initialization state.
    pub fn init_state(&self) -> InitState {
        self.state
    }

    /// The driver configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Destroys the driver and gives back the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> PCF8563<I2C> {
    async fn write_registers(
        &mut self,
        register: u8,
        values: &[u8],
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        let (frame, len) = burst_frame(register, values).ok_or(PCF8563Error::BurstTooLong)?;
        self.i2c.write(self.address, &frame[..len]).await?;
        Ok(())
    }

    async fn read_registers(
        &mut self,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        if !burst_fits(register, buffer.len()) {
            return Err(PCF8563Error::BurstTooLong);
        }
        self.i2c
            .write_read(self.address, &[register], buffer)
            .await?;
        Ok(())
    }

    async fn write_control(
        &mut self,
        register: RegAddr,
        value: u8,
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        match self.write_registers(register as u8, &[value]).await {
            Err(PCF8563Error::I2c(e)) => {
                error!("PCF8563: control register {:?} write failed", register);
                Err(PCF8563Error::Init(e))
            }
            other => other,
        }
    }

    /// Configures the control registers once per driver.
    ///
    /// # Arguments
    /// * `mode` - Control 2 mode; only `CONTROL2_MODE_MASK` bits are kept
    ///
    /// # Returns
    /// * `Ok(())` on success or when already initialized
    /// * `Err(PCF8563Error::Init)` if a control register write failed
    pub async fn ensure_initialized(&mut self, mode: u8) -> Result<(), PCF8563Error<I2C::Error>> {
        if self.state == InitState::Ready {
            return Ok(());
        }
        let control2 = Control2::from_mode(mode);
        debug!("PCF8563: initializing, control2={:?}", control2);
        self.write_control(RegAddr::Control1, Control1::default().into())
            .await?;
        self.write_control(RegAddr::Control2, control2.into())
            .await?;
        self.state = InitState::Ready;
        debug!("PCF8563: ready");
        Ok(())
    }

    /// Reads the raw time block from the device.
    async fn read_raw_datetime(&mut self) -> Result<DeviceDateTime, PCF8563Error<I2C::Error>> {
        let mut data = [0; TIME_BLOCK_LEN];
        self.read_registers(RegAddr::Seconds as u8, &mut data)
            .await?;
        debug!("PCF8563: read time block {:?}", data);
        Ok(data.into())
    }

    /// Gets the current date and time from the device.
    ///
    /// # Returns
    /// * `Ok(TimeReading)` - The decoded time and the clock integrity flag
    /// * `Err(PCF8563Error)` on error
    pub async fn datetime(&mut self) -> Result<TimeReading, PCF8563Error<I2C::Error>> {
        self.ensure_initialized(self.config.mode).await?;
        let raw = self.read_raw_datetime().await?;
        let reading = raw.into_reading().map_err(PCF8563Error::DateTime)?;
        if !reading.integrity_ok {
            warn!("PCF8563: clock integrity is not guaranteed");
        }
        Ok(reading)
    }

    /// Sets the current date and time on the device.
    ///
    /// # Arguments
    /// * `datetime` - The date and time to set; validated before any bus access
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(PCF8563Error)` on error
    pub async fn set_datetime(
        &mut self,
        datetime: &CalendarTime,
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        let raw = DeviceDateTime::from_calendar_time(datetime).map_err(PCF8563Error::DateTime)?;
        self.ensure_initialized(self.config.mode).await?;
        let data: [u8; TIME_BLOCK_LEN] = (&raw).into();
        debug!("PCF8563: writing time block {:?}", data);
        self.write_registers(RegAddr::Seconds as u8, &data).await
    }

    /// Sets the date and time from a chrono `NaiveDateTime` (taken as UTC).
    pub async fn set_naive_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        let time = CalendarTime::try_from(datetime).map_err(PCF8563Error::DateTime)?;
        self.set_datetime(&time).await
    }

    /// Sets the host clock from the RTC.
    ///
    /// # Returns
    /// * `Ok(TimeReading)` - The time that was applied to the host clock
    /// * `Err(SyncError)` on device or host clock failure
    pub async fn sync_device_to_host_clock<C: HostClock>(
        &mut self,
        clock: &mut C,
    ) -> Result<TimeReading, SyncError<I2C::Error, C::Error>> {
        let reading = self.datetime().await?;
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
    pub async fn sync_host_clock_to_device<C: HostClock>(
        &mut self,
        clock: &mut C,
    ) -> Result<(), SyncError<I2C::Error, C::Error>> {
        let now = clock.now_utc().map_err(SyncError::HostClock)?;
        let time = host_calendar_time(&now)?;
        self.set_datetime(&time).await?;
        debug!("PCF8563: device clock set to {:?}", time);
        Ok(())
    }
}

// Register access implementations
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<I2C: I2c> PCF8563<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    #[doc = "\n\n# Returns"]
                    #[doc = concat!("* `Ok(", stringify!($typ), ")` - The register value on success")]
                    #[doc = "* `Err(PCF8563Error)` on error"]
                    pub async fn $name(&mut self) -> Result<$typ, PCF8563Error<I2C::Error>> {
                        let mut data = [0];
                        self.read_registers($regaddr as u8, &mut data).await?;
                        Ok(<$typ>::from(data[0]))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    #[doc = "\n\n# Arguments"]
                    #[doc = concat!("* `value` - The value to write to the ", stringify!($name), " register")]
                    #[doc = "\n\n# Returns"]
                    #[doc = "* `Ok(())` on success"]
                    #[doc = "* `Err(PCF8563Error)` on error"]
                    pub async fn [<set_ $name>](&mut self, value: $typ) -> Result<(), PCF8563Error<I2C::Error>> {
                        self.write_registers($regaddr as u8, &[value.into()]).await
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (control1, RegAddr::Control1, Control1),
    (control2, RegAddr::Control2, Control2),
    (clkout_control, RegAddr::ClkoutControl, ClkoutControl)
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::FakeClock;
    use crate::CalendarTimeError;
    use chrono::NaiveDate;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const DEVICE_ADDRESS: u8 = 0x51;

    async fn setup_mock(expectations: &[I2cTrans]) -> I2cMock {
        I2cMock::new(expectations)
    }

    fn init_expectations(mode: u8) -> Vec<I2cTrans> {
        vec![
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Control1 as u8, 0x00]),
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Control2 as u8, mode]),
        ]
    }

    #[tokio::test]
    async fn test_async_ensure_initialized_once() {
        let mock = setup_mock(&init_expectations(0x13)).await;
        let mut dev = PCF8563::new(mock, DEVICE_ADDRESS);

        dev.ensure_initialized(0xFF).await.unwrap();
        dev.ensure_initialized(0xFF).await.unwrap();
        assert!(dev.is_initialized());
        dev.release().done();
    }

    #[tokio::test]
    async fn test_async_init_failure_then_retry() {
        let mut expectations = vec![I2cTrans::write(
            DEVICE_ADDRESS,
            vec![RegAddr::Control1 as u8, 0x00],
        )
        .with_error(ErrorKind::Other)];
        expectations.extend(init_expectations(0x00));
        let mock = setup_mock(&expectations).await;
        let mut dev = PCF8563::new(mock, DEVICE_ADDRESS);

        assert!(matches!(
            dev.ensure_initialized(0x00).await,
            Err(PCF8563Error::Init(ErrorKind::Other))
        ));
        assert!(!dev.is_initialized());
        dev.ensure_initialized(0x00).await.unwrap();
        assert!(dev.is_initialized());
        dev.release().done();
    }

    #[tokio::test]
    async fn test_async_read_datetime() {
        let mut expectations = init_expectations(0x00);
        expectations.push(I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![RegAddr::Seconds as u8],
            vec![0x00, 0x25, 0x16, 0x06, 0x03, 0x83, 0x22],
        ));
        let mock = setup_mock(&expectations).await;
        let mut dev = PCF8563::new_default(mock);

        let reading = dev.datetime().await.unwrap();
        assert_eq!(
            reading.time,
            CalendarTime {
                second: 0,
                minute: 25,
                hour: 16,
                day: 6,
                weekday: 3,
                month: 3,
                year: 2022,
            }
        );
        assert!(reading.integrity_ok);
        dev.release().done();
    }

    #[tokio::test]
    async fn test_async_set_datetime() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();

        let mut expectations = init_expectations(0x00);
        expectations.push(I2cTrans::write(
            DEVICE_ADDRESS,
            vec![
                RegAddr::Seconds as u8,
                0x00, // seconds
                0x30, // minutes
                0x15, // hours
                0x14, // day
                0x04, // weekday (Thursday)
                0x83, // month with century flag
                0x24, // year
            ],
        ));
        let mock = setup_mock(&expectations).await;
        let mut dev = PCF8563::new(mock, DEVICE_ADDRESS);

        dev.set_naive_datetime(&dt).await.unwrap();
        dev.release().done();
    }

    #[tokio::test]
    async fn test_async_set_invalid_datetime_never_touches_bus() {
        let mock = setup_mock(&[]).await;
        let mut dev = PCF8563::new(mock, DEVICE_ADDRESS);

        let invalid = CalendarTime {
            second: 0,
            minute: 0,
            hour: 24,
            day: 1,
            weekday: 0,
            month: 1,
            year: 2024,
        };
        assert!(matches!(
            dev.set_datetime(&invalid).await,
            Err(PCF8563Error::DateTime(CalendarTimeError::InvalidDateTime))
        ));
        dev.release().done();
    }

    #[tokio::test]
    async fn test_async_sync_roundtrip() {
        let host_time = NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        // 1999-12-31 is a Friday
        let registers = vec![0x58, 0x59, 0x23, 0x31, 0x05, 0x12, 0x99];

        let mut expectations = init_expectations(0x00);
        let mut frame = vec![RegAddr::Seconds as u8];
        frame.extend_from_slice(&registers);
        expectations.push(I2cTrans::write(DEVICE_ADDRESS, frame));
        expectations.push(I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![RegAddr::Seconds as u8],
            registers,
        ));
        let mock = setup_mock(&expectations).await;
        let mut dev = PCF8563::new(mock, DEVICE_ADDRESS);
        let mut clock = FakeClock::at(host_time);

        dev.sync_host_clock_to_device(&mut clock).await.unwrap();
        let reading = dev.sync_device_to_host_clock(&mut clock).await.unwrap();
        assert!(reading.integrity_ok);
        assert_eq!(clock.set_to, Some(host_time.and_utc().timestamp()));
        dev.release().done();
    }

    #[tokio::test]
    async fn test_async_register_operations() {
        let mock = setup_mock(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![RegAddr::Control2 as u8], vec![0x04]),
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Control2 as u8, 0x00]),
            I2cTrans::write_read(
                DEVICE_ADDRESS,
                vec![RegAddr::ClkoutControl as u8],
                vec![0x00],
            ),
        ])
        .await;
        let mut dev = PCF8563::new(mock, DEVICE_ADDRESS);

        let mut control2 = dev.control2().await.unwrap();
        assert!(control2.timer_flag());
        control2.set_timer_flag(false);
        dev.set_control2(control2).await.unwrap();

        let clkout = dev.clkout_control().await.unwrap();
        assert!(!clkout.enabled());
        assert!(!dev.is_initialized());
        dev.release().done();
    }
    #[tokio::test]
    async fn test_async_state_and_config_accessors() {
        let mock = setup_mock(&init_expectations(0x11)).await;
        let mut dev = PCF8563::with_config(mock, DEVICE_ADDRESS, Config { mode: 0x11 });
        assert_eq!(dev.config(), &Config { mode: 0x11 });
        assert_eq!(dev.init_state(), InitState::Uninitialized);

        dev.ensure_initialized(dev.config().mode).await.unwrap();
        assert_eq!(dev.init_state(), InitState::Ready);
        dev.release().done();
    }

    #[tokio::test]
    async fn test_async_burst_past_last_register_never_touches_bus() {
        let mock = setup_mock(&[]).await;
        let mut dev = PCF8563::new(mock, DEVICE_ADDRESS);

        assert!(matches!(
            dev.write_registers(RegAddr::Timer as u8, &[0xAA, 0xBB]).await,
            Err(PCF8563Error::BurstTooLong)
        ));
        let mut data = [0u8; TIME_BLOCK_LEN];
        assert!(matches!(
            dev.read_registers(RegAddr::HourAlarm as u8, &mut data).await,
            Err(PCF8563Error::BurstTooLong)
        ));
        dev.release().done();
    }
}
