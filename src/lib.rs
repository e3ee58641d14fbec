//! A platform-agnostic driver for the PCF8563 family of I2C real-time clocks.
//!
//! The driver reads and writes the wall-clock time kept in the chip's
//! battery-backed registers and can keep a host clock and the RTC in step in
//! either direction.
//!
//! # Features
//!
//! - Blocking driver over `embedded-hal` I2C, async driver over
//!   `embedded-hal-async` with the `async` feature
//! - Validated BCD conversion with the month-register century flag (1900-2099)
//! - Clock integrity flag reported with every read
//! - One-time control register initialization tracked per driver instance
//! - Host clock synchronization through the [`HostClock`] trait
//! - Logging through `log` or `defmt`
//!
//! # Example
//!
//! ```rust,ignore
//! use pcf8563::{CalendarTime, PCF8563};
//!
//! let mut rtc = PCF8563::new_default(i2c);
//! rtc.ensure_initialized(0)?;
//!
//! rtc.set_datetime(&CalendarTime {
//!     second: 0,
//!     minute: 25,
//!     hour: 16,
//!     day: 6,
//!     weekday: 0,
//!     month: 3,
//!     year: 2022,
//! })?;
//!
//! let reading = rtc.datetime()?;
//! if !reading.integrity_ok {
//!     // the RTC lost power since the time was last set
//! }
//! ```
//!
//! # Concurrency
//!
//! All operations take `&mut self`; the driver owns its I2C handle and its
//! initialization state, so sharing it between execution contexts requires
//! wrapping the whole driver in the caller's mutex.
#![cfg_attr(not(test), no_std)]

// Logging goes to `log` or `defmt` when one of them is enabled. Without
// either, the macros still borrow their arguments so no variable becomes
// unused.
cfg_if::cfg_if! {
    if #[cfg(feature = "log")] {
        macro_rules! debug {
            ($($arg:tt)+) => { ::log::debug!($($arg)+) };
        }
        macro_rules! warn {
            ($($arg:tt)+) => { ::log::warn!($($arg)+) };
        }
        macro_rules! error {
            ($($arg:tt)+) => { ::log::error!($($arg)+) };
        }
    } else if #[cfg(feature = "defmt")] {
        macro_rules! debug {
            ($($arg:tt)+) => { ::defmt::debug!($($arg)+) };
        }
        macro_rules! warn {
            ($($arg:tt)+) => { ::defmt::warn!($($arg)+) };
        }
        macro_rules! error {
            ($($arg:tt)+) => { ::defmt::error!($($arg)+) };
        }
    } else {
        macro_rules! debug {
            ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( & $x, )*); }};
        }
        macro_rules! warn {
            ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( & $x, )*); }};
        }
        macro_rules! error {
            ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( & $x, )*); }};
        }
    }
}

#[cfg(feature = "async")]
pub mod asynch;
pub mod bus;
pub mod datetime;
pub mod registers;
pub mod sync;

use embedded_hal::i2c::I2c;

pub use crate::bus::RegisterBus;
pub use crate::datetime::{CalendarTime, CalendarTimeError, TimeReading, MAX_YEAR, MIN_YEAR};
pub use crate::registers::*;
pub use crate::sync::{HostClock, SyncError};

use crate::datetime::DeviceDateTime;

/// Default 7-bit I2C address (0xA2 write / 0xA3 read).
pub const DEFAULT_ADDRESS: u8 = 0x51;

/// Driver configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Control 2 mode written by the implicit initialization performed before
    /// the first time read or write. Only [`CONTROL2_MODE_MASK`] bits are used.
    pub mode: u8,
}

/// Whether the control registers have been configured by this driver.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitState {
    /// Control registers not yet written
    Uninitialized,
    /// Control registers written; stays here for the life of the driver
    Ready,
}

/// Errors returned by the PCF8563 driver.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PCF8563Error<I2CE> {
    /// I2C bus error
    I2c(I2CE),
    /// Calendar time out of range or not decodable
    DateTime(CalendarTimeError),
    /// A control register write failed during initialization
    Init(I2CE),
    /// A register burst longer than the register bank was requested
    BurstTooLong,
}

impl<I2CE> From<I2CE> for PCF8563Error<I2CE> {
    fn from(e: I2CE) -> Self {
        PCF8563Error::I2c(e)
    }
}

/// PCF8563 Real-Time Clock driver.
pub struct PCF8563<I2C> {
    bus: RegisterBus<I2C>,
    config: Config,
    state: InitState,
}

macro_rules! set_and_get_register {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        $(
            paste::paste! {
                #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                #[doc = ""]
                #[doc = "This does not change the initialization state."]
                pub fn [< set_ $name >](&mut self, value: $typ) -> Result<(), PCF8563Error<I2C::Error>> {
                    self.bus.write($regaddr as u8, &[value.into()])
                }
            }

            #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
            pub fn $name(&mut self) -> Result<$typ, PCF8563Error<I2C::Error>> {
                let mut data = [0];
                self.bus.read($regaddr as u8, &mut data)?;
                Ok(<$typ>::from(data[0]))
            }
        )+
    }
}

impl<I2C> PCF8563<I2C> {
    /// Creates a new driver for the device at `address` with the default
    /// configuration.
    ///
    /// No bus traffic happens until the first operation.
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
            bus: RegisterBus::new(i2c, address),
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
        self.bus.release()
    }
}

impl<I2C: I2c> PCF8563<I2C> {
    /// Configures the control registers once per driver.
    ///
    /// Writes 0 to Control 1, then `mode & CONTROL2_MODE_MASK` to Control 2.
    /// When already [`InitState::Ready`] this returns immediately without bus
    /// access. On failure the state stays [`InitState::Uninitialized`] so the
    /// next call retries.
    ///
    /// # Returns
    /// * `Ok(())` on success or when already initialized
    /// * `Err(PCF8563Error::Init)` if a control register write failed
    pub fn ensure_initialized(&mut self, mode: u8) -> Result<(), PCF8563Error<I2C::Error>> {
        if self.state == InitState::Ready {
            return Ok(());
        }
        let control2 = Control2::from_mode(mode);
        debug!("PCF8563: initializing, control2={:?}", control2);
        self.write_control(RegAddr::Control1, Control1::default().into())?;
        self.write_control(RegAddr::Control2, control2.into())?;
        self.state = InitState::Ready;
        debug!("PCF8563: ready");
        Ok(())
    }

    fn write_control(&mut self, register: RegAddr, value: u8) -> Result<(), PCF8563Error<I2C::Error>> {
        self.bus
            .write(register as u8, &[value])
            .map_err(|e| match e {
                PCF8563Error::I2c(e) => {
                    error!("PCF8563: control register {:?} write failed", register);
                    PCF8563Error::Init(e)
                }
                other => other,
            })
    }

    fn read_raw_datetime(&mut self) -> Result<DeviceDateTime, PCF8563Error<I2C::Error>> {
        let mut data = [0; TIME_BLOCK_LEN];
        self.bus.read(RegAddr::Seconds as u8, &mut data)?;
        debug!("PCF8563: read time block {:?}", data);
        Ok(data.into())
    }

    fn write_raw_datetime(
        &mut self,
        datetime: &DeviceDateTime,
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        let data: [u8; TIME_BLOCK_LEN] = datetime.into();
        debug!("PCF8563: writing time block {:?}", data);
        self.bus.write(RegAddr::Seconds as u8, &data)
    }

    /// Reads the current date and time from the device.
    ///
    /// Initializes the device first if needed, using [`Config::mode`].
    ///
    /// # Returns
    /// * `Ok(TimeReading)` - the decoded time and the clock integrity flag
    /// * `Err(PCF8563Error)` on bus error or if the registers do not decode
    pub fn datetime(&mut self) -> Result<TimeReading, PCF8563Error<I2C::Error>> {
        self.ensure_initialized(self.config.mode)?;
        let raw = self.read_raw_datetime()?;
        let reading = raw.into_reading().map_err(PCF8563Error::DateTime)?;
        if !reading.integrity_ok {
            warn!("PCF8563: clock integrity is not guaranteed");
        }
        Ok(reading)
    }

    /// Sets the date and time on the device in a single 7-register burst.
    ///
    /// The value is validated before any bus access, including the implicit
    /// initialization, so an invalid time leaves the device untouched.
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(PCF8563Error::DateTime)` if a field is out of range
    /// * `Err(PCF8563Error)` on bus error
    pub fn set_datetime(&mut self, datetime: &CalendarTime) -> Result<(), PCF8563Error<I2C::Error>> {
        let raw = DeviceDateTime::from_calendar_time(datetime).map_err(PCF8563Error::DateTime)?;
        self.ensure_initialized(self.config.mode)?;
        self.write_raw_datetime(&raw)
    }

    /// Sets the date and time from a chrono `NaiveDateTime` (taken as UTC).
    ///
    /// The weekday register is derived from the date.
    pub fn set_naive_datetime(
        &mut self,
        datetime: &chrono::NaiveDateTime,
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        let time = CalendarTime::try_from(datetime).map_err(PCF8563Error::DateTime)?;
        self.set_datetime(&time)
    }

    set_and_get_register!(
        (control1, RegAddr::Control1, Control1),
        (control2, RegAddr::Control2, Control2),
        (clkout_control, RegAddr::ClkoutControl, ClkoutControl)
    );
}
