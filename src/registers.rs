//! Register definitions and bitfield structures for the PCF8563 RTC.
//!
//! This module contains the register addresses, bitfield definitions, and
//! related types for interacting with the PCF8563 register bank.
//!
//! The time block occupies seven consecutive registers starting at
//! [`RegAddr::Seconds`]. Two of those registers carry a status bit in their
//! top bit that is not part of the BCD value:
//! - Seconds bit 7: clock integrity is no longer guaranteed (VL)
//! - Months bit 7: century flag (set for 2000-2099)

use bitfield::bitfield;

/// Register addresses for the PCF8563 RTC.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Control/status register 1
    Control1 = 0x00,
    /// Control/status register 2 (interrupt and timer mode)
    Control2 = 0x01,
    /// Seconds register (0-59) plus clock integrity flag
    Seconds = 0x02,
    /// Minutes register (0-59)
    Minutes = 0x03,
    /// Hours register (0-23)
    Hours = 0x04,
    /// Days register (1-31)
    Days = 0x05,
    /// Weekdays register (0-6)
    Weekdays = 0x06,
    /// Months register (1-12) plus century flag
    Months = 0x07,
    /// Years register (0-99)
    Years = 0x08,
    /// Minute alarm register
    MinuteAlarm = 0x09,
    /// Hour alarm register
    HourAlarm = 0x0A,
    /// Day alarm register
    DayAlarm = 0x0B,
    /// Weekday alarm register
    WeekdayAlarm = 0x0C,
    /// CLKOUT control register
    ClkoutControl = 0x0D,
    /// Timer control register
    TimerControl = 0x0E,
    /// Timer countdown value register
    Timer = 0x0F,
}

/// Number of registers in the time block (seconds through years).
pub const TIME_BLOCK_LEN: usize = 7;

/// Number of registers in the device's register bank.
pub const REGISTER_COUNT: usize = 16;

/// Control 2 bits a caller-supplied mode may set: TI_TP, AIE and TIE.
pub const CONTROL2_MODE_MASK: u8 = 0b0001_0011;

/// CLKOUT output frequency.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClkoutFrequency {
    /// 32.768 kHz
    Hz32768 = 0b00,
    /// 1.024 kHz
    Hz1024 = 0b01,
    /// 32 Hz
    Hz32 = 0b10,
    /// 1 Hz
    Hz1 = 0b11,
}
impl From<u8> for ClkoutFrequency {
    /// Creates a `ClkoutFrequency` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0b00, 0b01, 0b10, or 0b11.
    fn from(v: u8) -> Self {
        match v {
            0b00 => ClkoutFrequency::Hz32768,
            0b01 => ClkoutFrequency::Hz1024,
            0b10 => ClkoutFrequency::Hz32,
            0b11 => ClkoutFrequency::Hz1,
            _ => panic!("Invalid value for ClkoutFrequency: {}", v),
        }
    }
}
impl From<ClkoutFrequency> for u8 {
    /// Converts a `ClkoutFrequency` to its raw register value.
    fn from(v: ClkoutFrequency) -> Self {
        v as u8
    }
}

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Control/status register 1.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Control1(u8);
    impl Debug;
    /// EXT_CLK test mode
    pub test_mode, set_test_mode: 7;
    /// RTC clock stopped
    pub stop, set_stop: 5;
    /// Power-on reset override
    pub power_on_reset_override, set_power_on_reset_override: 3;
}
from_register_u8!(Control1);

bitfield! {
    /// Control/status register 2: interrupt enables and flags.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Control2(u8);
    impl Debug;
    /// INT pulses instead of following the timer flag
    pub timer_interrupt_pulse, set_timer_interrupt_pulse: 4;
    /// Alarm triggered flag
    pub alarm_flag, set_alarm_flag: 3;
    /// Timer countdown flag
    pub timer_flag, set_timer_flag: 2;
    /// Alarm interrupt enable
    pub alarm_interrupt_enable, set_alarm_interrupt_enable: 1;
    /// Timer interrupt enable
    pub timer_interrupt_enable, set_timer_interrupt_enable: 0;
}
from_register_u8!(Control2);

impl Control2 {
    /// Builds the Control 2 value written during initialization.
    ///
    /// Only the bits in [`CONTROL2_MODE_MASK`] survive; the alarm and timer
    /// flags are always written as zero.
    pub fn from_mode(mode: u8) -> Self {
        Control2(mode & CONTROL2_MODE_MASK)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Control2 {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Control2(");
        let mut first = true;
        for (set, name) in [
            (self.timer_interrupt_pulse(), "TI_TP"),
            (self.alarm_flag(), "AF"),
            (self.timer_flag(), "TF"),
            (self.alarm_interrupt_enable(), "AIE"),
            (self.timer_interrupt_enable(), "TIE"),
        ] {
            if !set {
                continue;
            }
            if !first {
                defmt::write!(f, ", ");
            }
            defmt::write!(f, "{}", name);
            first = false;
        }
        if first {
            defmt::write!(f, "clear");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Seconds register (0-59) with BCD encoding and the clock integrity flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Seconds(u8);
    impl Debug;
    /// Clock integrity is not guaranteed (VL)
    pub integrity_lost, set_integrity_lost: 7;
    /// Tens place of seconds (0-5)
    pub ten_seconds, set_ten_seconds: 6, 4;
    /// Ones place of seconds (0-9)
    pub seconds, set_seconds: 3, 0;
}
from_register_u8!(Seconds);

#[cfg(feature = "defmt")]
impl defmt::Format for Seconds {
    fn format(&self, f: defmt::Formatter) {
        let seconds = 10 * self.ten_seconds() + self.seconds();
        defmt::write!(f, "Seconds({}s", seconds);
        if self.integrity_lost() {
            defmt::write!(f, ", VL");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Minutes register (0-59) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Minutes(u8);
    impl Debug;
    /// Tens place of minutes (0-5)
    pub ten_minutes, set_ten_minutes: 6, 4;
    /// Ones place of minutes (0-9)
    pub minutes, set_minutes: 3, 0;
}
from_register_u8!(Minutes);

bitfield! {
    /// Hours register (0-23) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Hours(u8);
    impl Debug;
    /// Tens place of hours (0-2)
    pub ten_hours, set_ten_hours: 5, 4;
    /// Ones place of hours (0-9)
    pub hours, set_hours: 3, 0;
}
from_register_u8!(Hours);

bitfield! {
    /// Days register (1-31) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Days(u8);
    impl Debug;
    /// Tens place of day of month (0-3)
    pub ten_days, set_ten_days: 5, 4;
    /// Ones place of day of month (0-9)
    pub days, set_days: 3, 0;
}
from_register_u8!(Days);

bitfield! {
    /// Weekdays register (0-6, 0 = Sunday).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Weekdays(u8);
    impl Debug;
    /// Day of week (0-6)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(Weekdays);

bitfield! {
    /// Months register (1-12) with BCD encoding and the century flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Months(u8);
    impl Debug;
    /// Century flag (set for years 2000-2099)
    pub century, set_century: 7;
    /// Tens place of month (0-1)
    pub ten_month, set_ten_month: 4, 4;
    /// Ones place of month (0-9)
    pub month, set_month: 3, 0;
}
from_register_u8!(Months);

#[cfg(feature = "defmt")]
impl defmt::Format for Months {
    fn format(&self, f: defmt::Formatter) {
        let month = 10 * self.ten_month() + self.month();
        defmt::write!(f, "Months({}", month);
        if self.century() {
            defmt::write!(f, ", C");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Years register (0-99) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Years(u8);
    impl Debug;
    /// Tens place of year (0-9)
    pub ten_year, set_ten_year: 7, 4;
    /// Ones place of year (0-9)
    pub year, set_year: 3, 0;
}
from_register_u8!(Years);

bitfield! {
    /// CLKOUT control register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct ClkoutControl(u8);
    impl Debug;
    /// CLKOUT output enabled
    pub enabled, set_enabled: 7;
    /// CLKOUT frequency
    pub from into ClkoutFrequency, frequency, set_frequency: 1, 0;
}
from_register_u8!(ClkoutControl);

#[cfg(feature = "defmt")]
impl defmt::Format for ClkoutControl {
    fn format(&self, f: defmt::Formatter) {
        if !self.enabled() {
            defmt::write!(f, "ClkoutControl(disabled)");
            return;
        }
        match self.frequency() {
            ClkoutFrequency::Hz32768 => defmt::write!(f, "ClkoutControl(32768 Hz)"),
            ClkoutFrequency::Hz1024 => defmt::write!(f, "ClkoutControl(1024 Hz)"),
            ClkoutFrequency::Hz32 => defmt::write!(f, "ClkoutControl(32 Hz)"),
            ClkoutFrequency::Hz1 => defmt::write!(f, "ClkoutControl(1 Hz)"),
        }
    }
}
