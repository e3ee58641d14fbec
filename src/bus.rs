//! Register transactions over I2C.
//!
//! Every operation here is one complete bus transaction: a write carries the
//! start register followed by the payload (the device auto-increments the
//! register pointer), and a read writes the register pointer and then reads
//! back after a repeated start. Nothing is cached between transactions and
//! nothing is retried; a failed transaction is reported as
//! [`PCF8563Error::I2c`].

use embedded_hal::i2c::I2c;

use crate::{PCF8563Error, REGISTER_COUNT};

/// Largest write frame: the register address plus one byte per register.
pub(crate) const MAX_FRAME_LEN: usize = REGISTER_COUNT + 1;

/// Returns `true` when `len` registers starting at `register` all lie inside
/// the register bank. The device pointer wraps after the last register, so a
/// burst past it would land on Control 1.
pub(crate) fn burst_fits(register: u8, len: usize) -> bool {
    usize::from(register) + len <= REGISTER_COUNT
}

/// Builds the write frame `[register, values...]`.
///
/// Returns the frame and the number of bytes of it to send, or `None` when
/// the burst would run past the end of the register bank.
pub(crate) fn burst_frame(register: u8, values: &[u8]) -> Option<([u8; MAX_FRAME_LEN], usize)> {
    if !burst_fits(register, values.len()) {
        return None;
    }
    let mut frame = [0u8; MAX_FRAME_LEN];
    frame[0] = register;
    frame[1..=values.len()].copy_from_slice(values);
    Some((frame, values.len() + 1))
}

/// An I2C device handle bound to a 7-bit address.
pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> RegisterBus<I2C> {
    /// Creates a register bus for the device at `address`.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// The 7-bit device address used for every transaction.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives back the underlying I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterBus<I2C> {
    /// Writes `values` to consecutive registers starting at `register`.
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(PCF8563Error::BurstTooLong)` if the burst runs past the last register
    /// * `Err(PCF8563Error::I2c)` on bus error
    pub fn write(&mut self, register: u8, values: &[u8]) -> Result<(), PCF8563Error<I2C::Error>> {
        let (frame, len) = burst_frame(register, values).ok_or(PCF8563Error::BurstTooLong)?;
        self.i2c.write(self.address, &frame[..len])?;
        Ok(())
    }

    /// Fills `buffer` from consecutive registers starting at `register`.
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(PCF8563Error::BurstTooLong)` if the burst runs past the last register
    /// * `Err(PCF8563Error::I2c)` on bus error
    pub fn read(
        &mut self,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        if !burst_fits(register, buffer.len()) {
            return Err(PCF8563Error::BurstTooLong);
        }
        self.i2c.write_read(self.address, &[register], buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const DEVICE_ADDRESS: u8 = 0x51;

    #[test]
    fn test_burst_frame() {
        let (frame, len) = burst_frame(0x02, &[0x11, 0x22, 0x33]).unwrap();
        assert_eq!(&frame[..len], &[0x02, 0x11, 0x22, 0x33]);

        let (frame, len) = burst_frame(0x00, &[]).unwrap();
        assert_eq!(&frame[..len], &[0x00]);

        assert!(burst_frame(0x00, &[0; REGISTER_COUNT]).is_some());
        assert!(burst_frame(0x00, &[0; REGISTER_COUNT + 1]).is_none());

        // The start register counts against the bank
        assert!(burst_frame(0x0F, &[0xAA]).is_some());
        assert!(burst_frame(0x0F, &[0xAA, 0xBB]).is_none());
        assert!(burst_frame(0x02, &[0; REGISTER_COUNT - 1]).is_none());
    }

    #[test]
    fn test_write_single_register() {
        let mock = I2cMock::new(&[I2cTrans::write(DEVICE_ADDRESS, vec![0x01, 0x13])]);
        let mut bus = RegisterBus::new(mock, DEVICE_ADDRESS);

        bus.write(0x01, &[0x13]).unwrap();
        bus.release().done();
    }

    #[test]
    fn test_write_burst() {
        let mock = I2cMock::new(&[I2cTrans::write(
            DEVICE_ADDRESS,
            vec![0x02, 0x00, 0x25, 0x16, 0x06, 0x03, 0x83, 0x22],
        )]);
        let mut bus = RegisterBus::new(mock, DEVICE_ADDRESS);

        bus.write(0x02, &[0x00, 0x25, 0x16, 0x06, 0x03, 0x83, 0x22])
            .unwrap();
        bus.release().done();
    }

    #[test]
    fn test_read_burst() {
        let mock = I2cMock::new(&[I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![0x02],
            vec![0x12, 0x34, 0x56],
        )]);
        let mut bus = RegisterBus::new(mock, DEVICE_ADDRESS);

        let mut data = [0u8; 3];
        bus.read(0x02, &mut data).unwrap();
        assert_eq!(data, [0x12, 0x34, 0x56]);
        bus.release().done();
    }

    #[test]
    fn test_bus_error_is_surfaced() {
        let mock = I2cMock::new(&[
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00, 0x00]).with_error(ErrorKind::Other),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x02], vec![0x00])
                .with_error(ErrorKind::Other),
        ]);
        let mut bus = RegisterBus::new(mock, DEVICE_ADDRESS);

        assert!(matches!(
            bus.write(0x00, &[0x00]),
            Err(PCF8563Error::I2c(ErrorKind::Other))
        ));
        let mut data = [0u8; 1];
        assert!(matches!(
            bus.read(0x02, &mut data),
            Err(PCF8563Error::I2c(ErrorKind::Other))
        ));
        bus.release().done();
    }

    #[test]
    fn test_oversized_burst_never_touches_bus() {
        let mock = I2cMock::new(&[]);
        let mut bus = RegisterBus::new(mock, DEVICE_ADDRESS);

        assert!(matches!(
            bus.write(0x00, &[0; REGISTER_COUNT + 1]),
            Err(PCF8563Error::BurstTooLong)
        ));
        let mut data = [0u8; REGISTER_COUNT + 1];
        assert!(matches!(
            bus.read(0x00, &mut data),
            Err(PCF8563Error::BurstTooLong)
        ));
        assert_eq!(bus.address(), DEVICE_ADDRESS);
        bus.release().done();
    }

    #[test]
    fn test_burst_past_last_register_never_touches_bus() {
        // Only the single in-bank transfers reach the device
        let mock = I2cMock::new(&[
            I2cTrans::write(DEVICE_ADDRESS, vec![0x0F, 0xAA]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0F], vec![0xAA]),
        ]);
        let mut bus = RegisterBus::new(mock, DEVICE_ADDRESS);

        assert!(matches!(
            bus.write(0x0F, &[0xAA, 0xBB]),
            Err(PCF8563Error::BurstTooLong)
        ));
        let mut data = [0u8; 2];
        assert!(matches!(
            bus.read(0x0F, &mut data),
            Err(PCF8563Error::BurstTooLong)
        ));
        let mut time_block = [0u8; 7];
        assert!(matches!(
            bus.read(0x0A, &mut time_block),
            Err(PCF8563Error::BurstTooLong)
        ));

        bus.write(0x0F, &[0xAA]).unwrap();
        let mut last = [0u8; 1];
        bus.read(0x0F, &mut last).unwrap();
        assert_eq!(last, [0xAA]);
        bus.release().done();
    }
}
