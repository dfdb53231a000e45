//! # OPT3001 Digital Ambient Light Sensor Driver
//!
//! This crate provides a `no_std` driver for the Texas Instruments OPT3001 single-chip
//! ambient light sensor. The driver is blocking by default; an async flavor is available
//! behind the `async` feature.
//!
//! The OPT3001 exposes six 16-bit registers behind a one-byte register pointer: a result
//! register, a configuration register, low/high limit registers and two identification
//! registers. The result and limit registers share a compact floating-point-like
//! encoding (4-bit exponent, 12-bit mantissa) which this driver decodes to lux.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use opt3001::{ConversionMode, Opt3001};
//!
//! let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! let delay = embedded_hal_mock::eh1::delay::NoopDelay;
//! let mut sensor = Opt3001::new(i2c, delay);
//!
//! // Verify the sensor is present (manufacturer ID reads "TI").
//! assert_eq!(sensor.manufacturer_id().unwrap(), 0x5449);
//!
//! // Start continuous conversions.
//! let mut config = opt3001::Config::default();
//! config.set_mode(ConversionMode::Continuous);
//! sensor.write_config(config).unwrap();
//!
//! let measurement = sensor.read_result().unwrap();
//! println!("Ambient light: {} lux", measurement.lux);
//! ```
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod fmt; // <-- must be first module!

#[cfg(test)]
#[macro_use]
extern crate std;

#[cfg(not(feature = "async"))]
use embedded_hal::{delay::DelayNs, i2c::I2c};
#[cfg(feature = "async")]
use embedded_hal_async::{delay::DelayNs, i2c::I2c};

use embedded_hal::i2c::{Error as I2cError, ErrorKind, NoAcknowledgeSource};

/// Default 7-bit I2C address (ADDR pin tied to GND).
///
/// The ADDR pin selects one of four addresses: 0x44 (GND), 0x45 (VDD),
/// 0x46 (SDA) or 0x47 (SCL).
pub const DEFAULT_ADDRESS: u8 = 0x44;

/// Interval between read attempts while waiting for the sensor to hand out a
/// register, in milliseconds.
pub const POLL_INTERVAL_MS: u32 = 10;

/// Maximum number of read attempts before a register read is abandoned with
/// [`Error::Timeout`].
pub const POLL_ATTEMPTS: u32 = 250;

/// Register addresses for the OPT3001 sensor.
///
/// These are the one-byte pointer values written on the bus to select a register;
/// they are fixed by the chip.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Conversion result register (0x00, read-only)
    Result = 0x00,
    /// Configuration register (0x01)
    Config = 0x01,
    /// Low comparison limit register (0x02)
    LowLimit = 0x02,
    /// High comparison limit register (0x03)
    HighLimit = 0x03,
    /// Manufacturer ID register (0x7E, reads 0x5449, "TI")
    ManufacturerId = 0x7E,
    /// Device ID register (0x7F, reads 0x3001)
    DeviceId = 0x7F,
}

impl From<Register> for u8 {
    fn from(r: Register) -> Self {
        r as u8
    }
}

/// Conversion mode field of the configuration register (bits 10:9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionMode {
    /// No conversions, lowest power (0b00)
    Shutdown,
    /// One conversion, then automatic return to shutdown (0b01)
    SingleShot,
    /// Back-to-back conversions (0b10; the chip treats 0b11 the same)
    Continuous,
}

impl From<ConversionMode> for u8 {
    fn from(mode: ConversionMode) -> Self {
        match mode {
            ConversionMode::Shutdown => 0b00,
            ConversionMode::SingleShot => 0b01,
            ConversionMode::Continuous => 0b10,
        }
    }
}

impl From<u8> for ConversionMode {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => ConversionMode::Shutdown,
            0b01 => ConversionMode::SingleShot,
            _ => ConversionMode::Continuous,
        }
    }
}

/// Conversion time field of the configuration register (bit 11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionTime {
    /// 100 ms per conversion
    Ms100,
    /// 800 ms per conversion
    Ms800,
}

/// Configuration register contents.
///
/// A thin wrapper around the raw 16-bit register value with shift/mask accessors for the
/// documented fields. The raw value and the field view are two interpretations of the
/// same word; no semantic validation is performed, any 16-bit pattern passes through
/// unchanged.
///
/// The status fields (conversion-ready, overflow and the limit flags) are read-only on
/// the chip, so only getters are provided for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config(u16);

impl Config {
    /// Wraps a raw 16-bit configuration word.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw 16-bit configuration word.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Fault count field (bits 1:0): number of consecutive out-of-limit conversions
    /// required before the limit flags are raised (0b00 = 1 fault .. 0b11 = 8 faults).
    #[must_use]
    pub const fn fault_count(self) -> u8 {
        (self.0 & 0x0003) as u8
    }

    /// Sets the fault count field. Only the low two bits of `count` are used.
    pub fn set_fault_count(&mut self, count: u8) {
        self.0 = (self.0 & !0x0003) | u16::from(count & 0x03);
    }

    /// Mask-exponent field (bit 2): forces the result exponent to zero when a manual
    /// full-scale range is selected.
    #[must_use]
    pub const fn mask_exponent(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// Sets the mask-exponent field.
    pub fn set_mask_exponent(&mut self, on: bool) {
        self.0 = (self.0 & !(1 << 2)) | (u16::from(on) << 2);
    }

    /// Interrupt polarity field (bit 3): `false` = INT pin active low, `true` = active high.
    #[must_use]
    pub const fn polarity(self) -> bool {
        self.0 & (1 << 3) != 0
    }

    /// Sets the interrupt polarity field.
    pub fn set_polarity(&mut self, active_high: bool) {
        self.0 = (self.0 & !(1 << 3)) | (u16::from(active_high) << 3);
    }

    /// Latch field (bit 4): `true` latches the limit flags until the configuration
    /// register is read, `false` makes them transparent.
    #[must_use]
    pub const fn latch(self) -> bool {
        self.0 & (1 << 4) != 0
    }

    /// Sets the latch field.
    pub fn set_latch(&mut self, latched: bool) {
        self.0 = (self.0 & !(1 << 4)) | (u16::from(latched) << 4);
    }

    /// Flag-low status field (bit 5): the result dropped below the low limit.
    #[must_use]
    pub const fn flag_low(self) -> bool {
        self.0 & (1 << 5) != 0
    }

    /// Flag-high status field (bit 6): the result exceeded the high limit.
    #[must_use]
    pub const fn flag_high(self) -> bool {
        self.0 & (1 << 6) != 0
    }

    /// Conversion-ready status field (bit 7): a conversion has completed since the
    /// configuration register was last read.
    #[must_use]
    pub const fn conversion_ready(self) -> bool {
        self.0 & (1 << 7) != 0
    }

    /// Overflow status field (bit 8): the conversion saturated the selected range.
    #[must_use]
    pub const fn overflow(self) -> bool {
        self.0 & (1 << 8) != 0
    }

    /// Conversion mode field (bits 10:9).
    #[must_use]
    pub fn mode(self) -> ConversionMode {
        ConversionMode::from(((self.0 >> 9) & 0b11) as u8)
    }

    /// Sets the conversion mode field.
    pub fn set_mode(&mut self, mode: ConversionMode) {
        self.0 = (self.0 & !(0b11 << 9)) | (u16::from(u8::from(mode)) << 9);
    }

    /// Conversion time field (bit 11).
    #[must_use]
    pub const fn conversion_time(self) -> ConversionTime {
        if self.0 & (1 << 11) != 0 {
            ConversionTime::Ms800
        } else {
            ConversionTime::Ms100
        }
    }

    /// Sets the conversion time field.
    pub fn set_conversion_time(&mut self, time: ConversionTime) {
        let bit = matches!(time, ConversionTime::Ms800);
        self.0 = (self.0 & !(1 << 11)) | (u16::from(bit) << 11);
    }

    /// Range number field (bits 15:12): full-scale range exponent; 0b1100 selects
    /// automatic ranging.
    #[must_use]
    pub const fn range_number(self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// Sets the range number field. Only the low four bits of `range` are used.
    pub fn set_range_number(&mut self, range: u8) {
        self.0 = (self.0 & !(0xF << 12)) | (u16::from(range & 0x0F) << 12);
    }
}

impl Default for Config {
    /// The chip's power-on reset value: automatic range, 800 ms conversions,
    /// shutdown mode, latched limit flags.
    fn default() -> Self {
        Self(0xC810)
    }
}

/// Raw contents of the result, low-limit or high-limit register.
///
/// All three registers share the chip's compact floating-point-like encoding:
/// a 4-bit exponent in bits 15:12 and a 12-bit mantissa in bits 11:0, with
/// `lux = 0.01 * 2^exponent * mantissa`. Both fields are unsigned; the exponent
/// only ever scales upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResultWord(u16);

impl ResultWord {
    /// Wraps a raw 16-bit register value.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw 16-bit register value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Exponent field (bits 15:12). The chip only produces 0..=11; larger values
    /// appear in hand-constructed words only.
    #[must_use]
    pub const fn exponent(self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// Mantissa field (bits 11:0).
    #[must_use]
    pub const fn mantissa(self) -> u16 {
        self.0 & 0x0FFF
    }

    /// Decodes the register value to lux: `0.01 * 2^exponent * mantissa`.
    ///
    /// The decoding is pure; equal raw words always produce the same lux.
    #[must_use]
    pub fn lux(self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let scale = (1u32 << self.exponent()) as f32;
        0.01 * scale * f32::from(self.mantissa())
    }
}

/// A decoded reading from the result or limit registers.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Illuminance in lux, decoded from `raw`
    pub lux: f32,
    /// Raw register contents the lux value was derived from
    pub raw: ResultWord,
}

/// OPT3001 ambient light sensor driver.
///
/// The driver holds the device's 7-bit bus address and owns the I2C bus handle and delay
/// provider it was constructed with; it keeps no other state, and every public operation
/// is a single self-contained register transaction. The driver performs no locking —
/// callers sharing one sensor across threads must serialize access themselves.
///
/// The chip's register protocol is two-phase: a one-byte write selects the register
/// pointer, then a two-byte read returns the register contents, most significant byte
/// first. Only the configuration register is writable through this driver.
pub struct Opt3001<I2C, D> {
    /// I2C interface for communication with the sensor
    i2c: I2C,
    /// 7-bit I2C address of the sensor
    address: u8,
    /// Delay implementation used while polling for data
    delay: D,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D> Opt3001<I2C, D>
where
    I2C: I2c<Error = E>,
    E: I2cError,
    D: DelayNs,
{
    /// Creates a new driver instance using the default I2C address
    /// ([`DEFAULT_ADDRESS`], ADDR pin to GND).
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use opt3001::Opt3001;
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let mut sensor = Opt3001::new(i2c, delay);
    /// ```
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::new_with_address(i2c, DEFAULT_ADDRESS, delay)
    }

    /// Creates a new driver instance with an explicit I2C address.
    ///
    /// The OPT3001's ADDR pin selects one of 0x44..=0x47; use this constructor when the
    /// pin is not tied to GND.
    pub fn new_with_address(i2c: I2C, address: u8, delay: D) -> Self {
        Self {
            i2c,
            address,
            delay,
        }
    }

    /// Consumes the driver and returns the I2C bus and delay provider.
    pub fn destroy(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Reads the manufacturer ID register.
    ///
    /// A present and healthy OPT3001 returns 0x5449 (ASCII "TI").
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    /// * `Err(Error::Timeout)` - If the sensor did not produce data in time
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use opt3001::Opt3001;
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let mut sensor = Opt3001::new(i2c, delay);
    ///
    /// if sensor.manufacturer_id().unwrap() == 0x5449 {
    ///     println!("OPT3001 detected");
    /// }
    /// ```
    pub async fn manufacturer_id(&mut self) -> Result<u16, Error<E>> {
        self.register_read(Register::ManufacturerId).await
    }

    /// Reads the device ID register.
    ///
    /// A present and healthy OPT3001 returns 0x3001.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    /// * `Err(Error::Timeout)` - If the sensor did not produce data in time
    pub async fn device_id(&mut self) -> Result<u16, Error<E>> {
        self.register_read(Register::DeviceId).await
    }

    /// Reads the configuration register.
    ///
    /// Note that reading the configuration register clears the latched limit flags and
    /// the conversion-ready flag on the chip.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    /// * `Err(Error::Timeout)` - If the sensor did not produce data in time
    pub async fn read_config(&mut self) -> Result<Config, Error<E>> {
        let raw = self.register_read(Register::Config).await?;
        Ok(Config::from_raw(raw))
    }

    /// Writes the configuration register.
    ///
    /// This is the only register write the driver performs; the result and limit
    /// registers are treated as read-only.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use opt3001::{Config, ConversionMode, Opt3001};
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let mut sensor = Opt3001::new(i2c, delay);
    ///
    /// let mut config = Config::default();
    /// config.set_mode(ConversionMode::Continuous);
    /// sensor.write_config(config).unwrap();
    /// ```
    pub async fn write_config(&mut self, config: Config) -> Result<(), Error<E>> {
        self.write_word(Register::Config, config.raw()).await
    }

    /// Reads the result register and decodes it to lux.
    ///
    /// The register holds the most recently completed conversion; a conversion in
    /// flight simply leaves the previous result in place. Use the conversion-ready
    /// flag in the configuration register to detect fresh data.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    /// * `Err(Error::Timeout)` - If the sensor did not produce data in time
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use opt3001::Opt3001;
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let mut sensor = Opt3001::new(i2c, delay);
    ///
    /// let measurement = sensor.read_result().unwrap();
    /// println!(
    ///     "{} lux (raw 0x{:04X})",
    ///     measurement.lux,
    ///     measurement.raw.raw()
    /// );
    /// ```
    pub async fn read_result(&mut self) -> Result<Measurement, Error<E>> {
        self.read_measurement(Register::Result).await
    }

    /// Reads the high comparison limit register, decoded to lux.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    /// * `Err(Error::Timeout)` - If the sensor did not produce data in time
    pub async fn read_high_limit(&mut self) -> Result<Measurement, Error<E>> {
        self.read_measurement(Register::HighLimit).await
    }

    /// Reads the low comparison limit register, decoded to lux.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    /// * `Err(Error::Timeout)` - If the sensor did not produce data in time
    pub async fn read_low_limit(&mut self) -> Result<Measurement, Error<E>> {
        self.read_measurement(Register::LowLimit).await
    }

    async fn read_measurement(&mut self, register: Register) -> Result<Measurement, Error<E>> {
        let raw = ResultWord::from_raw(self.register_read(register).await?);
        Ok(Measurement {
            lux: raw.lux(),
            raw,
        })
    }

    /// Writes the one-byte register pointer, selecting `register` for the next read.
    ///
    /// This is the first half of the chip's two-phase read protocol. Most applications
    /// should use the higher-level read functions instead of calling this directly.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    pub async fn write_command(&mut self, register: Register) -> Result<(), Error<E>> {
        trace!("select register {:#x}", register as u8);
        self.i2c.write(self.address, &[register.into()]).await?;
        Ok(())
    }

    /// Writes a 16-bit word to `register` as three bytes on the wire: the register
    /// pointer, then the word most significant byte first.
    ///
    /// Of the registers this driver touches only the configuration register accepts a
    /// payload; prefer [`write_config`](Self::write_config).
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    pub async fn write_word(&mut self, register: Register, word: u16) -> Result<(), Error<E>> {
        trace!("write register {:#x} = {:#x}", register as u8, word);
        let bytes = word.to_be_bytes();
        let buffer = [register.into(), bytes[0], bytes[1]];
        self.i2c.write(self.address, &buffer).await?;
        Ok(())
    }

    /// Reads two bytes from the device and assembles them big-endian.
    ///
    /// This is the second half of the two-phase read protocol; a prior successful
    /// [`write_command`](Self::write_command) must have pointed at the target register.
    ///
    /// The read is polled: an address or data NACK from the sensor counts as "data not
    /// ready" and is retried after [`POLL_INTERVAL_MS`] milliseconds, up to
    /// [`POLL_ATTEMPTS`] attempts. A read that succeeds on the first attempt performs no
    /// delay at all. Any other bus fault is returned immediately. The loop itself is not
    /// cancellable; callers needing cancellation must wrap the call externally.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Timeout)` - If the sensor did not produce data within the poll ceiling
    /// * `Err(Error::I2c(E))` - If there was a non-NACK I2C communication error
    pub async fn read_word(&mut self) -> Result<u16, Error<E>> {
        let mut buffer = [0u8; 2];
        for _ in 0..POLL_ATTEMPTS {
            match self.i2c.read(self.address, &mut buffer).await {
                Ok(()) => return Ok(u16::from_be_bytes(buffer)),
                Err(e) if matches!(e.kind(), ErrorKind::NoAcknowledge(_)) => {
                    self.delay.delay_ms(POLL_INTERVAL_MS).await;
                }
                Err(e) => return Err(Error::I2c(e)),
            }
        }
        warn!("no data from sensor after {} poll attempts", POLL_ATTEMPTS);
        Err(Error::Timeout)
    }

    /// Reads a register: writes the register pointer, then reads back the 16-bit word.
    ///
    /// If the pointer write fails its error is returned immediately and no read is
    /// attempted.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2c(E))` - If there was an I2C communication error
    /// * `Err(Error::Timeout)` - If the sensor did not produce data in time
    pub async fn register_read(&mut self, register: Register) -> Result<u16, Error<E>> {
        self.write_command(register).await?;
        self.read_word().await
    }
}

/// Error type for OPT3001 sensor operations.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: core::fmt::Debug> {
    /// I2C communication error from the underlying bus
    I2c(E),
    /// The sensor did not produce data within the poll ceiling
    Timeout,
}

impl<E: I2cError> Error<E> {
    /// Returns the numeric error code family used by legacy OPT3001 host drivers:
    /// −10 × the bus status (data too long → −10, address NACK → −20, data NACK →
    /// −30, other faults → −40), with the reserved value −100 for a timeout.
    ///
    /// Only useful to callers porting code that matched on those codes; Rust callers
    /// should match on the enum instead.
    #[must_use]
    pub fn code(&self) -> i16 {
        let status: i16 = match self {
            Error::Timeout => return -100,
            Error::I2c(e) => match e.kind() {
                ErrorKind::Overrun => 1,
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => 3,
                ErrorKind::NoAcknowledge(_) => 2,
                _ => 4,
            },
        };
        -10 * status
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<E: core::fmt::Debug> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::I2c(error)
    }
}

#[cfg(all(test, not(feature = "async")))]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::{CheckedDelay, NoopDelay, Transaction as DelayTransaction};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};
    use std::vec::Vec;

    const ADDR: u8 = DEFAULT_ADDRESS;

    #[test]
    fn manufacturer_id() {
        let expectations = [
            Transaction::write(ADDR, vec![0x7E]),
            Transaction::read(ADDR, vec![0x54, 0x49]),
        ];
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.manufacturer_id().unwrap(), 0x5449);

        let (mut i2c, _) = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn device_id() {
        let expectations = [
            Transaction::write(ADDR, vec![0x7F]),
            Transaction::read(ADDR, vec![0x30, 0x01]),
        ];
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.device_id().unwrap(), 0x3001);

        let (mut i2c, _) = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn result_decoding_on_the_wire() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00]),
            Transaction::read(ADDR, vec![0x0A, 0x64]),
        ];
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), NoopDelay);

        let measurement = sensor.read_result().unwrap();
        assert_eq!(measurement.raw.raw(), 0x0A64);
        assert_eq!(measurement.raw.exponent(), 0);
        assert_eq!(measurement.raw.mantissa(), 2660);
        assert!((measurement.lux - 26.60).abs() < 1e-4);

        let (mut i2c, _) = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn config_round_trip() {
        // The config write goes out as [pointer, hi, lo]; a device echoing the same
        // word back must yield the identical raw value.
        let expectations = [
            Transaction::write(ADDR, vec![0x01, 0xC8, 0x10]),
            Transaction::write(ADDR, vec![0x01]),
            Transaction::read(ADDR, vec![0xC8, 0x10]),
        ];
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), NoopDelay);

        sensor.write_config(Config::default()).unwrap();
        let config = sensor.read_config().unwrap();
        assert_eq!(config.raw(), Config::default().raw());

        let (mut i2c, _) = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn limit_registers_use_the_result_encoding() {
        let expectations = [
            Transaction::write(ADDR, vec![0x03]),
            Transaction::read(ADDR, vec![0xBF, 0xFF]),
            Transaction::write(ADDR, vec![0x02]),
            Transaction::read(ADDR, vec![0x00, 0x00]),
        ];
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), NoopDelay);

        // 0xBFFF is the chip's full-scale limit: exponent 11, mantissa 4095.
        let high = sensor.read_high_limit().unwrap();
        assert_eq!(high.raw.exponent(), 0x0B);
        assert_eq!(high.raw.mantissa(), 0x0FFF);
        assert!((high.lux - 83_865.6).abs() < 0.5);

        let low = sensor.read_low_limit().unwrap();
        assert_eq!(low.raw.raw(), 0x0000);
        assert_eq!(low.lux, 0.0);

        let (mut i2c, _) = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn immediate_data_performs_no_delay() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00]),
            Transaction::read(ADDR, vec![0x0A, 0x64]),
        ];
        // An empty delay mock fails the test if the driver sleeps at all.
        let no_delays: [DelayTransaction; 0] = [];
        let delay = CheckedDelay::new(&no_delays);
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), delay);

        sensor.read_result().unwrap();

        let (mut i2c, mut delay) = sensor.destroy();
        i2c.done();
        delay.done();
    }

    #[test]
    fn read_times_out_after_fixed_attempts() {
        let mut expectations = vec![Transaction::write(ADDR, vec![0x00])];
        for _ in 0..POLL_ATTEMPTS {
            expectations.push(
                Transaction::read(ADDR, vec![0, 0])
                    .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
            );
        }
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), NoopDelay);

        let err = sensor.read_result().unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(err.code(), -100);

        // done() panics if any of the 250 read expectations went unused, and the mock
        // itself panics on a 251st attempt.
        let (mut i2c, _) = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn failed_pointer_write_skips_the_read() {
        let expectations = [Transaction::write(ADDR, vec![0x7E]).with_error(ErrorKind::Bus)];
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), NoopDelay);

        let err = sensor.manufacturer_id().unwrap_err();
        assert!(matches!(err, Error::I2c(_)));

        let (mut i2c, _) = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn bus_fault_codes_scale_by_minus_ten() {
        let cases = [
            (ErrorKind::Overrun, -10),
            (ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address), -20),
            (ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data), -30),
            (ErrorKind::Bus, -40),
            (ErrorKind::ArbitrationLoss, -40),
        ];
        for (kind, code) in cases {
            let expectations = [Transaction::write(ADDR, vec![0x01]).with_error(kind)];
            let mut sensor = Opt3001::new(I2cMock::new(&expectations), NoopDelay);

            let err = sensor.write_command(Register::Config).unwrap_err();
            assert_eq!(err.code(), code, "wrong code for {kind:?}");

            let (mut i2c, _) = sensor.destroy();
            i2c.done();
        }
    }

    #[test]
    fn nack_then_data_retries_until_success() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00]),
            Transaction::read(ADDR, vec![0, 0])
                .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
            Transaction::read(ADDR, vec![0, 0])
                .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
            Transaction::read(ADDR, vec![0x0A, 0x64]),
        ];
        let delays: Vec<DelayTransaction> = (0..2)
            .map(|_| DelayTransaction::delay_ms(POLL_INTERVAL_MS))
            .collect();
        let mut sensor = Opt3001::new(I2cMock::new(&expectations), CheckedDelay::new(&delays));

        let measurement = sensor.read_result().unwrap();
        assert_eq!(measurement.raw.raw(), 0x0A64);

        let (mut i2c, mut delay) = sensor.destroy();
        i2c.done();
        delay.done();
    }

    #[test]
    fn decodes_datasheet_example() {
        let raw = ResultWord::from_raw(0x0A64);
        assert_eq!(raw.exponent(), 0);
        assert_eq!(raw.mantissa(), 2660);
        assert!((raw.lux() - 26.60).abs() < 1e-4);
    }

    #[test]
    fn lux_doubles_per_exponent_step() {
        for exp in 0..11u16 {
            let lo = ResultWord::from_raw((exp << 12) | 0x0123);
            let hi = ResultWord::from_raw(((exp + 1) << 12) | 0x0123);
            assert!((hi.lux() - 2.0 * lo.lux()).abs() < 1e-2);
        }
    }

    #[test]
    fn lux_monotone_in_mantissa() {
        for exp in [0u16, 5, 11] {
            let mut previous = -1.0f32;
            for mantissa in 0..=0x0FFFu16 {
                let lux = ResultWord::from_raw((exp << 12) | mantissa).lux();
                assert!(lux > previous);
                previous = lux;
            }
        }
    }

    #[test]
    fn config_default_matches_reset_value() {
        let config = Config::default();
        assert_eq!(config.raw(), 0xC810);
        assert_eq!(config.range_number(), 0b1100);
        assert_eq!(config.conversion_time(), ConversionTime::Ms800);
        assert_eq!(config.mode(), ConversionMode::Shutdown);
        assert!(config.latch());
        assert!(!config.polarity());
        assert_eq!(config.fault_count(), 0);
    }

    #[test]
    fn config_field_setters_only_touch_their_bits() {
        let mut config = Config::from_raw(0x0000);

        config.set_mode(ConversionMode::Continuous);
        assert_eq!(config.raw(), 0b10 << 9);
        assert_eq!(config.mode(), ConversionMode::Continuous);

        config.set_mode(ConversionMode::SingleShot);
        assert_eq!(config.mode(), ConversionMode::SingleShot);

        config.set_range_number(0xFF);
        assert_eq!(config.range_number(), 0x0F);

        config.set_conversion_time(ConversionTime::Ms800);
        config.set_latch(true);
        config.set_polarity(true);
        config.set_mask_exponent(true);
        config.set_fault_count(0b11);
        assert_eq!(config.mode(), ConversionMode::SingleShot);
        assert_eq!(config.range_number(), 0x0F);
        assert!(config.latch());
        assert!(config.polarity());
        assert!(config.mask_exponent());
        assert_eq!(config.fault_count(), 0b11);

        config.set_latch(false);
        assert!(!config.latch());
        assert!(config.polarity());
    }

    #[test]
    fn config_accepts_any_raw_pattern() {
        for raw in [0x0000u16, 0xFFFF, 0xA5A5, 0x0204] {
            assert_eq!(Config::from_raw(raw).raw(), raw);
        }
        // Status bits decode without validation.
        let status = Config::from_raw(0b1_1110_0000);
        assert!(status.flag_low());
        assert!(status.flag_high());
        assert!(status.conversion_ready());
        assert!(status.overflow());
    }
}
