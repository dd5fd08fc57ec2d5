//! PCF8583 Real-Time Clock Driver
//!
//! Blocking I2C driver for the NXP PCF8583 clock/calendar with 240 bytes of
//! static RAM.
//!
//! The chip only keeps a 2-bit year counter (0-3) in the upper bits of the
//! date register. The full year is rebuilt from that counter plus a 16-bit
//! "year base" kept in the first two bytes of user RAM (0x10-0x11, big-endian,
//! plain binary). On write the base is always rounded down to a multiple of 4.
//!
//! Notes:
//! - The address passed to [`Pcf8583::new`] is the 8-bit datasheet address
//!   (0xA0 / 0xA2); it is shifted down to the 7-bit form the bus expects.
//! - Both [`Pcf8583::get_time`] and [`Pcf8583::set_time`] stop the counter
//!   first and leave it stopped. Call [`Pcf8583::resume_counting`] to let
//!   the clock run again.
//! - Alarms, timer and event-counter modes are not handled.

use core::fmt::Write as _;
use embedded_hal::i2c::I2c;
use heapless::String;

/// Datasheet (8-bit) address with the A0 pin tied low.
pub const DEFAULT_ADDRESS: u8 = 0xA0;

/// Register map (subset used for timekeeping)
pub mod reg {
    pub const CONTROL: u8 = 0x00; // Control/status
    pub const SECONDS: u8 = 0x02; // 0-59 BCD
    pub const MINUTES: u8 = 0x03; // 0-59 BCD
    pub const HOURS: u8 = 0x04; // 0-23 BCD (24h mode)
    pub const YEAR_DATE: u8 = 0x05; // bits 0-5 date BCD, bits 6-7 year counter
    pub const WEEKDAY_MONTH: u8 = 0x06; // bits 0-4 month BCD, bits 5-7 weekday
    pub const YEAR_BASE: u8 = 0x10; // user RAM 0x10-0x11, big-endian year base
}

/// Control register values
pub mod ctrl {
    /// Stop counting, 32.768 kHz clock mode, alarm flags not masked.
    pub const STOP_COUNTING: u8 = 0xC0;
    /// Count, 32.768 kHz clock mode.
    pub const RUN: u8 = 0x00;
    /// Set while the counter is stopped.
    pub const STOP_BIT: u8 = 0x80;
}

const DATE_MASK: u8 = 0x3F;
const MONTH_MASK: u8 = 0x1F;
const COUNTER_SHIFT: u8 = 6;

/// Largest value each BCD field can hold in its register slot.
const MAX_SECOND: u8 = 99;
const MAX_MINUTE: u8 = 99;
const MAX_HOUR: u8 = 99;
const MAX_DAY: u8 = 39; // 6-bit slot
const MAX_MONTH: u8 = 19; // 5-bit slot

/// Field of [`TimeRecord`] that cannot be encoded into its register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Second,
    Minute,
    Hour,
    Day,
    Month,
}

#[derive(Debug)]
pub enum Error<E> {
    /// A write transaction was not acknowledged or failed on the bus.
    I2cWrite(E),
    /// A pointer-write + read transaction failed.
    I2cRead(E),
    /// Field value does not fit its BCD register slot; nothing was written.
    OutOfRange(Field),
}

#[cfg(feature = "defmt")]
impl<E: embedded_hal::i2c::Error> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::I2cWrite(e) => defmt::write!(f, "I2cWrite({})", defmt::Debug2Format(&e.kind())),
            Error::I2cRead(e) => defmt::write!(f, "I2cRead({})", defmt::Debug2Format(&e.kind())),
            Error::OutOfRange(field) => defmt::write!(f, "OutOfRange({})", field),
        }
    }
}

/// Raw copy of the registers the time lives in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterImage {
    /// 0x02..=0x06: seconds, minutes, hours, year/date, weekday/month
    pub clock: [u8; 5],
    /// 0x10..=0x11: year base, big-endian
    pub year_base: [u8; 2],
}

/// Time held in memory by the driver. Filled by `get_time`, consumed by `set_time`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeRecord {
    pub second: u8,     // 0..=59
    pub minute: u8,     // 0..=59
    pub hour: u8,       // 0..=23
    pub day: u8,        // 1..=31
    pub month: u8,      // 1..=12
    pub year: u16,      // full year, e.g. 2025
    pub year_base: u16, // multiple of 4, as stored in user RAM
}

impl TimeRecord {
    /// Value of the chip's 2-bit year counter for this year.
    pub fn counter(&self) -> u8 {
        (self.year % 4) as u8
    }

    /// Decode a register image. Bits outside each field's slot are dropped;
    /// BCD digits are not validated.
    pub fn from_registers(image: &RegisterImage) -> Self {
        let [sec, min, hour, year_date, weekday_month] = image.clock;
        let counter = (year_date >> COUNTER_SHIFT) & 0x03;
        let year_base = u16::from_be_bytes(image.year_base);

        Self {
            second: bcd_to_bin(sec),
            minute: bcd_to_bin(min),
            hour: bcd_to_bin(hour),
            day: bcd_to_bin(year_date & DATE_MASK),
            month: bcd_to_bin(weekday_month & MONTH_MASK),
            year: year_base.wrapping_add(counter as u16),
            year_base,
        }
    }

    /// Encode into a register image. The stored year base is recomputed from
    /// `year`; the `year_base` field is ignored. Run [`TimeRecord::check_range`]
    /// first: out-of-range fields spill into neighbouring bits.
    pub fn to_registers(&self) -> RegisterImage {
        let counter = self.counter();
        let year_base = self.year - counter as u16;

        RegisterImage {
            clock: [
                bin_to_bcd(self.second),
                bin_to_bcd(self.minute),
                bin_to_bcd(self.hour),
                (counter << COUNTER_SHIFT) | bin_to_bcd(self.day),
                bin_to_bcd(self.month),
            ],
            year_base: year_base.to_be_bytes(),
        }
    }

    /// Check that every BCD field fits its register slot. This is not a
    /// calendar check: hour 25 or April 31 pass.
    pub fn check_range(&self) -> Result<(), Field> {
        let limits = [
            (self.second, MAX_SECOND, Field::Second),
            (self.minute, MAX_MINUTE, Field::Minute),
            (self.hour, MAX_HOUR, Field::Hour),
            (self.day, MAX_DAY, Field::Day),
            (self.month, MAX_MONTH, Field::Month),
        ];
        match limits.iter().find(|(value, max, _)| value > max) {
            Some(&(_, _, field)) => Err(field),
            None => Ok(()),
        }
    }

    /// Format as a readable string
    pub fn format(&self) -> String<32> {
        let mut output = String::new();
        let _ = core::write!(
            output,
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02}",
            self.month, self.day, self.year, self.hour, self.minute, self.second
        );
        output
    }
}

/// PCF8583 Real-Time Clock driver
pub struct Pcf8583<I2C> {
    i2c: I2C,
    address: u8,
    time: TimeRecord,
}

impl<I2C> Pcf8583<I2C>
where
    I2C: I2c,
{
    /// Create a driver for the chip at `address` (8-bit datasheet form, e.g. 0xA0).
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address: address >> 1,
            time: TimeRecord::default(),
        }
    }

    /// 7-bit address used on the bus.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Last time read, or the time to be written by `set_time`.
    pub fn time(&self) -> &TimeRecord {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut TimeRecord {
        &mut self.time
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Stop the counter and read the time into the in-memory record.
    ///
    /// The counter stays stopped afterwards. On error the record keeps its
    /// previous contents, which no longer describe the chip.
    pub fn get_time(&mut self) -> Result<(), Error<I2C::Error>> {
        self.stop_counting()?;

        let mut image = RegisterImage::default();
        self.read_registers(reg::SECONDS, &mut image.clock)?;
        trace!("PCF8583 clock regs: {:02X}", image.clock);

        self.read_registers(reg::YEAR_BASE, &mut image.year_base)?;
        trace!("PCF8583 year base regs: {:02X}", image.year_base);

        self.time = TimeRecord::from_registers(&image);
        debug!(
            "PCF8583 read {:04}-{:02}-{:02} {:02}:{:02}:{:02} (base {})",
            self.time.year, self.time.month, self.time.day,
            self.time.hour, self.time.minute, self.time.second, self.time.year_base
        );
        Ok(())
    }

    /// Stop the counter and write the in-memory record to the chip.
    ///
    /// Fields are range-checked before any bus traffic. The counter stays
    /// stopped afterwards. On a bus error the chip may hold a mix of old and
    /// new values.
    pub fn set_time(&mut self) -> Result<(), Error<I2C::Error>> {
        self.time.check_range().map_err(|field| {
            warn!("PCF8583 refusing to write out-of-range {}", field);
            Error::OutOfRange(field)
        })?;
        let image = self.time.to_registers();

        self.stop_counting()?;
        self.write_registers(reg::SECONDS, &image.clock)?;
        self.write_registers(reg::YEAR_BASE, &image.year_base)?;

        self.time.year_base = u16::from_be_bytes(image.year_base);
        debug!(
            "PCF8583 wrote {:04}-{:02}-{:02} {:02}:{:02}:{:02} (base {})",
            self.time.year, self.time.month, self.time.day,
            self.time.hour, self.time.minute, self.time.second, self.time.year_base
        );
        Ok(())
    }

    /// Let the counter run again after `get_time` / `set_time`.
    pub fn resume_counting(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_registers(reg::CONTROL, &[ctrl::RUN])?;
        info!("PCF8583 counting resumed");
        Ok(())
    }

    /// Read raw control register for diagnostics.
    pub fn read_control(&mut self) -> Result<u8, Error<I2C::Error>> {
        let mut b = [0u8; 1];
        self.read_registers(reg::CONTROL, &mut b)?;
        Ok(b[0])
    }

    /// True when the stop bit is clear.
    pub fn is_counting(&mut self) -> Result<bool, Error<I2C::Error>> {
        Ok(self.read_control()? & ctrl::STOP_BIT == 0)
    }

    /// Dump the time registers without stopping the counter. Leaves the
    /// in-memory record untouched.
    pub fn diagnostic_read(&mut self) -> Result<RegisterImage, Error<I2C::Error>> {
        info!("=== PCF8583 Diagnostic Read ===");
        let control = self.read_control()?;
        info!("CONTROL: 0x{:02X} (stopped: {})", control, control & ctrl::STOP_BIT != 0);

        let mut image = RegisterImage::default();
        self.read_registers(reg::SECONDS, &mut image.clock)?;
        self.read_registers(reg::YEAR_BASE, &mut image.year_base)?;

        info!("SECONDS: 0x{:02X}", image.clock[0]);
        info!("MINUTES: 0x{:02X}", image.clock[1]);
        info!("HOURS: 0x{:02X}", image.clock[2]);
        info!("YEAR_DATE: 0x{:02X}", image.clock[3]);
        info!("WEEKDAY_MONTH: 0x{:02X}", image.clock[4]);
        info!("YEAR_BASE: 0x{:02X}{:02X}", image.year_base[0], image.year_base[1]);
        info!("=== End Diagnostic ===");
        Ok(image)
    }

    fn stop_counting(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_registers(reg::CONTROL, &[ctrl::STOP_COUNTING])
    }

    /// Read consecutive registers starting at `start_register`.
    fn read_registers(&mut self, start_register: u8, buffer: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write_read(self.address, &[start_register], buffer)
            .map_err(|e| {
                warn!("PCF8583 read at 0x{:02X} failed", start_register);
                Error::I2cRead(e)
            })
    }

    /// Write consecutive registers starting at `start_register`.
    fn write_registers(&mut self, start_register: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let mut write_buffer = [0u8; 6]; // Max 5 data bytes + 1 register byte
        write_buffer[0] = start_register;
        write_buffer[1..=data.len()].copy_from_slice(data);

        self.i2c
            .write(self.address, &write_buffer[..=data.len()])
            .map_err(|e| {
                warn!("PCF8583 write at 0x{:02X} failed", start_register);
                Error::I2cWrite(e)
            })
    }
}

/// Convert BCD to binary. Nibbles above 9 are not rejected.
pub fn bcd_to_bin(bcd: u8) -> u8 {
    (bcd & 0x0F) + ((bcd >> 4) * 10)
}

/// Convert binary to BCD. Values of 100 and above overflow the high nibble.
pub fn bin_to_bcd(bin: u8) -> u8 {
    ((bin / 10) << 4) | (bin % 10)
}
