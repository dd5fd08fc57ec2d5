//! PCF8583 middleware: wraps the raw driver and offers a simple API
//! for probing the chip, fetching the current time and setting it.

use crate::drivers::pcf8583::{Error as RtcError, Pcf8583, TimeRecord};
use core::fmt::Write as _;
use embedded_hal::i2c::I2c;
use heapless::String;

pub struct Pcf8583Api<'d, I2C> {
    driver: &'d mut Pcf8583<I2C>,
    pub present: bool,
    last: TimeRecord,
}

impl<'d, I2C: I2c> Pcf8583Api<'d, I2C> {
    pub fn new(driver: &'d mut Pcf8583<I2C>) -> Self {
        Self { driver, present: false, last: TimeRecord::default() }
    }

    /// Minimal: just try a read, mark present if OK
    pub fn init(&mut self) -> Result<(), RtcError<I2C::Error>> {
        match self.driver.get_time() {
            Ok(()) => {
                self.last = *self.driver.time();
                self.present = true;
                info!("PCF8583 present at 0x{:02X}", self.driver.address());
                Ok(())
            }
            Err(e) => {
                self.present = false;
                warn!("PCF8583 not responding at 0x{:02X}", self.driver.address());
                Err(e)
            }
        }
    }

    pub fn now(&mut self) -> Result<TimeRecord, RtcError<I2C::Error>> {
        self.driver.get_time()?;
        self.last = *self.driver.time();
        Ok(self.last)
    }

    /// Write `dt` to the chip. The counter is left stopped.
    pub fn set_datetime(&mut self, dt: &TimeRecord) -> Result<(), RtcError<I2C::Error>> {
        *self.driver.time_mut() = *dt;
        self.driver.set_time()?;
        self.last = *self.driver.time();
        Ok(())
    }

    /// Write `dt` and start the counter again.
    pub fn set_datetime_and_resume(&mut self, dt: &TimeRecord) -> Result<(), RtcError<I2C::Error>> {
        self.set_datetime(dt)?;
        self.driver.resume_counting()
    }

    pub fn last(&self) -> &TimeRecord { &self.last }

    pub fn format_iso8601(&self) -> String<32> {
        let mut s = String::new();
        let _ = core::write!(s, "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.last.year, self.last.month, self.last.day,
            self.last.hour, self.last.minute, self.last.second);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pcf8583::{ctrl, reg, DEFAULT_ADDRESS};
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const ADDR: u8 = 0x50;

    #[test]
    fn test_init_marks_present_and_caches_time() {
        let expectations = [
            I2cTrans::write(ADDR, vec![reg::CONTROL, ctrl::STOP_COUNTING]),
            I2cTrans::write_read(ADDR, vec![reg::SECONDS], vec![0x00, 0x15, 0x08, 0x50, 0x07]),
            I2cTrans::write_read(ADDR, vec![reg::YEAR_BASE], vec![0x07, 0xE8]),
        ];
        let mut mock = I2cMock::new(&expectations);
        let mut rtc = Pcf8583::new(mock.clone(), DEFAULT_ADDRESS);
        let mut api = Pcf8583Api::new(&mut rtc);

        api.init().unwrap();
        assert!(api.present);
        assert_eq!(api.format_iso8601().as_str(), "2025-07-10T08:15:00Z");
        mock.done();
    }

    #[test]
    fn test_init_clears_present_on_nack() {
        let expectations = [I2cTrans::write(ADDR, vec![reg::CONTROL, ctrl::STOP_COUNTING])
            .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))];
        let mut mock = I2cMock::new(&expectations);
        let mut rtc = Pcf8583::new(mock.clone(), DEFAULT_ADDRESS);
        let mut api = Pcf8583Api::new(&mut rtc);
        api.present = true;

        assert!(matches!(api.init(), Err(RtcError::I2cWrite(_))));
        assert!(!api.present);
        mock.done();
    }

    #[test]
    fn test_now_refreshes_last() {
        let expectations = [
            I2cTrans::write(ADDR, vec![reg::CONTROL, ctrl::STOP_COUNTING]),
            I2cTrans::write_read(ADDR, vec![reg::SECONDS], vec![0x59, 0x59, 0x23, 0xF1, 0x12]),
            I2cTrans::write_read(ADDR, vec![reg::YEAR_BASE], vec![0x07, 0xCC]),
        ];
        let mut mock = I2cMock::new(&expectations);
        let mut rtc = Pcf8583::new(mock.clone(), DEFAULT_ADDRESS);
        let mut api = Pcf8583Api::new(&mut rtc);

        let dt = api.now().unwrap();
        assert_eq!(dt.year, 1999);
        assert_eq!(dt.day, 31);
        assert_eq!(*api.last(), dt);
        assert_eq!(api.format_iso8601().as_str(), "1999-12-31T23:59:59Z");
        mock.done();
    }

    #[test]
    fn test_set_datetime_and_resume() {
        let expectations = [
            I2cTrans::write(ADDR, vec![reg::CONTROL, ctrl::STOP_COUNTING]),
            I2cTrans::write(ADDR, vec![reg::SECONDS, 0x30, 0x45, 0x21, 0x80 | 0x19, 0x11]),
            I2cTrans::write(ADDR, vec![reg::YEAR_BASE, 0x07, 0xE8]),
            I2cTrans::write(ADDR, vec![reg::CONTROL, ctrl::RUN]),
        ];
        let mut rtc = Pcf8583::new(I2cMock::new(&expectations), DEFAULT_ADDRESS);
        let mut api = Pcf8583Api::new(&mut rtc);

        let dt = TimeRecord { second: 30, minute: 45, hour: 21, day: 19, month: 11, year: 2026, year_base: 0 };
        api.set_datetime_and_resume(&dt).unwrap();
        assert_eq!(api.last().year_base, 2024);
        assert_eq!(api.format_iso8601().as_str(), "2026-11-19T21:45:30Z");

        rtc.release().done();
    }
}
