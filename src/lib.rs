//! # PCF8583 RTC
//!
//! Blocking `embedded-hal` 1.0 driver for the NXP PCF8583 real-time clock.
//!
//! The chip's year register is a 2-bit rolling counter, so the driver keeps
//! a 16-bit year base in the first two bytes of the chip's user RAM and
//! rebuilds the full year from both on every read.
//!
//! - [`drivers::pcf8583`]: register map, BCD codec and bus sequencing
//! - [`middleware::pcf8583_api`]: presence probing, cached time, ISO-8601 output
//!
//! Enable the `defmt` feature for logging through `defmt`.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod drivers;
pub mod middleware;

pub use drivers::pcf8583::{
    bcd_to_bin, bin_to_bcd, Error, Field, Pcf8583, RegisterImage, TimeRecord, DEFAULT_ADDRESS,
};
pub use middleware::pcf8583_api::Pcf8583Api;
