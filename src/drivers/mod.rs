//! Drivers module
//!
//! Contains the raw PCF8583 register driver.

pub mod pcf8583;
