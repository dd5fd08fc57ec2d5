pub mod pcf8583_api; // PCF8583 middleware
