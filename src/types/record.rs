//! Decoded position/event record.

use super::{CellTowerInfo, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known attribute names.
///
/// Names mirror the attribute vocabulary the downstream business-rule layer
/// consumes; parameter tables write these rather than raw parameter ids
/// wherever a semantic mapping exists.
pub mod keys {
    pub const PRIORITY: &str = "priority";
    pub const EVENT: &str = "event";
    pub const RSSI: &str = "rssi";
    pub const OPERATOR: &str = "operator";
    pub const BATTERY: &str = "battery";
    pub const BATTERY_LEVEL: &str = "batteryLevel";
    pub const POWER: &str = "power";
    pub const EXTERNAL_BATTERY_DISCONNECT: &str = "externalBatteryDisconnect";
    pub const INTERNAL_BATTERY_LOW: &str = "internalBatteryLow";
    pub const ODOMETER: &str = "odometer";
    pub const IGNITION: &str = "ignition";
    pub const MOTION: &str = "motion";
    pub const ALARM: &str = "alarm";
    pub const HDOP: &str = "hdop";
    pub const VDOP: &str = "vdop";
    pub const PDOP: &str = "pdop";
    pub const DRIVER_UNIQUE_ID: &str = "driverUniqueId";
    pub const WORK_MODE: &str = "workMode";
    pub const UPTIME: &str = "uptime";
    pub const USB_CONNECTED: &str = "usbConnected";
    pub const BUTTON: &str = "button";
    pub const ROAMING: &str = "roaming";
    pub const TYPE: &str = "type";
    pub const RESULT: &str = "result";
    pub const IMAGE: &str = "image";

    pub const PREFIX_IO: &str = "io";
    pub const PREFIX_ADC: &str = "adc";
    pub const PREFIX_TEMP: &str = "temp";
    pub const PREFIX_IN: &str = "di";
    pub const PREFIX_OUT: &str = "out";

    pub const ALARM_SOS: &str = "sos";
    pub const ALARM_OVERSPEED: &str = "overspeed";
    pub const ALARM_ACCELERATION: &str = "hardAcceleration";
    pub const ALARM_BRAKING: &str = "hardBraking";
    pub const ALARM_CORNERING: &str = "hardCornering";
}

/// A fully decoded telemetry record.
///
/// Attributes accumulate monotonically while a frame decodes; once the record
/// is handed to the sink it is treated as immutable. Speed is stored in knots,
/// the record's native unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub device_id: u64,
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level.
    pub altitude: f64,
    /// Knots.
    pub speed: f64,
    /// Degrees clockwise from north.
    pub course: f64,
    pub satellites: u8,
    pub network: Option<CellTowerInfo>,
    pub attributes: HashMap<String, Value>,
}

impl Record {
    /// Create an empty record for a device, stamped "now" until the frame
    /// supplies its own timestamp.
    pub fn new(device_id: u64) -> Self {
        Self {
            device_id,
            timestamp: Utc::now(),
            valid: false,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            speed: 0.0,
            course: 0.0,
            satellites: 0,
            network: None,
            attributes: HashMap::new(),
        }
    }

    /// Set an attribute. Keys are unique; a repeated key overwrites.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Set an indexed attribute such as `di1` or `temp2`.
    pub fn set_indexed(&mut self, prefix: &str, index: u32, value: impl Into<Value>) {
        self.attributes.insert(format!("{prefix}{index}"), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Unsigned view of an attribute, `0` when absent or non-numeric.
    pub fn get_u64(&self, key: &str) -> u64 {
        self.attributes.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    /// String view of an attribute, empty when absent.
    pub fn get_str(&self, key: &str) -> &str {
        self.attributes.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Copy the location fix from a previous record, leaving the timestamp
    /// and attributes of `self` untouched.
    ///
    /// This is the carry-forward rule for frames that declare no new fix:
    /// coordinates, altitude, course, speed, validity and satellite count all
    /// come from the last known record; only the timestamp is new.
    pub fn inherit_location(&mut self, last: &Record) {
        self.valid = last.valid;
        self.latitude = last.latitude;
        self.longitude = last.longitude;
        self.altitude = last.altitude;
        self.speed = last.speed;
        self.course = last.course;
        self.satellites = last.satellites;
    }
}
