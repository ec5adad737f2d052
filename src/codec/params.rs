//! Per-codec parameter tables.
//!
//! Each table interprets one parameter id at the width of its group: it reads
//! the raw value from the cursor and applies the semantic rule (attribute
//! name, scaling, derived alarm flags). Ids without a rule degrade to the
//! generic `io<ID>` attribute carrying the raw unsigned value, so firmware
//! sending newer ids never fails a record.

use crate::FrameReader;
use crate::Result;
use crate::types::{Record, keys};

/// Internal battery threshold, volts. At or below this the decoder flags the
/// record in addition to reporting the voltage.
const INTERNAL_BATTERY_LOW_VOLTS: f64 = 2.0;
/// External supply threshold, volts, below which the supply is treated as
/// disconnected.
const EXTERNAL_POWER_DISCONNECT_VOLTS: f64 = 1.0;

/// Parameter table for the extended location codecs (and serial frames).
pub(crate) fn extended_table(
    record: &mut Record,
    id: u8,
    reader: &mut FrameReader<'_>,
    width: usize,
) -> Result<()> {
    match id {
        1..=4 => {
            let value = reader.read_uint(width)?;
            record.set_indexed(keys::PREFIX_IN, u32::from(id), value);
        }
        9 => {
            let value = reader.read_uint(width)?;
            record.set_indexed(keys::PREFIX_ADC, 1, value);
        }
        17 => record.set("axisX", reader.read_int(width)?),
        18 => record.set("axisY", reader.read_int(width)?),
        19 => record.set("axisZ", reader.read_int(width)?),
        21 => record.set(keys::RSSI, reader.read_uint(width)?),
        66 => {
            let power = reader.read_uint(width)? as f64 * 0.001;
            record.set(keys::POWER, power);
            if power < EXTERNAL_POWER_DISCONNECT_VOLTS {
                record.set(keys::EXTERNAL_BATTERY_DISCONNECT, true);
            }
        }
        67 => {
            let battery = reader.read_uint(width)? as f64 * 0.001;
            record.set(keys::BATTERY, battery);
            if battery < INTERNAL_BATTERY_LOW_VOLTS {
                record.set(keys::INTERNAL_BATTERY_LOW, true);
            }
        }
        72..=74 => {
            let value = reader.read_int(width)? as f64 * 0.1;
            record.set_indexed(keys::PREFIX_TEMP, u32::from(id - 71), value);
        }
        78 => {
            let value = reader.read_uint(width)?;
            if value != 0 {
                record.set(keys::DRIVER_UNIQUE_ID, format!("{value:016X}"));
            }
        }
        80 => record.set(keys::WORK_MODE, reader.read_uint(width)?),
        129..=134 => {
            let fragment =
                String::from_utf8_lossy(reader.read_bytes(width)?).trim().to_string();
            let seed = if id == 129 || id == 132 {
                String::new()
            } else {
                record.get_str("driver1").to_string()
            };
            let slot = if id >= 132 { "driver2" } else { "driver1" };
            record.set(slot, format!("{seed}{fragment}"));
        }
        179 => record.set_indexed(keys::PREFIX_OUT, 1, reader.read_uint(width)? == 1),
        180 => record.set_indexed(keys::PREFIX_OUT, 2, reader.read_uint(width)? == 1),
        181 => record.set(keys::PDOP, reader.read_uint(width)? as f64 * 0.1),
        182 => record.set(keys::HDOP, reader.read_uint(width)? as f64 * 0.1),
        216 => record.set(keys::ODOMETER, reader.read_uint(width)?),
        236 => {
            if reader.read_uint(width)? == 1 {
                record.set(keys::ALARM, keys::ALARM_OVERSPEED);
            }
        }
        237 => record.set(keys::MOTION, reader.read_uint(width)? == 0),
        238 => match reader.read_uint(width)? {
            1 => record.set(keys::ALARM, keys::ALARM_ACCELERATION),
            2 => record.set(keys::ALARM, keys::ALARM_BRAKING),
            3 => record.set(keys::ALARM, keys::ALARM_CORNERING),
            _ => {}
        },
        239 => record.set(keys::IGNITION, reader.read_uint(width)? == 1),
        240 => record.set(keys::MOTION, reader.read_uint(width)? == 1),
        241 => record.set(keys::OPERATOR, reader.read_uint(width)?),
        _ => {
            let value = reader.read_uint(width)?;
            record.set_indexed(keys::PREFIX_IO, u32::from(id), value);
        }
    }
    Ok(())
}

/// Parameter table for the compact location codec.
pub(crate) fn compact_table(
    record: &mut Record,
    id: u8,
    reader: &mut FrameReader<'_>,
    width: usize,
) -> Result<()> {
    match id {
        1 => record.set(keys::BATTERY_LEVEL, reader.read_uint(width)?),
        2 => record.set(keys::USB_CONNECTED, reader.read_uint(width)? == 1),
        5 => record.set(keys::UPTIME, reader.read_uint(width)?),
        20 => record.set(keys::HDOP, reader.read_uint(width)? as f64 * 0.1),
        21 => record.set(keys::VDOP, reader.read_uint(width)? as f64 * 0.1),
        22 => record.set(keys::PDOP, reader.read_uint(width)? as f64 * 0.1),
        67 => {
            let battery = reader.read_uint(width)? as f64 * 0.001;
            record.set(keys::BATTERY, battery);
            if battery < INTERNAL_BATTERY_LOW_VOLTS {
                record.set(keys::INTERNAL_BATTERY_LOW, true);
            }
        }
        221 => record.set(keys::BUTTON, reader.read_uint(width)?),
        222 => {
            if reader.read_uint(width)? == 1 {
                record.set(keys::ALARM, keys::ALARM_SOS);
            }
        }
        240 => record.set(keys::MOTION, reader.read_uint(width)? == 1),
        244 => record.set(keys::ROAMING, reader.read_uint(width)? == 1),
        _ => {
            let value = reader.read_uint(width)?;
            record.set_indexed(keys::PREFIX_IO, u32::from(id), value);
        }
    }
    Ok(())
}
