//! Location record decoding for both header variants.
//!
//! The compact variant packs every fix field behind a pair of bitmasks and
//! counts time in seconds from a protocol-fixed epoch base. The extended
//! variant carries a fixed-width header with absolute millisecond timestamps.
//! Both are followed by the same count-prefixed parameter groups, dispatched
//! through the codec's parameter table.
//!
//! Decoding never fails on unknown parameter ids and never performs
//! plausibility checks on decoded values; a frame only fails when its
//! declared structure outruns the buffer.

use super::network;
use super::{CodecEntry, CodecTable, FrameKind, GlobalMask, LocationMask};
use crate::types::{CellTowerInfo, Record, keys};
use crate::{FrameReader, ProtocolError, Result};
use chrono::DateTime;

/// Epoch base of the compact codec's 30-bit timestamp: 2007-01-01 00:00:00
/// UTC, in seconds since the Unix epoch. Part of the wire compatibility
/// contract.
pub const COMPACT_EPOCH_OFFSET: i64 = 1_167_609_600;

/// Records carry speed in knots; the wire sends km/h.
fn knots_from_kph(kph: f64) -> f64 {
    kph / 1.852
}

/// Decode one location record at the cursor into `record`.
///
/// `last` is the session's previous record, consulted only when the compact
/// variant declares no new fix.
pub fn decode_location(
    reader: &mut FrameReader<'_>,
    entry: &CodecEntry,
    table: CodecTable,
    record: &mut Record,
    last: Option<&Record>,
) -> Result<()> {
    let global = match entry.kind {
        FrameKind::CompactLocation => decode_compact_header(reader, record, last)?,
        FrameKind::ExtendedLocation => {
            decode_extended_header(reader, record)?;
            GlobalMask::EXTENDED
        }
        FrameKind::Serial | FrameKind::Transfer => {
            return Err(ProtocolError::framing("codec carries no location header"));
        }
    };

    if global.group_1() {
        decode_group(record, entry, reader, 1)?;
    }
    if global.group_2() {
        decode_group(record, entry, reader, 2)?;
    }
    if global.group_4() {
        decode_group(record, entry, reader, 4)?;
    }
    if entry.eight_byte_group {
        decode_group(record, entry, reader, 8)?;
    }
    if table.hex_group {
        let count = reader.read_u8()?;
        for _ in 0..count {
            let id = reader.read_u8()?;
            let bytes = reader.read_bytes(16)?;
            record.set_indexed(keys::PREFIX_IO, u32::from(id), hex::encode(bytes));
        }
    }

    if let Some(tower) = network::assemble(record) {
        record.network = Some(tower);
    }

    Ok(())
}

fn decode_compact_header(
    reader: &mut FrameReader<'_>,
    record: &mut Record,
    last: Option<&Record>,
) -> Result<GlobalMask> {
    let seconds = i64::from(reader.read_u32()? & 0x3fff_ffff) + COMPACT_EPOCH_OFFSET;
    record.timestamp = DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::UNIX_EPOCH);

    let global = GlobalMask(reader.read_u8()?);
    if global.fix_present() {
        let location = LocationMask(reader.read_u8()?);

        if location.has_coordinates() {
            record.latitude = f64::from(reader.read_f32()?);
            record.longitude = f64::from(reader.read_f32()?);
        }
        if location.has_altitude() {
            record.altitude = f64::from(reader.read_u16()?);
        }
        if location.has_course() {
            record.course = f64::from(reader.read_u8()?) * 360.0 / 256.0;
        }
        if location.has_speed() {
            record.speed = knots_from_kph(f64::from(reader.read_u8()?));
        }
        if location.has_satellites() {
            let satellites = reader.read_u8()?;
            record.satellites = satellites;
            record.valid = satellites >= 3;
        }

        if location.has_cell() {
            let lac = u32::from(reader.read_u16()?);
            let cell_id = u64::from(reader.read_u16()?);
            let mut tower = CellTowerInfo::from_lac_cid(lac, cell_id);
            if location.has_signal() {
                tower = tower.with_signal_strength(reader.read_u8()?);
            }
            if location.has_operator() {
                tower = tower.with_operator(u64::from(reader.read_u32()?));
            }
            record.network = Some(tower);
        } else {
            if location.has_signal() {
                record.set(keys::RSSI, u64::from(reader.read_u8()?));
            }
            if location.has_operator() {
                record.set(keys::OPERATOR, u64::from(reader.read_u32()?));
            }
        }
    } else if let Some(last) = last {
        record.inherit_location(last);
    }

    Ok(global)
}

fn decode_extended_header(reader: &mut FrameReader<'_>, record: &mut Record) -> Result<()> {
    let millis = reader.read_i64()?;
    record.timestamp = DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH);

    record.set(keys::PRIORITY, u64::from(reader.read_u8()?));

    record.longitude = f64::from(reader.read_i32()?) / 10_000_000.0;
    record.latitude = f64::from(reader.read_i32()?) / 10_000_000.0;
    record.altitude = f64::from(reader.read_i16()?);
    record.course = f64::from(reader.read_u16()?);

    let satellites = reader.read_u8()?;
    record.satellites = satellites;
    record.valid = satellites != 0;

    record.speed = knots_from_kph(f64::from(reader.read_u16()?));
    record.set(keys::EVENT, u64::from(reader.read_u8()?));
    reader.read_u8()?; // total IO count, redundant with the per-group counts

    Ok(())
}

fn decode_group(
    record: &mut Record,
    entry: &CodecEntry,
    reader: &mut FrameReader<'_>,
    width: usize,
) -> Result<()> {
    let count = reader.read_u8()?;
    for _ in 0..count {
        let id = reader.read_u8()?;
        (entry.params)(record, id, reader, width)?;
    }
    Ok(())
}

/// Decode one serial/command passthrough record.
///
/// Serial records have no fix of their own: the last known location carries
/// forward, and the payload becomes `type` and `result` attributes.
pub fn decode_serial(
    reader: &mut FrameReader<'_>,
    record: &mut Record,
    last: Option<&Record>,
) -> Result<()> {
    if let Some(last) = last {
        record.inherit_location(last);
    }

    record.set(keys::TYPE, u64::from(reader.read_u8()?));

    let length = reader.read_u32()? as usize;
    let bytes = reader.read_bytes(length)?;
    record.set(keys::RESULT, String::from_utf8_lossy(bytes).to_string());

    Ok(())
}
