//! Codec identification and dispatch.
//!
//! Devices select a binary dialect with a codec byte in every frame. Each
//! codec maps to a [`CodecEntry`] describing how its records decode: which
//! header variant applies, which parameter table interprets the variable
//! parameter groups, and whether the wider parameter groups are present.
//! Adding a codec means adding a table entry; the dispatch core and the
//! transports never change.
//!
//! Two distinct mask types guard the bit-packed optional fields. The global
//! mask gates parameter groups (and, for the compact codec, whether a fix is
//! present at all); the location mask is internal to the compact header. The
//! bit meanings are disjoint between the two and are never conflated.

mod location;
mod network;
mod params;

pub use location::{COMPACT_EPOCH_OFFSET, decode_location, decode_serial};
pub use network::assemble;

use crate::types::Record;
use crate::{FrameReader, ProtocolError, Result};

/// Compact location codec (Variant A): bit-packed optional header fields.
pub const CODEC_COMPACT: u8 = 0x07;
/// Extended location codec (Variant B): fixed-width header.
pub const CODEC_EXTENDED: u8 = 0x08;
/// Serial/command passthrough sub-frames.
pub const CODEC_SERIAL: u8 = 0x0c;
/// Fragmented out-of-band transfer frames.
pub const CODEC_TRANSFER: u8 = 0x0d;
/// Variant B header with 16-bit event ids; shares the extended table.
pub const CODEC_EXTENDED_16: u8 = 0x10;

/// How a codec's records decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Compact bit-packed location header (Variant A).
    CompactLocation,
    /// Fixed-width location header (Variant B).
    ExtendedLocation,
    /// Command/serial passthrough; location carries forward.
    Serial,
    /// Fragment of a multi-frame transfer; handled by the reassembler.
    Transfer,
}

/// A parameter-table function: reads one value of `width` bytes for `id`
/// and applies it to the record.
pub type ParamTable = fn(&mut Record, u8, &mut FrameReader<'_>, usize) -> Result<()>;

/// One row of the codec dispatch table.
pub struct CodecEntry {
    pub id: u8,
    pub kind: FrameKind,
    pub params: ParamTable,
    /// Whether an 8-byte parameter group follows the 4-byte group.
    pub eight_byte_group: bool,
}

static ENTRIES: &[CodecEntry] = &[
    CodecEntry {
        id: CODEC_COMPACT,
        kind: FrameKind::CompactLocation,
        params: params::compact_table,
        eight_byte_group: false,
    },
    CodecEntry {
        id: CODEC_EXTENDED,
        kind: FrameKind::ExtendedLocation,
        params: params::extended_table,
        eight_byte_group: true,
    },
    CodecEntry {
        id: CODEC_EXTENDED_16,
        kind: FrameKind::ExtendedLocation,
        params: params::extended_table,
        eight_byte_group: true,
    },
    CodecEntry {
        id: CODEC_SERIAL,
        kind: FrameKind::Serial,
        params: params::extended_table,
        eight_byte_group: false,
    },
    CodecEntry {
        id: CODEC_TRANSFER,
        kind: FrameKind::Transfer,
        params: params::extended_table,
        eight_byte_group: false,
    },
];

/// Codec dispatch table.
///
/// `hex_group` corresponds to the extended-firmware flag: when set, location
/// records additionally carry a 16-byte parameter group whose values are
/// preserved as hex strings.
#[derive(Debug, Clone, Copy)]
pub struct CodecTable {
    pub hex_group: bool,
}

impl CodecTable {
    pub fn new(hex_group: bool) -> Self {
        Self { hex_group }
    }

    /// Look up the entry for a codec byte.
    pub fn entry(&self, id: u8) -> Result<&'static CodecEntry> {
        ENTRIES
            .iter()
            .find(|entry| entry.id == id)
            .ok_or(ProtocolError::UnsupportedCodec { codec: id })
    }
}

impl Default for CodecTable {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Global mask: gates the presence of a fix (compact codec only) and the
/// variable-width parameter groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalMask(pub u8);

impl GlobalMask {
    /// Fixed mask for the extended header: no fix bit, all three narrow
    /// parameter groups present.
    pub const EXTENDED: GlobalMask = GlobalMask(0x0f);

    /// Bit 0: a fix is present in this record.
    pub fn fix_present(&self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Bit 1: 1-byte parameter group present.
    pub fn group_1(&self) -> bool {
        self.0 & 0x02 != 0
    }

    /// Bit 2: 2-byte parameter group present.
    pub fn group_2(&self) -> bool {
        self.0 & 0x04 != 0
    }

    /// Bit 3: 4-byte parameter group present.
    pub fn group_4(&self) -> bool {
        self.0 & 0x08 != 0
    }
}

/// Location mask: internal to the compact header, gates each optional fix
/// field. Bit meanings are unrelated to [`GlobalMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationMask(pub u8);

impl LocationMask {
    pub fn has_coordinates(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn has_altitude(&self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn has_course(&self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn has_speed(&self) -> bool {
        self.0 & 0x08 != 0
    }

    pub fn has_satellites(&self) -> bool {
        self.0 & 0x10 != 0
    }

    /// Bit 5: cell-tower fields follow; when clear, bits 6 and 7 select the
    /// raw signal/operator attributes instead.
    pub fn has_cell(&self) -> bool {
        self.0 & 0x20 != 0
    }

    pub fn has_signal(&self) -> bool {
        self.0 & 0x40 != 0
    }

    pub fn has_operator(&self) -> bool {
        self.0 & 0x80 != 0
    }
}
