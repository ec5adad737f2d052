//! Core types for decoded telemetry representation.
//!
//! This module provides the foundational data structures shared by the codec
//! layer and the transports:
//!
//! - [`Record`] is one decoded position/event with its typed attribute map
//! - [`Value`] is the typed attribute value produced by parameter tables
//! - [`CellTowerInfo`] is the derived serving-cell structure
//! - [`keys`] names the attribute vocabulary the downstream layer consumes
//!
//! Records are plain owned data: the decoder builds them, the session
//! registry snapshots the last one per device for carry-forward, and the sink
//! hands them to the persistence collaborator.

mod cell;
mod record;
mod value;

pub use cell::CellTowerInfo;
pub use record::{Record, keys};
pub use value::Value;
