//! Async ingestion server for binary GPS fleet-telemetry dialects.
//!
//! Fleetwire listens on TCP and UDP for the bit-packed AVL frames that
//! fleet-tracking hardware emits, decodes them into structured position and
//! event records, and answers with the exact acknowledgement bytes each
//! transport mandates.
//!
//! # Features
//!
//! - **Codec dispatch**: versioned binary dialects resolved through a table;
//!   adding a codec never touches the transports
//! - **Session binding**: handshake-bound TCP sessions, identity-keyed UDP
//!   sessions, carry-forward of the last known fix
//! - **Transfer reassembly**: out-of-band payloads (camera snapshots)
//!   rebuilt from out-of-order fragments with CRC-32 verification
//! - **Fault isolation**: a malformed frame is dropped without disturbing
//!   its session, its connection, or any other device
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fleetwire::{MemoryInventory, MemoryStorage, Server, ServerConfig};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let inventory = Arc::new(MemoryInventory::new());
//!     inventory.register("356307042441013");
//!
//!     let mut server = Server::bind(
//!         ServerConfig::default(),
//!         inventory,
//!         Arc::new(MemoryStorage::new()),
//!     )
//!     .await?;
//!
//!     let mut records = server.records().expect("records taken once");
//!     while let Some(record) = records.next().await {
//!         println!("{} at {},{}", record.device_id, record.latitude, record.longitude);
//!     }
//!     Ok(())
//! }
//! ```

// Decoding core
pub mod codec;
mod error;
mod frame;
pub mod types;

// Shared state and collaborators
pub mod inventory;
pub mod session;
pub mod storage;
pub mod transfer;

// Transports and assembly
pub mod ack;
mod config;
mod server;
mod sink;
pub mod transport;

// Core exports
pub use error::{ProtocolError, Result};
pub use frame::FrameReader;
pub use types::{CellTowerInfo, Record, Value, keys};

// State exports
pub use inventory::{DeviceInventory, MemoryInventory};
pub use session::{ConnectionId, Session, SessionKey, SessionRegistry};
pub use storage::{MediaStorage, MemoryStorage};
pub use transfer::{Ingest, TransferReassembler};

// Assembly exports
pub use config::ServerConfig;
pub use server::Server;
pub use sink::RecordSink;
pub use transport::{FramePipeline, Transport};
