//! # FRAMELOCK Sync
//!
//! Rendezvous of per-camera capture pipelines and cross-checking of their
//! frame timestamps.
//!
//! ## Design Principles
//!
//! 1. **No fixed group** - every call names its own targets; the last arriver wakes the rest
//! 2. **Bounded waits** - a peer that never arrives costs a `BarrierTimeout`, not a hang
//! 3. **Fail closed per participant** - a malformed request fails its own check only
//!
//! ## Example
//!
//! ```rust,ignore
//! use framelock_sync::{CaptureResult, ParticipantId, SyncConfig, SyncCoordinator, SyncRequest};
//!
//! let sync = SyncCoordinator::new(SyncConfig::from_toml_file("config/sync.toml")?);
//! sync.start(ParticipantId(0))?;
//!
//! let request = SyncRequest::new([ParticipantId(1)]);
//! sync.enqueue(ParticipantId(0), &request)?;
//! let verdict = sync.check_result(ParticipantId(0), &request, &CaptureResult::new(sof_ns))?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod policy;
pub mod request;
pub mod semaphore;

pub use config::SyncConfig;
pub use context::{ParticipantId, SyncContext};
pub use coordinator::{ArrivalRole, Barrier, SyncCoordinator};
pub use error::{SyncError, SyncResult};
pub use policy::{FailHandling, FrameVerdict};
pub use request::{CaptureResult, SyncRequest};
pub use semaphore::Semaphore;
