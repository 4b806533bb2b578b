//! # FRAMELOCK
//!
//! Ordered sharing of frame buffers between pipeline stages, and rendezvous
//! of independent camera pipelines with timestamp cross-checks.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐      ┌────────────────────┐
//! │   framelock_core   │      │   framelock_sync   │
//! │ BufferSet, pools,  │      │ SyncCoordinator,   │
//! │ users registries   │      │ barriers, verdicts │
//! └─────────┬──────────┘      └─────────┬──────────┘
//!           └──────────┬────────────────┘
//!                ┌─────┴─────┐
//!                │ framelock │  CaptureRig, RigConfig
//!                └───────────┘
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod rig;

pub use framelock_core;
pub use framelock_sync;

pub use config::{CameraConfig, RigConfig};
pub use error::{RigError, RigResult};
pub use rig::{CameraStats, CaptureRig, FrameHandle, RigReport};
