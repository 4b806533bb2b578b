//! # FRAMELOCK Core
//!
//! Ordered sharing of physical frame buffers between pipeline users.
//!
//! ## Design Principles
//!
//! 1. **Registration order is release order** - a user may touch a buffer only
//!    once every user registered ahead of it released or pre-released
//! 2. **At-most-once hand-back** - a physical buffer goes back to its pool
//!    exactly once, after every user released it
//! 3. **No foreign code under lock** - pools and listeners run after the set
//!    lock is dropped
//!
//! ## Example
//!
//! ```rust,ignore
//! use framelock_core::{BufferSet, FreeListPool, SharedBuffer, UserCategory, UserStatus};
//!
//! let pool = Arc::new(FreeListPool::new("raw", vec![0_u32, 1, 2, 3]));
//! let set = BufferSet::new(request_no, frame_no);
//! set.add(
//!     SharedBuffer::new(RAW, "raw", pool.acquire().unwrap(), &pool)
//!         .with_user(SENSOR, UserCategory::Producer)?
//!         .with_user(ISP, UserCategory::Consumer)?,
//! )?;
//!
//! let raw = set.get_buffer(RAW, SENSOR).unwrap();
//! let _ = set.mark_user_status(RAW, SENSOR, UserStatus::USED);
//! set.apply_release(SENSOR);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod buffer;
pub mod buffer_set;
pub mod error;
pub mod ids;
pub mod pool;
pub mod registry;
pub mod status;

pub use buffer::{AcquiredBuffer, BufferScope, SharedBuffer};
pub use buffer_set::{BufferSet, FrameEvent, FrameListener, ListenerToken};
pub use error::{BufferError, BufferResult};
pub use ids::{StreamId, UserCategory, UserId};
pub use pool::{BufferPool, FreeListPool};
pub use registry::UsersRegistry;
pub use status::{BufferStatus, UserStatus};
