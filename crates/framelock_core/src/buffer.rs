//! # Shared Buffer
//!
//! One physical buffer, its users registry and its status bits.
//!
//! ## Ownership
//!
//! ```text
//!   BufferSet slot ──owns──> SharedBuffer ──owns──> Option<B>  (physical handle)
//!                                  │
//!                                  └──weak──> Pool
//!
//!   all users RELEASED:  handle.take() ──move──> Pool::release_to_pool
//! ```
//!
//! The pool never holds a live handle while the set still holds one: the
//! handle is moved out exactly once, and `RETURNED_TO_POOL` records it.

use std::sync::{Arc, Weak};

use crate::error::BufferResult;
use crate::ids::{StreamId, UserCategory, UserId};
use crate::pool::BufferPool;
use crate::registry::UsersRegistry;
use crate::status::{BufferStatus, UserStatus};

/// Which sub-map of a buffer set the buffer lives in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferScope {
    /// Pipeline-internal buffer. Looked up first.
    Internal,
    /// Buffer visible to the application.
    #[default]
    App,
}

/// A physical buffer shared by the users of one frame.
pub struct SharedBuffer<B> {
    stream: StreamId,
    scope: BufferScope,
    /// Name handed to the pool on return.
    pool_name: String,
    pool: Weak<dyn BufferPool<B>>,
    users: UsersRegistry,
    status: BufferStatus,
    /// `None` once returned to the pool.
    handle: Option<B>,
}

impl<B> SharedBuffer<B> {
    /// Wraps a physical handle taken from `pool`.
    ///
    /// The buffer only keeps a weak reference to the pool.
    #[must_use]
    pub fn new<P>(stream: StreamId, pool_name: impl Into<String>, handle: B, pool: &Arc<P>) -> Self
    where
        P: BufferPool<B> + 'static,
    {
        let pool: Weak<P> = Arc::downgrade(pool);
        let pool: Weak<dyn BufferPool<B>> = pool;
        Self {
            stream,
            scope: BufferScope::default(),
            pool_name: pool_name.into(),
            pool,
            users: UsersRegistry::new(),
            status: BufferStatus::empty(),
            handle: Some(handle),
        }
    }

    /// Sets the scope (builder style).
    #[must_use]
    pub fn with_scope(mut self, scope: BufferScope) -> Self {
        self.scope = scope;
        self
    }

    /// Registers a user at the next release-order position.
    ///
    /// # Errors
    ///
    /// See [`UsersRegistry::register`].
    pub fn register_user(&mut self, id: UserId, category: UserCategory) -> BufferResult<usize> {
        self.users.register(id, category)
    }

    /// Registers a user (builder style).
    ///
    /// # Errors
    ///
    /// See [`UsersRegistry::register`].
    pub fn with_user(mut self, id: UserId, category: UserCategory) -> BufferResult<Self> {
        self.users.register(id, category)?;
        Ok(self)
    }

    /// Stream this buffer belongs to.
    #[inline]
    #[must_use]
    pub const fn stream(&self) -> StreamId {
        self.stream
    }

    /// Scope of this buffer.
    #[inline]
    #[must_use]
    pub const fn scope(&self) -> BufferScope {
        self.scope
    }

    /// Pool name recorded for hand-back.
    #[inline]
    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// Current status bits.
    #[inline]
    #[must_use]
    pub const fn status(&self) -> BufferStatus {
        self.status
    }

    /// Users registry.
    #[inline]
    #[must_use]
    pub const fn users(&self) -> &UsersRegistry {
        &self.users
    }

    /// Returns whether the physical buffer went back to its pool.
    #[inline]
    #[must_use]
    pub const fn is_returned(&self) -> bool {
        self.status.contains(BufferStatus::RETURNED_TO_POOL)
    }

    /// Returns whether the physical handle is still held.
    #[inline]
    #[must_use]
    pub const fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Merges `mask` into the user's status and returns the merged value.
    ///
    /// A producer whose merged status shows `RELEASED` without `USED` never
    /// wrote content: the buffer is flagged `ERROR` so consumers do not trust
    /// stale data.
    #[must_use]
    pub fn mark_status(&mut self, id: UserId, mask: UserStatus) -> UserStatus {
        let merged = self.users.mark_status(id, mask);

        if self.users.category(id) == Some(UserCategory::Producer) {
            if mask.intersects(UserStatus::RELEASED | UserStatus::PRE_RELEASED) {
                self.status.remove(BufferStatus::WRITE_IN_PROGRESS);
            }
            if merged.contains(UserStatus::RELEASED)
                && !merged.contains(UserStatus::USED)
                && !self.status.contains(BufferStatus::ERROR)
            {
                tracing::warn!(
                    "stream {} producer {} released without producing content",
                    self.stream,
                    id
                );
                self.status.insert(BufferStatus::ERROR);
            }
        }

        merged
    }

    /// Grants `caller` access to the buffer.
    ///
    /// Returns `None` when the handle is gone, every user already released,
    /// or a user registered ahead of `caller` has neither released nor
    /// pre-released.
    pub fn try_acquire(&mut self, caller: UserId) -> Option<AcquiredBuffer<B>>
    where
        B: Clone,
    {
        let handle = self.handle.as_ref()?;

        if self.users.all_users_released() {
            tracing::warn!(
                "stream {} user {}: all users released this buffer",
                self.stream,
                caller
            );
            return None;
        }
        if !self.users.all_users_released_or_pre_released(caller) {
            tracing::debug!(
                "stream {} user {}: not all prior users released or pre-released",
                self.stream,
                caller
            );
            return None;
        }

        let acquired = AcquiredBuffer {
            stream: self.stream,
            handle: handle.clone(),
            status: self.status,
        };
        if self.users.category(caller) == Some(UserCategory::Producer) {
            self.status.insert(BufferStatus::WRITE_IN_PROGRESS);
        }
        Some(acquired)
    }

    pub(crate) fn seal_users(&mut self) {
        self.users.seal();
    }

    /// Moves the handle out if every user released and it was not returned.
    ///
    /// Sets `RETURNED_TO_POOL`; a second call always yields `None`.
    pub(crate) fn take_if_all_released(&mut self) -> Option<PoolReturn<B>> {
        if self.is_returned() || !self.users.all_users_released() {
            return None;
        }
        let buffer = self.handle.take()?;
        self.status.insert(BufferStatus::RETURNED_TO_POOL);
        self.status.remove(BufferStatus::WRITE_IN_PROGRESS);

        Some(PoolReturn {
            stream: self.stream,
            name: self.pool_name.clone(),
            pool: Weak::clone(&self.pool),
            buffer,
        })
    }
}

impl<B> std::fmt::Debug for SharedBuffer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("stream", &self.stream)
            .field("scope", &self.scope)
            .field("pool_name", &self.pool_name)
            .field("status", &self.status)
            .field("users", &self.users.len())
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}

/// A buffer granted to a user by a successful acquire.
///
/// Carries a status snapshot taken at acquire time, so consumers can see
/// `ERROR` without another round-trip through the set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquiredBuffer<B> {
    stream: StreamId,
    handle: B,
    status: BufferStatus,
}

impl<B> AcquiredBuffer<B> {
    /// Stream of the buffer.
    #[inline]
    #[must_use]
    pub const fn stream(&self) -> StreamId {
        self.stream
    }

    /// Physical handle.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> &B {
        &self.handle
    }

    /// Consumes the grant, returning the physical handle.
    #[inline]
    #[must_use]
    pub fn into_handle(self) -> B {
        self.handle
    }

    /// Status at acquire time.
    #[inline]
    #[must_use]
    pub const fn status(&self) -> BufferStatus {
        self.status
    }

    /// Returns whether the content is flagged as untrustworthy.
    #[inline]
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status.contains(BufferStatus::ERROR)
    }
}

/// A physical buffer on its way back to its pool.
pub(crate) struct PoolReturn<B> {
    pub(crate) stream: StreamId,
    name: String,
    pool: Weak<dyn BufferPool<B>>,
    buffer: B,
}

impl<B> PoolReturn<B> {
    /// Hands the buffer to its pool. Must run without the set lock held.
    pub(crate) fn hand_back(self) {
        match self.pool.upgrade() {
            Some(pool) => pool.release_to_pool(&self.name, self.buffer),
            None => tracing::warn!(
                "stream {}: pool {} is gone, dropping buffer",
                self.stream,
                self.name
            ),
        }
    }
}
