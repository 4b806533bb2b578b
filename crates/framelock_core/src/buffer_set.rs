//! # Buffer Set
//!
//! All shared buffers of one in-flight frame, keyed by stream.
//!
//! ## Release Path
//!
//! ```text
//!   apply_release(user)
//!     ├─ lock ───────────────────────────────────────────┐
//!     │   mark RELEASED on every buffer `user` is on     │
//!     │   collect buffers whose users all released       │  set lock held
//!     │   decide frame events                            │
//!     ├─ unlock ─────────────────────────────────────────┘
//!     ├─ hand collected buffers to their pools           no lock
//!     └─ notify listeners                                no lock
//! ```
//!
//! Pools and listeners may call back into the set or take their own locks,
//! so neither is ever reached while the set lock is held.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Weak;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::buffer::{AcquiredBuffer, BufferScope, PoolReturn, SharedBuffer};
use crate::error::{BufferError, BufferResult};
use crate::ids::{StreamId, UserId};
use crate::status::{BufferStatus, UserStatus};

/// Something that happened to a frame, as seen by listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameEvent {
    /// `user` pre-released every buffer it is registered on.
    PreReleased {
        /// The user.
        user: UserId,
    },
    /// `user` released every buffer it is registered on.
    UserReleased {
        /// The user.
        user: UserId,
    },
    /// Every physical buffer of the frame is back in its pool. Sent once.
    FrameReleased,
}

/// Observer of frame events.
///
/// Called without any set lock held, from whichever thread drove the release.
pub trait FrameListener: Send + Sync {
    /// Delivers one event for frame `frame_no`.
    fn on_frame_event(&self, frame_no: u32, event: FrameEvent);
}

/// Handle returned by [`BufferSet::attach_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

/// Lock-protected part of a buffer set.
struct SetState<B> {
    internal: HashMap<StreamId, SharedBuffer<B>>,
    app: HashMap<StreamId, SharedBuffer<B>>,
    /// Buffers still holding a physical handle.
    live: usize,
    listeners: Vec<(ListenerToken, Weak<dyn FrameListener>)>,
    next_token: u64,
    /// Set when the last buffer went back to its pool.
    released_at: Option<Instant>,
}

impl<B> SetState<B> {
    fn find_mut(&mut self, stream: StreamId) -> Option<&mut SharedBuffer<B>> {
        match self.internal.get_mut(&stream) {
            Some(buffer) => Some(buffer),
            None => self.app.get_mut(&stream),
        }
    }

    fn find(&self, stream: StreamId) -> Option<&SharedBuffer<B>> {
        self.internal.get(&stream).or_else(|| self.app.get(&stream))
    }

    fn buffers(&self) -> impl Iterator<Item = &SharedBuffer<B>> {
        self.internal.values().chain(self.app.values())
    }

    /// Marks `mask` on every buffer `user` is registered on.
    ///
    /// Returns how many buffers were touched.
    fn mark_everywhere(&mut self, user: UserId, mask: UserStatus) -> usize {
        let mut touched = 0;
        for buffer in self.internal.values_mut().chain(self.app.values_mut()) {
            if buffer.users().contains(user) {
                let _ = buffer.mark_status(user, mask);
                touched += 1;
            }
        }
        touched
    }

    /// Moves out every buffer whose users all released.
    fn collect_returns(&mut self) -> Vec<PoolReturn<B>> {
        let returns: Vec<_> = self
            .internal
            .values_mut()
            .chain(self.app.values_mut())
            .filter_map(SharedBuffer::take_if_all_released)
            .collect();
        self.live -= returns.len();
        returns
    }

    /// Appends `FrameReleased` the first time the live count reaches zero.
    fn check_frame_released(&mut self, returned: usize, events: &mut Vec<FrameEvent>) {
        if returned > 0 && self.live == 0 && self.released_at.is_none() {
            self.released_at = Some(Instant::now());
            events.push(FrameEvent::FrameReleased);
        }
    }

    fn live_listeners(&self) -> Vec<Weak<dyn FrameListener>> {
        self.listeners
            .iter()
            .map(|(_, listener)| Weak::clone(listener))
            .collect()
    }
}

/// Work collected under the set lock and performed after unlocking.
struct Deferred<B> {
    returns: Vec<PoolReturn<B>>,
    events: Vec<FrameEvent>,
    listeners: Vec<Weak<dyn FrameListener>>,
}

/// Buffers of one frame.
///
/// One mutex guards both sub-maps, all user registries and the listener
/// list. Every public method is safe to call from any thread.
///
/// # Example
///
/// ```rust,ignore
/// let set = BufferSet::new(7, 7);
/// set.add(SharedBuffer::new(RAW, "raw", handle, &pool)
///     .with_user(SENSOR, UserCategory::Producer)?
///     .with_user(ISP, UserCategory::Consumer)?)?;
///
/// let raw = set.get_buffer(RAW, SENSOR).expect("sensor is first");
/// let _ = set.mark_user_status(RAW, SENSOR, UserStatus::USED);
/// set.apply_release(SENSOR);
/// ```
pub struct BufferSet<B> {
    request_no: u32,
    frame_no: u32,
    created_at: Instant,
    inner: Mutex<SetState<B>>,
}

impl<B> BufferSet<B> {
    /// Creates an empty set for one frame.
    #[must_use]
    pub fn new(request_no: u32, frame_no: u32) -> Self {
        Self {
            request_no,
            frame_no,
            created_at: Instant::now(),
            inner: Mutex::new(SetState {
                internal: HashMap::new(),
                app: HashMap::new(),
                live: 0,
                listeners: Vec::new(),
                next_token: 0,
                released_at: None,
            }),
        }
    }

    /// Request number this frame serves.
    #[inline]
    #[must_use]
    pub const fn request_no(&self) -> u32 {
        self.request_no
    }

    /// Frame number.
    #[inline]
    #[must_use]
    pub const fn frame_no(&self) -> u32 {
        self.frame_no
    }

    /// Adds a configured buffer and seals its users registry.
    ///
    /// # Errors
    ///
    /// `DuplicateStream` if either sub-map already holds the stream.
    pub fn add(&self, mut buffer: SharedBuffer<B>) -> BufferResult<()> {
        let stream = buffer.stream();
        let mut state = self.inner.lock();

        if state.find(stream).is_some() {
            tracing::warn!("frame {}: stream {} already in set", self.frame_no, stream);
            return Err(BufferError::DuplicateStream(stream));
        }

        buffer.seal_users();
        if buffer.has_handle() {
            state.live += 1;
        }
        match buffer.scope() {
            BufferScope::Internal => state.internal.insert(stream, buffer),
            BufferScope::App => state.app.insert(stream, buffer),
        };
        Ok(())
    }

    /// Grants `caller` the buffer of `stream`.
    ///
    /// Internal buffers are looked up before app buffers. Returns `None` when
    /// the frame has no live buffer left, the stream is unknown, or the
    /// acquire gate refuses `caller`.
    pub fn get_buffer(&self, stream: StreamId, caller: UserId) -> Option<AcquiredBuffer<B>>
    where
        B: Clone,
    {
        let mut state = self.inner.lock();
        if state.live == 0 {
            tracing::debug!("frame {}: no live buffer left", self.frame_no);
            return None;
        }
        state.find_mut(stream)?.try_acquire(caller)
    }

    /// Merges `mask` into `user`'s status on `stream`.
    ///
    /// Returns the merged status, or `None` if the stream is unknown.
    /// Does not return buffers to pools; see [`Self::apply_release`].
    #[must_use]
    pub fn mark_user_status(
        &self,
        stream: StreamId,
        user: UserId,
        mask: UserStatus,
    ) -> Option<UserStatus> {
        let mut state = self.inner.lock();
        let buffer = state.find_mut(stream)?;
        Some(buffer.mark_status(user, mask))
    }

    /// Marks `user` `RELEASED` on one stream and returns the buffer to its
    /// pool if that completes it.
    ///
    /// Returns whether the buffer went back to its pool.
    ///
    /// # Errors
    ///
    /// `UnknownStream` if the set has no buffer for `stream`.
    pub fn release(&self, stream: StreamId, user: UserId) -> BufferResult<bool> {
        let deferred = {
            let mut state = self.inner.lock();
            let Some(buffer) = state.find_mut(stream) else {
                return Err(BufferError::UnknownStream(stream));
            };
            let _ = buffer.mark_status(user, UserStatus::RELEASED);
            let returned = buffer.take_if_all_released();

            let mut events = Vec::new();
            let count = usize::from(returned.is_some());
            state.live -= count;
            state.check_frame_released(count, &mut events);
            Deferred {
                listeners: if events.is_empty() { Vec::new() } else { state.live_listeners() },
                returns: returned.into_iter().collect(),
                events,
            }
        };

        let returned = !deferred.returns.is_empty();
        self.finish(deferred);
        Ok(returned)
    }

    /// Marks `user` `PRE_RELEASED` on every buffer it is registered on.
    ///
    /// Buffers whose users are now all released go back to their pools.
    /// Returns how many did.
    pub fn apply_pre_release(&self, user: UserId) -> usize {
        self.apply(user, UserStatus::PRE_RELEASED, FrameEvent::PreReleased { user })
    }

    /// Marks `user` `RELEASED` on every buffer it is registered on.
    ///
    /// Buffers whose users are now all released go back to their pools.
    /// Returns how many did.
    pub fn apply_release(&self, user: UserId) -> usize {
        self.apply(user, UserStatus::RELEASED, FrameEvent::UserReleased { user })
    }

    fn apply(&self, user: UserId, mask: UserStatus, event: FrameEvent) -> usize {
        let deferred = {
            let mut state = self.inner.lock();
            let touched = state.mark_everywhere(user, mask);
            if touched == 0 {
                tracing::debug!(
                    "frame {}: user {} is not registered on any buffer",
                    self.frame_no,
                    user
                );
            }

            let returns = state.collect_returns();
            let mut events = Vec::new();
            if touched > 0 {
                events.push(event);
            }
            state.check_frame_released(returns.len(), &mut events);

            Deferred {
                listeners: if events.is_empty() { Vec::new() } else { state.live_listeners() },
                returns,
                events,
            }
        };

        let count = deferred.returns.len();
        self.finish(deferred);
        count
    }

    /// Runs the unlocked half of a release.
    fn finish(&self, deferred: Deferred<B>) {
        for ret in deferred.returns {
            tracing::trace!("frame {}: stream {} back to pool", self.frame_no, ret.stream);
            ret.hand_back();
        }

        for listener in deferred.listeners {
            // Listeners dropped since attach are skipped.
            let Some(listener) = listener.upgrade() else {
                continue;
            };
            for &event in &deferred.events {
                listener.on_frame_event(self.frame_no, event);
            }
        }

        if deferred.events.contains(&FrameEvent::FrameReleased) {
            tracing::debug!(
                "frame {} (request {}) released after {:?}",
                self.frame_no,
                self.request_no,
                self.created_at.elapsed()
            );
        }
    }

    /// Registers a listener. The set only keeps a weak reference.
    pub fn attach_listener(&self, listener: Weak<dyn FrameListener>) -> ListenerToken {
        let mut state = self.inner.lock();
        let token = ListenerToken(state.next_token);
        state.next_token += 1;
        state.listeners.push((token, listener));
        token
    }

    /// Removes a listener. Returns whether it was attached.
    pub fn detach_listener(&self, token: ListenerToken) -> bool {
        let mut state = self.inner.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(t, _)| *t != token);
        state.listeners.len() != before
    }

    /// Number of buffers still holding a physical handle.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.lock().live
    }

    /// Returns whether the set has a buffer for `stream`.
    #[must_use]
    pub fn contains(&self, stream: StreamId) -> bool {
        self.inner.lock().find(stream).is_some()
    }

    /// Status of the buffer of `stream`.
    #[must_use]
    pub fn buffer_status(&self, stream: StreamId) -> Option<BufferStatus> {
        self.inner.lock().find(stream).map(SharedBuffer::status)
    }

    /// Status of `user` on the buffer of `stream`.
    #[must_use]
    pub fn user_status(&self, stream: StreamId, user: UserId) -> Option<UserStatus> {
        self.inner.lock().find(stream)?.users().status(user)
    }

    /// Returns whether every buffer went back to its pool.
    #[must_use]
    pub fn is_frame_released(&self) -> bool {
        self.inner.lock().released_at.is_some()
    }

    /// Time from creation until the frame was released, once it has been.
    #[must_use]
    pub fn lifetime(&self) -> Option<Duration> {
        self.inner
            .lock()
            .released_at
            .map(|at| at.duration_since(self.created_at))
    }

    /// Returns whether the set lock is currently held by anyone.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl<B> std::fmt::Debug for BufferSet<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSet")
            .field("request_no", &self.request_no)
            .field("frame_no", &self.frame_no)
            .finish_non_exhaustive()
    }
}

impl<B> Drop for BufferSet<B> {
    fn drop(&mut self) {
        let state = self.inner.get_mut();
        if state.live == 0 {
            return;
        }

        let mut pending = String::new();
        for buffer in state.buffers().filter(|b| b.has_handle()) {
            let _ = write!(pending, "[stream {}: {}] ", buffer.stream(), buffer.users());
        }
        tracing::warn!(
            "frame {} (request {}) dropped with {} unreleased buffer(s): {}",
            self.frame_no,
            self.request_no,
            state.live,
            pending
        );
    }
}
