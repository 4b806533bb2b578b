//! # Users Registry
//!
//! Tracks which users may touch one buffer, and in what order.
//!
//! ## Release Order
//!
//! ```text
//! position:   0          1          2          3
//!          [Sensor P] [ISP C]    [FD C]     [App C]
//!             RELEASED   PRE_REL    -          -
//!                                   ^ may acquire: everyone ahead is
//!                                     RELEASED or PRE_RELEASED
//! ```
//!
//! Positions are fixed when the frame is configured. They encode the commit
//! order of the pipeline, not the order in which threads happen to call in.

use std::collections::HashMap;
use std::fmt;

use crate::error::{BufferError, BufferResult};
use crate::ids::{UserCategory, UserId};
use crate::status::UserStatus;

/// One registered user.
#[derive(Clone, Copy, Debug)]
struct UserEntry {
    id: UserId,
    category: UserCategory,
    status: UserStatus,
}

/// Users of a single shared buffer, in registration order.
///
/// # Thread Safety
///
/// Not synchronized on its own. The owning buffer set serializes every
/// access under its lock.
#[derive(Clone, Debug, Default)]
pub struct UsersRegistry {
    /// Users in registration order.
    users: Vec<UserEntry>,
    /// UserId -> position in `users`.
    positions: HashMap<UserId, usize>,
    /// Set once the owning frame is configured.
    sealed: bool,
}

impl UsersRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user at the next position.
    ///
    /// # Errors
    ///
    /// `UserAlreadyRegistered` if `id` is present, `RegistrySealed` once the
    /// registry has been sealed.
    pub fn register(&mut self, id: UserId, category: UserCategory) -> BufferResult<usize> {
        if self.sealed {
            return Err(BufferError::RegistrySealed(id));
        }
        if self.positions.contains_key(&id) {
            tracing::warn!("user {} already exists", id);
            return Err(BufferError::UserAlreadyRegistered(id));
        }

        let position = self.users.len();
        self.users.push(UserEntry {
            id,
            category,
            status: UserStatus::empty(),
        });
        self.positions.insert(id, position);
        Ok(position)
    }

    /// Forbids further registration.
    #[inline]
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Returns whether registration is closed.
    #[inline]
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Merges `mask` into the user's status and returns the merged value.
    ///
    /// Unknown users get an empty status back.
    #[must_use]
    pub fn mark_status(&mut self, id: UserId, mask: UserStatus) -> UserStatus {
        let Some(&position) = self.positions.get(&id) else {
            tracing::warn!("cannot find user {} (#users {})", id, self.users.len());
            return UserStatus::empty();
        };
        let entry = &mut self.users[position];
        entry.status |= mask;
        entry.status
    }

    /// Current status of a user, if registered.
    #[must_use]
    pub fn status(&self, id: UserId) -> Option<UserStatus> {
        self.entry(id).map(|entry| entry.status)
    }

    /// Category of a user, if registered.
    #[must_use]
    pub fn category(&self, id: UserId) -> Option<UserCategory> {
        self.entry(id).map(|entry| entry.category)
    }

    /// Registration position of a user, if registered.
    #[inline]
    #[must_use]
    pub fn position(&self, id: UserId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Returns whether the user is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: UserId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Number of registered users.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns whether no user is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Number of registered producers.
    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.count_category(UserCategory::Producer)
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.count_category(UserCategory::Consumer)
    }

    /// True iff every registered user has `RELEASED` set.
    #[must_use]
    pub fn all_users_released(&self) -> bool {
        self.users
            .iter()
            .all(|entry| entry.status.contains(UserStatus::RELEASED))
    }

    /// Acquire gate: true iff every user registered before `caller` has
    /// `RELEASED` or `PRE_RELEASED` set.
    ///
    /// An unknown caller never passes.
    #[must_use]
    pub fn all_users_released_or_pre_released(&self, caller: UserId) -> bool {
        let Some(position) = self.position(caller) else {
            return false;
        };
        let done = UserStatus::RELEASED | UserStatus::PRE_RELEASED;
        match self.users[..position]
            .iter()
            .find(|entry| !entry.status.intersects(done))
        {
            Some(blocker) => {
                tracing::debug!(
                    "user {} ahead of user {} has not released or pre-released",
                    blocker.id,
                    caller
                );
                false
            }
            None => true,
        }
    }

    /// True iff every producer has `RELEASED` set.
    #[must_use]
    pub fn all_producers_released(&self) -> bool {
        self.producers()
            .all(|entry| entry.status.contains(UserStatus::RELEASED))
    }

    /// True iff every producer has `USED` set.
    #[must_use]
    pub fn all_producers_used(&self) -> bool {
        self.producers()
            .all(|entry| entry.status.contains(UserStatus::USED))
    }

    /// Status summarizing all users.
    ///
    /// `RELEASED` if everyone released, `PRE_RELEASED` if everyone released
    /// or pre-released, empty otherwise.
    #[must_use]
    pub fn aggregate_status(&self) -> UserStatus {
        let done = UserStatus::RELEASED | UserStatus::PRE_RELEASED;
        if self.all_users_released() {
            UserStatus::RELEASED
        } else if self.users.iter().all(|entry| entry.status.intersects(done)) {
            UserStatus::PRE_RELEASED
        } else {
            UserStatus::empty()
        }
    }

    /// Drops every user and reopens registration.
    pub fn reset(&mut self) {
        self.users.clear();
        self.positions.clear();
        self.sealed = false;
    }

    fn entry(&self, id: UserId) -> Option<&UserEntry> {
        self.positions.get(&id).map(|&position| &self.users[position])
    }

    fn producers(&self) -> impl Iterator<Item = &UserEntry> {
        self.users
            .iter()
            .filter(|entry| entry.category == UserCategory::Producer)
    }

    fn count_category(&self, category: UserCategory) -> usize {
        self.users
            .iter()
            .filter(|entry| entry.category == category)
            .count()
    }
}

impl fmt::Display for UsersRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (title, category) in [
            ("Producer", UserCategory::Producer),
            ("Consumer", UserCategory::Consumer),
        ] {
            let of_kind = || self.users.iter().filter(move |e| e.category == category);
            let total = of_kind().count();
            if total == 0 {
                continue;
            }
            let count = |flag: UserStatus| of_kind().filter(|e| e.status.contains(flag)).count();
            write!(
                f,
                "{title} #{total} used:{} released:{} pre-released:{}; ",
                count(UserStatus::USED),
                count(UserStatus::RELEASED),
                count(UserStatus::PRE_RELEASED),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSOR: UserId = UserId(1);
    const ISP: UserId = UserId(2);
    const APP: UserId = UserId(3);

    fn pipeline() -> UsersRegistry {
        let mut users = UsersRegistry::new();
        assert_eq!(users.register(SENSOR, UserCategory::Producer).unwrap(), 0);
        assert_eq!(users.register(ISP, UserCategory::Consumer).unwrap(), 1);
        assert_eq!(users.register(APP, UserCategory::Consumer).unwrap(), 2);
        users
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut users = pipeline();
        assert_eq!(
            users.register(ISP, UserCategory::Producer),
            Err(BufferError::UserAlreadyRegistered(ISP))
        );
        assert_eq!(users.len(), 3);
        assert_eq!(users.category(ISP), Some(UserCategory::Consumer));
    }

    #[test]
    fn test_sealed_registry_rejects_users() {
        let mut users = pipeline();
        users.seal();
        assert_eq!(
            users.register(UserId(9), UserCategory::Consumer),
            Err(BufferError::RegistrySealed(UserId(9)))
        );
    }

    #[test]
    fn test_mark_status_merges() {
        let mut users = pipeline();
        assert_eq!(users.mark_status(SENSOR, UserStatus::USED), UserStatus::USED);
        assert_eq!(
            users.mark_status(SENSOR, UserStatus::RELEASED),
            UserStatus::USED | UserStatus::RELEASED
        );
        assert_eq!(users.mark_status(UserId(42), UserStatus::USED), UserStatus::empty());
    }

    #[test]
    fn test_gate_follows_registration_order() {
        let mut users = pipeline();

        // First user always passes: nobody is ahead.
        assert!(users.all_users_released_or_pre_released(SENSOR));
        assert!(!users.all_users_released_or_pre_released(ISP));
        assert!(!users.all_users_released_or_pre_released(APP));

        let _ = users.mark_status(SENSOR, UserStatus::USED | UserStatus::RELEASED);
        assert!(users.all_users_released_or_pre_released(ISP));
        assert!(!users.all_users_released_or_pre_released(APP));

        let _ = users.mark_status(ISP, UserStatus::PRE_RELEASED);
        assert!(users.all_users_released_or_pre_released(APP));

        assert!(!users.all_users_released_or_pre_released(UserId(77)));
    }

    #[test]
    fn test_gate_ignores_users_behind_caller() {
        let mut users = pipeline();
        // App releasing early does not open the gate for ISP.
        let _ = users.mark_status(APP, UserStatus::RELEASED);
        assert!(!users.all_users_released_or_pre_released(ISP));
    }

    #[test]
    fn test_all_released_and_aggregate() {
        let mut users = pipeline();
        assert!(!users.all_users_released());
        assert_eq!(users.aggregate_status(), UserStatus::empty());

        let _ = users.mark_status(SENSOR, UserStatus::USED | UserStatus::RELEASED);
        let _ = users.mark_status(ISP, UserStatus::PRE_RELEASED);
        let _ = users.mark_status(APP, UserStatus::RELEASED);
        assert!(!users.all_users_released());
        assert_eq!(users.aggregate_status(), UserStatus::PRE_RELEASED);

        let _ = users.mark_status(ISP, UserStatus::RELEASED);
        assert!(users.all_users_released());
        assert_eq!(users.aggregate_status(), UserStatus::RELEASED);
    }

    #[test]
    fn test_producer_queries() {
        let mut users = pipeline();
        assert_eq!(users.producer_count(), 1);
        assert_eq!(users.consumer_count(), 2);
        assert!(!users.all_producers_used());

        let _ = users.mark_status(SENSOR, UserStatus::USED);
        assert!(users.all_producers_used());
        assert!(!users.all_producers_released());

        let _ = users.mark_status(SENSOR, UserStatus::RELEASED);
        assert!(users.all_producers_released());
    }

    #[test]
    fn test_reset_reopens_registration() {
        let mut users = pipeline();
        users.seal();
        users.reset();
        assert!(users.is_empty());
        assert!(!users.is_sealed());
        assert!(users.register(SENSOR, UserCategory::Producer).is_ok());
    }

    #[test]
    fn test_summary() {
        let mut users = pipeline();
        let _ = users.mark_status(SENSOR, UserStatus::USED | UserStatus::RELEASED);
        let summary = users.to_string();
        assert!(summary.contains("Producer #1 used:1 released:1 pre-released:0"));
        assert!(summary.contains("Consumer #2 used:0 released:0 pre-released:0"));
    }
}
