//! # Identifiers
//!
//! Opaque ids for pipeline users and streams.

use std::fmt;

/// Opaque identifier of a logical buffer user (a pipeline node or role).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identity of a stream. A frame holds at most one buffer per stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Role a user plays against a specific buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserCategory {
    /// Writes buffer content.
    Producer,
    /// Reads buffer content.
    Consumer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_hex() {
        assert_eq!(UserId(0x1f).to_string(), "0x1f");
        assert_eq!(StreamId(16).to_string(), "0x10");
    }
}
