use std::fmt;
use uuid::Uuid;

/// Identifier assigned to each accepted connection.
///
/// Only used to tie log records of one connection together; it never
/// travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, enough to tell connections apart in logs.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_generate_unique() {
        // ---
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_format() {
        // ---
        let id = ConnectionId::generate();
        assert_eq!(id.to_string().len(), 36); // Standard UUID format
        assert_eq!(id.short().len(), 8);
    }
}
