//! ID generation utilities.

use std::sync::{LazyLock, Mutex, PoisonError};
use ulid::{Generator, Ulid};

/// Process-wide monotonic source, so ids sort in creation order even
/// within the same millisecond.
static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// IDs are lower-case, 26 characters long, and strictly increasing
    /// across calls in this process. Ordering rows by id therefore matches
    /// insertion order, which breaks ties between equal timestamps.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut generator = GENERATOR.lock().unwrap_or_else(PoisonError::into_inner);
        // Overflow needs 2^80 ids in one millisecond; fall back to a fresh ULID.
        generator
            .generate()
            .unwrap_or_else(|_| Ulid::new())
            .to_string()
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let id_gen = IdGenerator::new();
        let ids: Vec<String> = (0..1000).map(|_| id_gen.generate()).collect();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
