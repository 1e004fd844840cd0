//! Id and timestamp generation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// Source of unique ids and current timestamps.
///
/// Engines use random v4 UUIDs. Tests can switch to a predictable
/// `prefix-N` sequence.
#[derive(Debug, Default)]
pub struct ModelUtils {
    sequence: Option<Mutex<(String, u64)>>,
}

impl ModelUtils {
    /// UUID-backed ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids `prefix-1`, `prefix-2`, ...
    pub fn sequential(prefix: impl Into<String>) -> Self {
        Self {
            sequence: Some(Mutex::new((prefix.into(), 0))),
        }
    }

    /// A new unique id.
    pub fn generate_id(&self) -> String {
        match &self.sequence {
            Some(sequence) => {
                let mut guard = sequence.lock();
                guard.1 += 1;
                format!("{}-{}", guard.0, guard.1)
            }
            None => Uuid::new_v4().to_string(),
        }
    }

    pub fn get_timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// `requested` if given, otherwise a fresh id.
    pub fn ensure_id(&self, requested: Option<&str>) -> String {
        requested.map_or_else(|| self.generate_id(), str::to_string)
    }
}
