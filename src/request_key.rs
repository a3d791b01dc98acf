use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_KEY: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp that names one acquisition's temporary files.
///
/// Keys handed out by [`RequestKey::next`] are unique and strictly increasing for the life of
/// the process: two requests in the same millisecond get consecutive values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey(u64);

impl RequestKey {
    pub fn next() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut prev = LAST_KEY.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match LAST_KEY.compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Self(candidate),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Use a caller-chosen key. The caller is responsible for uniqueness.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// File stem the extractor writes to, e.g. `audio_1700000000000`.
    pub fn file_stem(self) -> String {
        format!("audio_{}", self.0)
    }

    /// Prefix shared by every file belonging to this request (stem plus the dot).
    pub fn file_prefix(self) -> String {
        format!("audio_{}.", self.0)
    }

    /// Display name for the finished artifact.
    pub fn artifact_name(self, extension: &str) -> String {
        format!("youtube_{}.{}", self.0, extension)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
