//! Per-session cache of detection results.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::domain::detection::DetectionResult;
use crate::domain::foundation::{SessionId, Timestamp};

struct Entry {
    result: DetectionResult,
    expires_at: Timestamp,
}

pub struct DetectionCache {
    ttl: Duration,
    entries: RwLock<HashMap<SessionId, Entry>>,
}

impl DetectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Unexpired result for the session.
    pub fn get(&self, session_id: &SessionId, now: Timestamp) -> Option<DetectionResult> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(session_id)
            .filter(|entry| now.is_before(&entry.expires_at))
            .map(|entry| entry.result.clone())
    }

    pub fn insert(&self, session_id: SessionId, result: DetectionResult, now: Timestamp) {
        let expires_at = now.plus_secs(self.ttl.as_secs());
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id, Entry { result, expires_at });
    }

    pub fn invalidate(&self, session_id: &SessionId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }

    /// Drops expired entries; returns how many were removed.
    pub fn purge_expired(&self, now: Timestamp) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| now.is_before(&entry.expires_at));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::culture::CulturalProfile;
    use crate::domain::detection::DetectionMethod;
    use crate::domain::foundation::CountryCode;
    use std::sync::Arc;

    fn result() -> DetectionResult {
        let code = CountryCode::new("DE").unwrap();
        DetectionResult {
            profile: Arc::new(CulturalProfile::generic(code.clone())),
            country_code: code,
            confidence: 0.36,
            method: DetectionMethod::Ip,
            profile_resolved: true,
            rules: Vec::new(),
            adaptations: Vec::new(),
            detected_at: Timestamp::from_unix_secs(1_000),
        }
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = DetectionCache::new(Duration::from_secs(1800));
        let session = SessionId::new("s").unwrap();
        let t0 = Timestamp::from_unix_secs(1_000);
        cache.insert(session.clone(), result(), t0);

        assert!(cache.get(&session, t0.plus_secs(1799)).is_some());
        assert!(cache.get(&session, t0.plus_secs(1800)).is_none());
        assert_eq!(cache.purge_expired(t0.plus_secs(1800)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = DetectionCache::new(Duration::from_secs(60));
        let session = SessionId::new("s").unwrap();
        let now = Timestamp::now();
        cache.insert(session.clone(), result(), now);
        cache.invalidate(&session);
        assert!(cache.get(&session, now).is_none());
    }
}
