use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Keys under which CRUD collaborators and the public site cache derived
/// data. The auth/payment core only ever invalidates; reads and writes of
/// cached values happen elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    PositionResults(Uuid),
    CandidateTally(Uuid),
    DashboardSummary,
}

pub trait InvalidateCache: Send + Sync {
    fn invalidate(&self, keys: &HashSet<CacheKey>);
}

pub type CacheHandle = Arc<Box<dyn InvalidateCache>>;

/// Used when no cache layer is deployed.
pub struct NoopCache {}

impl NoopCache {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for NoopCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidateCache for NoopCache {
    fn invalidate(&self, keys: &HashSet<CacheKey>) {
        log::debug!("Cache invalidation requested for {} key(s)", keys.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    struct RecordingCache {
        invalidated: Mutex<Vec<CacheKey>>,
    }

    impl InvalidateCache for RecordingCache {
        fn invalidate(&self, keys: &HashSet<CacheKey>) {
            self.invalidated
                .lock()
                .unwrap()
                .extend(keys.iter().cloned());
        }
    }

    #[test]
    fn test_invalidation_receives_all_keys() {
        let cache = RecordingCache {
            invalidated: Mutex::new(Vec::new()),
        };

        let position_id = Uuid::now_v7();
        let candidate_id = Uuid::now_v7();

        let mut keys = HashSet::new();
        keys.insert(CacheKey::PositionResults(position_id));
        keys.insert(CacheKey::CandidateTally(candidate_id));
        keys.insert(CacheKey::DashboardSummary);

        cache.invalidate(&keys);

        let invalidated = cache.invalidated.lock().unwrap();
        assert_eq!(invalidated.len(), 3);
        assert!(invalidated.contains(&CacheKey::PositionResults(position_id)));
        assert!(invalidated.contains(&CacheKey::CandidateTally(candidate_id)));
        assert!(invalidated.contains(&CacheKey::DashboardSummary));
    }
}
