use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use autopattern_core::PatternRecord;

/// Patterns inferred during one orchestrator run, keyed by title.
///
/// Branches merge into it concurrently; the lock is held only for the insert.
/// The first record stored under a title wins.
#[derive(Debug, Default)]
pub struct InferredPatternSet {
    patterns: Mutex<HashMap<String, PatternRecord>>,
}

impl InferredPatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PatternRecord>> {
        self.patterns.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns `false` when the title was already present.
    pub fn insert(&self, title: String, record: PatternRecord) -> bool {
        let mut patterns = self.lock();
        if patterns.contains_key(&title) {
            return false;
        }
        patterns.insert(title, record);
        true
    }

    /// Merge a branch result; returns how many titles were new.
    pub fn merge(&self, found: HashMap<String, PatternRecord>) -> usize {
        let mut patterns = self.lock();
        let mut added = 0;
        for (title, record) in found {
            if !patterns.contains_key(&title) {
                patterns.insert(title, record);
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> HashMap<String, PatternRecord> {
        self.lock().clone()
    }

    pub fn into_inner(self) -> HashMap<String, PatternRecord> {
        self.patterns.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn record(title: &str, time_field: &str) -> PatternRecord {
        PatternRecord {
            title: title.to_string(),
            time_field_name: time_field.to_string(),
        }
    }

    #[test]
    fn duplicate_titles_collapse() {
        let set = InferredPatternSet::new();
        assert!(set.insert("foo-*".into(), record("foo-*", "@timestamp")));
        assert!(!set.insert("foo-*".into(), record("foo-*", "other")));
        assert_eq!(set.len(), 1);

        let patterns = set.into_inner();
        assert_eq!(patterns["foo-*"].time_field_name, "@timestamp");
    }

    #[test]
    fn merge_counts_new_titles_only() {
        let set = InferredPatternSet::new();
        set.insert("a-*".into(), record("a-*", "ts"));

        let found = HashMap::from([
            ("a-*".to_string(), record("a-*", "ts")),
            ("b-*".to_string(), record("b-*", "ts")),
        ]);
        assert_eq!(set.merge(found), 1);
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
    }

    #[test]
    fn concurrent_merges_keep_every_title() {
        let set = Arc::new(InferredPatternSet::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let set = set.clone();
                std::thread::spawn(move || {
                    let found = (0..50)
                        .map(|j| {
                            let title = format!("t{}-*", (i * 50 + j) % 200);
                            (title.clone(), record(&title, "ts"))
                        })
                        .collect();
                    set.merge(found)
                })
            })
            .collect();

        let added: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(added, 200);
        assert_eq!(set.snapshot().len(), 200);
    }
}
