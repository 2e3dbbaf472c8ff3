//! Static response cache of pre-authored answers.
//!
//! Queries are normalized (lowercase + trim) and matched first exactly,
//! then by substring containment in either direction, in table order.
//! Short queries can match many keys; the first one wins.

use std::collections::HashMap;

use tollgate_core::config::CacheEntryConfig;

pub struct ResponseCache {
    /// Normalized question → answer, in table order.
    entries: Vec<(String, String)>,
    exact: HashMap<String, usize>,
}

impl ResponseCache {
    pub fn new<I, Q, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Q, A)>,
        Q: AsRef<str>,
        A: Into<String>,
    {
        let mut entries = Vec::new();
        let mut exact = HashMap::new();
        for (question, answer) in pairs {
            let key = normalize(question.as_ref());
            if key.is_empty() || exact.contains_key(&key) {
                continue;
            }
            exact.insert(key.clone(), entries.len());
            entries.push((key, answer.into()));
        }
        Self { entries, exact }
    }

    pub fn from_config(entries: &[CacheEntryConfig]) -> Self {
        Self::new(
            entries
                .iter()
                .map(|e| (e.question.as_str(), e.answer.clone())),
        )
    }

    pub fn lookup(&self, query: &str) -> Option<&str> {
        let q = normalize(query);
        if q.is_empty() {
            return None;
        }
        if let Some(&idx) = self.exact.get(&q) {
            return Some(self.entries[idx].1.as_str());
        }
        self.entries
            .iter()
            .find(|(key, _)| key.contains(&q) || q.contains(key.as_str()))
            .map(|(_, answer)| answer.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
