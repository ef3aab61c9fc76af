//! Named counters for tracking events

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct Counter {
    counters: HashMap<String, usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }

    pub fn increment(&mut self, name: &str, value: usize) {
        *self.counters.entry(name.to_string()).or_insert(0) += value;
    }

    pub fn set(&mut self, name: &str, value: usize) {
        self.counters.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> usize {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, name: &str) {
        self.counters.insert(name.to_string(), 0);
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    /// All counters sorted by name, for stable log output.
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<_> = self
            .counters
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_accumulates() {
        let mut counter = Counter::new();
        counter.increment("rows_added", 3);
        counter.increment("rows_added", 2);
        assert_eq!(counter.get("rows_added"), 5);
        assert_eq!(counter.get("missing"), 0);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let mut counter = Counter::new();
        counter.set("rows_removed", 1);
        counter.set("chunks_created", 4);
        counter.reset("rows_removed");
        assert_eq!(
            counter.snapshot(),
            vec![("chunks_created".to_string(), 4), ("rows_removed".to_string(), 0)]
        );
    }
}
