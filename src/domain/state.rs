use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// In-memory monitor state. Lives for the whole process and is never persisted.
#[derive(Debug)]
pub struct MonitorState {
    start_time: DateTime<Utc>,
    seen_ids: HashSet<String>,
    baselined: HashSet<String>,
}

impl MonitorState {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            seen_ids: HashSet::new(),
            baselined: HashSet::new(),
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    pub(crate) fn insert_seen(&mut self, id: &str) {
        self.seen_ids.insert(id.to_string());
    }

    pub fn seen_count(&self) -> usize {
        self.seen_ids.len()
    }

    /// True until the account's baseline snapshot has been taken.
    pub fn is_first_run(&self, account: &str) -> bool {
        !self.baselined.contains(account)
    }

    pub fn complete_first_run(&mut self, account: &str) {
        self.baselined.insert(account.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_is_tracked_per_account() {
        let mut state = MonitorState::new(Utc::now());
        assert!(state.is_first_run("alice"));
        assert!(state.is_first_run("bob"));

        state.complete_first_run("alice");
        assert!(!state.is_first_run("alice"));
        assert!(state.is_first_run("bob"));
    }

    #[test]
    fn seen_ids_only_grow() {
        let mut state = MonitorState::new(Utc::now());
        state.insert_seen("a");
        state.insert_seen("a");
        state.insert_seen("b");
        assert_eq!(state.seen_count(), 2);
        assert!(state.has_seen("a"));
    }
}
