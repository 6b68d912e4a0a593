//! Working set of candidate endpoints for one resolution session.
//!
//! The registry owns the two collections the selection machine consults:
//! candidates under probe and candidates known to have failed. Insertion is
//! idempotent and duplicate failures never double-count, so the exhaustion
//! check stays correct under at-least-once event delivery.

use std::collections::BTreeSet;

#[derive(Clone, Debug, Default)]
pub struct CandidateRegistry {
    candidates: BTreeSet<String>,
    failed: BTreeSet<String>,
}

impl CandidateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working set with a fresh batch and clear all failures.
    pub fn set_initial(&mut self, urls: impl IntoIterator<Item = String>) {
        self.candidates = urls.into_iter().collect();
        self.failed.clear();
    }

    /// Insert late-arriving candidates; already-known URLs are skipped.
    ///
    /// Returns how many were genuinely new.
    pub fn add_extra<S: AsRef<str>>(&mut self, urls: &[S]) -> usize {
        let mut added = 0;
        for url in urls {
            if self.candidates.insert(url.as_ref().to_string()) {
                added += 1;
            }
        }
        added
    }

    /// Record a validation failure for `url`.
    ///
    /// Failures for URLs outside the working set are ignored for counting
    /// purposes (the caller still reports them to telemetry). Returns true
    /// iff every known candidate has now failed.
    pub fn mark_failed(&mut self, url: &str) -> bool {
        if self.candidates.contains(url) {
            self.failed.insert(url.to_string());
        }
        self.all_failed()
    }

    pub fn all_failed(&self) -> bool {
        !self.candidates.is_empty() && self.failed.len() >= self.candidates.len()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.candidates.contains(url)
    }

    pub fn total(&self) -> usize {
        self.candidates.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(urls: &[&str]) -> CandidateRegistry {
        let mut registry = CandidateRegistry::new();
        registry.set_initial(urls.iter().map(|u| u.to_string()));
        registry
    }

    #[test]
    fn add_extra_is_idempotent() {
        let mut registry = registry_with(&["https://a/", "https://b/"]);
        assert_eq!(registry.add_extra(&["https://c/"]), 1);
        assert_eq!(registry.total(), 3);
        assert_eq!(registry.add_extra(&["https://c/"]), 0);
        assert_eq!(registry.total(), 3);
        assert_eq!(registry.add_extra(&["https://a/", "https://d/"]), 1);
        assert_eq!(registry.total(), 4);
    }

    #[test]
    fn duplicate_failures_do_not_double_count() {
        let mut registry = registry_with(&["https://a/", "https://b/"]);
        assert!(!registry.mark_failed("https://a/"));
        assert!(!registry.mark_failed("https://a/"));
        assert_eq!(registry.failed_count(), 1);
        assert!(registry.mark_failed("https://b/"));
    }

    #[test]
    fn unknown_url_failure_does_not_exhaust() {
        let mut registry = registry_with(&["https://a/"]);
        assert!(!registry.mark_failed("https://elsewhere/"));
        assert_eq!(registry.failed_count(), 0);
    }

    #[test]
    fn empty_registry_is_never_exhausted() {
        let mut registry = CandidateRegistry::new();
        assert!(!registry.all_failed());
        assert!(!registry.mark_failed("https://a/"));
    }

    #[test]
    fn set_initial_resets_failures() {
        let mut registry = registry_with(&["https://a/"]);
        registry.mark_failed("https://a/");
        registry.set_initial(["https://a/".to_string(), "https://b/".to_string()]);
        assert_eq!(registry.failed_count(), 0);
        assert_eq!(registry.total(), 2);
    }

    #[test]
    fn late_candidate_reopens_exhaustion() {
        let mut registry = registry_with(&["https://a/"]);
        assert!(registry.mark_failed("https://a/"));
        registry.add_extra(&["https://b/"]);
        assert!(!registry.all_failed());
    }
}
