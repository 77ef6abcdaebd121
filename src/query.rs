//! Search-query assembly: free-text description plus object-count filters.
//!
//! Object filters are keyed by label; adding a label twice is rejected
//! synchronously with no state change, so the caller can surface the message
//! and keep the existing filter untouched.

use thiserror::Error;

use crate::api::{ObjectQuery, SearchQuery};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Object already added.")]
    DuplicateLabel,
}

/// The set of object filters attached to the next search.
#[derive(Debug, Default)]
pub struct FilterSet {
    objects: Vec<ObjectQuery>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one object filter. Fails if a filter with the same label already
    /// exists; nothing is mutated on failure.
    pub fn add(&mut self, object: ObjectQuery) -> Result<(), QueryError> {
        if self.objects.iter().any(|o| o.label == object.label) {
            return Err(QueryError::DuplicateLabel);
        }
        self.objects.push(object);
        Ok(())
    }

    /// Remove the filter with `label`. Returns whether one was removed.
    pub fn remove(&mut self, label: &str) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.label != label);
        self.objects.len() != before
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn objects(&self) -> &[ObjectQuery] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Assemble the request body for `POST /search`.
    pub fn build_query(&self, description: &str, audio: &str) -> SearchQuery {
        SearchQuery {
            description: description.to_string(),
            objects: self.objects.clone(),
            audio: audio.to_string(),
        }
    }
}

/// Display text for a filter's instance-count constraint:
/// `Count: >= min` when unbounded, `Count: [min, max]` otherwise.
pub fn count_label(object: &ObjectQuery) -> String {
    match object.max_instances {
        Some(max) => format!("Count: [{}, {}]", object.min_instances, max),
        None => format!("Count: >= {}", object.min_instances),
    }
}
