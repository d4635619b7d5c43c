//! Positional path-parameter buffer filled by the router.
//!
//! The trie records capture boundaries as byte spans while it searches and
//! only copies them into the value slots once a route has matched. Slots are
//! `String`s that are cleared and refilled, so a warmed-up buffer sized to the
//! largest capture count never allocates on the lookup path.
use std::ops::Range;

#[derive(Debug, Default, Clone)]
pub struct PathParams {
    spans: Vec<Range<usize>>,
    values: Vec<String>,
    len: usize,
}

impl PathParams {
    /// Buffer with `capacity` preallocated value slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            spans: Vec::with_capacity(capacity),
            values: (0..capacity).map(|_| String::new()).collect(),
            len: 0,
        }
    }

    /// Number of values captured by the last successful lookup.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        (index < self.len).then(|| self.values[index].as_str())
    }

    pub fn values(&self) -> &[String] {
        &self.values[..self.len]
    }

    /// Overwrite a captured value, e.g. from middleware that decodes it.
    pub fn set(&mut self, index: usize, value: &str) {
        if let Some(slot) = self.values[..self.len].get_mut(index) {
            slot.clear();
            slot.push_str(value);
        }
    }

    pub fn clear(&mut self) {
        self.spans.clear();
        self.len = 0;
    }

    /// Scratch stack of capture spans used during a search.
    pub(crate) fn spans_mut(&mut self) -> &mut Vec<Range<usize>> {
        &mut self.spans
    }

    /// Copy the recorded spans of `path` into the value slots.
    pub(crate) fn commit(&mut self, path: &str) {
        while self.values.len() < self.spans.len() {
            self.values.push(String::new());
        }
        for (slot, span) in self.values.iter_mut().zip(self.spans.iter()) {
            slot.clear();
            slot.push_str(path.get(span.clone()).unwrap_or_default());
        }
        self.len = self.spans.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_reuses_slots() {
        let mut params = PathParams::with_capacity(2);
        let path = "/users/42/posts/7";
        params.spans_mut().extend([7..9, 16..17]);
        params.commit(path);
        assert_eq!(params.values(), ["42".to_string(), "7".to_string()]);

        params.clear();
        assert!(params.is_empty());
        assert_eq!(params.get(0), None);
        assert_eq!(params.capacity(), 2);
    }

    #[test]
    fn test_commit_grows_undersized_buffer() {
        let mut params = PathParams::default();
        params.spans_mut().push(1..4);
        params.commit("/abc");
        assert_eq!(params.get(0), Some("abc"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_set_overwrites_only_captured_slots() {
        let mut params = PathParams::with_capacity(3);
        params.spans_mut().push(1..2);
        params.commit("/a");
        params.set(0, "b");
        params.set(2, "ignored");
        assert_eq!(params.values(), ["b".to_string()]);
    }
}
