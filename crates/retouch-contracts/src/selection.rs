use std::collections::BTreeSet;

/// History indices chosen for bulk export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSelection {
    indices: BTreeSet<usize>,
}

impl DownloadSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `index`; returns whether it is selected afterwards.
    pub fn toggle(&mut self, index: usize) -> bool {
        if self.indices.remove(&index) {
            false
        } else {
            self.indices.insert(index);
            true
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Selected indices in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.indices.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    /// Drops every index at or past `len`.
    pub fn retain_below(&mut self, len: usize) {
        self.indices.retain(|index| *index < len);
    }
}

/// Replaces every character outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "image".to_string()
    } else {
        sanitized
    }
}

/// `{index:03}_{sanitized name}`.
pub fn archive_entry_name(index: usize, name: &str) -> String {
    format!("{index:03}_{}", sanitize_file_name(name))
}
