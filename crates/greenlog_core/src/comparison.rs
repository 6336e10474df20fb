//! crates/greenlog_core/src/comparison.rs
//!
//! The bounded photo selection behind the before/after growth comparison.

use crate::domain::PhotoTimelineEntry;

/// How many photos a comparison shows side by side.
pub const MAX_SELECTION: usize = 2;

/// Up to two timeline ids, in the order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonSelector {
    selection: Vec<String>,
}

impl ComparisonSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deselects `id` if it is selected. Otherwise selects it, evicting the
    /// oldest pick once the selection is full.
    pub fn toggle(&mut self, id: &str) {
        if let Some(pos) = self.selection.iter().position(|selected| selected == id) {
            self.selection.remove(pos);
            return;
        }
        if self.selection.len() >= MAX_SELECTION {
            self.selection.remove(0);
        }
        self.selection.push(id.to_string());
    }

    /// The selected entries present in `timeline`, earliest photo first,
    /// whatever order they were picked in.
    pub fn resolve(&self, timeline: &[PhotoTimelineEntry]) -> Vec<PhotoTimelineEntry> {
        let mut picked: Vec<PhotoTimelineEntry> = timeline
            .iter()
            .filter(|entry| self.is_selected(&entry.id))
            .cloned()
            .collect();
        picked.sort_by_key(|entry| entry.date);
        picked
    }

    /// True once both sides of the comparison resolve against `timeline`.
    pub fn is_ready(&self, timeline: &[PhotoTimelineEntry]) -> bool {
        self.resolve(timeline).len() == MAX_SELECTION
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|selected| selected == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.selection
    }

    pub fn len(&self) -> usize {
        self.selection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    pub fn clear(&mut self) {
        self.selection.clear();
    }
}
