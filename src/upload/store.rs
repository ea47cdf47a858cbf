use std::collections::BTreeMap;

use tracing::debug;

use crate::error::ValidationError;
use crate::upload::types::{SelectedFile, SlotKey, SubmissionBatch, UploadSlot};
use crate::upload::validator::validate;

/// Files selected for the next submission, keyed by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadStore {
    files: BTreeMap<SlotKey, Vec<SelectedFile>>,
}

impl UploadStore {
    pub fn get(&self, key: SlotKey) -> &[SelectedFile] {
        self.files.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_filled(&self, key: SlotKey) -> bool {
        !self.get(key).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.files.values().all(Vec::is_empty)
    }

    /// Validates `file` against the slot and stores it. Single-file slots
    /// replace their current file, multi-file slots append.
    pub fn add(&mut self, slot: &UploadSlot, file: SelectedFile) -> Result<(), ValidationError> {
        if let Err(e) = validate(Some(&file), slot.accept) {
            debug!(slot = %slot.key, file = %file.name, error = %e, "rejected file");
            return Err(e);
        }

        let entry = self.files.entry(slot.key).or_default();
        if !slot.multi {
            entry.clear();
        }
        entry.push(file);
        Ok(())
    }

    /// Replaces one slot's files, leaving every other slot untouched. The slot
    /// keeps its current files if any candidate is rejected.
    pub fn set(&mut self, slot: &UploadSlot, files: Vec<SelectedFile>) -> Result<(), ValidationError> {
        if !slot.multi && files.len() > 1 {
            return Err(ValidationError::TooManyFiles {
                slot: slot.key,
                given: files.len(),
            });
        }
        for file in &files {
            if let Err(e) = validate(Some(file), slot.accept) {
                debug!(slot = %slot.key, file = %file.name, error = %e, "rejected file");
                return Err(e);
            }
        }

        if files.is_empty() {
            self.files.remove(&slot.key);
        } else {
            self.files.insert(slot.key, files);
        }
        Ok(())
    }

    pub fn remove(&mut self, key: SlotKey, index: usize) -> Option<SelectedFile> {
        let entry = self.files.get_mut(&key)?;
        if index >= entry.len() {
            return None;
        }
        let removed = entry.remove(index);
        if entry.is_empty() {
            self.files.remove(&key);
        }
        Some(removed)
    }

    /// Empties every slot at once.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub(crate) fn snapshot(&self) -> SubmissionBatch {
        SubmissionBatch {
            files: self
                .files
                .iter()
                .filter(|(_, files)| !files.is_empty())
                .map(|(key, files)| (*key, files.clone()))
                .collect(),
        }
    }
}
