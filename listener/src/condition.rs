use std::collections::BTreeMap;

use converge3a_common::frame::{FrameMetadata, MetadataKey, MetadataValue};

use crate::ListenerError;

/// For each key, the values that count as "done".
///
/// A frame satisfies the condition when it carries every key and each
/// value is one of the acceptable ones for that key.
#[derive(Debug, Clone)]
pub struct ExitCondition {
    keys: BTreeMap<MetadataKey, Vec<MetadataValue>>,
}

impl ExitCondition {
    /// Build from `(key, acceptable values)` pairs. A key given twice keeps
    /// its last list. Fails if no keys are given.
    pub fn new(
        entries: impl IntoIterator<Item = (MetadataKey, Vec<MetadataValue>)>,
    ) -> Result<Self, ListenerError> {
        let keys: BTreeMap<_, _> = entries.into_iter().collect();
        if keys.is_empty() {
            return Err(ListenerError::EmptyExitCondition);
        }
        Ok(Self { keys })
    }

    pub fn is_satisfied_by<M: FrameMetadata + ?Sized>(&self, metadata: &M) -> bool {
        self.keys.iter().all(|(key, acceptable)| {
            metadata
                .get(*key)
                .is_some_and(|value| acceptable.contains(&value))
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
