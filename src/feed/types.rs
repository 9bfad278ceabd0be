use serde::{Deserialize, Serialize};

/// One mutation recorded in a partition's log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeItem {
    /// Identifier of the changed document.
    pub id: String,
    /// Log sequence number, strictly increasing within a partition.
    pub lsn: u64,
    /// The document body after the change.
    pub payload: serde_json::Value,
}

/// An ordered run of changes fetched from one partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeBatch {
    pub items: Vec<ChangeItem>,
    /// Position after the last item of this batch (or the request position if empty).
    pub continuation_token: Option<String>,
}

impl ChangeBatch {
    pub fn new(items: Vec<ChangeItem>, continuation_token: Option<String>) -> Self {
        Self {
            items,
            continuation_token,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
