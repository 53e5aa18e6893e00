// src/schema/types.rs

use std::collections::HashMap;

use serde::Serialize;

/// One column of the canonical schema.
#[derive(Debug, Serialize, PartialEq, Clone, Eq, Hash)]
pub struct CanonicalColumn {
    /// Normalized key used for matching, see [`column_key`](super::column_key).
    pub key: String,
    /// First spelling seen, in chronological file order.
    pub name: String,
}

/// Ordered, deduplicated union of every column seen in a run.
///
/// Built once, then shared read-only behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct CanonicalSchema {
    pub(super) columns: Vec<CanonicalColumn>,
    pub(super) index: HashMap<String, usize>,
}

impl CanonicalSchema {
    pub fn columns(&self) -> &[CanonicalColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of the column whose key matches `name` once normalized.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&super::column_key(name)).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Where each local column of one file lands in the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// `targets[local]` is the canonical index, or `None` when unmapped.
    pub targets: Vec<Option<usize>>,
}

impl ColumnMapping {
    pub fn unmapped(&self) -> usize {
        self.targets.iter().filter(|t| t.is_none()).count()
    }
}

/// A row laid out on the canonical schema; `None` is the missing marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRow {
    pub values: Vec<Option<String>>,
}

impl CanonicalRow {
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    /// Look a value up by column name (any spelling with the same key).
    pub fn get_by_name(&self, schema: &CanonicalSchema, name: &str) -> Option<&str> {
        schema.position(name).and_then(|i| self.get(i))
    }
}
