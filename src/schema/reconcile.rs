use crate::process::normalize::RawRow;

use super::types::{CanonicalRow, CanonicalSchema, ColumnMapping};

/// Result of laying one raw row onto the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub row: CanonicalRow,
    /// A present value sat in a column the schema could not place.
    pub dropped_unmapped: bool,
}

/// Copy mapped values into canonical position; everything else stays missing.
pub fn reconcile(raw: &RawRow, mapping: &ColumnMapping, schema: &CanonicalSchema) -> Reconciled {
    let mut values = vec![None; schema.len()];
    let mut dropped_unmapped = false;

    for (value, target) in raw.fields.iter().zip(&mapping.targets) {
        match target {
            Some(idx) => values[*idx] = value.clone(),
            None => dropped_unmapped |= value.is_some(),
        }
    }

    Reconciled {
        row: CanonicalRow { values },
        dropped_unmapped,
    }
}
