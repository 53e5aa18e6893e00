//! Canonical schema construction: union the headers of every file in a run,
//! matching columns by a normalized key rather than their literal spelling.

use std::collections::HashMap;

use tracing::{debug, info, instrument};

use super::types::{CanonicalColumn, CanonicalSchema, ColumnMapping};

/// Stable matching key for a column name: lowercase, with whitespace,
/// underscores and hyphens removed.
///
/// `"Payment Date"`, `"payment_date"` and `" PAYMENTDATE "` all map to
/// `"paymentdate"`.
pub fn column_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl CanonicalSchema {
    /// Union of all `headers`, in the order given (callers pass catalog order).
    ///
    /// The first spelling of a key wins as the display name. Empty names are
    /// not columns.
    #[instrument(level = "debug", skip(headers), fields(files = headers.len()))]
    pub fn union<H: AsRef<[String]>>(headers: &[H]) -> Self {
        let mut columns: Vec<CanonicalColumn> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for header in headers {
            for name in header.as_ref() {
                let key = column_key(name);
                if key.is_empty() || index.contains_key(&key) {
                    continue;
                }
                debug!(column = %name, key = %key, "new canonical column");
                index.insert(key.clone(), columns.len());
                columns.push(CanonicalColumn {
                    key,
                    name: name.clone(),
                });
            }
        }

        info!(columns = columns.len(), "canonical schema built");
        Self { columns, index }
    }

    /// Map one file's header onto this schema.
    ///
    /// A column is unmapped when its name is empty or when an earlier column
    /// of the same file already claimed its key.
    pub fn mapping(&self, local: &[String]) -> ColumnMapping {
        let mut claimed = vec![false; self.columns.len()];
        let targets = local
            .iter()
            .map(|name| {
                let idx = self.index.get(&column_key(name)).copied()?;
                if claimed[idx] {
                    debug!(column = %name, "duplicate column in file, left unmapped");
                    return None;
                }
                claimed[idx] = true;
                Some(idx)
            })
            .collect();
        ColumnMapping { targets }
    }
}
