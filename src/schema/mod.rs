pub mod canonical;
pub mod reconcile;
pub mod types;

pub use canonical::column_key;
pub use reconcile::{reconcile, Reconciled};
pub use types::{CanonicalColumn, CanonicalRow, CanonicalSchema, ColumnMapping};
