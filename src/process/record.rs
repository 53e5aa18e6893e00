use std::sync::Arc;

use chrono::NaiveDate;

use crate::catalog::SourceFile;

/// One typed disclosure payment.
///
/// `fiscal_year` and `display_fiscal_year` always come from `source`, so they
/// are present even when every other field failed to coerce.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRecord {
    pub ministry: Option<String>,
    pub business_unit: Option<String>,
    pub recipient: Option<String>,
    pub program: Option<String>,
    pub amount: Option<f64>,
    pub lottery: Option<bool>,
    pub payment_date: Option<NaiveDate>,
    pub fiscal_year: i32,
    pub display_fiscal_year: String,
    /// Provenance.
    pub source: Arc<SourceFile>,
    pub line: u64,
}
