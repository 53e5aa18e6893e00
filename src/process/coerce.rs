// src/process/coerce.rs

use std::{collections::HashSet, sync::Arc};

use tracing::{debug, trace, warn};

use crate::catalog::{FiscalYearLabel, SourceFile};
use crate::config::CoercionConfig;
use crate::process::date_parser::parse_payment_date;
use crate::process::record::TypedRecord;
use crate::report::{CoercedField, CoercionFailure, FileReport};
use crate::schema::{CanonicalRow, CanonicalSchema};

/// Source column names accepted for each typed field, before config overrides.
const DEFAULT_ALIASES: &[(&str, &[&str])] = &[
    ("ministry", &["Ministry"]),
    (
        "business_unit",
        &["BusinessUnit", "BUName", "Business Unit Name"],
    ),
    ("recipient", &["Recipient", "Recipient Name", "Payee"]),
    ("program", &["Program", "Program Name"]),
    ("amount", &["Amount", "Payment Amount"]),
    ("lottery", &["Lottery", "Lottery Funded"]),
    ("payment_date", &["PaymentDate", "Date"]),
    ("row_fiscal_year", &["DisplayFiscalYear", "FiscalYear"]),
];

/// Canonical columns feeding each typed field, resolved once per run.
///
/// Files spell the same field differently ("Amount", "Payment Amount"), and
/// each spelling is its own canonical column. A field lists every matching
/// column in alias priority order; a row takes the first one that holds a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSources {
    pub ministry: Vec<usize>,
    pub business_unit: Vec<usize>,
    pub recipient: Vec<usize>,
    pub program: Vec<usize>,
    pub amount: Vec<usize>,
    pub lottery: Vec<usize>,
    pub payment_date: Vec<usize>,
    pub row_fiscal_year: Vec<usize>,
}

impl FieldSources {
    fn resolve(schema: &CanonicalSchema, cfg: &CoercionConfig) -> Self {
        let find = |field: &str| -> Vec<usize> {
            let configured = cfg.aliases.get(field).into_iter().flatten().map(String::as_str);
            let defaults = DEFAULT_ALIASES
                .iter()
                .filter(|(f, _)| *f == field)
                .flat_map(|(_, names)| names.iter().copied());
            let mut found: Vec<usize> = Vec::new();
            for idx in configured.chain(defaults).filter_map(|n| schema.position(n)) {
                if !found.contains(&idx) {
                    found.push(idx);
                }
            }
            if found.is_empty() {
                warn!(field, "no source column for typed field; values will be null");
            }
            found
        };
        Self {
            ministry: find("ministry"),
            business_unit: find("business_unit"),
            recipient: find("recipient"),
            program: find("program"),
            amount: find("amount"),
            lottery: find("lottery"),
            payment_date: find("payment_date"),
            row_fiscal_year: find("row_fiscal_year"),
        }
    }
}

/// First present value among `columns`.
fn first_present<'a>(row: &'a CanonicalRow, columns: &[usize]) -> Option<&'a str> {
    columns.iter().find_map(|&i| row.get(i))
}

/// Turns canonical rows into [`TypedRecord`]s. Never drops a row.
#[derive(Debug, Clone)]
pub struct Coercer {
    sources: FieldSources,
    date_formats: Vec<String>,
    true_tokens: HashSet<String>,
    false_tokens: HashSet<String>,
    uppercase_ministry: bool,
}

impl Coercer {
    pub fn new(schema: &CanonicalSchema, cfg: &CoercionConfig) -> Self {
        let sources = FieldSources::resolve(schema, cfg);
        debug!(?sources, "resolved typed field sources");
        Self {
            sources,
            date_formats: cfg.date_formats.clone(),
            true_tokens: lowercase_set(&cfg.true_tokens),
            false_tokens: lowercase_set(&cfg.false_tokens),
            uppercase_ministry: cfg.uppercase_ministry,
        }
    }

    pub fn sources(&self) -> &FieldSources {
        &self.sources
    }

    /// Coerce one row. Failures null the field and are counted in `report`.
    pub fn coerce(
        &self,
        row: &CanonicalRow,
        source: &Arc<SourceFile>,
        line: u64,
        report: &mut FileReport,
    ) -> TypedRecord {
        let text = |columns: &[usize]| first_present(row, columns).map(str::to_string);
        let mut fail = |field: CoercedField, value: &str| {
            trace!(line, ?field, value, "coercion failure");
            report.record_coercion(CoercionFailure {
                line,
                field,
                value: value.to_string(),
            });
        };

        let ministry = text(&self.sources.ministry).map(|m| {
            if self.uppercase_ministry {
                m.to_uppercase()
            } else {
                m
            }
        });

        let mut amount_missing = false;
        let amount = match first_present(row, &self.sources.amount) {
            None => {
                amount_missing = true;
                None
            }
            Some(raw) => {
                let parsed = parse_amount(raw);
                if parsed.is_none() {
                    fail(CoercedField::Amount, raw);
                }
                parsed
            }
        };

        let lottery = first_present(row, &self.sources.lottery).and_then(|raw| {
            let parsed = self.parse_flag(raw);
            if parsed.is_none() {
                fail(CoercedField::Lottery, raw);
            }
            parsed
        });

        let payment_date = first_present(row, &self.sources.payment_date).and_then(|raw| {
            let parsed = parse_payment_date(raw, &self.date_formats);
            if parsed.is_none() {
                fail(CoercedField::PaymentDate, raw);
            }
            parsed
        });

        let record = TypedRecord {
            ministry,
            business_unit: text(&self.sources.business_unit),
            recipient: text(&self.sources.recipient),
            program: text(&self.sources.program),
            amount,
            lottery,
            payment_date,
            fiscal_year: source.fiscal_year.fiscal_year(),
            display_fiscal_year: source.fiscal_year.display(),
            source: Arc::clone(source),
            line,
        };

        // absent is not unparseable; counted on its own
        if amount_missing {
            report.counts.amount_missing += 1;
        }
        if let Some(raw) = first_present(row, &self.sources.row_fiscal_year) {
            if FiscalYearLabel::parse(raw).is_some_and(|fy| fy != source.fiscal_year) {
                report.counts.fiscal_year_mismatches += 1;
            }
        }
        record
    }

    /// Case-insensitive match against the configured vocabularies.
    pub fn parse_flag(&self, raw: &str) -> Option<bool> {
        let token = raw.trim().to_lowercase();
        if self.true_tokens.contains(&token) {
            Some(true)
        } else if self.false_tokens.contains(&token) {
            Some(false)
        } else {
            None
        }
    }
}

fn lowercase_set(tokens: &[String]) -> HashSet<String> {
    tokens.iter().map(|t| t.trim().to_lowercase()).collect()
}

/// Parse a signed currency amount.
///
/// Accepts `$`, thousands separators, inner spaces and accounting-style
/// parentheses for negatives: `"(1,250.50)"` → `-1250.5`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let (negated, s) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let cleaned: String = s
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negated { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FiscalYearLabel;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn source(start: i32) -> Arc<SourceFile> {
        Arc::new(SourceFile {
            path: PathBuf::from("grants.csv"),
            name: "grants.csv".into(),
            fiscal_year: FiscalYearLabel::new(start),
            encoding: None,
            byte_size: 0,
        })
    }

    fn row(values: &[Option<&str>]) -> CanonicalRow {
        CanonicalRow {
            values: values.iter().map(|v| v.map(str::to_string)).collect(),
        }
    }

    const HEADER: &[&str] = &[
        "Ministry",
        "BUName",
        "Recipient",
        "Program",
        "Amount",
        "Lottery",
        "PaymentDate",
        "DisplayFiscalYear",
    ];

    fn coercer() -> (CanonicalSchema, Coercer) {
        let schema = CanonicalSchema::union(&[cols(HEADER)]);
        let c = Coercer::new(&schema, &CoercionConfig::default());
        (schema, c)
    }

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_amount("-1,250.50"), Some(-1250.50));
        assert_eq!(parse_amount("(1,250.50)"), Some(-1250.50));
        assert_eq!(parse_amount("$3,000"), Some(3000.0));
        assert_eq!(parse_amount(" 12 500.25 "), Some(12500.25));
        assert_eq!(parse_amount("0"), Some(0.0));
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("$"), None);
    }

    #[test]
    fn resolves_aliases_case_insensitively() {
        let (_, c) = coercer();
        let s = c.sources();
        assert_eq!(s.ministry, vec![0]);
        assert_eq!(s.business_unit, vec![1]);
        assert_eq!(s.payment_date, vec![6]);
        assert_eq!(s.row_fiscal_year, vec![7]);
    }

    #[test]
    fn configured_alias_is_preferred() {
        let schema = CanonicalSchema::union(&[cols(&["Payee", "Vendor Name"])]);
        let mut cfg = CoercionConfig::default();
        cfg.aliases
            .insert("recipient".into(), vec!["vendor_name".into()]);
        let c = Coercer::new(&schema, &cfg);
        assert_eq!(c.sources().recipient, vec![1, 0]);
    }

    #[test]
    fn alias_spellings_from_different_files_coalesce() {
        let schema = CanonicalSchema::union(&[
            cols(&["Recipient", "Amount"]),
            cols(&["Payee", "Payment Amount"]),
        ]);
        let c = Coercer::new(&schema, &CoercionConfig::default());
        assert_eq!(c.sources().recipient, vec![0, 2]);
        assert_eq!(c.sources().amount, vec![1, 3]);

        let src = source(2015);
        let mut report = FileReport::new(&src, 10);
        let newer = c.coerce(
            &row(&[None, None, Some("Museum"), Some("20")]),
            &src,
            2,
            &mut report,
        );
        assert_eq!(newer.recipient.as_deref(), Some("Museum"));
        assert_eq!(newer.amount, Some(20.0));
        assert_eq!(report.counts.amount_missing, 0);

        let older = c.coerce(
            &row(&[Some("Clinic"), Some("10"), None, None]),
            &src,
            3,
            &mut report,
        );
        assert_eq!(older.recipient.as_deref(), Some("Clinic"));
        assert_eq!(older.amount, Some(10.0));
    }

    #[test]
    fn good_row_is_fully_typed() {
        let (_, c) = coercer();
        let src = source(2014);
        let mut report = FileReport::new(&src, 10);
        let rec = c.coerce(
            &row(&[
                Some("Culture and Tourism"),
                Some("Arts Branch"),
                Some("Alberta Ballet"),
                Some("Operating Grant"),
                Some("-1,250.50"),
                Some("y"),
                Some("2015-03-31"),
                Some("2014 - 2015"),
            ]),
            &src,
            2,
            &mut report,
        );
        assert_eq!(rec.ministry.as_deref(), Some("CULTURE AND TOURISM"));
        assert_eq!(rec.business_unit.as_deref(), Some("Arts Branch"));
        assert_eq!(rec.amount, Some(-1250.50));
        assert_eq!(rec.lottery, Some(true));
        assert_eq!(rec.payment_date, NaiveDate::from_ymd_opt(2015, 3, 31));
        assert_eq!(rec.fiscal_year, 2014);
        assert_eq!(rec.display_fiscal_year, "2014 - 2015");
        assert_eq!(report.counts, Default::default());
    }

    #[test]
    fn bad_fields_become_null_and_are_counted() {
        let (_, c) = coercer();
        let src = source(2016);
        let mut report = FileReport::new(&src, 10);
        let rec = c.coerce(
            &row(&[
                Some("Health"),
                None,
                Some("Clinic"),
                None,
                Some("lots"),
                Some("maybe"),
                Some("someday"),
                Some("2015 - 2016"),
            ]),
            &src,
            7,
            &mut report,
        );
        assert_eq!(rec.amount, None);
        assert_eq!(rec.lottery, None);
        assert_eq!(rec.payment_date, None);
        assert_eq!(rec.fiscal_year, 2016);
        assert_eq!(rec.display_fiscal_year, "2016 - 2017");
        assert_eq!(report.counts.amount_failures, 1);
        assert_eq!(report.counts.lottery_failures, 1);
        assert_eq!(report.counts.date_failures, 1);
        assert_eq!(report.counts.amount_missing, 0);
        assert_eq!(report.counts.fiscal_year_mismatches, 1);
        assert_eq!(report.issues.len(), 3);
    }

    #[test]
    fn missing_values_are_not_failures() {
        let (_, c) = coercer();
        let src = source(2014);
        let mut report = FileReport::new(&src, 10);
        let rec = c.coerce(&row(&[None; 8]), &src, 3, &mut report);
        assert_eq!(rec.ministry, None);
        assert_eq!(rec.amount, None);
        assert_eq!(rec.fiscal_year, 2014);
        assert_eq!(report.counts.amount_missing, 1);
        assert_eq!(report.counts.amount_failures, 0);
        assert_eq!(report.counts.date_failures, 0);
        assert_eq!(report.counts.lottery_failures, 0);
    }

    #[test]
    fn flag_vocabulary_is_case_insensitive() {
        let (_, c) = coercer();
        assert_eq!(c.parse_flag("TRUE"), Some(true));
        assert_eq!(c.parse_flag(" n "), Some(false));
        assert_eq!(c.parse_flag("False"), Some(false));
        assert_eq!(c.parse_flag("2"), None);
    }
}
