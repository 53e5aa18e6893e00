// src/process/normalize.rs

use csv::{ReaderBuilder, StringRecordsIntoIter};
use tracing::{trace, warn};

use crate::error::MalformedRowError;
use crate::process::utils::{clean_field, clean_header};

/// A field value; `None` is the missing marker.
pub type Cell = Option<String>;

/// One data row, aligned with the file's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the source file where the record starts.
    pub line: u64,
    pub fields: Vec<Cell>,
}

impl RawRow {
    /// Pair each value with its column name.
    pub fn iter<'a>(&'a self, header: &'a [String]) -> impl Iterator<Item = (&'a str, &'a Cell)> {
        header.iter().map(String::as_str).zip(self.fields.iter())
    }
}

/// Lazily parses decoded text into [`RawRow`]s.
///
/// The first record is consumed as the header. Rows whose width differs from
/// the header come out as `Err(MalformedRowError)`.
pub struct RawRows<'a> {
    header: Vec<String>,
    records: StringRecordsIntoIter<&'a [u8]>,
}

impl<'a> RawRows<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .into_records();

        let header = match records.next() {
            Some(Ok(rec)) => rec.iter().map(clean_header).collect(),
            Some(Err(e)) => {
                warn!("unreadable header row: {}", e);
                Vec::new()
            }
            None => {
                warn!("file has no header row");
                Vec::new()
            }
        };
        trace!(columns = header.len(), "parsed header");

        Self { header, records }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl Iterator for RawRows<'_> {
    type Item = Result<RawRow, MalformedRowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.header.is_empty() {
            return None;
        }
        let expected = self.header.len();
        let item = match self.records.next()? {
            Ok(rec) => {
                let line = rec.position().map(|p| p.line()).unwrap_or(0);
                if rec.len() == expected {
                    Ok(RawRow {
                        line,
                        fields: rec.iter().map(clean_field).collect(),
                    })
                } else {
                    Err(MalformedRowError {
                        line,
                        expected,
                        found: rec.len(),
                    })
                }
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                trace!(line, "csv error: {}", e);
                Err(MalformedRowError {
                    line,
                    expected,
                    found: 0,
                })
            }
        };
        Some(item)
    }
}
