// src/output/batch.rs

use std::sync::Arc;

use arrow::{
    array::{
        ArrayRef, BooleanBuilder, Date32Builder, Float64Builder, Int32Builder, StringBuilder,
    },
    datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};

use crate::process::{date_parser::epoch_days, TypedRecord};

/// Column names of the consolidated artifact, in order.
pub const OUTPUT_COLUMNS: [&str; 9] = [
    "Ministry",
    "BusinessUnit",
    "Recipient",
    "Program",
    "Amount",
    "Lottery",
    "PaymentDate",
    "FiscalYear",
    "DisplayFiscalYear",
];

pub const PROVENANCE_COLUMN: &str = "SourceFile";

/// Arrow schema of the artifact.
///
/// - text fields            → Utf8 (nullable)
/// - Amount                 → Float64 (nullable)
/// - Lottery                → Boolean (nullable)
/// - PaymentDate            → Date32 (nullable)
/// - FiscalYear             → Int32
/// - DisplayFiscalYear      → Utf8
/// - SourceFile (optional)  → Utf8
pub fn output_schema(provenance: bool) -> SchemaRef {
    let mut fields = vec![
        Field::new(OUTPUT_COLUMNS[0], DataType::Utf8, true),
        Field::new(OUTPUT_COLUMNS[1], DataType::Utf8, true),
        Field::new(OUTPUT_COLUMNS[2], DataType::Utf8, true),
        Field::new(OUTPUT_COLUMNS[3], DataType::Utf8, true),
        Field::new(OUTPUT_COLUMNS[4], DataType::Float64, true),
        Field::new(OUTPUT_COLUMNS[5], DataType::Boolean, true),
        Field::new(OUTPUT_COLUMNS[6], DataType::Date32, true),
        Field::new(OUTPUT_COLUMNS[7], DataType::Int32, false),
        Field::new(OUTPUT_COLUMNS[8], DataType::Utf8, false),
    ];
    if provenance {
        fields.push(Field::new(PROVENANCE_COLUMN, DataType::Utf8, false));
    }
    Arc::new(ArrowSchema::new(fields))
}

/// Build one record batch from a slice of records.
pub fn to_record_batch(
    records: &[TypedRecord],
    schema: &SchemaRef,
    provenance: bool,
) -> Result<RecordBatch, ArrowError> {
    let n = records.len();
    let mut ministry = StringBuilder::with_capacity(n, n * 16);
    let mut business_unit = StringBuilder::with_capacity(n, n * 16);
    let mut recipient = StringBuilder::with_capacity(n, n * 24);
    let mut program = StringBuilder::with_capacity(n, n * 24);
    let mut amount = Float64Builder::with_capacity(n);
    let mut lottery = BooleanBuilder::with_capacity(n);
    let mut payment_date = Date32Builder::with_capacity(n);
    let mut fiscal_year = Int32Builder::with_capacity(n);
    let mut display = StringBuilder::with_capacity(n, n * 11);
    let mut source_file = StringBuilder::new();

    for r in records {
        ministry.append_option(r.ministry.as_deref());
        business_unit.append_option(r.business_unit.as_deref());
        recipient.append_option(r.recipient.as_deref());
        program.append_option(r.program.as_deref());
        amount.append_option(r.amount);
        lottery.append_option(r.lottery);
        payment_date.append_option(r.payment_date.map(epoch_days));
        fiscal_year.append_value(r.fiscal_year);
        display.append_value(&r.display_fiscal_year);
        if provenance {
            source_file.append_value(&r.source.name);
        }
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(ministry.finish()),
        Arc::new(business_unit.finish()),
        Arc::new(recipient.finish()),
        Arc::new(program.finish()),
        Arc::new(amount.finish()),
        Arc::new(lottery.finish()),
        Arc::new(payment_date.finish()),
        Arc::new(fiscal_year.finish()),
        Arc::new(display.finish()),
    ];
    if provenance {
        columns.push(Arc::new(source_file.finish()));
    }

    RecordBatch::try_new(schema.clone(), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FiscalYearLabel, SourceFile};
    use arrow::array::{Array, Date32Array, Float64Array, StringArray};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn record(amount: Option<f64>) -> TypedRecord {
        TypedRecord {
            ministry: Some("HEALTH".into()),
            business_unit: None,
            recipient: Some("Clinic".into()),
            program: None,
            amount,
            lottery: Some(false),
            payment_date: NaiveDate::from_ymd_opt(2015, 3, 31),
            fiscal_year: 2014,
            display_fiscal_year: "2014 - 2015".into(),
            source: Arc::new(SourceFile {
                path: PathBuf::from("g-2014-15.csv"),
                name: "g-2014-15.csv".into(),
                fiscal_year: FiscalYearLabel::new(2014),
                encoding: None,
                byte_size: 0,
            }),
            line: 2,
        }
    }

    #[test]
    fn batch_matches_schema_and_keeps_nulls() -> anyhow::Result<()> {
        let schema = output_schema(true);
        let batch = to_record_batch(&[record(Some(-5.5)), record(None)], &schema, true)?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 10);

        let amount = batch
            .column(4)
            .as_any()
            .downcast_ref::<Float64Array>()
            .expect("Float64");
        assert_eq!(amount.value(0), -5.5);
        assert!(amount.is_null(1));

        let dates = batch
            .column(6)
            .as_any()
            .downcast_ref::<Date32Array>()
            .expect("Date32");
        assert_eq!(dates.value(0), 16525);

        let src = batch
            .column(9)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("Utf8");
        assert_eq!(src.value(1), "g-2014-15.csv");
        assert!(batch.column(1).is_null(0));
        Ok(())
    }

    #[test]
    fn provenance_column_is_optional() -> anyhow::Result<()> {
        let schema = output_schema(false);
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, OUTPUT_COLUMNS.to_vec());
        let batch = to_record_batch(&[record(Some(1.0))], &schema, false)?;
        assert_eq!(batch.num_columns(), 9);
        Ok(())
    }
}
