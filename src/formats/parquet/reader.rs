//! Parquet file reader implementation.

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::StreamExt;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;
use std::io::Cursor;
use tracing::debug;

use super::conversion::{record_batch_to_records, table_schema_for};
use crate::formats::reader::Dataset;

/// Read a whole Parquet file held in memory into a row-oriented dataset
///
/// Row groups are streamed in file order, so the resulting records keep the
/// source row order.
pub async fn read_parquet(data: Bytes) -> Result<Dataset> {
    let builder = ParquetRecordBatchStreamBuilder::new(Cursor::new(data))
        .await
        .context("Failed to read Parquet metadata")?;

    let schema = table_schema_for(builder.schema());
    let total_rows: i64 = builder
        .metadata()
        .row_groups()
        .iter()
        .map(|rg| rg.num_rows())
        .sum();

    debug!(
        "Parquet file has {} row groups, {} rows, {} columns",
        builder.metadata().num_row_groups(),
        total_rows,
        schema.len()
    );

    let stream = builder
        .build()
        .context("Failed to build Parquet stream")?;

    let mut records = Vec::with_capacity(total_rows.max(0) as usize);
    let mut stream = Box::pin(stream);
    while let Some(batch_result) = stream.next().await {
        let batch = batch_result.context("Failed to read record batch")?;
        let batch_records = record_batch_to_records(&batch)
            .context("Failed to convert RecordBatch to Records")?;
        records.extend(batch_records);
    }

    Ok(Dataset { schema, records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::SqlType;
    use crate::formats::value::Value;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::WriterProperties;
    use std::sync::Arc;

    fn write_parquet(num_rows: i64, row_group_size: usize) -> Bytes {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("value", DataType::Float64, true),
        ]));

        let props = WriterProperties::builder()
            .set_max_row_group_size(row_group_size)
            .build();

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, schema.clone(), Some(props)).unwrap();
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from_iter_values(0..num_rows)),
                Arc::new(StringArray::from_iter(
                    (0..num_rows).map(|i| Some(format!("name_{}", i))),
                )),
                Arc::new(Float64Array::from_iter_values(
                    (0..num_rows).map(|i| i as f64 * 1.5),
                )),
            ],
        )
        .unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        Bytes::from(buffer)
    }

    #[tokio::test]
    async fn test_read_parquet_across_row_groups() {
        let dataset = read_parquet(write_parquet(120, 50)).await.unwrap();

        assert_eq!(dataset.len(), 120);
        let names: Vec<&str> = dataset.schema.names().collect();
        assert_eq!(names, vec!["id", "name", "value"]);
        assert_eq!(dataset.schema.columns[2].sql_type, SqlType::DoublePrecision);

        for (i, record) in dataset.records.iter().enumerate() {
            assert_eq!(record.values[0], Value::Int(i as i64));
        }
        assert_eq!(dataset.records[3].values[1], Value::Text("name_3".into()));
    }

    #[tokio::test]
    async fn test_read_empty_parquet_keeps_schema() {
        let dataset = read_parquet(write_parquet(0, 50)).await.unwrap();

        assert!(dataset.is_empty());
        assert_eq!(dataset.schema.len(), 3);
    }

    #[tokio::test]
    async fn test_read_garbage_fails() {
        let result = read_parquet(Bytes::from_static(b"id,name\n1,a\n")).await;
        assert!(result.is_err());
    }
}
