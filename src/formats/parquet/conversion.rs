//! Conversion from Arrow RecordBatch to row-based Records.
//!
//! Arrow's columnar arrays are turned into tagged `Value`s column by column and
//! then transposed into rows. Nulls become `Value::Null`; integer widths collapse
//! to `i64`, floats and decimals to `f64`, dates and timestamps to naive UTC
//! timestamps. Anything else is rendered as text through Arrow's cast kernel.

use anyhow::{Context, Result, anyhow};
use arrow::array::*;
use arrow::compute::cast;
use arrow::datatypes::{
    ArrowTemporalType, DataType, Date32Type, Date64Type, Decimal128Type, Float16Type,
    Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;

use crate::db::schema::{Column, SqlType, TableSchema};
use crate::formats::reader::Record;
use crate::formats::value::Value;

/// Map an Arrow column type to the SQL type its values convert to
pub fn sql_type_for(data_type: &DataType) -> SqlType {
    match data_type {
        DataType::Boolean => SqlType::Boolean,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => SqlType::BigInt,
        DataType::Float16 | DataType::Float32 | DataType::Float64 | DataType::Decimal128(_, _) => {
            SqlType::DoublePrecision
        }
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => SqlType::Timestamp,
        DataType::Null => SqlType::DoublePrecision,
        _ => SqlType::Text,
    }
}

/// Table schema matching an Arrow schema, column for column
pub fn table_schema_for(schema: &arrow::datatypes::Schema) -> TableSchema {
    TableSchema::new(
        schema
            .fields()
            .iter()
            .map(|f| Column::new(f.name().clone(), sql_type_for(f.data_type())))
            .collect(),
    )
}

/// Convert an Arrow RecordBatch to a vector of Records
pub fn record_batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let num_rows = batch.num_rows();
    let num_columns = batch.num_columns();

    if num_rows == 0 {
        return Ok(Vec::new());
    }

    // Convert each column to values
    let schema = batch.schema();
    let mut column_values: Vec<Vec<Value>> = Vec::with_capacity(num_columns);
    for (col_idx, field) in schema.fields().iter().enumerate() {
        let array = batch.column(col_idx);
        let values = array_to_values(array.as_ref()).with_context(|| {
            format!(
                "Failed to convert column '{}' ({:?})",
                field.name(),
                array.data_type()
            )
        })?;
        column_values.push(values);
    }

    // Transpose to rows, draining the columns so values move instead of clone
    let mut iters: Vec<_> = column_values.into_iter().map(Vec::into_iter).collect();
    let mut records = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let values = iters
            .iter_mut()
            .map(|col| col.next().unwrap_or(Value::Null))
            .collect();
        records.push(Record { values });
    }

    Ok(records)
}

/// Convert an Arrow array to a vector of values
fn array_to_values(array: &dyn Array) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(array.len());

    match array.data_type() {
        DataType::Null => values.resize(array.len(), Value::Null),
        DataType::Boolean => {
            let arr = as_boolean_array(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Bool(arr.value(i))
                });
            }
        }
        DataType::Int8 => convert_int::<Int8Type>(array, &mut values)?,
        DataType::Int16 => convert_int::<Int16Type>(array, &mut values)?,
        DataType::Int32 => convert_int::<Int32Type>(array, &mut values)?,
        DataType::Int64 => convert_int::<Int64Type>(array, &mut values)?,
        DataType::UInt8 => convert_int::<UInt8Type>(array, &mut values)?,
        DataType::UInt16 => convert_int::<UInt16Type>(array, &mut values)?,
        DataType::UInt32 => convert_int::<UInt32Type>(array, &mut values)?,
        DataType::UInt64 => convert_int::<UInt64Type>(array, &mut values)?,
        DataType::Float16 => {
            let arr = as_primitive_array::<Float16Type>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Float(arr.value(i).to_f64())
                });
            }
        }
        DataType::Float32 => {
            let arr = as_primitive_array::<Float32Type>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Float(arr.value(i) as f64)
                });
            }
        }
        DataType::Float64 => {
            let arr = as_primitive_array::<Float64Type>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Float(arr.value(i))
                });
            }
        }
        DataType::Decimal128(_, scale) => {
            let arr = as_primitive_array::<Decimal128Type>(array);
            let divisor = 10f64.powi(*scale as i32);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Float(arr.value(i) as f64 / divisor)
                });
            }
        }
        DataType::Date32 => convert_temporal::<Date32Type>(array, &mut values)?,
        DataType::Date64 => convert_temporal::<Date64Type>(array, &mut values)?,
        DataType::Timestamp(unit, _) => match unit {
            TimeUnit::Second => convert_temporal::<TimestampSecondType>(array, &mut values)?,
            TimeUnit::Millisecond => {
                convert_temporal::<TimestampMillisecondType>(array, &mut values)?
            }
            TimeUnit::Microsecond => {
                convert_temporal::<TimestampMicrosecondType>(array, &mut values)?
            }
            TimeUnit::Nanosecond => {
                convert_temporal::<TimestampNanosecondType>(array, &mut values)?
            }
        },
        DataType::Utf8 => convert_strings(as_string_array(array), &mut values),
        _ => {
            // Dictionary, LargeUtf8, Utf8View and friends: let Arrow render them
            let casted = cast(array, &DataType::Utf8).map_err(|e| {
                anyhow!(
                    "Unsupported array type for conversion: {:?} ({})",
                    array.data_type(),
                    e
                )
            })?;
            convert_strings(as_string_array(casted.as_ref()), &mut values);
        }
    }

    Ok(values)
}

fn convert_strings(arr: &StringArray, values: &mut Vec<Value>) {
    for i in 0..arr.len() {
        values.push(if arr.is_null(i) {
            Value::Null
        } else {
            Value::Text(arr.value(i).to_string())
        });
    }
}

/// Helper to convert integer arrays of any width
fn convert_int<T: ArrowPrimitiveType>(array: &dyn Array, values: &mut Vec<Value>) -> Result<()>
where
    T::Native: TryInto<i64> + std::fmt::Display,
{
    let arr = as_primitive_array::<T>(array);
    for i in 0..arr.len() {
        if arr.is_null(i) {
            values.push(Value::Null);
            continue;
        }
        let raw = arr.value(i);
        let v: i64 = raw
            .try_into()
            .map_err(|_| anyhow!("Integer {} does not fit in BIGINT", raw))?;
        values.push(Value::Int(v));
    }
    Ok(())
}

/// Helper to convert date and timestamp arrays
fn convert_temporal<T>(array: &dyn Array, values: &mut Vec<Value>) -> Result<()>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    let arr = as_primitive_array::<T>(array);
    for i in 0..arr.len() {
        if arr.is_null(i) {
            values.push(Value::Null);
            continue;
        }
        let ts = arr
            .value_as_datetime(i)
            .context("Invalid timestamp")?;
        values.push(Value::Timestamp(ts));
    }
    Ok(())
}
