use anyhow::Result;
use std::fmt;

use crate::formats::value::is_missing;

/// Field values from a record (as strings from CSV/TSV)
/// Used for schema inference - just the raw field values without metadata
pub type FieldValues = Vec<String>;

/// SQL data type of a target column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    BigInt,
    DoublePrecision,
    Text,
    Timestamp,
}

impl SqlType {
    /// Returns the Postgres type name
    pub fn to_postgres(self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::BigInt => "BIGINT",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Text => "TEXT",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }

    /// Find the most specific common type that accommodates both types
    pub fn common_type(self, other: SqlType) -> SqlType {
        use SqlType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (BigInt, DoublePrecision) | (DoublePrecision, BigInt) => DoublePrecision,
            _ => Text,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_postgres())
    }
}

/// A column in a table schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// Ordered columns of a target table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Quote an identifier for use in generated SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generate the DROP statement used by the replace step
pub fn drop_table_ddl(table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table_name))
}

/// Generate DDL statement for creating a table
pub fn create_table_ddl(table_name: &str, schema: &TableSchema) -> String {
    let mut ddl = format!("CREATE TABLE {} (\n", quote_ident(table_name));

    let column_defs: Vec<String> = schema
        .columns
        .iter()
        .map(|col| format!("  {} {}", quote_ident(&col.name), col.sql_type.to_postgres()))
        .collect();

    ddl.push_str(&column_defs.join(",\n"));
    ddl.push_str("\n)");

    ddl
}

/// Schema inferrer for delimited sources
///
/// Follows the dataframe conventions the tables were originally produced with:
/// integer columns that contain blanks become floating point, all-blank columns
/// are floating point, and a header without data rows yields TEXT columns.
pub struct SchemaInferrer;

impl SchemaInferrer {
    /// Infer the type of a single non-missing value
    fn infer_value_type(value: &str) -> SqlType {
        let trimmed = value.trim();

        if matches!(trimmed, "True" | "TRUE" | "true" | "False" | "FALSE" | "false") {
            return SqlType::Boolean;
        }

        if trimmed.parse::<i64>().is_ok() {
            return SqlType::BigInt;
        }

        if trimmed.parse::<f64>().is_ok() {
            return SqlType::DoublePrecision;
        }

        SqlType::Text
    }

    /// Infer column type from multiple values
    fn infer_column_type(values: &[&str]) -> SqlType {
        if values.is_empty() {
            return SqlType::Text;
        }

        let mut inferred_type: Option<SqlType> = None;
        let mut has_missing = false;

        for value in values {
            if is_missing(value) {
                has_missing = true;
                continue;
            }
            let val_type = Self::infer_value_type(value);
            inferred_type = Some(match inferred_type {
                None => val_type,
                Some(current) => current.common_type(val_type),
            });
        }

        match (inferred_type, has_missing) {
            (None, _) => SqlType::DoublePrecision,
            (Some(SqlType::BigInt), true) => SqlType::DoublePrecision,
            (Some(SqlType::Boolean), true) => SqlType::Text,
            (Some(t), _) => t,
        }
    }

    /// Infer schema from sample records, the header row first
    pub fn infer_from_data(&self, records: &[FieldValues]) -> Result<TableSchema> {
        let Some((header_names, data_rows)) = records.split_first() else {
            anyhow::bail!("Cannot infer schema from empty dataset");
        };

        let mut columns = Vec::with_capacity(header_names.len());

        for (col_idx, name) in header_names.iter().enumerate() {
            let column_values: Vec<&str> = data_rows
                .iter()
                .filter_map(|row| row.get(col_idx).map(|s| s.as_str()))
                .collect();

            columns.push(Column::new(
                name.clone(),
                Self::infer_column_type(&column_values),
            ));
        }

        Ok(TableSchema { columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<FieldValues> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_infer_zone_lookup_schema() {
        let inferrer = SchemaInferrer;
        let schema = inferrer
            .infer_from_data(&rows(&[
                &["LocationID", "Borough", "Zone", "service_zone"],
                &["1", "EWR", "Newark Airport", "EWR"],
                &["2", "Queens", "Jamaica Bay", "Boro Zone"],
                &["264", "Unknown", "N/A", "N/A"],
            ]))
            .unwrap();

        let types: Vec<SqlType> = schema.columns.iter().map(|c| c.sql_type).collect();
        assert_eq!(
            types,
            vec![SqlType::BigInt, SqlType::Text, SqlType::Text, SqlType::Text]
        );
        assert_eq!(schema.columns[0].name, "LocationID");
    }

    #[test]
    fn test_integers_with_blanks_become_double() {
        let inferrer = SchemaInferrer;
        let schema = inferrer
            .infer_from_data(&rows(&[&["a", "b"], &["1", ""], &["", "x"], &["3", "2.5"]]))
            .unwrap();

        assert_eq!(schema.columns[0].sql_type, SqlType::DoublePrecision);
        assert_eq!(schema.columns[1].sql_type, SqlType::Text);
    }

    #[test]
    fn test_mixed_numeric_and_boolean() {
        let inferrer = SchemaInferrer;
        let schema = inferrer
            .infer_from_data(&rows(&[
                &["n", "flag", "empty"],
                &["1", "True", ""],
                &["1.5", "false", ""],
            ]))
            .unwrap();

        assert_eq!(schema.columns[0].sql_type, SqlType::DoublePrecision);
        assert_eq!(schema.columns[1].sql_type, SqlType::Boolean);
        assert_eq!(schema.columns[2].sql_type, SqlType::DoublePrecision);
    }

    #[test]
    fn test_header_only_is_text() {
        let inferrer = SchemaInferrer;
        let schema = inferrer.infer_from_data(&rows(&[&["a", "b"]])).unwrap();

        assert_eq!(schema.len(), 2);
        assert!(schema.columns.iter().all(|c| c.sql_type == SqlType::Text));
    }

    #[test]
    fn test_create_table_ddl() {
        let schema = TableSchema::new(vec![
            Column::new("VendorID", SqlType::BigInt),
            Column::new("lpep_pickup_datetime", SqlType::Timestamp),
            Column::new("fare_amount", SqlType::DoublePrecision),
        ]);

        let ddl = create_table_ddl("green_taxi_trips", &schema);
        assert_eq!(
            ddl,
            "CREATE TABLE \"green_taxi_trips\" (\n  \"VendorID\" BIGINT,\n  \"lpep_pickup_datetime\" TIMESTAMP,\n  \"fare_amount\" DOUBLE PRECISION\n)"
        );
        assert_eq!(
            drop_table_ddl("green_taxi_trips"),
            "DROP TABLE IF EXISTS \"green_taxi_trips\""
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
