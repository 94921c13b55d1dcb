//! Values, rows and column types exchanged with the engine.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Dynamically typed SQL value used for arguments and result cells.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    /// Arbitrary precision decimal kept in its text form.
    Numeric(String),
    Text(String),
    /// Label of a user-defined enum type.
    Enum(String),
    Bytes(Vec<u8>),
    Json(JsonValue),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    Array(Vec<DbValue>),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Column type implied by this value; `None` for `Null`.
    pub fn column_type(&self) -> Option<ColumnType> {
        let column_type = match self {
            DbValue::Null => return None,
            DbValue::Boolean(_) => ColumnType::Boolean,
            DbValue::Int32(_) => ColumnType::Int32,
            DbValue::Int64(_) => ColumnType::Int64,
            DbValue::Float(_) => ColumnType::Float,
            DbValue::Double(_) => ColumnType::Double,
            DbValue::Numeric(_) => ColumnType::Numeric,
            DbValue::Text(_) => ColumnType::Text,
            DbValue::Enum(_) => ColumnType::Enum,
            DbValue::Bytes(_) => ColumnType::Bytes,
            DbValue::Json(_) => ColumnType::Json,
            DbValue::Uuid(_) => ColumnType::Uuid,
            DbValue::Date(_) => ColumnType::Date,
            DbValue::Time(_) => ColumnType::Time,
            DbValue::DateTime(_) => ColumnType::DateTime,
            DbValue::Array(items) => items
                .iter()
                .find_map(DbValue::column_type)
                .and_then(ColumnType::array_of)
                .unwrap_or(ColumnType::TextArray),
        };
        Some(column_type)
    }

    /// Build a value from a JSON literal (used for CLI arguments).
    pub fn from_json(value: &JsonValue) -> DbValue {
        match value {
            JsonValue::Null => DbValue::Null,
            JsonValue::Bool(value) => DbValue::Boolean(*value),
            JsonValue::Number(number) => match number.as_i64() {
                Some(value) => DbValue::Int64(value),
                None => DbValue::Double(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(value) => DbValue::Text(value.clone()),
            JsonValue::Array(items) => DbValue::Array(items.iter().map(DbValue::from_json).collect()),
            JsonValue::Object(_) => DbValue::Json(value.clone()),
        }
    }

    /// JSON rendering of a result cell.
    pub fn to_json(&self) -> JsonValue {
        match self {
            DbValue::Null => JsonValue::Null,
            DbValue::Boolean(value) => JsonValue::Bool(*value),
            DbValue::Int32(value) => JsonValue::from(*value),
            DbValue::Int64(value) => JsonValue::String(value.to_string()),
            DbValue::Float(value) => JsonValue::from(*value),
            DbValue::Double(value) => JsonValue::from(*value),
            DbValue::Numeric(value) | DbValue::Text(value) | DbValue::Enum(value) => {
                JsonValue::String(value.clone())
            }
            DbValue::Bytes(value) => JsonValue::from(value.clone()),
            DbValue::Json(value) => value.clone(),
            DbValue::Uuid(value) => JsonValue::String(value.to_string()),
            DbValue::Date(value) => JsonValue::String(value.format("%Y-%m-%d").to_string()),
            DbValue::Time(value) => JsonValue::String(value.format("%H:%M:%S%.f").to_string()),
            DbValue::DateTime(value) => {
                JsonValue::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            DbValue::Array(items) => JsonValue::Array(items.iter().map(DbValue::to_json).collect()),
        }
    }
}

impl Serialize for DbValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int32,
    Int64,
    Float,
    Double,
    Numeric,
    Boolean,
    Text,
    Date,
    Time,
    DateTime,
    Json,
    Enum,
    Bytes,
    Uuid,
    Int32Array,
    Int64Array,
    FloatArray,
    DoubleArray,
    NumericArray,
    BooleanArray,
    TextArray,
    DateArray,
    TimeArray,
    DateTimeArray,
    JsonArray,
    EnumArray,
    BytesArray,
    UuidArray,
}

impl ColumnType {
    /// Array type for a scalar element type. Arrays of arrays have none.
    pub fn array_of(element: ColumnType) -> Option<ColumnType> {
        let array = match element {
            ColumnType::Int32 => ColumnType::Int32Array,
            ColumnType::Int64 => ColumnType::Int64Array,
            ColumnType::Float => ColumnType::FloatArray,
            ColumnType::Double => ColumnType::DoubleArray,
            ColumnType::Numeric => ColumnType::NumericArray,
            ColumnType::Boolean => ColumnType::BooleanArray,
            ColumnType::Text => ColumnType::TextArray,
            ColumnType::Date => ColumnType::DateArray,
            ColumnType::Time => ColumnType::TimeArray,
            ColumnType::DateTime => ColumnType::DateTimeArray,
            ColumnType::Json => ColumnType::JsonArray,
            ColumnType::Enum => ColumnType::EnumArray,
            ColumnType::Bytes => ColumnType::BytesArray,
            ColumnType::Uuid => ColumnType::UuidArray,
            _ => return None,
        };
        Some(array)
    }
}

/// Result row: column names mapped to values, in the order the client
/// returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, DbValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an existing value of the same name.
    pub fn insert(&mut self, column: impl Into<String>, value: DbValue) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: DbValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&DbValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Values in the order of `names`; missing columns become `Null`.
    pub fn values_for(&self, names: &[String]) -> Vec<DbValue> {
        names
            .iter()
            .map(|name| self.get(name).cloned().unwrap_or(DbValue::Null))
            .collect()
    }
}

impl FromIterator<(String, DbValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, DbValue)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

/// Guess column types from sampled values.
///
/// Columns come from the first row. Each column takes the type of its first
/// non-null value; columns without one fall back to `Text`.
pub fn guess_column_types(rows: &[Row]) -> Vec<ColumnType> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    first
        .column_names()
        .map(|name| {
            rows.iter()
                .filter_map(|row| row.get(name))
                .find(|value| !value.is_null())
                .and_then(DbValue::column_type)
                .unwrap_or(ColumnType::Text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guess_uses_first_non_null_sample() {
        let rows = vec![
            Row::new()
                .with("id", DbValue::Int32(1))
                .with("name", DbValue::Null)
                .with("tags", DbValue::Null),
            Row::new()
                .with("id", DbValue::Int32(2))
                .with("name", DbValue::Text("bob".to_string()))
                .with("tags", DbValue::Null),
        ];

        assert_eq!(
            guess_column_types(&rows),
            vec![ColumnType::Int32, ColumnType::Text, ColumnType::Text]
        );
    }

    #[test]
    fn test_guess_empty_rows() {
        assert!(guess_column_types(&[]).is_empty());
    }

    #[test]
    fn test_guess_array_columns() {
        let rows = vec![
            Row::new().with("ids", DbValue::Array(vec![DbValue::Null, DbValue::Int64(3)])),
            Row::new().with("ids", DbValue::Array(vec![])),
        ];
        assert_eq!(guess_column_types(&rows), vec![ColumnType::Int64Array]);

        let rows = vec![Row::new().with("ids", DbValue::Array(vec![]))];
        assert_eq!(guess_column_types(&rows), vec![ColumnType::TextArray]);
    }

    #[test]
    fn test_row_preserves_column_order() {
        let row = Row::new()
            .with("z", DbValue::Int32(1))
            .with("a", DbValue::Int32(2))
            .with("z", DbValue::Int32(3));

        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(row.get("z"), Some(&DbValue::Int32(3)));
        assert_eq!(
            row.values_for(&["a".to_string(), "missing".to_string()]),
            vec![DbValue::Int32(2), DbValue::Null]
        );
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(
            DbValue::from_json(&json!([1, "a", null, 1.5, {"k": true}])),
            DbValue::Array(vec![
                DbValue::Int64(1),
                DbValue::Text("a".to_string()),
                DbValue::Null,
                DbValue::Double(1.5),
                DbValue::Json(json!({"k": true})),
            ])
        );

        assert_eq!(DbValue::Int64(9_007_199_254_740_993).to_json(), json!("9007199254740993"));
        assert_eq!(
            DbValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()).to_json(),
            json!("2024-02-29")
        );
    }
}
