//! Decoding sqlx rows into `Row`s of `DbValue`.
//!
//! Every column decodes. Types outside the `ColumnType` set fall back to
//! `Text`: the payload itself when it reads as text, `\x`-prefixed hex
//! otherwise.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind, PgValueFormat};
use sqlx::types::Json;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::value::{DbValue, Row};

/// Element types with a native decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scalar {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Bytes,
    Json,
    Uuid,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Enum,
}

impl Scalar {
    fn from_name(name: &str) -> Option<Scalar> {
        let scalar = match name {
            "BOOL" => Scalar::Bool,
            "INT2" => Scalar::Int2,
            "INT4" => Scalar::Int4,
            "INT8" => Scalar::Int8,
            "FLOAT4" => Scalar::Float4,
            "FLOAT8" => Scalar::Float8,
            "NUMERIC" => Scalar::Numeric,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => Scalar::Text,
            "BYTEA" => Scalar::Bytes,
            "JSON" | "JSONB" => Scalar::Json,
            "UUID" => Scalar::Uuid,
            "DATE" => Scalar::Date,
            "TIME" => Scalar::Time,
            "TIMESTAMP" => Scalar::Timestamp,
            "TIMESTAMPTZ" => Scalar::Timestamptz,
            _ => return None,
        };
        Some(scalar)
    }
}

/// How a column is read off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoder {
    Scalar(Scalar),
    Array(Scalar),
    Interval,
    Fallback,
}

impl Decoder {
    pub(crate) fn for_type(type_info: &PgTypeInfo) -> Decoder {
        match type_info.kind() {
            PgTypeKind::Enum(_) => return Decoder::Scalar(Scalar::Enum),
            PgTypeKind::Array(element) if matches!(element.kind(), PgTypeKind::Enum(_)) => {
                return Decoder::Array(Scalar::Enum);
            }
            _ => {}
        }

        let name = type_info.name();
        if let Some(element) = name.strip_suffix("[]") {
            return Scalar::from_name(element).map_or(Decoder::Fallback, Decoder::Array);
        }
        if name == "INTERVAL" {
            return Decoder::Interval;
        }
        Scalar::from_name(name).map_or(Decoder::Fallback, Decoder::Scalar)
    }
}

pub(crate) fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    let mut record = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = match Decoder::for_type(column.type_info()) {
            Decoder::Scalar(scalar) => decode_scalar(row, idx, scalar)?,
            Decoder::Array(scalar) => decode_array(row, idx, scalar)?,
            Decoder::Interval => wrap(row.try_get::<Option<PgInterval>, _>(idx)?, |interval| {
                DbValue::Text(interval_text(&interval))
            }),
            Decoder::Fallback => decode_fallback(row, idx)?,
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn decode_scalar(row: &PgRow, idx: usize, scalar: Scalar) -> Result<DbValue, sqlx::Error> {
    let value = match scalar {
        Scalar::Bool => wrap(row.try_get::<Option<bool>, _>(idx)?, DbValue::Boolean),
        Scalar::Int2 => wrap(row.try_get::<Option<i16>, _>(idx)?, |v| DbValue::Int32(i32::from(v))),
        Scalar::Int4 => wrap(row.try_get::<Option<i32>, _>(idx)?, DbValue::Int32),
        Scalar::Int8 => wrap(row.try_get::<Option<i64>, _>(idx)?, DbValue::Int64),
        Scalar::Float4 => wrap(row.try_get::<Option<f32>, _>(idx)?, DbValue::Float),
        Scalar::Float8 => wrap(row.try_get::<Option<f64>, _>(idx)?, DbValue::Double),
        Scalar::Numeric => decode_numeric(row, idx)?,
        Scalar::Text => wrap(row.try_get_unchecked::<Option<String>, _>(idx)?, DbValue::Text),
        Scalar::Bytes => wrap(row.try_get::<Option<Vec<u8>>, _>(idx)?, DbValue::Bytes),
        Scalar::Json => wrap(row.try_get::<Option<Json<serde_json::Value>>, _>(idx)?, |v| {
            DbValue::Json(v.0)
        }),
        Scalar::Uuid => wrap(row.try_get::<Option<Uuid>, _>(idx)?, DbValue::Uuid),
        Scalar::Date => wrap(row.try_get::<Option<NaiveDate>, _>(idx)?, DbValue::Date),
        Scalar::Time => wrap(row.try_get::<Option<NaiveTime>, _>(idx)?, DbValue::Time),
        Scalar::Timestamp => wrap(row.try_get::<Option<NaiveDateTime>, _>(idx)?, |v| {
            DbValue::DateTime(v.and_utc())
        }),
        Scalar::Timestamptz => {
            wrap(row.try_get::<Option<DateTime<Utc>>, _>(idx)?, DbValue::DateTime)
        }
        Scalar::Enum => wrap(row.try_get_unchecked::<Option<String>, _>(idx)?, DbValue::Enum),
    };
    Ok(value)
}

// Element types were matched by name above, so arrays skip sqlx's own
// compatibility check (it rejects e.g. JSON[] for `Vec<Json<_>>`).
fn decode_array(row: &PgRow, idx: usize, scalar: Scalar) -> Result<DbValue, sqlx::Error> {
    let value = match scalar {
        Scalar::Bool => array(row.try_get_unchecked::<Option<Vec<Option<bool>>>, _>(idx)?, DbValue::Boolean),
        Scalar::Int2 => array(row.try_get_unchecked::<Option<Vec<Option<i16>>>, _>(idx)?, |v| {
            DbValue::Int32(i32::from(v))
        }),
        Scalar::Int4 => array(row.try_get_unchecked::<Option<Vec<Option<i32>>>, _>(idx)?, DbValue::Int32),
        Scalar::Int8 => array(row.try_get_unchecked::<Option<Vec<Option<i64>>>, _>(idx)?, DbValue::Int64),
        Scalar::Float4 => array(row.try_get_unchecked::<Option<Vec<Option<f32>>>, _>(idx)?, DbValue::Float),
        Scalar::Float8 => array(row.try_get_unchecked::<Option<Vec<Option<f64>>>, _>(idx)?, DbValue::Double),
        Scalar::Numeric => array(row.try_get_unchecked::<Option<Vec<Option<Decimal>>>, _>(idx)?, |v| {
            DbValue::Numeric(v.to_string())
        }),
        Scalar::Text => array(row.try_get_unchecked::<Option<Vec<Option<String>>>, _>(idx)?, DbValue::Text),
        Scalar::Bytes => array(row.try_get_unchecked::<Option<Vec<Option<Vec<u8>>>>, _>(idx)?, DbValue::Bytes),
        Scalar::Json => array(
            row.try_get_unchecked::<Option<Vec<Option<Json<serde_json::Value>>>>, _>(idx)?,
            |v| DbValue::Json(v.0),
        ),
        Scalar::Uuid => array(row.try_get_unchecked::<Option<Vec<Option<Uuid>>>, _>(idx)?, DbValue::Uuid),
        Scalar::Date => array(row.try_get_unchecked::<Option<Vec<Option<NaiveDate>>>, _>(idx)?, DbValue::Date),
        Scalar::Time => array(row.try_get_unchecked::<Option<Vec<Option<NaiveTime>>>, _>(idx)?, DbValue::Time),
        Scalar::Timestamp => array(
            row.try_get_unchecked::<Option<Vec<Option<NaiveDateTime>>>, _>(idx)?,
            |v| DbValue::DateTime(v.and_utc()),
        ),
        Scalar::Timestamptz => array(
            row.try_get_unchecked::<Option<Vec<Option<DateTime<Utc>>>>, _>(idx)?,
            DbValue::DateTime,
        ),
        Scalar::Enum => array(row.try_get_unchecked::<Option<Vec<Option<String>>>, _>(idx)?, DbValue::Enum),
    };
    Ok(value)
}

fn decode_fallback(row: &PgRow, idx: usize) -> Result<DbValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(DbValue::Null);
    }
    let format = raw.format();
    let bytes = raw.as_bytes().map_err(sqlx::Error::Decode)?;
    Ok(DbValue::Text(fallback_text(format, bytes)))
}

// Read from the wire rather than through `Decimal`, which has no NaN or
// infinities and stops at 28 digits.
fn decode_numeric(row: &PgRow, idx: usize) -> Result<DbValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(DbValue::Null);
    }
    let format = raw.format();
    let bytes = raw.as_bytes().map_err(sqlx::Error::Decode)?;
    let text = match format {
        PgValueFormat::Text => std::str::from_utf8(bytes)
            .map_err(|err| sqlx::Error::Decode(err.into()))?
            .to_string(),
        PgValueFormat::Binary => numeric_text(bytes)
            .ok_or_else(|| sqlx::Error::Decode("malformed NUMERIC value".into()))?,
    };
    Ok(DbValue::Numeric(text))
}

/// Text of a binary NUMERIC: header of digit count, weight, sign and scale,
/// then base-10000 digits.
pub(crate) fn numeric_text(bytes: &[u8]) -> Option<String> {
    let word = |at: usize| -> Option<u16> {
        Some(u16::from_be_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
    };
    let ndigits = usize::from(word(0)?);
    let weight = i64::from(word(2)? as i16);
    let sign = word(4)?;
    let scale = usize::from(word(6)?);
    let digits: Vec<u16> = (0..ndigits)
        .map(|i| word(8 + 2 * i))
        .collect::<Option<_>>()?;

    match sign {
        0xC000 => return Some("NaN".to_string()),
        0xD000 => return Some("Infinity".to_string()),
        0xF000 => return Some("-Infinity".to_string()),
        0x0000 | 0x4000 => {}
        _ => return None,
    }

    let group = |idx: i64| -> u16 {
        usize::try_from(idx)
            .ok()
            .and_then(|idx| digits.get(idx))
            .copied()
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == 0x4000 {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&group(0).to_string());
        for idx in 1..=weight {
            text.push_str(&format!("{:04}", group(idx)));
        }
    }
    if scale > 0 {
        let mut fraction = String::with_capacity(scale + 4);
        let mut idx = weight + 1;
        while fraction.len() < scale {
            fraction.push_str(&format!("{:04}", group(idx)));
            idx += 1;
        }
        fraction.truncate(scale);
        text.push('.');
        text.push_str(&fraction);
    }
    Some(text)
}

pub(crate) fn fallback_text(format: PgValueFormat, bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if format == PgValueFormat::Text => text.to_string(),
        Ok(text) if text.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
            text.to_string()
        }
        _ => format!("\\x{}", hex::encode(bytes)),
    }
}

/// ISO 8601 duration, which Postgres accepts back as interval input.
pub(crate) fn interval_text(interval: &PgInterval) -> String {
    let seconds = interval.microseconds as f64 / 1_000_000.0;
    format!("P{}M{}DT{}S", interval.months, interval.days, seconds)
}

fn wrap<T>(value: Option<T>, to_value: impl Fn(T) -> DbValue) -> DbValue {
    value.map(to_value).unwrap_or(DbValue::Null)
}

fn array<T>(value: Option<Vec<Option<T>>>, to_value: impl Fn(T) -> DbValue) -> DbValue {
    match value {
        Some(items) => DbValue::Array(
            items
                .into_iter()
                .map(|item| wrap(item, &to_value))
                .collect(),
        ),
        None => DbValue::Null,
    }
}
