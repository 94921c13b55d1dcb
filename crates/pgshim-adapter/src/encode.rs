//! Binding `DbValue` arguments onto sqlx queries.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgHasArrayType, PgTypeInfo, Postgres};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Encode, Type};

use crate::value::DbValue;

pub(crate) type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Parameter sent with an unspecified type (OID 0).
///
/// The server infers the type from the statement, so a NULL can land in any
/// column and an enum label in an enum column. Non-null payloads are sent as
/// text bytes, which is also the binary form of enum labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Untyped(pub(crate) Option<String>);

impl Type<Postgres> for Untyped {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for Untyped {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        match &self.0 {
            Some(text) => <&str as Encode<'_, Postgres>>::encode_by_ref(&text.as_str(), buf),
            None => Ok(IsNull::Yes),
        }
    }
}

/// Values that must leave their type to the server.
pub(crate) fn untyped(value: &DbValue) -> Option<Untyped> {
    match value {
        DbValue::Null => Some(Untyped(None)),
        DbValue::Enum(label) => Some(Untyped(Some(label.clone()))),
        _ => None,
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;
const NUMERIC_MAX_SCALE: i64 = 0x3FFF;
const NUMERIC_MAX_POINT: i64 = 4 * (i16::MAX as i64 + 1);

/// NUMERIC parameter encoded straight from its decimal text.
///
/// Covers what `Decimal` cannot hold: `NaN`, infinities, more than 28
/// significant digits and large exponents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NumericText(pub(crate) String);

impl Type<Postgres> for NumericText {
    fn type_info() -> PgTypeInfo {
        <Decimal as Type<Postgres>>::type_info()
    }
}

impl PgHasArrayType for NumericText {
    fn array_type_info() -> PgTypeInfo {
        <Decimal as PgHasArrayType>::array_type_info()
    }
}

impl Encode<'_, Postgres> for NumericText {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.extend_from_slice(&NumericParts::parse(&self.0)?.to_bytes());
        Ok(IsNull::No)
    }
}

/// Base-10000 form of the NUMERIC binary wire format.
#[derive(Debug, PartialEq, Eq)]
struct NumericParts {
    weight: i16,
    sign: u16,
    scale: u16,
    digits: Vec<i16>,
}

impl NumericParts {
    fn special(sign: u16) -> Self {
        Self {
            weight: 0,
            sign,
            scale: 0,
            digits: Vec::new(),
        }
    }

    fn parse(text: &str) -> Result<Self, BoxDynError> {
        let text = text.trim();
        let invalid = || -> BoxDynError { format!("invalid numeric value: {text:?}").into() };

        match text.to_ascii_lowercase().as_str() {
            "nan" => return Ok(Self::special(NUMERIC_NAN)),
            "infinity" | "+infinity" | "inf" | "+inf" => return Ok(Self::special(NUMERIC_PINF)),
            "-infinity" | "-inf" => return Ok(Self::special(NUMERIC_NINF)),
            _ => {}
        }

        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(idx) => {
                let exponent = unsigned[idx + 1..].parse::<i64>().map_err(|_| invalid())?;
                (&unsigned[..idx], exponent)
            }
            None => (unsigned, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let all_digits = int_part.bytes().chain(frac_part.bytes());
        if int_part.len() + frac_part.len() == 0 || !all_digits.clone().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let int_len = i64::try_from(int_part.len())?;
        let frac_len = i64::try_from(frac_part.len())?;
        let scale = frac_len.checked_sub(exponent).ok_or_else(invalid)?.max(0);
        let point = int_len.checked_add(exponent).ok_or_else(invalid)?;
        if scale > NUMERIC_MAX_SCALE || point > NUMERIC_MAX_POINT {
            return Err(invalid());
        }

        // Decimal digits with `point` of them before the decimal point, padded
        // so the point and the end both fall on base-10000 group boundaries.
        let mut decimal: Vec<u8> = all_digits.map(|b| b - b'0').collect();
        let mut point = point;
        if point < 0 {
            decimal = zero_padded(usize::try_from(-point)?, decimal);
            point = 0;
        }
        let lead = (4 - point.rem_euclid(4)) % 4;
        decimal = zero_padded(usize::try_from(lead)?, decimal);
        point += lead;
        let point_idx = usize::try_from(point)?;
        if decimal.len() < point_idx {
            decimal.resize(point_idx, 0);
        }
        decimal.resize(decimal.len().div_ceil(4) * 4, 0);

        let mut digits: Vec<i16> = decimal
            .chunks(4)
            .map(|group| group.iter().fold(0_i16, |acc, d| acc * 10 + i16::from(*d)))
            .collect();
        let mut weight = point / 4 - 1;
        let leading = digits.iter().take_while(|d| **d == 0).count();
        digits.drain(..leading);
        weight -= i64::try_from(leading)?;
        while digits.last() == Some(&0) {
            digits.pop();
        }
        if digits.len() > i16::MAX as usize {
            return Err(invalid());
        }

        let scale = u16::try_from(scale)?;
        if digits.is_empty() {
            return Ok(Self {
                weight: 0,
                sign: 0,
                scale,
                digits,
            });
        }
        Ok(Self {
            weight: i16::try_from(weight).map_err(|_| invalid())?,
            sign: if negative { NUMERIC_NEG } else { 0 },
            scale,
            digits,
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 2 * self.digits.len());
        // Length is bounded by `parse`.
        bytes.extend_from_slice(&(self.digits.len() as i16).to_be_bytes());
        bytes.extend_from_slice(&self.weight.to_be_bytes());
        bytes.extend_from_slice(&self.sign.to_be_bytes());
        bytes.extend_from_slice(&self.scale.to_be_bytes());
        for digit in &self.digits {
            bytes.extend_from_slice(&digit.to_be_bytes());
        }
        bytes
    }
}

fn zero_padded(lead: usize, digits: Vec<u8>) -> Vec<u8> {
    let mut padded = vec![0; lead];
    padded.extend(digits);
    padded
}

pub(crate) fn bind_value<'q>(query: PgQuery<'q>, value: &DbValue) -> PgQuery<'q> {
    match value {
        DbValue::Null | DbValue::Enum(_) => query.bind(untyped(value)),
        DbValue::Boolean(value) => query.bind(*value),
        DbValue::Int32(value) => query.bind(*value),
        DbValue::Int64(value) => query.bind(*value),
        DbValue::Float(value) => query.bind(*value),
        DbValue::Double(value) => query.bind(*value),
        DbValue::Numeric(text) => match Decimal::from_str(text) {
            Ok(decimal) => query.bind(decimal),
            Err(_) => query.bind(NumericText(text.clone())),
        },
        DbValue::Text(value) => query.bind(value.clone()),
        DbValue::Bytes(value) => query.bind(value.clone()),
        DbValue::Json(value) => query.bind(Json(value.clone())),
        DbValue::Uuid(value) => query.bind(*value),
        DbValue::Date(value) => query.bind(*value),
        DbValue::Time(value) => query.bind(*value),
        DbValue::DateTime(value) => query.bind(*value),
        DbValue::Array(items) => bind_array(query, items),
    }
}

fn collect<T>(items: &[DbValue], pick: impl Fn(&DbValue) -> Option<T>) -> Option<Vec<Option<T>>> {
    items
        .iter()
        .map(|item| match item {
            DbValue::Null => Some(None),
            other => pick(other).map(Some),
        })
        .collect()
}

fn bind_array<'q>(query: PgQuery<'q>, items: &[DbValue]) -> PgQuery<'q> {
    match items.iter().find(|item| !item.is_null()) {
        Some(DbValue::Boolean(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Boolean(value) => Some(*value),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::Int32(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Int32(value) => Some(*value),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::Int64(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Int64(value) => Some(*value),
                DbValue::Int32(value) => Some(i64::from(*value)),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::Double(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Double(value) => Some(*value),
                DbValue::Int64(value) => Some(*value as f64),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::Numeric(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Numeric(value) => Some(NumericText(value.clone())),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::Uuid(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Uuid(value) => Some(*value),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::DateTime(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::DateTime(value) => Some(*value),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::Date(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Date(value) => Some(*value),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::Bytes(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Bytes(value) => Some(value.clone()),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        Some(DbValue::Json(_)) => {
            if let Some(values) = collect(items, |item| match item {
                DbValue::Json(value) => Some(Json(value.clone())),
                _ => None,
            }) {
                return query.bind(values);
            }
        }
        _ => {}
    }

    // Mixed or textual elements go over the wire as text[].
    let texts: Vec<Option<String>> = items
        .iter()
        .map(|item| match item {
            DbValue::Null => None,
            DbValue::Text(value) | DbValue::Enum(value) | DbValue::Numeric(value) => {
                Some(value.clone())
            }
            other => Some(other.to_json().to_string()),
        })
        .collect();
    query.bind(texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Arguments, Execute};

    #[test]
    fn test_untyped_parameters_have_no_oid() {
        assert_eq!(
            <Untyped as Type<Postgres>>::type_info(),
            PgTypeInfo::with_oid(Oid(0))
        );
    }

    #[test]
    fn test_null_and_enum_are_untyped() {
        assert_eq!(untyped(&DbValue::Null), Some(Untyped(None)));
        assert_eq!(
            untyped(&DbValue::Enum("admin".to_string())),
            Some(Untyped(Some("admin".to_string())))
        );
    }

    #[test]
    fn test_typed_values_keep_their_type() {
        assert_eq!(untyped(&DbValue::Int32(1)), None);
        assert_eq!(untyped(&DbValue::Text("admin".to_string())), None);
        assert_eq!(untyped(&DbValue::Numeric("NaN".to_string())), None);
        assert_eq!(untyped(&DbValue::Array(vec![DbValue::Null])), None);
    }

    #[test]
    fn test_numeric_text_is_sent_as_numeric() {
        assert_eq!(
            <NumericText as Type<Postgres>>::type_info(),
            <Decimal as Type<Postgres>>::type_info()
        );
    }

    fn parts(weight: i16, sign: u16, scale: u16, digits: &[i16]) -> NumericParts {
        NumericParts {
            weight,
            sign,
            scale,
            digits: digits.to_vec(),
        }
    }

    #[test]
    fn test_numeric_special_values() {
        assert_eq!(NumericParts::parse("NaN").unwrap(), NumericParts::special(NUMERIC_NAN));
        assert_eq!(
            NumericParts::parse("Infinity").unwrap(),
            NumericParts::special(NUMERIC_PINF)
        );
        assert_eq!(
            NumericParts::parse("-infinity").unwrap(),
            NumericParts::special(NUMERIC_NINF)
        );
    }

    #[test]
    fn test_numeric_parts_use_base_10000_groups() {
        assert_eq!(NumericParts::parse("1.50").unwrap(), parts(0, 0, 2, &[1, 5000]));
        assert_eq!(
            NumericParts::parse("-0.00012").unwrap(),
            parts(-1, NUMERIC_NEG, 5, &[1, 2000])
        );
        assert_eq!(NumericParts::parse("1e3").unwrap(), parts(0, 0, 0, &[1000]));
        assert_eq!(NumericParts::parse("1e-30").unwrap(), parts(-8, 0, 30, &[100]));
        assert_eq!(NumericParts::parse("-0.000").unwrap(), parts(0, 0, 3, &[]));
    }

    #[test]
    fn test_numeric_beyond_decimal_range() {
        let text = "12345678901234567890123456789012345";
        assert!(Decimal::from_str(text).is_err());
        assert_eq!(
            NumericParts::parse(text).unwrap(),
            parts(8, 0, 0, &[123, 4567, 8901, 2345, 6789, 123, 4567, 8901, 2345])
        );
    }

    #[test]
    fn test_numeric_wire_bytes() {
        assert_eq!(
            NumericParts::parse("1.50").unwrap().to_bytes(),
            vec![0, 2, 0, 0, 0, 0, 0, 2, 0, 1, 0x13, 0x88]
        );
    }

    #[test]
    fn test_invalid_numeric_text_is_rejected() {
        for text in ["", ".", "12a", "1e", "--1", "1e200000", "1e-20000"] {
            assert!(NumericParts::parse(text).is_err(), "{text:?}");
        }
    }

    #[test]
    fn test_every_argument_encodes() {
        let args = [
            DbValue::Null,
            DbValue::Enum("admin".to_string()),
            DbValue::Int64(7),
            DbValue::Array(vec![DbValue::Int32(1), DbValue::Null]),
            DbValue::Array(vec![DbValue::Text("a".to_string()), DbValue::Int32(1)]),
            DbValue::Numeric("NaN".to_string()),
            DbValue::Array(vec![DbValue::Numeric("1.5".to_string()), DbValue::Null]),
        ];
        let mut query = args
            .iter()
            .fold(sqlx::query("SELECT $1, $2, $3, $4, $5, $6, $7"), bind_value);

        let arguments = query.take_arguments().unwrap().unwrap();
        assert_eq!(arguments.len(), args.len());
    }
}
