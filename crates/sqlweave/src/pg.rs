//! PostgreSQL adapter for [`Connection`].
//!
//! Statements are written with `?` placeholders; they are rewritten to `$1`,
//! `$2`, … before being sent. JSON values are encoded according to the
//! parameter type the server inferred, and result columns are decoded back
//! into JSON values by column type.

use crate::client::{Connection, RawRow};
use crate::error::{OrmError, OrmResult};
use crate::sql::placeholder_offsets;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};
use std::error::Error;
use std::fmt::Write as _;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// Rewrite `?` placeholders outside quotes to `$n`.
pub fn rewrite_placeholders(sql: &str) -> String {
    let offsets = placeholder_offsets(sql);
    if offsets.is_empty() {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + offsets.len() * 2);
    let mut last = 0;
    for (i, offset) in offsets.into_iter().enumerate() {
        out.push_str(&sql[last..offset]);
        let _ = write!(out, "${}", i + 1);
        last = offset + 1;
    }
    out.push_str(&sql[last..]);
    out
}

/// A JSON value bound as a statement parameter.
#[derive(Debug)]
pub struct PgValue<'a>(pub &'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        encode(self.0, ty, out)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot encode {value} as {ty}").into()
}

fn integer(value: &Value, ty: &Type) -> Result<i64, BoxError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| mismatch(value, ty)),
        Value::String(s) => s.parse().map_err(|_| mismatch(value, ty)),
        _ => Err(mismatch(value, ty)),
    }
}

fn float(value: &Value, ty: &Type) -> Result<f64, BoxError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| mismatch(value, ty)),
        Value::String(s) => s.parse().map_err(|_| mismatch(value, ty)),
        _ => Err(mismatch(value, ty)),
    }
}

fn text<'v>(value: &'v Value, ty: &Type) -> Result<&'v str, BoxError> {
    value.as_str().ok_or_else(|| mismatch(value, ty))
}

fn encode(value: &Value, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if value.is_null() {
        return Ok(IsNull::Yes);
    }

    if let Kind::Array(_) = ty.kind() {
        let Value::Array(items) = value else {
            return Err(mismatch(value, ty));
        };
        let items: Vec<PgValue<'_>> = items.iter().map(PgValue).collect();
        return items.to_sql(ty, out);
    }

    match *ty {
        Type::BOOL => value
            .as_bool()
            .ok_or_else(|| mismatch(value, ty))?
            .to_sql(ty, out),
        Type::INT2 => i16::try_from(integer(value, ty)?)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(integer(value, ty)?)?.to_sql(ty, out),
        Type::INT8 => integer(value, ty)?.to_sql(ty, out),
        Type::OID => u32::try_from(integer(value, ty)?)?.to_sql(ty, out),
        Type::FLOAT4 => (float(value, ty)? as f32).to_sql(ty, out),
        Type::FLOAT8 => float(value, ty)?.to_sql(ty, out),
        Type::NUMERIC => encode_numeric(value, ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => match value {
            Value::String(s) => s.as_str().to_sql(ty, out),
            other => other.to_string().as_str().to_sql(ty, out),
        },
        Type::JSON | Type::JSONB => value.to_sql(ty, out),
        Type::UUID => text(value, ty)?.parse::<uuid::Uuid>()?.to_sql(ty, out),
        Type::DATE => text(value, ty)?.parse::<NaiveDate>()?.to_sql(ty, out),
        Type::TIMESTAMP => {
            let s = text(value, ty)?;
            let ts = match s.parse::<NaiveDateTime>() {
                Ok(ts) => ts,
                Err(_) => DateTime::parse_from_rfc3339(s)?.naive_utc(),
            };
            ts.to_sql(ty, out)
        }
        Type::TIMESTAMPTZ => {
            let s = text(value, ty)?;
            let ts = match DateTime::parse_from_rfc3339(s) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(_) => s.parse::<NaiveDateTime>()?.and_utc(),
            };
            ts.to_sql(ty, out)
        }
        Type::BYTEA => match value {
            Value::String(s) => s.as_bytes().to_sql(ty, out),
            Value::Array(items) => {
                let bytes = items
                    .iter()
                    .map(|b| {
                        b.as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(|| mismatch(value, ty))
                    })
                    .collect::<Result<Vec<u8>, _>>()?;
                bytes.to_sql(ty, out)
            }
            _ => Err(mismatch(value, ty)),
        },
        _ => Err(mismatch(value, ty)),
    }
}

#[cfg(feature = "rust_decimal")]
fn encode_numeric(value: &Value, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let decimal: rust_decimal::Decimal = match value {
        Value::Number(n) => n.to_string().parse()?,
        Value::String(s) => s.parse()?,
        _ => return Err(mismatch(value, ty)),
    };
    decimal.to_sql(ty, out)
}

#[cfg(not(feature = "rust_decimal"))]
fn encode_numeric(value: &Value, ty: &Type, _out: &mut BytesMut) -> Result<IsNull, BoxError> {
    Err(format!("cannot encode {value} as {ty}: enable the `rust_decimal` feature").into())
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> OrmResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| OrmError::decode(row.columns()[idx].name(), e.to_string()))
}

fn to_value<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

fn float_value(value: Option<f64>) -> Value {
    value.and_then(Number::from_f64).map_or(Value::Null, Value::Number)
}

fn array<'a, T>(row: &'a Row, idx: usize) -> OrmResult<Value>
where
    T: FromSql<'a> + Into<Value>,
{
    let items = get::<Vec<Option<T>>>(row, idx)?;
    Ok(items.map_or(Value::Null, |items| {
        Value::Array(items.into_iter().map(to_value).collect())
    }))
}

/// Decode one column into a JSON value.
fn decode_column(row: &Row, idx: usize) -> OrmResult<Value> {
    let column = &row.columns()[idx];
    let value = match *column.type_() {
        Type::BOOL => to_value(get::<bool>(row, idx)?),
        Type::INT2 => to_value(get::<i16>(row, idx)?),
        Type::INT4 => to_value(get::<i32>(row, idx)?),
        Type::INT8 => to_value(get::<i64>(row, idx)?),
        Type::OID => to_value(get::<u32>(row, idx)?),
        Type::FLOAT4 => float_value(get::<f32>(row, idx)?.map(f64::from)),
        Type::FLOAT8 => float_value(get::<f64>(row, idx)?),
        Type::NUMERIC => decode_numeric(row, idx)?,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => to_value(get::<String>(row, idx)?),
        Type::JSON | Type::JSONB => get::<Value>(row, idx)?.unwrap_or(Value::Null),
        Type::UUID => to_value(get::<uuid::Uuid>(row, idx)?.map(|u| u.to_string())),
        Type::DATE => to_value(get::<NaiveDate>(row, idx)?.map(|d| d.to_string())),
        Type::TIMESTAMP => to_value(
            get::<NaiveDateTime>(row, idx)?.map(|t| t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        ),
        Type::TIMESTAMPTZ => to_value(get::<DateTime<Utc>>(row, idx)?.map(|t| t.to_rfc3339())),
        Type::BYTEA => to_value(get::<Vec<u8>>(row, idx)?),
        Type::BOOL_ARRAY => array::<bool>(row, idx)?,
        Type::INT2_ARRAY => array::<i16>(row, idx)?,
        Type::INT4_ARRAY => array::<i32>(row, idx)?,
        Type::INT8_ARRAY => array::<i64>(row, idx)?,
        Type::FLOAT8_ARRAY => array::<f64>(row, idx)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => array::<String>(row, idx)?,
        Type::JSON_ARRAY | Type::JSONB_ARRAY => array::<Value>(row, idx)?,
        ref other => {
            return Err(OrmError::decode(
                column.name(),
                format!("unsupported column type {other}"),
            ));
        }
    };
    Ok(value)
}

#[cfg(feature = "rust_decimal")]
fn decode_numeric(row: &Row, idx: usize) -> OrmResult<Value> {
    Ok(to_value(
        get::<rust_decimal::Decimal>(row, idx)?.map(|d| d.to_string()),
    ))
}

#[cfg(not(feature = "rust_decimal"))]
fn decode_numeric(row: &Row, idx: usize) -> OrmResult<Value> {
    Err(OrmError::decode(
        row.columns()[idx].name(),
        "numeric columns need the `rust_decimal` feature",
    ))
}

/// Decode a row into positional JSON values.
pub fn decode_row(row: &Row) -> OrmResult<RawRow> {
    (0..row.len())
        .map(|idx| decode_column(row, idx))
        .collect::<OrmResult<Vec<_>>>()
        .map(RawRow::Positional)
}

fn params(values: &[Value]) -> Vec<PgValue<'_>> {
    values.iter().map(PgValue).collect()
}

fn param_refs<'a>(params: &'a [PgValue<'_>]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl Connection for tokio_postgres::Client {
    async fn query(&self, sql: &str, values: &[Value]) -> OrmResult<Vec<RawRow>> {
        let sql = rewrite_placeholders(sql);
        let params = params(values);
        let rows = tokio_postgres::Client::query(self, &sql, &param_refs(&params)).await?;
        rows.iter().map(decode_row).collect()
    }
}

impl Connection for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, values: &[Value]) -> OrmResult<Vec<RawRow>> {
        let sql = rewrite_placeholders(sql);
        let params = params(values);
        let rows = tokio_postgres::Transaction::query(self, &sql, &param_refs(&params)).await?;
        rows.iter().map(decode_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoded(value: Value, ty: &Type) -> Result<(IsNull, Vec<u8>), BoxError> {
        let mut buf = BytesMut::new();
        let is_null = PgValue(&value).to_sql(ty, &mut buf)?;
        Ok((is_null, buf.to_vec()))
    }

    #[test]
    fn rewrites_placeholders_in_order() {
        assert_eq!(
            rewrite_placeholders("SELECT a FROM t WHERE a = ? AND b IN (?, ?)"),
            "SELECT a FROM t WHERE a = $1 AND b IN ($2, $3)"
        );
    }

    #[test]
    fn leaves_quoted_question_marks() {
        assert_eq!(
            rewrite_placeholders("SELECT '?' AS \"q?\" FROM t WHERE a = ?"),
            "SELECT '?' AS \"q?\" FROM t WHERE a = $1"
        );
    }

    #[test]
    fn encodes_null_as_sql_null() {
        let (is_null, bytes) = encoded(Value::Null, &Type::INT8).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(bytes.is_empty());
    }

    #[test]
    fn encodes_by_parameter_type() {
        let (_, bytes) = encoded(json!(5), &Type::INT8).unwrap();
        assert_eq!(bytes, 5_i64.to_be_bytes());

        let (_, bytes) = encoded(json!(7), &Type::INT4).unwrap();
        assert_eq!(bytes, 7_i32.to_be_bytes());

        let (_, bytes) = encoded(json!("abc"), &Type::TEXT).unwrap();
        assert_eq!(bytes, b"abc");

        let (_, bytes) = encoded(json!(true), &Type::BOOL).unwrap();
        assert_eq!(bytes, [1]);
    }

    #[test]
    fn numbers_bound_as_text_are_stringified() {
        let (_, bytes) = encoded(json!(42), &Type::TEXT).unwrap();
        assert_eq!(bytes, b"42");
    }

    #[test]
    fn rejects_mismatched_values() {
        assert!(encoded(json!("x"), &Type::BOOL).is_err());
        assert!(encoded(json!(1.5), &Type::INT8).is_err());
        assert!(encoded(json!(70000), &Type::INT2).is_err());
        assert!(encoded(json!("not-a-uuid"), &Type::UUID).is_err());
    }

    #[test]
    fn encodes_arrays_element_wise() {
        let (_, direct) = encoded(json!([1, 2]), &Type::INT8_ARRAY).unwrap();
        let mut expected = BytesMut::new();
        vec![1_i64, 2].to_sql(&Type::INT8_ARRAY, &mut expected).unwrap();
        assert_eq!(direct, expected.to_vec());
    }
}
