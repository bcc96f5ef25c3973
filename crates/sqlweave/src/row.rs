//! Row unzipping and typed parsing.
//!
//! Returned rows are zipped with the statement's aliases into [`Record`]s.
//! Aliases of joined columns look like `image.id` and are nested under the
//! join alias; a joined object whose values are all `NULL` (an unmatched
//! LEFT JOIN) becomes `null`.

use crate::client::RawRow;
use crate::error::{OrmError, OrmResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A field-keyed row, in alias order.
pub type Record = Map<String, Value>;

/// Zip one raw row with the statement's aliases.
pub fn unzip(row: RawRow, aliases: &[String]) -> OrmResult<Record> {
    let values = match row {
        RawRow::Positional(values) => {
            if values.len() < aliases.len() {
                return Err(OrmError::decode(
                    aliases[values.len()].as_str(),
                    format!("row has {} columns, expected {}", values.len(), aliases.len()),
                ));
            }
            values
        }
        RawRow::Keyed(mut map) => aliases
            .iter()
            .enumerate()
            .map(|(i, alias)| {
                map.remove(&i.to_string())
                    .or_else(|| map.remove(alias))
                    .ok_or_else(|| OrmError::decode(alias.as_str(), "column missing from row"))
            })
            .collect::<OrmResult<Vec<_>>>()?,
    };

    let mut record = Record::new();
    let mut joins: Vec<&str> = Vec::new();
    for (alias, value) in aliases.iter().zip(values) {
        match alias.split_once('.') {
            Some((join, field)) => {
                if !joins.contains(&join) {
                    joins.push(join);
                }
                let nested = record
                    .entry(join.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                let Value::Object(nested) = nested else {
                    return Err(join_conflict(alias, join));
                };
                nested.insert(field.to_string(), value);
            }
            None => {
                if joins.contains(&alias.as_str()) {
                    return Err(join_conflict(alias, alias));
                }
                record.insert(alias.clone(), value);
            }
        }
    }

    for join in joins {
        if let Some(value) = record.get_mut(join)
            && let Value::Object(nested) = value
            && nested.values().all(Value::is_null)
        {
            *value = Value::Null;
        }
    }
    Ok(record)
}

fn join_conflict(alias: &str, join: &str) -> OrmError {
    OrmError::decode(alias, format!("`{join}` names both a column and a join"))
}

/// Deserialize a record into `T`.
pub fn parse<T: DeserializeOwned>(record: Record) -> OrmResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Typed access to record fields.
pub trait RecordExt {
    /// Deserialize one field, returning [`OrmError::Decode`] on failure.
    fn try_get_field<T: DeserializeOwned>(&self, field: &str) -> OrmResult<T>;
}

impl RecordExt for Record {
    fn try_get_field<T: DeserializeOwned>(&self, field: &str) -> OrmResult<T> {
        let value = self
            .get(field)
            .ok_or_else(|| OrmError::decode(field, "missing field"))?;
        T::deserialize(value).map_err(|e| OrmError::decode(field, e.to_string()))
    }
}
