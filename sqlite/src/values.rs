//! Conversions between trellis values and rusqlite values

use rusqlite::types::{ToSqlOutput, ValueRef};
use trellis_types::{ScalarType, Value};

/// Borrowed parameter binding for a [`Value`].
pub(crate) struct SqlValue<'a>(pub &'a Value);

impl rusqlite::ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Reads a column value, restoring booleans from their integer storage.
pub(crate) fn decode(value: ValueRef<'_>, ty: ScalarType) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if ty == ScalarType::Boolean => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(items) => Value::Text(String::from_utf8_lossy(items).into_owned()),
        ValueRef::Blob(items) => Value::Blob(items.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ToSql;

    #[test]
    fn booleans_round_trip_through_integers() {
        let bound = SqlValue(&Value::Bool(true)).to_sql().unwrap();
        assert!(matches!(
            bound,
            ToSqlOutput::Owned(rusqlite::types::Value::Integer(1))
        ));
        assert_eq!(decode(ValueRef::Integer(0), ScalarType::Boolean), Value::Bool(false));
        assert_eq!(decode(ValueRef::Integer(0), ScalarType::Integer), Value::Integer(0));
    }
}
