pub mod attendance;
pub mod billing;

use serde_json::Value;
use uuid::Uuid;

use crate::database::Row;

pub(crate) fn uuid_field(row: &Row, column: &str) -> Option<Uuid> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

pub(crate) fn text_field<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}
