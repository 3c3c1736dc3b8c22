use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid value for '{param}': expected {expected}")]
    InvalidFilterValue { param: String, expected: &'static str },

    #[error("Unsupported sort key: {0}")]
    InvalidSortKey(String),
}
