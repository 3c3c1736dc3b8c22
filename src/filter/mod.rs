pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod spec;
pub mod types;

use std::collections::HashMap;

pub use error::FilterError;
pub use filter::Filter;
pub use spec::{FieldType, FilterField, FilterKind, FilterSpec, PeriodColumns, PeriodFilter, SortField, SortSpec};
pub use types::*;

/// Raw query-string parameters of a request
pub type QueryParams = HashMap<String, String>;
