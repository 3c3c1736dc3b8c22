use super::error::FilterError;
use super::filter_where::quote;
use super::spec::SortSpec;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Resolve `sort_by`/`order` against the whitelist.
    ///
    /// Unknown keys fall back to the default column unless `SortSpec::strict` is set.
    /// The key column is appended as a tie-breaker so pages are stable.
    pub fn resolve(
        spec: &SortSpec,
        sort_by: Option<&str>,
        order: Option<&str>,
        key_column: &str,
    ) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let requested = sort_by.map(str::trim).filter(|s| !s.is_empty());
        let column = match requested {
            Some(key) => match spec.column_for(key) {
                Some(column) => column,
                None if spec.strict => return Err(FilterError::InvalidSortKey(key.to_string())),
                None => {
                    tracing::debug!("sort key '{}' not whitelisted, using '{}'", key, spec.default_key);
                    spec.default_column()
                }
            },
            None => spec.default_column(),
        };

        let mut infos = vec![FilterOrderInfo {
            column: column.to_string(),
            sort: SortDirection::parse(order),
        }];
        if column != key_column {
            infos.push(FilterOrderInfo {
                column: key_column.to_string(),
                sort: SortDirection::Asc,
            });
        }
        Ok(infos)
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("{} {}", quote(&i.column), i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
