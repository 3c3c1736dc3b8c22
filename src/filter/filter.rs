use chrono::{DateTime, Datelike, NaiveDate, Utc};
use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{quote, FilterWhere};
use super::spec::{FilterSpec, PeriodColumns, PeriodFilter, SortSpec};
use super::types::{Condition, FilterOp, FilterOrderInfo, SqlResult, SqlValue};
use super::QueryParams;

/// A tenant-scoped query over one table.
///
/// The only constructor is [`Filter::scoped`], so every filter carries the
/// tenant equality predicate as its first condition.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    tenant_column: String,
    tenant_id: Uuid,
    conditions: Vec<Condition>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn scoped(
        table_name: impl Into<String>,
        tenant_column: impl Into<String>,
        tenant_id: Uuid,
    ) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        let tenant_column = tenant_column.into();
        Self::validate_table_name(&table_name)?;
        Self::validate_column(&tenant_column)?;
        Ok(Self {
            conditions: vec![Condition::eq(tenant_column.clone(), tenant_id)],
            table_name,
            tenant_column,
            tenant_id,
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    /// Exclude soft-deleted rows
    pub fn alive(&mut self, deleted_column: &str) -> Result<&mut Self, FilterError> {
        self.where_condition(Condition::IsNull(deleted_column.to_string()))
    }

    pub fn where_condition(&mut self, condition: Condition) -> Result<&mut Self, FilterError> {
        Self::validate_condition(&condition)?;
        self.conditions.push(condition);
        Ok(self)
    }

    /// Apply whitelisted filters, the period filter and search from raw query parameters.
    /// Keys outside the whitelist are ignored.
    pub fn apply_filters(&mut self, spec: &FilterSpec, params: &QueryParams) -> Result<&mut Self, FilterError> {
        for field in spec.fields {
            let Some(raw) = params.get(field.param) else { continue };
            if raw.trim().is_empty() {
                continue;
            }
            let value = field.value_type.parse(raw).ok_or_else(|| FilterError::InvalidFilterValue {
                param: field.param.to_string(),
                expected: field.value_type.name(),
            })?;
            self.where_condition(Condition::compare(field.column, field.kind.op(), value))?;
        }

        if let Some(period) = &spec.period {
            self.apply_period(period, params)?;
        }

        if !spec.search.is_empty() {
            if let Some(term) = params.get("q").map(|q| q.trim()).filter(|q| !q.is_empty()) {
                let pattern = format!("%{}%", escape_like(term));
                let group = spec
                    .search
                    .iter()
                    .map(|column| Condition::compare(*column, FilterOp::ILike, pattern.clone()))
                    .collect();
                self.where_condition(Condition::AnyOf(group))?;
            }
        }

        Ok(self)
    }

    /// `term_id` wins when it parses; otherwise fall back to `year` (+ `month`).
    /// Fallback values that fail to parse are ignored.
    fn apply_period(&mut self, period: &PeriodFilter, params: &QueryParams) -> Result<(), FilterError> {
        if let Some(raw) = params.get("term_id") {
            match Uuid::parse_str(raw.trim()) {
                Ok(term_id) => {
                    self.where_condition(Condition::eq(period.term_column, term_id))?;
                    return Ok(());
                }
                Err(_) => tracing::debug!("term_id '{}' did not parse, trying year/month", raw),
            }
        }

        let year = params
            .get("year")
            .and_then(|y| y.trim().parse::<i32>().ok())
            .filter(|y| (1..=9998).contains(y));
        let Some(year) = year else {
            if params.contains_key("year") || params.contains_key("month") {
                tracing::debug!("ignoring unparseable year/month filter");
            }
            return Ok(());
        };
        let month = params
            .get("month")
            .and_then(|m| m.trim().parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m));

        match period.fallback {
            PeriodColumns::YearMonth { year_column, month_column } => {
                self.where_condition(Condition::eq(year_column, year as i64))?;
                if let Some(month) = month {
                    self.where_condition(Condition::eq(month_column, month as i64))?;
                }
            }
            PeriodColumns::DateRange { column } => {
                let Some((start, end)) = period_bounds(year, month) else {
                    return Ok(());
                };
                self.where_condition(Condition::compare(column, FilterOp::Gte, start))?;
                self.where_condition(Condition::compare(column, FilterOp::Lt, end))?;
            }
        }
        Ok(())
    }

    pub fn apply_sort(
        &mut self,
        spec: &SortSpec,
        params: &QueryParams,
        key_column: &str,
    ) -> Result<&mut Self, FilterError> {
        let infos = FilterOrder::resolve(
            spec,
            params.get("sort_by").map(String::as_str),
            params.get("order").map(String::as_str),
            key_column,
        )?;
        self.order(infos)
    }

    pub fn order(&mut self, infos: Vec<FilterOrderInfo>) -> Result<&mut Self, FilterError> {
        for info in &infos {
            Self::validate_column(&info.column)?;
        }
        self.order_data = infos;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> &mut Self {
        self.limit = Some(limit.max(0));
        self.offset = offset.map(|o| o.max(0));
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn tenant_column(&self) -> &str {
        &self.tenant_column
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order_data(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// Rows as JSON objects, sorted and bounded
    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.conditions, 0);
        let table = quote(&self.table_name);
        let query = [
            format!("SELECT row_to_json({}) AS row", table),
            format!("FROM {}", table),
            format!("WHERE {}", where_clause),
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    /// Count over the filtered rows, ignoring order and bounds
    pub fn to_count_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.conditions, 0);
        SqlResult {
            query: format!(
                "SELECT COUNT(*) AS count FROM {} WHERE {}",
                quote(&self.table_name),
                where_clause
            ),
            params,
        }
    }

    pub fn to_soft_delete_sql(&self, deleted_column: &str, at: DateTime<Utc>) -> Result<SqlResult, FilterError> {
        Self::validate_column(deleted_column)?;
        let (where_clause, mut where_params) = FilterWhere::generate(&self.conditions, 1);
        let mut params = vec![SqlValue::Timestamp(at)];
        params.append(&mut where_params);
        Ok(SqlResult {
            query: format!(
                "UPDATE {} SET {} = $1 WHERE {}",
                quote(&self.table_name),
                quote(deleted_column),
                where_clause
            ),
            params,
        })
    }

    /// Atomic counter adjustment clamped at zero, evaluated by the store in one statement
    pub fn to_counter_sql(&self, column: &str, delta: i64) -> Result<SqlResult, FilterError> {
        Self::validate_column(column)?;
        let (where_clause, mut where_params) = FilterWhere::generate(&self.conditions, 1);
        let mut params = vec![SqlValue::Int(delta)];
        params.append(&mut where_params);
        let col = quote(column);
        Ok(SqlResult {
            query: format!(
                "UPDATE {table} SET {col} = CASE WHEN {col} + $1 < 0 THEN 0 ELSE {col} + $1 END, \"updated_at\" = now() WHERE {where_clause}",
                table = quote(&self.table_name),
                col = col,
                where_clause = where_clause
            ),
            params,
        })
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if !is_identifier(name) {
            return Err(FilterError::InvalidTableName(name.to_string()));
        }
        Ok(())
    }

    pub(crate) fn validate_column(name: &str) -> Result<(), FilterError> {
        if !is_identifier(name) {
            return Err(FilterError::InvalidColumn(name.to_string()));
        }
        Ok(())
    }

    fn validate_condition(condition: &Condition) -> Result<(), FilterError> {
        match condition {
            Condition::Compare { column, .. } | Condition::In { column, .. } | Condition::IsNull(column) => {
                Self::validate_column(column)
            }
            Condition::AnyOf(group) => group.iter().try_for_each(Self::validate_condition),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// First day of the period and first day after it
fn period_bounds(year: i32, month: Option<u32>) -> Option<(NaiveDate, NaiveDate)> {
    match month {
        Some(12) => Some((NaiveDate::from_ymd_opt(year, 12, 1)?, NaiveDate::from_ymd_opt(year + 1, 1, 1)?)),
        Some(month) => Some((
            NaiveDate::from_ymd_opt(year, month, 1)?,
            NaiveDate::from_ymd_opt(year, month + 1, 1)?,
        )),
        None => {
            let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
            Some((start, NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)?))
        }
    }
}
