use super::types::{Condition, FilterOp, SqlValue};

/// Renders a list of conditions into a parameterized WHERE body
pub struct FilterWhere {
    param_values: Vec<SqlValue>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Generate `cond AND cond ...` with placeholders numbered after `starting_param_index`
    pub fn generate(conditions: &[Condition], starting_param_index: usize) -> (String, Vec<SqlValue>) {
        let mut filter_where = Self::new(starting_param_index);
        let parts: Vec<String> = conditions
            .iter()
            .map(|c| filter_where.build_sql_condition(c))
            .collect();
        let where_clause = if parts.is_empty() { "1=1".to_string() } else { parts.join(" AND ") };
        (where_clause, filter_where.param_values)
    }

    fn build_sql_condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { column, op, value } => {
                let quoted_column = quote(column);
                match (op, value) {
                    (FilterOp::Eq, SqlValue::Null) => format!("{} IS NULL", quoted_column),
                    (FilterOp::IEq, _) => {
                        format!("LOWER({}) = LOWER({})", quoted_column, self.param(value.clone()))
                    }
                    _ => format!("{} {} {}", quoted_column, op.to_sql(), self.param(value.clone())),
                }
            }
            Condition::In { column, values } => {
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                format!("{} IN ({})", quote(column), params.join(", "))
            }
            Condition::IsNull(column) => format!("{} IS NULL", quote(column)),
            Condition::AnyOf(group) => {
                if group.is_empty() {
                    return "1=0".to_string();
                }
                let parts: Vec<String> = group.iter().map(|c| self.build_sql_condition(c)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    fn param(&mut self, value: SqlValue) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}
