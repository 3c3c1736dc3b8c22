//! Include/nested resolution: related entities fetched in one tenant-scoped
//! batch per relation, attached inline (`nested`) or as a top-level
//! collection (`include`).

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use uuid::Uuid;

use crate::database::{DatabaseError, Row, Store};
use crate::filter::{Condition, Filter, FilterOrderInfo, QueryParams, SortDirection, SqlValue};
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    AcademicTerm,
    ClassSection,
    Teacher,
    Student,
    FeeRule,
    BillBatch,
    Lecture,
}

impl Relation {
    /// Normalize a client-supplied relation name. Case, `-`/`_` and plurals are accepted.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let relation = match normalized.as_str() {
            "term" | "terms" | "academic_term" | "academic_terms" => Relation::AcademicTerm,
            "section" | "sections" | "class_section" | "class_sections" | "class" => Relation::ClassSection,
            "teacher" | "teachers" => Relation::Teacher,
            "student" | "students" => Relation::Student,
            "rule" | "fee_rule" | "fee_rules" => Relation::FeeRule,
            "batch" | "bill_batch" | "bill_batches" => Relation::BillBatch,
            "lecture" | "lectures" | "session" | "sessions" => Relation::Lecture,
            _ => return None,
        };
        Some(relation)
    }

    pub fn table(&self) -> &'static str {
        match self {
            Relation::AcademicTerm => "academic_terms",
            Relation::ClassSection => "class_sections",
            Relation::Teacher => "teachers",
            Relation::Student => "students",
            Relation::FeeRule => "fee_rules",
            Relation::BillBatch => "bill_batches",
            Relation::Lecture => "lectures",
        }
    }

    /// Key of the inline copy on each item
    pub fn field(&self) -> &'static str {
        match self {
            Relation::AcademicTerm => "academic_term",
            Relation::ClassSection => "class_section",
            Relation::Teacher => "teacher",
            Relation::Student => "student",
            Relation::FeeRule => "fee_rule",
            Relation::BillBatch => "bill_batch",
            Relation::Lecture => "lecture",
        }
    }

    /// Key of the collection inside the top-level `include` object
    pub fn include_key(&self) -> &'static str {
        self.table()
    }
}

/// A foreign key column on an entity pointing at a related entity's `id`
#[derive(Debug, Clone, Copy)]
pub struct RelationLink {
    pub relation: Relation,
    pub foreign_key: &'static str,
}

impl RelationLink {
    pub const fn new(relation: Relation, foreign_key: &'static str) -> Self {
        Self { relation, foreign_key }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationRequest {
    pub include: BTreeSet<Relation>,
    pub nested: BTreeSet<Relation>,
}

impl RelationRequest {
    /// Parse `include` and `nested` independently. Names the entity has no link for are dropped.
    pub fn from_params(params: &QueryParams, links: &[RelationLink]) -> Self {
        let parse = |key: &str| -> BTreeSet<Relation> {
            params
                .get(key)
                .map(|raw| {
                    raw.split(',')
                        .filter(|s| !s.trim().is_empty())
                        .filter_map(|name| {
                            let relation = Relation::parse(name);
                            if relation.is_none() {
                                tracing::debug!("ignoring unknown relation '{}' in {}", name.trim(), key);
                            }
                            relation
                        })
                        .filter(|r| links.iter().any(|l| l.relation == *r))
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            include: parse("include"),
            nested: parse("nested"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.nested.is_empty()
    }

    fn relations(&self) -> BTreeSet<Relation> {
        self.include.union(&self.nested).copied().collect()
    }
}

/// Fetch every requested relation once and attach it.
///
/// Returns the top-level `include` object when any include relation was
/// requested; nested copies are written into `items` in place.
pub async fn resolve_related(
    store: &dyn Store,
    tenant: &TenantScope,
    links: &[RelationLink],
    items: &mut [Row],
    request: &RelationRequest,
) -> Result<Option<Row>, DatabaseError> {
    if request.is_empty() {
        return Ok(None);
    }

    let mut include = Row::new();
    for relation in request.relations() {
        let Some(link) = links.iter().find(|l| l.relation == relation) else { continue };

        let ids = foreign_keys(items, link.foreign_key);
        let related = if ids.is_empty() {
            BTreeMap::new()
        } else {
            batch_fetch(store, tenant, relation, &ids).await?
        };

        if request.nested.contains(&relation) {
            for item in items.iter_mut() {
                let target = item
                    .get(link.foreign_key)
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .and_then(|id| related.get(&id));
                if let Some(row) = target {
                    item.insert(relation.field().to_string(), Value::Object(row.clone()));
                }
            }
        }

        if request.include.contains(&relation) {
            let rows = related.into_values().map(Value::Object).collect();
            include.insert(relation.include_key().to_string(), Value::Array(rows));
        }
    }

    Ok((!request.include.is_empty()).then_some(include))
}

fn foreign_keys(items: &[Row], column: &str) -> BTreeSet<Uuid> {
    items
        .iter()
        .filter_map(|item| item.get(column).and_then(Value::as_str))
        .filter_map(|s| Uuid::parse_str(s).ok())
        .collect()
}

/// `tenant_id = $t AND deleted_at IS NULL AND id IN (...)`, keyed by id
async fn batch_fetch(
    store: &dyn Store,
    tenant: &TenantScope,
    relation: Relation,
    ids: &BTreeSet<Uuid>,
) -> Result<BTreeMap<Uuid, Row>, DatabaseError> {
    let mut filter = Filter::scoped(relation.table(), "tenant_id", tenant.tenant_id)?;
    filter
        .alive("deleted_at")?
        .where_condition(Condition::In {
            column: "id".to_string(),
            values: ids.iter().copied().map(SqlValue::Uuid).collect(),
        })?
        .order(vec![FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Asc }])?;

    let rows = store.fetch(&filter).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let id = row.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())?;
            Some((id, row))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::json;

    const LINKS: &[RelationLink] = &[
        RelationLink::new(Relation::AcademicTerm, "term_id"),
        RelationLink::new(Relation::Student, "student_id"),
    ];

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn synonyms_normalize() {
        for name in ["term", "Terms", "academic-term", "academic_terms"] {
            assert_eq!(Relation::parse(name), Some(Relation::AcademicTerm), "{}", name);
        }
        assert_eq!(Relation::parse("sessions"), Some(Relation::Lecture));
        assert_eq!(Relation::parse("password"), None);
    }

    #[test]
    fn include_and_nested_parse_independently() {
        let request = RelationRequest::from_params(
            &params(&[("include", "terms, bogus"), ("nested", "student,lecture")]),
            LINKS,
        );
        assert_eq!(request.include, BTreeSet::from([Relation::AcademicTerm]));
        // lectures are not linked from this entity
        assert_eq!(request.nested, BTreeSet::from([Relation::Student]));
    }

    #[tokio::test]
    async fn one_fetch_per_relation_for_both_modes() {
        let store = MemoryStore::new();
        let tenant = TenantScope::new(Uuid::new_v4());
        let term = Uuid::new_v4();
        let deleted_term = Uuid::new_v4();
        store
            .seed("academic_terms", json!({"id": term, "tenant_id": tenant.tenant_id, "name": "Ganjil"}))
            .await;
        store
            .seed(
                "academic_terms",
                json!({"id": deleted_term, "tenant_id": tenant.tenant_id, "deleted_at": "2024-01-01T00:00:00Z"}),
            )
            .await;

        let mut items: Vec<Row> = (0..5)
            .map(|i| {
                let term_id = if i == 4 { deleted_term } else { term };
                json!({"id": Uuid::new_v4(), "term_id": term_id}).as_object().cloned().unwrap()
            })
            .collect();

        let request = RelationRequest::from_params(&params(&[("include", "term"), ("nested", "term")]), LINKS);
        let include = resolve_related(&store, &tenant, LINKS, &mut items, &request)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.queries().await.len(), 1);
        assert_eq!(include["academic_terms"].as_array().unwrap().len(), 1);
        assert_eq!(items[0]["academic_term"]["name"], json!("Ganjil"));
        assert!(!items[4].contains_key("academic_term"));
    }

    #[tokio::test]
    async fn nested_only_has_no_include_block() {
        let store = MemoryStore::new();
        let tenant = TenantScope::new(Uuid::new_v4());
        let mut items: Vec<Row> = vec![json!({"id": Uuid::new_v4(), "student_id": null}).as_object().cloned().unwrap()];
        let request = RelationRequest::from_params(&params(&[("nested", "student")]), LINKS);
        let include = resolve_related(&store, &tenant, LINKS, &mut items, &request).await.unwrap();
        assert!(include.is_none());
        // no foreign keys, no query
        assert!(store.queries().await.is_empty());
    }
}
