//! Per-entity configuration consumed by the generic list/show/delete pipeline.

pub mod academic;
pub mod attendance;
pub mod billing;

use crate::database::Row;
use crate::filter::{Filter, FilterError, FilterSpec, SortSpec};
use crate::relations::RelationLink;
use crate::tenancy::{Role, TenantScope};

pub use academic::{ACADEMIC_TERMS, CLASS_SECTIONS, STUDENTS, TEACHERS};
pub use attendance::{ATTENDANCE, LECTURES, SEMESTER_STATS};
pub use billing::{BILL_BATCHES, FEE_RULES, STUDENT_BILLS};

#[derive(Debug)]
pub struct EntitySpec {
    /// URL segment under `/api/v1`
    pub resource: &'static str,
    pub table: &'static str,
    pub tenant_column: &'static str,
    pub key_column: &'static str,
    /// `None` for entities without soft delete
    pub deleted_column: Option<&'static str>,
    pub filters: FilterSpec,
    pub sort: SortSpec,
    pub relations: &'static [RelationLink],
    pub read_role: Role,
    pub write_role: Role,
    /// Human-readable names used in response messages
    pub singular: &'static str,
    pub plural: &'static str,
    /// Post-fetch row transform (snapshot decoding and the like)
    pub decorate: Option<fn(&mut Row)>,
}

impl EntitySpec {
    /// Tenant predicate plus the soft-delete predicate when the entity has one
    pub fn scoped_filter(&self, tenant: &TenantScope) -> Result<Filter, FilterError> {
        let mut filter = Filter::scoped(self.table, self.tenant_column, tenant.tenant_id)?;
        if let Some(column) = self.deleted_column {
            filter.alive(column)?;
        }
        Ok(filter)
    }

    pub fn decorate_all(&self, rows: &mut [Row]) {
        if let Some(decorate) = self.decorate {
            rows.iter_mut().for_each(decorate);
        }
    }
}

pub static ALL: &[&EntitySpec] = &[
    &ACADEMIC_TERMS,
    &CLASS_SECTIONS,
    &TEACHERS,
    &STUDENTS,
    &FEE_RULES,
    &BILL_BATCHES,
    &STUDENT_BILLS,
    &LECTURES,
    &ATTENDANCE,
    &SEMESTER_STATS,
];

pub fn by_resource(resource: &str) -> Option<&'static EntitySpec> {
    ALL.iter().copied().find(|e| e.resource == resource)
}
