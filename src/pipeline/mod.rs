//! The tenant-scoped read path shared by every resource endpoint:
//! authorize, build the filtered query, count and page, attach relations,
//! wrap in the response envelope.

use uuid::Uuid;

use crate::database::Store;
use crate::entities::EntitySpec;
use crate::error::ApiError;
use crate::filter::{Condition, Filter, QueryParams};
use crate::middleware::ApiResponse;
use crate::pagination::{paginate, PageLimits, PageRequest};
use crate::relations::{resolve_related, RelationRequest};
use crate::tenancy::{authorize, CallerIdentity, TenantScope};

pub async fn list(
    store: &dyn Store,
    entity: &EntitySpec,
    caller: &CallerIdentity,
    tenant: &TenantScope,
    params: &QueryParams,
) -> Result<ApiResponse, ApiError> {
    authorize(Some(caller), tenant, entity.read_role)?;

    let mut filter = entity.scoped_filter(tenant)?;
    filter
        .apply_filters(&entity.filters, params)?
        .apply_sort(&entity.sort, params, entity.key_column)?;

    let page = PageRequest::from_params(params, PageLimits::from_config());
    let mut paged = paginate(store, &filter, page).await?;
    entity.decorate_all(&mut paged.items);

    let relations = RelationRequest::from_params(params, entity.relations);
    let include = resolve_related(store, tenant, entity.relations, &mut paged.items, &relations).await?;

    Ok(ApiResponse::list(
        format!("{} retrieved", entity.plural),
        paged.items,
        include,
        paged.pagination,
    ))
}

pub async fn show(
    store: &dyn Store,
    entity: &EntitySpec,
    caller: &CallerIdentity,
    tenant: &TenantScope,
    id: &str,
    params: &QueryParams,
) -> Result<ApiResponse, ApiError> {
    authorize(Some(caller), tenant, entity.read_role)?;

    let filter = by_id(entity, tenant, id)?;
    let row = store
        .fetch_one(&filter)
        .await?
        .ok_or_else(|| not_found(entity))?;

    let mut items = vec![row];
    entity.decorate_all(&mut items);
    let relations = RelationRequest::from_params(params, entity.relations);
    let include = resolve_related(store, tenant, entity.relations, &mut items, &relations).await?;

    let row = items.pop().ok_or_else(|| not_found(entity))?;
    Ok(ApiResponse::item(format!("{} retrieved", entity.singular), row, include))
}

/// Soft delete one row. Entities without a soft-delete column cannot be deleted.
pub async fn delete(
    store: &dyn Store,
    entity: &EntitySpec,
    caller: &CallerIdentity,
    tenant: &TenantScope,
    id: &str,
) -> Result<ApiResponse, ApiError> {
    authorize(Some(caller), tenant, entity.write_role)?;

    let Some(deleted_column) = entity.deleted_column else {
        return Err(ApiError::bad_request(format!("{} cannot be deleted", entity.plural)));
    };

    let filter = by_id(entity, tenant, id)?;
    let affected = store.soft_delete(&filter, deleted_column).await?;
    if affected == 0 {
        return Err(not_found(entity));
    }

    if crate::config::config().security.enable_audit_logging {
        tracing::info!(
            table = entity.table,
            id,
            tenant_id = %tenant.tenant_id,
            user_id = %caller.user_id,
            "soft deleted"
        );
    }
    ApiResponse::success(format!("{} deleted", entity.singular), serde_json::json!({ "id": id }))
}

/// Tenant-scoped, alive, single-row filter. Ids that are not UUIDs can match nothing.
pub fn by_id(entity: &EntitySpec, tenant: &TenantScope, id: &str) -> Result<Filter, ApiError> {
    let id = Uuid::parse_str(id.trim()).map_err(|_| not_found(entity))?;
    let mut filter = entity.scoped_filter(tenant)?;
    filter.where_condition(Condition::eq(entity.key_column, id))?;
    Ok(filter)
}

pub fn not_found(entity: &EntitySpec) -> ApiError {
    ApiError::not_found(format!("{} not found", entity.singular))
}
