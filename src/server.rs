use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post, MethodRouter},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::config;
use crate::entities::{self, EntitySpec};
use crate::handlers::{attendance, auth, billing, public, resources};
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    let api = api_routes();

    let router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/v1/auth/whoami", get(auth::whoami_get))
        // Token-only tenant resolution and the tenant-in-path compatibility routes
        .nest("/api/v1", api.clone())
        .nest("/api/v1/tenants/:tenant_id", api)
        .layer(from_fn(jwt_auth_middleware))
        .with_state(state);

    let router = if config().security.enable_cors {
        router.layer(cors_layer())
    } else {
        router
    };

    if config().api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn api_routes() -> Router<AppState> {
    entities::ALL
        .iter()
        .fold(Router::new(), |router, entity| router.merge(resource_routes(entity)))
        .route("/bill-batches/generate", post(billing::bill_batch_generate))
}

/// List/show for every resource, plus the writes a resource supports
fn resource_routes(entity: &'static EntitySpec) -> Router<AppState> {
    let collection: MethodRouter<AppState> = match entity.resource {
        "fee-rules" => get(resources::list).post(billing::fee_rule_post),
        "attendance" => get(resources::list).post(attendance::record_post),
        _ => get(resources::list),
    };

    let item: MethodRouter<AppState> = match (entity.resource, entity.deleted_column) {
        // Attendance deletes also adjust semester stats
        ("attendance", _) => get(resources::show).delete(attendance::record_delete),
        (_, Some(_)) => get(resources::show).delete(resources::delete),
        (_, None) => get(resources::show),
    };

    Router::new()
        .route(&format!("/{}", entity.resource), collection)
        .route(&format!("/{}/:id", entity.resource), item)
        .layer(Extension(entity))
}

fn cors_layer() -> CorsLayer {
    let origins = &config().security.cors_origins;
    if !crate::is_production!() && origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
