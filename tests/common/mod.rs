#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use madrasa_api::auth::{generate_jwt, Claims};
use madrasa_api::database::MemoryStore;
use madrasa_api::tenancy::Role;
use madrasa_api::AppState;

/// An in-process server backed by a fresh memory store
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("madrasa_api=debug")
            .with_test_writer()
            .try_init();

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let store = Arc::new(MemoryStore::new());
        let app = madrasa_api::app(AppState::new(store.clone()));
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("test server stopped: {}", e);
            }
        });

        let server = Self { base_url, store, client: reqwest::Client::new() };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with a bearer token, returning status and parsed body
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        Ok((status, resp.json::<Value>().await?))
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        let resp = self.client.post(self.url(path)).bearer_auth(token).json(&body).send().await?;
        let status = resp.status();
        Ok((status, resp.json::<Value>().await?))
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        let resp = self.client.delete(self.url(path)).bearer_auth(token).send().await?;
        let status = resp.status();
        Ok((status, resp.json::<Value>().await?))
    }

    /// Insert a live row for a tenant and return its id
    pub async fn seed(&self, table: &str, tenant: Uuid, fields: Value) -> Uuid {
        let id = Uuid::new_v4();
        let mut row = json!({
            "id": id.to_string(),
            "tenant_id": tenant.to_string(),
            "deleted_at": null,
        });
        if let (Some(row), Value::Object(extra)) = (row.as_object_mut(), fields) {
            row.extend(extra);
        }
        self.store.seed(table, row).await;
        id
    }
}

/// Token for a caller holding one role in one tenant
pub fn token_for(tenant: Uuid, role: Role) -> String {
    token_with(HashMap::from([(tenant, role)]), None)
}

pub fn token_with(tenants: HashMap<Uuid, Role>, active: Option<Uuid>) -> String {
    let claims = Claims::new(Uuid::new_v4(), tenants, active);
    generate_jwt(&claims).expect("token generation")
}

pub fn data_len(body: &Value) -> usize {
    body["data"].as_array().map(Vec::len).unwrap_or(0)
}
