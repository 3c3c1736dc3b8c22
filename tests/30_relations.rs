mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{data_len, token_for, TestServer};
use madrasa_api::tenancy::Role;

/// Three sections with four students each
async fn seed_roster(server: &TestServer, tenant: Uuid) -> Vec<Uuid> {
    let mut sections = Vec::new();
    for name in ["7A", "7B", "8A"] {
        let section = server.seed("class_sections", tenant, json!({"name": name, "grade": &name[..1]})).await;
        for i in 0..4 {
            server
                .seed(
                    "students",
                    tenant,
                    json!({"full_name": format!("{} student {}", name, i), "status": "active",
                           "class_section_id": section.to_string()}),
                )
                .await;
        }
        sections.push(section);
    }
    sections
}

#[tokio::test]
async fn include_collects_related_rows_once() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Teacher);
    seed_roster(&server, tenant).await;

    let (status, body) = server.get("/api/v1/students?per_page=all&include=class_section", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(data_len(&body), 12);

    let sections = body["include"]["class_sections"].as_array().cloned().unwrap_or_default();
    assert_eq!(sections.len(), 3, "{}", body["include"]);
    // include alone leaves the items untouched
    assert!(body["data"].as_array().into_iter().flatten().all(|s| s.get("class_section").is_none()));
    Ok(())
}

#[tokio::test]
async fn nested_embeds_without_include_block() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Teacher);
    seed_roster(&server, tenant).await;

    let (_, body) = server.get("/api/v1/students?per_page=all&nested=section", Some(&token)).await?;
    assert!(body.get("include").is_none(), "{}", body);
    for student in body["data"].as_array().into_iter().flatten() {
        assert_eq!(student["class_section"]["id"], student["class_section_id"]);
    }

    let (_, body) = server
        .get("/api/v1/students?per_page=all&nested=section&include=section", Some(&token))
        .await?;
    assert_eq!(body["include"]["class_sections"].as_array().map(Vec::len), Some(3));
    assert!(body["data"][0]["class_section"].is_object());
    Ok(())
}

#[tokio::test]
async fn relations_cost_one_query_each() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Teacher);
    seed_roster(&server, tenant).await;

    server.store.reset_queries().await;
    let (status, _) = server
        .get("/api/v1/students?per_page=all&include=class_section&nested=class_section", Some(&token))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let queries = server.store.queries().await;
    let section_queries = queries.iter().filter(|q| q.contains("FROM \"class_sections\"")).count();
    assert_eq!(section_queries, 1, "{:#?}", queries);
    // count + page + one relation batch
    assert_eq!(queries.len(), 3, "{:#?}", queries);
    Ok(())
}

#[tokio::test]
async fn unknown_relations_are_ignored() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Teacher);
    seed_roster(&server, tenant).await;

    let (status, body) = server.get("/api/v1/students?include=passwords,fee_rule", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("include").is_none(), "{}", body);
    Ok(())
}

#[tokio::test]
async fn related_rows_stay_inside_the_tenant() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (tenant, other) = (Uuid::new_v4(), Uuid::new_v4());
    let token = token_for(tenant, Role::Teacher);

    // A student pointing at another tenant's section gets nothing back for it
    let foreign_section = server.seed("class_sections", other, json!({"name": "X"})).await;
    server
        .seed(
            "students",
            tenant,
            json!({"full_name": "Umar", "status": "active", "class_section_id": foreign_section.to_string()}),
        )
        .await;

    let (_, body) = server.get("/api/v1/students?include=section", Some(&token)).await?;
    let included = body["include"]["class_sections"].as_array().map(Vec::len).unwrap_or(0);
    assert_eq!(included, 0, "{}", body);
    Ok(())
}
