mod common;

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{data_len, token_for, token_with, TestServer};
use madrasa_api::tenancy::Role;

async fn seed_fee_rules(server: &TestServer, tenant: Uuid, count: usize) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for i in 0..count {
        let id = server
            .seed(
                "fee_rules",
                tenant,
                json!({
                    "name": format!("Rule {:02}", i),
                    "option_code": format!("R{:02}", i),
                    "amount_idr": ((i * 7) % count) as i64 * 1000,
                    "status": if i % 2 == 0 { "active" } else { "inactive" },
                }),
            )
            .await;
        ids.push(id);
    }
    ids
}

#[tokio::test]
async fn pages_cover_every_row_once() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Member);
    let seeded: HashSet<String> = seed_fee_rules(&server, tenant, 25).await.iter().map(Uuid::to_string).collect();

    let mut seen = HashSet::new();
    for (page, expected) in [(1, 10), (2, 10), (3, 5)] {
        let (status, body) = server.get(&format!("/api/v1/fee-rules?page={}&per_page=10", page), Some(&token)).await?;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(data_len(&body), expected);
        assert_eq!(body["pagination"]["total"], 25);
        assert_eq!(body["pagination"]["page"], page);
        assert_eq!(body["pagination"]["per_page"], 10);
        assert_eq!(body["pagination"]["total_pages"], 3);
        for row in body["data"].as_array().into_iter().flatten() {
            assert!(seen.insert(row["id"].as_str().unwrap_or_default().to_string()));
        }
    }
    assert_eq!(seen, seeded);

    let (_, body) = server.get("/api/v1/fee-rules?page=4&per_page=10", Some(&token)).await?;
    assert_eq!(data_len(&body), 0);
    assert_eq!(body["pagination"]["total"], 25);
    Ok(())
}

#[tokio::test]
async fn per_page_all_returns_everything() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Member);
    seed_fee_rules(&server, tenant, 25).await;

    let (status, body) = server.get("/api/v1/fee-rules?per_page=ALL", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data_len(&body), 25);
    assert_eq!(body["pagination"]["per_page"], 25);
    assert_eq!(body["pagination"]["total_pages"], 1);

    // Garbage paging falls back to defaults instead of failing
    let (status, body) = server.get("/api/v1/fee-rules?page=abc&per_page=-3", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], 1);
    Ok(())
}

#[tokio::test]
async fn sorts_by_whitelisted_key() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Member);
    seed_fee_rules(&server, tenant, 9).await;

    let amounts = |body: &serde_json::Value| -> Vec<i64> {
        body["data"].as_array().into_iter().flatten().filter_map(|r| r["amount_idr"].as_i64()).collect()
    };

    let (_, body) = server.get("/api/v1/fee-rules?sort_by=amount&order=asc", Some(&token)).await?;
    let asc = amounts(&body);
    assert_eq!(asc.len(), 9);
    assert!(asc.windows(2).all(|w| w[0] <= w[1]), "{:?}", asc);

    let (_, body) = server.get("/api/v1/fee-rules?sort_by=amount&order=desc", Some(&token)).await?;
    let desc = amounts(&body);
    assert!(desc.windows(2).all(|w| w[0] >= w[1]), "{:?}", desc);

    // Unknown keys fall back to the default ordering
    let (status, body) = server.get("/api/v1/fee-rules?sort_by=password;drop", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data_len(&body), 9);
    Ok(())
}

#[tokio::test]
async fn strict_sort_rejects_unknown_key() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Teacher);

    let (status, _) = server.get("/api/v1/semester-stats?sort_by=nope", Some(&token)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn filters_and_search_narrow_results() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Member);
    seed_fee_rules(&server, tenant, 10).await;

    let (_, body) = server.get("/api/v1/fee-rules?status=active&per_page=all", Some(&token)).await?;
    assert_eq!(data_len(&body), 5);
    assert!(body["data"].as_array().into_iter().flatten().all(|r| r["status"] == "active"));

    let (_, body) = server.get("/api/v1/fee-rules?q=rule%2003", Some(&token)).await?;
    assert_eq!(data_len(&body), 1);
    assert_eq!(body["data"][0]["option_code"], "R03");

    // Empty values are ignored, unknown params are ignored
    let (_, body) = server.get("/api/v1/fee-rules?status=&colour=red&per_page=all", Some(&token)).await?;
    assert_eq!(data_len(&body), 10);

    let (status, _) = server.get("/api/v1/fee-rules?term_id=not-a-uuid", Some(&token)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn tenants_never_see_each_other() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (tenant_a, tenant_b) = (Uuid::new_v4(), Uuid::new_v4());
    seed_fee_rules(&server, tenant_a, 3).await;
    let foreign = seed_fee_rules(&server, tenant_b, 4).await;

    let token_a = token_for(tenant_a, Role::Member);
    let (_, body) = server.get("/api/v1/fee-rules", Some(&token_a)).await?;
    assert_eq!(body["pagination"]["total"], 3);
    assert!(body["data"].as_array().into_iter().flatten().all(|r| r["tenant_id"] == tenant_a.to_string()));

    let (status, _) = server.get(&format!("/api/v1/fee-rules/{}", foreign[0]), Some(&token_a)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn path_tenant_is_used_when_token_is_ambiguous() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (tenant_a, tenant_b, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    seed_fee_rules(&server, tenant_a, 2).await;
    seed_fee_rules(&server, tenant_b, 5).await;
    seed_fee_rules(&server, stranger, 1).await;

    let token = token_with(HashMap::from([(tenant_a, Role::Admin), (tenant_b, Role::Member)]), None);

    // Two memberships and no active tenant: no tenant context without the path
    let (status, _) = server.get("/api/v1/fee-rules", Some(&token)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.get(&format!("/api/v1/tenants/{}/fee-rules", tenant_b), Some(&token)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["pagination"]["total"], 5);

    let (status, _) = server.get(&format!("/api/v1/tenants/{}/fee-rules", stranger), Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server.get("/api/v1/tenants/not-a-uuid/fee-rules", Some(&token)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn role_gates_restricted_resources() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    server.seed("students", tenant, json!({"full_name": "Aisyah", "status": "active"})).await;

    let (status, body) = server.get("/api/v1/students", Some(&token_for(tenant, Role::Member))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, body) = server.get("/api/v1/students", Some(&token_for(tenant, Role::Teacher))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data_len(&body), 1);
    Ok(())
}

#[tokio::test]
async fn term_id_takes_precedence_over_year_and_month() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Teacher);
    let (term_1, term_2) = (Uuid::new_v4(), Uuid::new_v4());
    let rule = Uuid::new_v4();

    for (term, year, month) in [(term_1, 2024, 3), (term_2, 2024, 3), (term_1, 2024, 4), (term_2, 2025, 1)] {
        server
            .seed(
                "bill_batches",
                tenant,
                json!({"term_id": term.to_string(), "fee_rule_id": rule.to_string(), "year": year, "month": month,
                       "title": "SPP", "class_sections_snapshot": "[]"}),
            )
            .await;
    }

    let (_, body) = server
        .get(&format!("/api/v1/bill-batches?term_id={}&year=2025&month=1", term_1), Some(&token))
        .await?;
    assert_eq!(body["pagination"]["total"], 2);
    assert!(body["data"].as_array().into_iter().flatten().all(|r| r["term_id"] == term_1.to_string()));

    let (_, body) = server.get("/api/v1/bill-batches?year=2024&month=3", Some(&token)).await?;
    assert_eq!(body["pagination"]["total"], 2);

    let (_, body) = server.get("/api/v1/bill-batches?year=2024", Some(&token)).await?;
    assert_eq!(body["pagination"]["total"], 3);

    // Unparseable period values are ignored
    let (status, body) = server.get("/api/v1/bill-batches?year=soon&month=13", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 4);
    Ok(())
}

#[tokio::test]
async fn repeated_reads_are_identical() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let token = token_for(tenant, Role::Member);
    seed_fee_rules(&server, tenant, 12).await;

    let path = "/api/v1/fee-rules?sort_by=amount&order=asc&page=2&per_page=5";
    let (_, first) = server.get(path, Some(&token)).await?;
    let (_, second) = server.get(path, Some(&token)).await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn show_and_soft_delete() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant = Uuid::new_v4();
    let ids = seed_fee_rules(&server, tenant, 2).await;
    let member = token_for(tenant, Role::Member);
    let admin = token_for(tenant, Role::Admin);

    let (status, body) = server.get(&format!("/api/v1/fee-rules/{}", ids[0]), Some(&member)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], ids[0].to_string());

    let (status, _) = server.get("/api/v1/fee-rules/12345", Some(&member)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.delete(&format!("/api/v1/fee-rules/{}", ids[0]), &member).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = server.delete(&format!("/api/v1/fee-rules/{}", ids[0]), &admin).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["id"], ids[0].to_string());

    let (status, _) = server.delete(&format!("/api/v1/fee-rules/{}", ids[0]), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.get(&format!("/api/v1/fee-rules/{}", ids[0]), Some(&member)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = server.get("/api/v1/fee-rules", Some(&member)).await?;
    assert_eq!(body["pagination"]["total"], 1);

    // The row is kept, only marked deleted
    let rows = server.store.rows("fee_rules").await;
    assert_eq!(rows.len(), 2);
    Ok(())
}
