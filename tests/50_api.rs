mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use field_vault::crypto::FieldCipher;
use field_vault::database::RecordStore;
use field_vault::handlers::{app, AppState};

fn router(vault: &common::TestVault, max_page_size: usize) -> Router {
    app(AppState::new(vault.service.clone(), max_page_size))
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, json))
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    let vault = common::vault();
    let (status, body) = send(&router(&vault, 10), "GET", "/health", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("ok"));
    Ok(())
}

#[tokio::test]
async fn create_then_show_returns_raw_and_decrypted() -> Result<()> {
    let vault = common::vault();
    let router = router(&vault, 10);

    let (status, body) = send(
        &router,
        "POST",
        "/api/data/user_profile",
        Some(json!({"phone_number": "+1-555-123-4567", "headline": "Backend developer"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], json!(true));

    let data = &body["data"];
    let raw = data["phone_number"].as_str().expect("raw phone");
    assert!(vault.cipher.looks_encrypted(raw));
    assert_eq!(data["decrypted"]["phone_number"], json!("+1-555-123-4567"));
    assert_eq!(data["headline"], json!("Backend developer"));

    let id = data["id"].as_str().expect("id");
    let (status, shown) = send(&router, "GET", &format!("/api/data/user_profile/{}", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["data"]["phone_number"], json!(raw));
    assert_eq!(shown["data"]["decrypted"]["phone_number"], json!("+1-555-123-4567"));
    Ok(())
}

#[tokio::test]
async fn put_reencrypts_only_the_written_field() -> Result<()> {
    let vault = common::vault();
    let router = router(&vault, 10);

    let (_, created) = send(
        &router,
        "POST",
        "/api/data/user",
        Some(json!({"first_name": "Jane", "last_name": "Doe"})),
    )
    .await?;
    let id = created["data"]["id"].as_str().expect("id").to_string();
    let last_name_payload = created["data"]["last_name"].clone();

    let (status, updated) = send(
        &router,
        "PUT",
        &format!("/api/data/user/{}", id),
        Some(json!({"first_name": "Janet"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["data"]["decrypted"]["first_name"], json!("Janet"));
    assert_eq!(updated["data"]["decrypted"]["last_name"], json!("Doe"));
    assert_eq!(updated["data"]["last_name"], last_name_payload);

    let stored = vault
        .store
        .get("user", id.parse()?)
        .await?
        .expect("row");
    assert_eq!(vault.cipher.decrypt(stored["first_name"].as_str().expect("text"))?, "Janet");
    Ok(())
}

#[tokio::test]
async fn list_pages_by_cursor() -> Result<()> {
    let vault = common::vault();
    let router = router(&vault, 2);

    for n in 0..3 {
        let (status, _) = send(
            &router,
            "POST",
            "/api/data/user_profile",
            Some(json!({"bio": format!("bio {}", n)})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, first) = send(&router, "GET", "/api/data/user_profile?limit=50", None).await?;
    assert_eq!(status, StatusCode::OK);
    let records = first["data"]["records"].as_array().expect("records");
    assert_eq!(records.len(), 2, "limit is capped by max page size");
    assert!(records.iter().all(|r| r["decrypted"]["bio"].as_str().is_some_and(|b| b.starts_with("bio "))));

    let cursor = first["data"]["next_cursor"].as_str().expect("cursor");
    let (_, second) = send(
        &router,
        "GET",
        &format!("/api/data/user_profile?after={}", cursor),
        None,
    )
    .await?;
    assert_eq!(second["data"]["records"].as_array().map(Vec::len), Some(1));
    assert_eq!(second["data"]["next_cursor"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn unknown_record_type_is_not_found() -> Result<()> {
    let vault = common::vault();
    let (status, body) = send(&router(&vault, 10), "GET", "/api/data/jobs", None).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    Ok(())
}

#[tokio::test]
async fn missing_record_is_not_found() -> Result<()> {
    let vault = common::vault();
    let uri = format!("/api/data/user/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&router(&vault, 10), "GET", &uri, None).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    Ok(())
}

#[tokio::test]
async fn system_fields_are_rejected() -> Result<()> {
    let vault = common::vault();
    let (status, body) = send(
        &router(&vault, 10),
        "POST",
        "/api/data/user",
        Some(json!({"id": "abc", "first_name": "Jane"})),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(vault.store.is_empty("user").await);
    Ok(())
}

#[tokio::test]
async fn non_text_sensitive_field_is_a_validation_error() -> Result<()> {
    let vault = common::vault();
    let (status, body) = send(
        &router(&vault, 10),
        "POST",
        "/api/data/user_profile",
        Some(json!({"phone_number": 5551234567u64})),
    )
    .await?;

    assert_eq!(status.as_u16(), 400, "{}", body);
    assert_eq!(body["success"], json!(false));
    assert_eq!(vault.cipher.encrypts(), 0);
    Ok(())
}
