mod common;

use axum::http::StatusCode;
use common::*;
use invoicing_service::dtos::certification::{
    CreateCertificationRequest, UpdateCertificationRequest,
};
use invoicing_service::models::Certification;
use invoicing_service::services::{InvoicingError, Page, WarningKind};
use serde_json::json;

fn certification(company_name: &str, agent_id: Option<&str>) -> CreateCertificationRequest {
    serde_json::from_value(json!({
        "company_name": company_name,
        "client_name": "R. Iyer",
        "email": "QA@Acme.test",
        "standard": "ISO 9001",
        "agent_id": agent_id,
        "registered_at": "2024-01-10T00:00:00Z",
        "expires_at": "2027-01-09T00:00:00Z"
    }))
    .expect("Invalid certification request")
}

#[tokio::test]
async fn test_certification_is_linked_to_its_agent() {
    let app = TestApp::spawn();
    let agent = app.agent("Asha", dec!(10000)).await;

    let outcome = app
        .service
        .create_certification(&certification("Acme Textiles", Some(&agent.id)))
        .await
        .unwrap();

    assert!(outcome.warnings.is_empty());
    let created = outcome.data;
    assert_eq!(created.status, Certification::DEFAULT_STATUS);
    assert_eq!(created.contact.email, "qa@acme.test");
    assert!(!created.is_expired(at(2024, 6, 15)));

    let agent = app.reload_agent(&agent.id).await;
    assert_eq!(agent.certification_count, 1);
    assert_eq!(agent.certification_ids, vec![created.id.clone()]);
    // Certifications do not count as invoices.
    assert_eq!(agent.invoice_count, 0);
}

#[tokio::test]
async fn test_unknown_agent_is_a_warning() {
    let app = TestApp::spawn();

    let outcome = app
        .service
        .create_certification(&certification("Acme Textiles", Some("ghost")))
        .await
        .unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].kind, WarningKind::MissingAgent);
    assert!(app.service.get_certification(&outcome.data.id).await.is_ok());
}

#[tokio::test]
async fn test_reassignment_moves_the_back_reference() {
    let app = TestApp::spawn();
    let first = app.agent("Asha", dec!(10000)).await;
    let second = app.agent("Ravi", dec!(10000)).await;
    let created = app
        .service
        .create_certification(&certification("Acme Textiles", Some(&first.id)))
        .await
        .unwrap()
        .data;

    let patch = UpdateCertificationRequest {
        agent_id: Some(second.id.clone()),
        scope_of_work: Some("Design and manufacture of yarn".to_string()),
        ..Default::default()
    };
    let updated = app
        .service
        .update_certification(&created.id, &patch)
        .await
        .unwrap()
        .data;

    assert_eq!(updated.agent_id.as_deref(), Some(second.id.as_str()));
    assert_eq!(updated.client_name, created.client_name);
    assert_eq!(app.reload_agent(&first.id).await.certification_count, 0);
    assert_eq!(
        app.reload_agent(&second.id).await.certification_ids,
        vec![created.id.clone()]
    );

    app.service.delete_certification(&created.id).await.unwrap();
    assert_eq!(app.reload_agent(&second.id).await.certification_count, 0);
    assert!(matches!(
        app.service.get_certification(&created.id).await,
        Err(InvoicingError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_listing_filters_by_agent() {
    let app = TestApp::spawn();
    let agent = app.agent("Asha", dec!(10000)).await;
    app.service
        .create_certification(&certification("Acme Textiles", Some(&agent.id)))
        .await
        .unwrap();
    app.service
        .create_certification(&certification("Globex", None))
        .await
        .unwrap();

    let mine = app
        .service
        .list_certifications(Some(&agent.id), Page::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    assert_eq!(mine.items[0].company_name, "Acme Textiles");

    let all = app
        .service
        .list_certifications(None, Page::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
}

#[tokio::test]
async fn test_certification_routes() {
    let app = TestApp::spawn();

    let (status, body) = app
        .send(
            "POST",
            "/api/certifications",
            Some(json!({
                "company_name": "Acme Textiles",
                "email": "qa@acme.test",
                "registered_at": "2024-05-01T00:00:00Z",
                "expires_at": "2024-04-01T00:00:00Z"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = app
        .send(
            "POST",
            "/api/certifications",
            Some(json!({ "company_name": "Acme Textiles", "email": "not-an-email" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");

    let (status, created) = app
        .send(
            "POST",
            "/api/certifications",
            Some(json!({ "company_name": "Acme Textiles", "email": "qa@acme.test" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, updated) = app
        .send(
            "PATCH",
            &format!("/api/certifications/{}", id),
            Some(json!({ "status": "Suspended" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["status"], "Suspended");

    let (status, listing) = app.send("GET", "/api/certifications", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 1);

    let (status, _) = app
        .send("DELETE", &format!("/api/certifications/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send("GET", &format!("/api/certifications/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
