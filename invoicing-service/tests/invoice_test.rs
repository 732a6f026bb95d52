mod common;

use common::*;
use invoicing_service::dtos::invoice::{CreateInvoiceRequest, InvoiceQuery, UpdateInvoiceRequest};
use invoicing_service::models::{InvoiceKind, ProformaStatus, TermStatus};
use invoicing_service::services::{InvoiceStore, InvoicingError, WarningKind};
use invoicing_service::services::term_ledger::RawTerm;
use serde_json::json;

fn request(value: serde_json::Value) -> CreateInvoiceRequest {
    serde_json::from_value(value).expect("Invalid invoice request")
}

#[tokio::test]
async fn test_create_links_agent_and_founds_company() {
    let app = TestApp::spawn();
    let agent = app.agent("Asha", dec!(10000)).await;

    let invoice = app
        .create(inr_invoice("INV-001", Some(&agent.id), None, &["ISO 9001"], dec!(1000)))
        .await;

    let company_id = invoice.company_id.clone().expect("company id assigned");
    let company = app.service.get_company(&company_id).await.unwrap();
    assert_eq!(company.company_name, "Acme Textiles");
    assert_eq!(company.invoice_count, 1);
    assert_eq!(company.invoice_ids, vec![invoice.id.clone()]);
    assert_eq!(company.proforma_invoice_count, 0);

    let agent = app.reload_agent(&agent.id).await;
    assert_eq!(agent.invoice_count, 1);
    assert_eq!(agent.invoice_ids, vec![invoice.id.clone()]);
    assert_eq!(invoice.booked_at, at(2024, 6, 15));
    assert_eq!(invoice.pending_payment_in_inr, dec!(1180));
    assert!(!invoice.is_completed);
    app.assert_agent_consistent(&agent.id).await;
}

#[tokio::test]
async fn test_second_invoice_for_same_company_and_standard_does_not_accrue() {
    let app = TestApp::spawn();
    let agent = app.agent("Asha", dec!(0)).await;

    let first = app
        .create(inr_invoice("INV-001", Some(&agent.id), None, &["ISO 9001"], dec!(1000)))
        .await;
    let company_id = first.company_id.clone().unwrap();
    assert_eq!(app.reload_agent(&agent.id).await.target_achieved, dec!(1000));

    app.create(inr_invoice(
        "INV-002",
        Some(&agent.id),
        Some(&company_id),
        &["ISO 9001"],
        dec!(500),
    ))
    .await;

    let agent = app.reload_agent(&agent.id).await;
    assert_eq!(agent.target_achieved, dec!(1000));
    assert_eq!(agent.invoice_count, 2);
    let company = app.service.get_company(&company_id).await.unwrap();
    assert_eq!(company.invoice_count, 2);
    app.assert_agent_consistent(&agent.id).await;
}

#[tokio::test]
async fn test_foreign_invoice_accrues_in_inr() {
    let app = TestApp::spawn();
    let agent = app.agent("Ravi", dec!(50000)).await;

    let invoice = app
        .create(usd_invoice("US-001", Some(&agent.id), None, &["SOC 2"], dec!(100), dec!(83)))
        .await;

    assert_eq!(invoice.inr_closure(), dec!(8300));
    assert_eq!(invoice.pending_payment_in_inr, dec!(8300));
    let agent = app.reload_agent(&agent.id).await;
    assert_eq!(agent.target_achieved, dec!(8300));
}

#[tokio::test]
async fn test_foreign_invoice_requires_exchange_rate() {
    let app = TestApp::spawn();
    let mut body = usd_invoice("US-002", None, None, &[], dec!(100), dec!(83));
    body.as_object_mut().unwrap().remove("exchange_rate");

    let result = app.service.create_invoice(&request(body)).await;

    assert!(matches!(result, Err(InvoicingError::Validation(_))));
}

#[tokio::test]
async fn test_foreign_invoice_rejects_gst_fields() {
    let app = TestApp::spawn();
    let mut body = usd_invoice("US-003", None, None, &[], dec!(100), dec!(83));
    body["gst_number"] = json!("27AAACA1234A1Z5");

    let result = app.service.create_invoice(&request(body)).await;

    assert!(matches!(result, Err(InvoicingError::Validation(_))));
}

#[tokio::test]
async fn test_supplied_inr_amount_must_match_rate() {
    let app = TestApp::spawn();
    let mut body = usd_invoice("US-004", None, None, &[], dec!(100), dec!(83));
    body["base_closure_amount_inr"] = json!(9000.0);
    let result = app.service.create_invoice(&request(body)).await;
    assert!(matches!(result, Err(InvoicingError::Validation(_))));

    let mut body = usd_invoice("US-005", None, None, &[], dec!(100), dec!(83));
    body["base_closure_amount_inr"] = json!(8300.0);
    let created = app.service.create_invoice(&request(body)).await.unwrap();
    assert_eq!(created.data.inr_closure(), dec!(8300));
}

#[tokio::test]
async fn test_inr_invoice_requires_gst_number() {
    let app = TestApp::spawn();
    let mut body = inr_invoice("INV-010", None, None, &[], dec!(500));
    body.as_object_mut().unwrap().remove("gst_number");

    let result = app.service.create_invoice(&request(body)).await;

    assert!(matches!(result, Err(InvoicingError::Validation(_))));
}

#[tokio::test]
async fn test_duplicate_invoice_number_is_conflict() {
    let app = TestApp::spawn();
    app.create(inr_invoice("INV-001", None, None, &[], dec!(100))).await;

    let result = app
        .service
        .create_invoice(&request(inr_invoice("INV-001", None, None, &[], dec!(200))))
        .await;

    assert!(matches!(result, Err(InvoicingError::Conflict(_))));
}

#[tokio::test]
async fn test_missing_agent_is_a_warning() {
    let app = TestApp::spawn();

    let outcome = app
        .service
        .create_invoice(&request(inr_invoice(
            "INV-020",
            Some("ghost-agent"),
            None,
            &["ISO 9001"],
            dec!(1000),
        )))
        .await
        .unwrap();

    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::MissingAgent));
    let stored = app
        .service
        .get_invoice(InvoiceKind::Final, &outcome.data.id)
        .await
        .unwrap();
    assert_eq!(stored.agent_id.as_deref(), Some("ghost-agent"));
}

#[tokio::test]
async fn test_unknown_company_is_a_warning() {
    let app = TestApp::spawn();

    let outcome = app
        .service
        .create_invoice(&request(inr_invoice(
            "INV-021",
            None,
            Some("no-such-company"),
            &[],
            dec!(1000),
        )))
        .await
        .unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].kind, WarningKind::MissingCompany);
}

#[tokio::test]
async fn test_reassignment_moves_back_references() {
    let app = TestApp::spawn();
    let first = app.agent("Asha", dec!(10000)).await;
    let second = app.agent("Ravi", dec!(10000)).await;
    let invoice = app
        .create(inr_invoice("INV-030", Some(&first.id), None, &["ISO 9001"], dec!(1000)))
        .await;

    let patch = UpdateInvoiceRequest {
        agent_id: Some(second.id.clone()),
        ..Default::default()
    };
    let outcome = app
        .service
        .update_invoice(InvoiceKind::Final, &invoice.id, &patch)
        .await
        .unwrap();

    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.data.agent_id.as_deref(), Some(second.id.as_str()));

    let first = app.reload_agent(&first.id).await;
    let second = app.reload_agent(&second.id).await;
    assert_eq!(first.invoice_count, 0);
    assert!(first.invoice_ids.is_empty());
    assert_eq!(second.invoice_count, 1);
    assert_eq!(second.invoice_ids, vec![invoice.id.clone()]);
    // Achievement stays with the agent that closed the deal.
    assert_eq!(first.target_achieved, dec!(1000));
    assert_eq!(second.target_achieved, dec!(0));
    app.assert_agent_consistent(&first.id).await;
    app.assert_agent_consistent(&second.id).await;
}

#[tokio::test]
async fn test_moving_to_another_company_relinks_it() {
    let app = TestApp::spawn();
    let original = app
        .create(inr_invoice("INV-031", None, None, &["ISO 9001"], dec!(1000)))
        .await;
    let other = app
        .create(inr_invoice("INV-032", None, None, &["ISO 27001"], dec!(500)))
        .await;
    let old_company = original.company_id.clone().unwrap();
    let new_company = other.company_id.clone().unwrap();

    let patch = UpdateInvoiceRequest {
        company_id: Some(new_company.clone()),
        ..Default::default()
    };
    app.service
        .update_invoice(InvoiceKind::Final, &original.id, &patch)
        .await
        .unwrap();

    let old = app.service.get_company(&old_company).await.unwrap();
    let new = app.service.get_company(&new_company).await.unwrap();
    assert_eq!(old.invoice_count, 0);
    assert_eq!(new.invoice_count, 2);
    assert!(new.invoice_ids.contains(&original.id));
}

#[tokio::test]
async fn test_delete_detaches_and_counters_never_go_negative() {
    let app = TestApp::spawn();
    let agent = app.agent("Asha", dec!(10000)).await;
    let invoice = app
        .create(inr_invoice("INV-040", Some(&agent.id), None, &[], dec!(1000)))
        .await;
    let company_id = invoice.company_id.clone().unwrap();

    // Drop the back-reference behind the service's back.
    app.service
        .store()
        .unlink_agent_invoice(&agent.id, &invoice.id, at(2024, 6, 15))
        .await
        .unwrap();

    app.service
        .delete_invoice(InvoiceKind::Final, &invoice.id)
        .await
        .unwrap();

    let agent = app.reload_agent(&agent.id).await;
    assert_eq!(agent.invoice_count, 0);
    assert!(agent.invoice_ids.is_empty());
    let company = app.service.get_company(&company_id).await.unwrap();
    assert_eq!(company.invoice_count, 0);

    let again = app
        .service
        .delete_invoice(InvoiceKind::Final, &invoice.id)
        .await;
    assert!(matches!(again, Err(InvoicingError::NotFound(_))));
}

#[tokio::test]
async fn test_counters_match_invoices_after_mixed_writes() {
    let app = TestApp::spawn();
    let agent = app.agent("Asha", dec!(10000)).await;
    let other = app.agent("Ravi", dec!(10000)).await;

    let mut ids = Vec::new();
    for n in 0..4 {
        let invoice = app
            .create(inr_invoice(
                &format!("INV-05{}", n),
                Some(&agent.id),
                None,
                &[],
                dec!(100),
            ))
            .await;
        ids.push(invoice.id);
    }
    app.service
        .delete_invoice(InvoiceKind::Final, &ids[0])
        .await
        .unwrap();
    let patch = UpdateInvoiceRequest {
        agent_id: Some(other.id.clone()),
        ..Default::default()
    };
    app.service
        .update_invoice(InvoiceKind::Final, &ids[1], &patch)
        .await
        .unwrap();

    app.assert_agent_consistent(&agent.id).await;
    app.assert_agent_consistent(&other.id).await;
    assert_eq!(app.reload_agent(&agent.id).await.invoice_count, 2);
    assert_eq!(app.reload_agent(&other.id).await.invoice_count, 1);
}

#[tokio::test]
async fn test_related_invoices_share_company_and_standard() {
    let app = TestApp::spawn();
    let first = app
        .create(inr_invoice("INV-060", None, None, &["ISO 9001", "ISO 14001"], dec!(1000)))
        .await;
    let company_id = first.company_id.clone().unwrap();
    let sibling = app
        .create(inr_invoice("INV-061", None, Some(&company_id), &["ISO 14001"], dec!(400)))
        .await;
    app.create(inr_invoice("INV-062", None, Some(&company_id), &["SOC 2"], dec!(300)))
        .await;
    app.create(inr_invoice("INV-063", None, None, &["ISO 9001"], dec!(300)))
        .await;

    let (invoice, related) = app
        .service
        .get_invoice_with_related(InvoiceKind::Final, &first.id)
        .await
        .unwrap();

    assert_eq!(invoice.id, first.id);
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].id, sibling.id);
}

#[tokio::test]
async fn test_update_keeps_terms_unless_recompute_requested() {
    let app = TestApp::spawn();
    let invoice = app
        .create(inr_invoice("INV-070", None, None, &[], dec!(1000)))
        .await;

    let patch = UpdateInvoiceRequest {
        base_closure_amount: Some(dec!(2000)),
        ..Default::default()
    };
    let updated = app
        .service
        .update_invoice(InvoiceKind::Final, &invoice.id, &patch)
        .await
        .unwrap()
        .data;
    assert_eq!(updated.base_closure_amount, dec!(2000));
    assert_eq!(updated.terms, invoice.terms);

    let patch = UpdateInvoiceRequest {
        terms: Some(vec![RawTerm {
            term_name: Some("Revised".to_string()),
            base_amount: Some(dec!(2000)),
            ..Default::default()
        }]),
        recompute_derived: true,
        ..Default::default()
    };
    let updated = app
        .service
        .update_invoice(InvoiceKind::Final, &invoice.id, &patch)
        .await
        .unwrap()
        .data;
    assert_eq!(updated.terms.len(), 1);
    assert_eq!(updated.terms[0].gst_amount(), dec!(360));
    assert_eq!(updated.terms[0].term_total, dec!(2360));
    assert_eq!(updated.pending_payment_in_inr, dec!(2360));
}

#[tokio::test]
async fn test_terms_stored_as_given_must_be_complete() {
    let app = TestApp::spawn();
    let invoice = app
        .create(inr_invoice("INV-071", None, None, &[], dec!(1000)))
        .await;

    let incomplete = UpdateInvoiceRequest {
        terms: Some(vec![RawTerm {
            term_name: Some("Manual".to_string()),
            base_amount: Some(dec!(1000)),
            ..Default::default()
        }]),
        ..Default::default()
    };
    let result = app
        .service
        .update_invoice(InvoiceKind::Final, &invoice.id, &incomplete)
        .await;
    assert!(matches!(result, Err(InvoicingError::Validation(_))));

    let manual = UpdateInvoiceRequest {
        terms: Some(vec![RawTerm {
            term_name: Some("Manual".to_string()),
            base_amount: Some(dec!(1000)),
            gst_percentage: Some(dec!(18)),
            gst_amount: Some(dec!(175)),
            tds_amount: Some(dec!(10)),
            term_total: Some(dec!(1165)),
            ..Default::default()
        }]),
        ..Default::default()
    };
    let updated = app
        .service
        .update_invoice(InvoiceKind::Final, &invoice.id, &manual)
        .await
        .unwrap()
        .data;
    assert_eq!(updated.terms[0].gst_amount(), dec!(175));
    assert_eq!(updated.terms[0].term_total, dec!(1165));
}

#[tokio::test]
async fn test_currency_cannot_change() {
    let app = TestApp::spawn();
    let invoice = app
        .create(inr_invoice("INV-080", None, None, &[], dec!(1000)))
        .await;

    let patch: UpdateInvoiceRequest =
        serde_json::from_value(json!({ "currency": "USD", "exchange_rate": 83.0 })).unwrap();
    let result = app
        .service
        .update_invoice(InvoiceKind::Final, &invoice.id, &patch)
        .await;

    assert!(matches!(result, Err(InvoicingError::Validation(_))));
}

#[tokio::test]
async fn test_invoice_date_drives_booking_date() {
    let app = TestApp::spawn();
    let mut body = inr_invoice("INV-081", None, None, &[], dec!(1000));
    body["invoice_date"] = json!("2024-02-10T00:00:00Z");
    let invoice = app.create(body).await;
    assert_eq!(invoice.booked_at.to_rfc3339(), "2024-02-10T00:00:00+00:00");

    let patch: UpdateInvoiceRequest =
        serde_json::from_value(json!({ "invoice_date": "2024-03-05T00:00:00Z" })).unwrap();
    let updated = app
        .service
        .update_invoice(InvoiceKind::Final, &invoice.id, &patch)
        .await
        .unwrap()
        .data;
    assert_eq!(updated.booked_at.to_rfc3339(), "2024-03-05T00:00:00+00:00");
}

#[tokio::test]
async fn test_paying_every_term_completes_invoice() {
    let app = TestApp::spawn();
    let mut body = inr_invoice("INV-090", None, None, &[], dec!(2000));
    body["terms"] = json!([
        { "term_name": "Advance", "base_amount": 1000.0 },
        { "term_name": "Balance", "base_amount": 1000.0 }
    ]);
    body["total_gst_amount"] = json!(360.0);
    let invoice = app.create(body).await;
    assert_eq!(invoice.pending_payment_in_inr, dec!(2360));

    let advance = invoice.terms[0].term_id.clone();
    let balance = invoice.terms[1].term_id.clone();

    let after_first = app
        .service
        .update_term_status(&invoice.id, &advance, TermStatus::Paid)
        .await
        .unwrap();
    assert_eq!(after_first.pending_payment_in_inr, dec!(1180));
    assert!(!after_first.is_completed);

    let pending = app.service.pending_terms(&invoice.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].term_id, balance);

    let done = app
        .service
        .update_term_status(&invoice.id, &balance, TermStatus::Paid)
        .await
        .unwrap();
    assert_eq!(done.pending_payment_in_inr, dec!(0));
    assert!(done.is_completed);

    let reopened = app
        .service
        .update_term_status(&invoice.id, &balance, TermStatus::Pending)
        .await
        .unwrap();
    assert!(!reopened.is_completed);
    assert_eq!(reopened.pending_payment_in_inr, dec!(1180));
}

#[tokio::test]
async fn test_unknown_term_is_not_found() {
    let app = TestApp::spawn();
    let invoice = app
        .create(inr_invoice("INV-091", None, None, &[], dec!(1000)))
        .await;

    let result = app
        .service
        .update_term_status(&invoice.id, "missing-term", TermStatus::Paid)
        .await;

    assert!(matches!(result, Err(InvoicingError::NotFound(_))));
}

#[tokio::test]
async fn test_proforma_lifecycle_tracks_company_counters_only() {
    let app = TestApp::spawn();
    let agent = app.agent("Asha", dec!(10000)).await;

    let proforma = app
        .service
        .create_proforma(&request(inr_invoice(
            "PI-001",
            Some(&agent.id),
            None,
            &["ISO 9001"],
            dec!(1000),
        )))
        .await
        .unwrap()
        .data;
    assert_eq!(proforma.kind, InvoiceKind::Proforma);
    assert_eq!(proforma.proforma_status, Some(ProformaStatus::Active));

    let company_id = proforma.company_id.clone().unwrap();
    let company = app.service.get_company(&company_id).await.unwrap();
    assert_eq!(company.proforma_invoice_count, 1);
    assert_eq!(company.invoice_count, 0);

    let agent_after = app.reload_agent(&agent.id).await;
    assert_eq!(agent_after.invoice_count, 0);
    assert_eq!(agent_after.target_achieved, dec!(0));

    let closed = app
        .service
        .set_proforma_status(&proforma.id, ProformaStatus::Close)
        .await
        .unwrap();
    assert_eq!(closed.proforma_status, Some(ProformaStatus::Close));

    let as_final = app
        .service
        .get_invoice(InvoiceKind::Final, &proforma.id)
        .await;
    assert!(matches!(as_final, Err(InvoicingError::NotFound(_))));

    app.service
        .delete_invoice(InvoiceKind::Proforma, &proforma.id)
        .await
        .unwrap();
    let company = app.service.get_company(&company_id).await.unwrap();
    assert_eq!(company.proforma_invoice_count, 0);
    assert!(company.proforma_invoice_ids.is_empty());
}

#[tokio::test]
async fn test_proforma_status_rejected_on_final_invoice() {
    let app = TestApp::spawn();
    let mut body = inr_invoice("INV-100", None, None, &[], dec!(1000));
    body["proforma_status"] = json!("Lost");

    let result = app.service.create_invoice(&request(body)).await;

    assert!(matches!(result, Err(InvoicingError::Validation(_))));
}

#[tokio::test]
async fn test_filter_by_status_search_and_dates() {
    let app = TestApp::spawn();
    let agent = app.agent("Meera Iyer", dec!(10000)).await;

    let mut paid = inr_invoice("INV-110", None, None, &["ISO 9001"], dec!(1000));
    paid["invoice_date"] = json!("2024-01-10T00:00:00Z");
    let paid = app.create(paid).await;
    app.service
        .update_term_status(&paid.id, &paid.terms[0].term_id, TermStatus::Paid)
        .await
        .unwrap();

    let mut open = inr_invoice("INV-111", Some(&agent.id), None, &["SOC 2"], dec!(500));
    open["invoice_date"] = json!("2024-04-10T00:00:00Z");
    let open = app.create(open).await;

    let completed = app
        .service
        .filter_invoices(
            InvoiceKind::Final,
            &InvoiceQuery {
                status: Some("completed".to_string()),
                limit: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.total, 1);
    assert_eq!(completed.items[0].id, paid.id);

    let by_agent_name = app
        .service
        .filter_invoices(
            InvoiceKind::Final,
            &InvoiceQuery {
                search: Some("meera".to_string()),
                limit: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_agent_name.total, 1);
    assert_eq!(by_agent_name.items[0].id, open.id);

    let by_standard = app
        .service
        .filter_invoices(
            InvoiceKind::Final,
            &InvoiceQuery {
                search: Some("iso".to_string()),
                limit: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_standard.total, 1);
    assert_eq!(by_standard.items[0].id, paid.id);

    let first_quarter = app
        .service
        .filter_invoices(
            InvoiceKind::Final,
            &InvoiceQuery {
                from: Some(at(2024, 1, 1)),
                to: Some(at(2024, 4, 1)),
                limit: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first_quarter.total, 1);
    assert_eq!(first_quarter.items[0].id, paid.id);

    let backwards = app
        .service
        .filter_invoices(
            InvoiceKind::Final,
            &InvoiceQuery {
                from: Some(at(2024, 4, 1)),
                to: Some(at(2024, 1, 1)),
                limit: 50,
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(backwards, Err(InvoicingError::Validation(_))));
}

#[tokio::test]
async fn test_listing_pages_report_full_total() {
    let app = TestApp::spawn();
    for n in 0..5 {
        app.create(inr_invoice(&format!("INV-12{}", n), None, None, &[], dec!(100)))
            .await;
    }

    let page = app
        .service
        .filter_invoices(
            InvoiceKind::Final,
            &InvoiceQuery {
                limit: 2,
                offset: 4,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_attachments_stored_verbatim() {
    let app = TestApp::spawn();
    let mut body = inr_invoice("INV-001", None, None, &[], dec!(100));
    body["attachments"] = json!([
        { "file_name": "po.pdf", "file_url": "https://files.test/po.pdf", "file_type": "application/pdf" }
    ]);

    let invoice = app.create(body).await;
    let stored = app
        .service
        .get_invoice(InvoiceKind::Final, &invoice.id)
        .await
        .unwrap();

    assert_eq!(stored.attachments.len(), 1);
    assert_eq!(stored.attachments[0].file_name, "po.pdf");
    assert_eq!(stored.attachments[0].file_url, "https://files.test/po.pdf");
    assert_eq!(stored.attachments[0].file_type, "application/pdf");
}
