use super::common::*;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::workflows::invoicing::invoicing_router;

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn invoice_body(customer_id: &str) -> Value {
    json!({
        "customerId": customer_id,
        "issueDate": "2026-03-01",
        "dueDate": "2026-03-31",
        "items": [{ "description": "Consulting", "quantity": 2, "rate": 50 }],
        "tax": 10,
        "discount": 5,
    })
}

#[tokio::test]
async fn billing_flow_over_http() {
    let (service, _, notifier) = build_service();
    let router = invoicing_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/customers",
            json!({ "name": "Acme Corp", "email": "billing@acme.test" }),
        ))
        .await
        .expect("create customer executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    let customer_id = payload["customer"]["id"]
        .as_str()
        .expect("customer id")
        .to_string();

    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/invoices", invoice_body(&customer_id)))
        .await
        .expect("create invoice executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    let invoice = &payload["invoice"];
    assert_eq!(invoice["number"], "INV-0001");
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["items"][0]["amount"], 100.0);
    assert_eq!(
        invoice["totals"],
        json!({ "subtotal": 100.0, "discountAmount": 5.0, "taxAmount": 9.5, "total": 104.5 })
    );
    assert_eq!(invoice["balanceDue"], 104.5);
    let invoice_id = invoice["id"].as_str().expect("invoice id").to_string();

    let response = router
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/api/invoices/{invoice_id}/send"),
        ))
        .await
        .expect("send executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["invoice"]["status"], "sent");

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/payments",
            json!({
                "invoiceId": invoice_id,
                "amount": 104.5,
                "paidOn": "2026-03-20",
                "method": "card",
            }),
        ))
        .await
        .expect("payment executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["invoice"]["status"], "paid");
    assert_eq!(payload["invoice"]["overdue"], false);
    assert_eq!(payload["payment"]["method"], "card");

    let response = router
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/api/invoices/{invoice_id}/payments"),
        ))
        .await
        .expect("list payments executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["payments"].as_array().map(Vec::len), Some(1));

    let response = router
        .oneshot(empty_request(
            "DELETE",
            &format!("/api/customers/{customer_id}"),
        ))
        .await
        .expect("delete customer executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(notifier.events().len(), 2);
}

#[tokio::test]
async fn invalid_payloads_are_bad_requests() {
    let (service, _, _) = build_service();
    let (customer, invoice) = billed_customer(&service);
    let router = invoicing_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/customers",
            json!({ "name": "No Email", "email": "nobody" }),
        ))
        .await
        .expect("create customer executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = invoice_body(&customer.id.0);
    body["items"] = json!([]);
    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/invoices", body))
        .await
        .expect("create invoice executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "an invoice needs at least one line item");

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/payments",
            json!({
                "invoiceId": invoice.id.0,
                "amount": 500,
                "paidOn": "2026-03-20",
                "method": "cash",
            }),
        ))
        .await
        .expect("payment executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_records_return_not_found() {
    let (service, _, _) = build_service();
    let router = invoicing_router(Arc::new(service));

    for (method, uri) in [
        ("GET", "/api/customers/cus-missing"),
        ("GET", "/api/invoices/inv-missing"),
        ("DELETE", "/api/invoices/inv-missing"),
        ("GET", "/api/invoices/inv-missing/payments"),
        ("DELETE", "/api/payments/pay-missing"),
    ] {
        let response = router
            .clone()
            .oneshot(empty_request(method, uri))
            .await
            .expect("lookup executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
    }
}

#[tokio::test]
async fn invoices_can_be_filtered_by_customer() {
    let (service, _, _) = build_service();
    let (customer, _) = billed_customer(&service);
    let other = service
        .create_customer(customer_draft("Globex", "ap@globex.test"))
        .expect("customer created");
    service
        .create_invoice(invoice_draft(&other.id))
        .expect("invoice created");
    let router = invoicing_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/api/invoices?customerId={}", customer.id.0),
        ))
        .await
        .expect("list executes");
    let payload = read_json_body(response).await;
    let invoices = payload["invoices"].as_array().expect("invoice list");
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["customerId"], customer.id.0.as_str());

    let response = router
        .oneshot(empty_request("GET", "/api/invoices"))
        .await
        .expect("list executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["invoices"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn export_streams_csv_with_attachment_headers() {
    let (service, _, _) = build_service();
    billed_customer(&service);
    let router = invoicing_router(Arc::new(service));

    let response = router
        .oneshot(empty_request("GET", "/api/invoices/export"))
        .await
        .expect("export executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"invoices.csv\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8 csv");
    assert!(text.contains("INV-0001,Acme Corp"));
}

#[tokio::test]
async fn updating_a_paid_invoice_conflicts() {
    let (service, _, _) = build_service();
    let (customer, invoice) = billed_customer(&service);
    service
        .record_payment(payment(&invoice.id, 10.0))
        .expect("payment recorded");
    let router = invoicing_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "PUT",
            &format!("/api/invoices/{}", invoice.id.0),
            invoice_body(&customer.id.0),
        ))
        .await
        .expect("update executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["error"],
        "invoice has recorded payments and can no longer be edited"
    );
}

#[tokio::test]
async fn malformed_json_is_reported_in_the_error_body() {
    let (service, _, _) = build_service();
    let router = invoicing_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post("/api/payments")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"invoiceId\": "))
                .expect("request builds"),
        )
        .await
        .expect("payment executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"].is_string());
}

#[tokio::test]
async fn paying_a_zero_total_invoice_conflicts() {
    let (service, _, _) = build_service();
    let customer = service
        .create_customer(customer_draft("Acme", "billing@acme.test"))
        .expect("customer created");
    let mut draft = invoice_draft(&customer.id);
    draft.items[0].rate = 0.0;
    let invoice = service.create_invoice(draft).expect("invoice created");
    let router = invoicing_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/payments",
            json!({
                "invoiceId": invoice.id.0,
                "amount": 5,
                "paidOn": "2026-03-20",
                "method": "cash",
            }),
        ))
        .await
        .expect("payment executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "invoice has no balance to collect");
}
