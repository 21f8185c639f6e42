//! The service client against an in-process stand-in for the reviewing service.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use nyaya_core::{AnalysisRecord, CaseRecord, Verdict, VerdictLabel};
use nyaya_service::{
    CrossExamination, SampleKind, ServiceClient, ServiceConfig, ServiceError, Speaker,
    BENCH_IN_RECESS,
};
use serde_json::{json, Value};

fn case_json(tender_id: &str, bids: Value) -> Value {
    json!({
        "tender_id": tender_id,
        "title": "Annual Maintenance Contract for Office Equipment",
        "department": "Ministry of Finance",
        "estimated_value": 1500000,
        "procurement_method": "limited_tender",
        "publication_date": "2024-02-01",
        "bid_opening_date": "2024-02-20",
        "bids": bids,
        "selected_vendor": "ServicePro Systems",
        "selection_reason": "L1 Bidder and MSME",
        "documents_available": ["Tender Notice"]
    })
}

fn one_bid() -> Value {
    json!([{"vendor_name": "ServicePro Systems", "bid_amount": 1400000, "is_msme": true}])
}

async fn parse_tender(Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default();
    Json(case_json(text, one_bid()))
}

async fn ask_bench(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    let question = body["question"].as_str().unwrap_or_default();
    if question.contains("crash") {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let verdict = body["verdict_data"]["verdict"]["verdict"].as_str().unwrap_or("?");
    let tender = body["case_data"]["tender_id"].as_str().unwrap_or("?");
    Ok(Json(json!({"answer": format!("{tender} was ruled {verdict}: {question}")})))
}

async fn serve() -> ServiceClient {
    let router = Router::new()
        .route(
            "/sample-case-violation",
            get(|| async { Json(case_json("TENDER-2024-001", one_bid())) }),
        )
        .route(
            "/sample-case-compliant",
            get(|| async { Json(case_json("TENDER-2024-002", json!([]))) }),
        )
        .route("/parse_tender", post(parse_tender))
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy", "llm": "connected"})) }),
        )
        .route("/ask_bench", post(ask_bench));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    client(format!("http://127.0.0.1:{port}"))
}

fn client(base_url: String) -> ServiceClient {
    ServiceClient::new(&ServiceConfig {
        base_url,
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn record(case: &CaseRecord) -> AnalysisRecord {
    AnalysisRecord {
        case_id: case.tender_id.clone(),
        agent_opinions: BTreeMap::new(),
        verdict: Verdict {
            verdict: VerdictLabel::Reject,
            constitutional_score: 30.0,
            citizen_summary: "Re-issue the tender.".into(),
            critical_issues: Vec::new(),
            mandatory_actions: Vec::new(),
        },
    }
}

#[tokio::test]
async fn fetches_a_valid_sample() {
    let client = serve().await;
    let case = client.sample_case(SampleKind::Violation).await.unwrap();
    assert_eq!(case.tender_id, "TENDER-2024-001");
    assert_eq!(case.bids.len(), 1);
}

#[tokio::test]
async fn invalid_sample_is_rejected_before_review() {
    let client = serve().await;
    let err = client.sample_case(SampleKind::Compliant).await.unwrap_err();
    assert_eq!(err.error_kind(), "invalid_case");
}

#[tokio::test]
async fn extracts_case_from_text() {
    let client = serve().await;
    let case = client.extract_case("NIT-123/2024").await.unwrap();
    assert_eq!(case.tender_id, "NIT-123/2024");

    assert!(matches!(
        client.extract_case("   ").await,
        Err(ServiceError::EmptyText)
    ));
}

#[tokio::test]
async fn reports_health() {
    let client = serve().await;
    let health = client.health().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.llm, "connected");
}

#[tokio::test]
async fn missing_endpoint_is_a_status_error() {
    let client = serve().await;
    let record = record(&case_from_service(&client).await);
    // Point the client at a path prefix the service does not serve.
    let stray = self::client(format!("{}/v2", client.base_url()));
    let err = stray
        .ask(&case_from_service(&client).await, &record, "why?")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Status { status: 404, .. }));
}

#[tokio::test]
async fn cross_examination_keeps_the_exchange() {
    let client = serve().await;
    let case = case_from_service(&client).await;
    let mut examination = CrossExamination::new(case.clone(), record(&case));

    let answer = examination
        .ask(&client, "Why was the bid window too short?")
        .await
        .map(str::to_owned);
    assert_eq!(
        answer.as_deref(),
        Some("TENDER-2024-001 was ruled REJECT: Why was the bid window too short?")
    );
    assert_eq!(examination.ask(&client, "  ").await, None);

    let failed = examination.ask(&client, "crash please").await.map(str::to_owned);
    assert_eq!(failed.as_deref(), Some(BENCH_IN_RECESS));

    let transcript = examination.transcript();
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript[0].speaker, Speaker::Reviewer);
    assert_eq!(transcript[1].speaker, Speaker::Bench);
    assert_eq!(transcript[0].question_id, transcript[1].question_id);
    assert_ne!(transcript[1].question_id, transcript[2].question_id);
}

#[tokio::test]
async fn unreachable_service_answers_with_recess() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client(format!("http://127.0.0.1:{port}"));
    let case: CaseRecord =
        serde_json::from_value(case_json("TENDER-9", one_bid())).unwrap();
    let answer = client.ask_or_recess(&case, &record(&case), "hello?").await;
    assert_eq!(answer, BENCH_IN_RECESS);
    assert_eq!(
        client.health().await.unwrap_err().error_kind(),
        "request"
    );
}

async fn case_from_service(client: &ServiceClient) -> CaseRecord {
    client.sample_case(SampleKind::Violation).await.unwrap()
}
