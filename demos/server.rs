//! Simple REST admin API example for the membership balance engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /members` - Register a member
//! - `POST /memberships` - Grant a membership pool
//! - `POST /charges` - Charge a care session against a pool
//! - `GET /members/{id}/history` - Unified history, newest first
//! - `GET /members/{id}/totals` - Balance totals across active pools
//! - `POST /audit` - Run the audit-and-heal sweep
//! - `POST /cleanup` - Purge orphaned rows
//!
//! ## Example Usage
//!
//! ```bash
//! # Register a member
//! curl -X POST http://localhost:3000/members \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": 1, "name": "Kim", "phone": "010-1234-5678"}'
//!
//! # Grant a 3,000,000 pool
//! curl -X POST http://localhost:3000/memberships \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": 1, "member_id": 1, "product_name": "10-session body care", "total_amount": "3000000"}'
//!
//! # Charge a session
//! curl -X POST http://localhost:3000/charges \
//!   -H "Content-Type: application/json" \
//!   -d '{"record_id": 1, "member_id": 1, "membership_id": 1, "program_id": 7, "original_price": "1188000", "date": "2025-03-01", "time": "10:00:00"}'
//!
//! # Check the member's balance view
//! curl http://localhost:3000/members/1/totals
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use care_ledger_rs::{
    AuditReport, ChargeError, ChargeRequest, CleanupReport, Engine, HistoryEntry, HistoryView,
    Member, MemberId, MemberTotals, Membership, MembershipId, MemoryStore, ProgramId, Reconciler,
    RecordId,
};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
struct MemberRequest {
    id: u64,
    name: String,
    phone: String,
}

#[derive(Debug, Deserialize)]
struct MembershipRequest {
    id: u64,
    member_id: u64,
    product_name: String,
    total_amount: Decimal,
    #[serde(default)]
    discount_rate: Option<Decimal>,
    #[serde(default)]
    expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ChargeRequestDto {
    record_id: u64,
    member_id: u64,
    membership_id: u64,
    program_id: u32,
    original_price: Decimal,
    #[serde(default)]
    discount_rate: Option<Decimal>,
    date: NaiveDate,
    time: NaiveTime,
    #[serde(default)]
    signature_data: Option<String>,
    #[serde(default)]
    note_summary: Option<String>,
}

impl ChargeRequestDto {
    fn into_request(self) -> ChargeRequest {
        ChargeRequest {
            record_id: RecordId(self.record_id),
            member_id: MemberId(self.member_id),
            membership_id: MembershipId(self.membership_id),
            program_id: ProgramId(self.program_id),
            original_price: self.original_price,
            discount_rate: self.discount_rate,
            date: self.date,
            time: self.time,
            signature_data: self.signature_data,
            note_summary: self.note_summary,
        }
    }
}

/// Response body for errors.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

// === Application State ===

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine<MemoryStore>>,
    history: Arc<HistoryView<MemoryStore>>,
    store: Arc<MemoryStore>,
}

// === Error Handling ===

/// Wrapper for converting `ChargeError` into HTTP responses.
struct AppError(ChargeError);

impl From<ChargeError> for AppError {
    fn from(err: ChargeError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            ChargeError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            ChargeError::InsufficientBalance => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BALANCE")
            }
            ChargeError::MemberNotFound => (StatusCode::NOT_FOUND, "MEMBER_NOT_FOUND"),
            ChargeError::MembershipNotFound => (StatusCode::NOT_FOUND, "MEMBERSHIP_NOT_FOUND"),
            ChargeError::MembershipMismatch => (StatusCode::BAD_REQUEST, "MEMBERSHIP_MISMATCH"),
            ChargeError::RecordNotFound => (StatusCode::NOT_FOUND, "RECORD_NOT_FOUND"),
            ChargeError::AlreadyCompleted => (StatusCode::CONFLICT, "ALREADY_COMPLETED"),
            ChargeError::ReservationNotFound => (StatusCode::NOT_FOUND, "RESERVATION_NOT_FOUND"),
            ChargeError::ReservationClosed => (StatusCode::CONFLICT, "RESERVATION_CLOSED"),
            ChargeError::Store(_) => (StatusCode::BAD_GATEWAY, "STORE_ERROR"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /members - Register a member.
async fn create_member(
    State(state): State<AppState>,
    Json(request): Json<MemberRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .register_member(Member::new(MemberId(request.id), request.name, request.phone))?;
    Ok(StatusCode::CREATED)
}

/// POST /memberships - Grant a membership pool.
async fn create_membership(
    State(state): State<AppState>,
    Json(request): Json<MembershipRequest>,
) -> Result<StatusCode, AppError> {
    let mut membership = Membership::new(
        MembershipId(request.id),
        MemberId(request.member_id),
        request.product_name,
        request.total_amount,
    );
    if let Some(rate) = request.discount_rate {
        membership = membership.with_discount_rate(rate);
    }
    if let Some(expiry) = request.expiry_date {
        membership = membership.with_expiry(expiry);
    }
    state.engine.grant_membership(membership)?;
    Ok(StatusCode::CREATED)
}

/// POST /charges - Charge a care session.
async fn create_charge(
    State(state): State<AppState>,
    Json(request): Json<ChargeRequestDto>,
) -> Result<StatusCode, AppError> {
    state.engine.charge_and_record(request.into_request())?;
    Ok(StatusCode::CREATED)
}

/// GET /members/{id}/history - Unified history, newest first.
async fn member_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let entries = state
        .history
        .unified_history(MemberId(id))
        .map_err(ChargeError::from)?;
    Ok(Json(entries))
}

/// GET /members/{id}/totals - Balance totals across active pools.
async fn member_totals(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MemberTotals>, AppError> {
    let totals = state
        .history
        .member_totals(MemberId(id))
        .map_err(ChargeError::from)?;
    Ok(Json(totals))
}

/// POST /audit - Run the audit-and-heal sweep.
async fn run_audit(State(state): State<AppState>) -> Json<AuditReport> {
    Json(Reconciler::new(state.store.clone()).audit_and_heal())
}

/// POST /cleanup - Purge orphaned rows.
async fn run_cleanup(State(state): State<AppState>) -> Json<CleanupReport> {
    Json(Reconciler::new(state.store.clone()).purge_orphans())
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/members", post(create_member))
        .route("/memberships", post(create_membership))
        .route("/charges", post(create_charge))
        .route("/members/{id}/history", get(member_history))
        .route("/members/{id}/totals", get(member_totals))
        .route("/audit", post(run_audit))
        .route("/cleanup", post(run_cleanup))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        engine: Arc::new(Engine::new(store.clone())),
        history: Arc::new(HistoryView::new(store.clone())),
        store,
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Care Ledger admin API running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /members               - Register a member");
    println!("  POST /memberships           - Grant a membership pool");
    println!("  POST /charges               - Charge a care session");
    println!("  GET  /members/:id/history   - Unified history");
    println!("  GET  /members/:id/totals    - Balance totals");
    println!("  POST /audit                 - Audit-and-heal sweep");
    println!("  POST /cleanup               - Purge orphaned rows");

    axum::serve(listener, app).await.unwrap();
}
