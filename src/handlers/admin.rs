use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::booking;
use crate::state::AppState;

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DEFAULT_PAGE_SIZE: i64 = 5;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    name: String,
    phone: String,
    bike_model: String,
    service_type: String,
    notes: Option<String>,
    status: String,
    tracking_code: String,
    pickup_datetime: Option<String>,
    pickup_address: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        BookingResponse {
            id: b.id,
            name: b.name,
            phone: b.phone,
            bike_model: b.bike_model,
            service_type: b.service_type,
            notes: b.notes,
            status: b.status.as_str().to_string(),
            tracking_code: b.tracking_code,
            pickup_datetime: b
                .pickup
                .as_ref()
                .map(|p| p.datetime.format(DATETIME_FMT).to_string()),
            pickup_address: b.pickup.as_ref().map(|p| p.address.clone()),
            created_at: b.created_at.format(DATETIME_FMT).to_string(),
            updated_at: b.updated_at.format(DATETIME_FMT).to_string(),
        }
    }
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let page = {
        let db = state.db.lock().unwrap();
        booking::list_bookings(
            &db,
            query.q.as_deref(),
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )?
    };

    let bookings: Vec<BookingResponse> =
        page.bookings.into_iter().map(BookingResponse::from).collect();

    Ok(Json(serde_json::json!({
        "bookings": bookings,
        "total": page.total,
        "page": page.page,
        "page_size": page.page_size,
    })))
}

// PATCH /bookings/:id/status
#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = update
        .status
        .as_deref()
        .and_then(BookingStatus::parse)
        .ok_or_else(|| {
            AppError::invalid(
                "status",
                "status must be one of: pending, work_started, work_completed",
            )
        })?;

    let booking = {
        let db = state.db.lock().unwrap();
        booking::transition(&db, &id, status, Utc::now().naive_utc())?
    };

    let notified = match state.notifier.send(&booking::transition_notice(&booking)).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, id = %booking.id,
                "status saved but notification dispatch failed");
            false
        }
    };

    Ok(Json(serde_json::json!({
        "id": booking.id,
        "status": booking.status.as_str(),
        "notified": notified,
    })))
}

// DELETE /bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    {
        let db = state.db.lock().unwrap();
        booking::delete_if_eligible(&db, &id, Utc::now().naive_utc())?;
    }

    Ok(Json(serde_json::json!({ "success": true })))
}
