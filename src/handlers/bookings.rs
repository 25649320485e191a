use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::errors::AppError;
use crate::services::booking::{self, BookingInput};
use crate::state::AppState;

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(input): Json<BookingInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now().naive_utc();

    let booking = {
        let db = state.db.lock().unwrap();
        booking::create_booking(&db, &input, now)?
    };

    // Best effort: the booking is already persisted, a failed notification
    // only downgrades the response to a partial success.
    let notified = match state.notifier.send(&booking::creation_notice(&booking)).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, tracking_code = %booking.tracking_code,
                "booking saved but notification dispatch failed");
            false
        }
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "tracking_code": booking.tracking_code,
        "notified": notified,
    })))
}

// GET /bookings/:tracking_code
#[derive(Serialize)]
pub struct TrackResponse {
    name: String,
    phone: String,
    bike_model: String,
    service_type: String,
    notes: Option<String>,
    status: String,
    tracking_code: String,
}

pub async fn track_booking(
    State(state): State<Arc<AppState>>,
    Path(tracking_code): Path<String>,
) -> Result<Json<TrackResponse>, AppError> {
    let booking = {
        let db = state.db.lock().unwrap();
        booking::lookup_by_code(&db, &tracking_code)?
    };

    Ok(Json(TrackResponse {
        name: booking.name,
        phone: booking.phone,
        bike_model: booking.bike_model,
        service_type: booking.service_type,
        notes: booking.notes,
        status: booking.status.as_str().to_string(),
        tracking_code: booking.tracking_code,
    }))
}
