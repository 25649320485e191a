use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Pickup};
use crate::services::tracking;
use crate::services::validation::{self, MALE_AREA};

const MAX_NAME_LEN: usize = 100;
const MAX_CODE_ATTEMPTS: usize = 5;
const DELETION_HOLD_DAYS: i64 = 7;

/// Raw booking submission as it arrives from the form. Everything is optional
/// so that missing fields surface as field-level validation errors instead of
/// deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bike_model: Option<String>,
    pub service_type: Option<String>,
    pub notes: Option<String>,
    /// Honeypot; legitimate clients leave it empty.
    pub company: Option<String>,
    pub pickup_datetime: Option<String>,
    pub pickup_address: Option<String>,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub pickup_place_id: Option<String>,
}

pub struct BookingPage {
    pub bookings: Vec<Booking>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Validates the submission, allocates a unique tracking code and persists the
/// booking with `status = pending` and `created_at = updated_at = now`.
/// Nothing is written when validation fails.
pub fn create_booking(
    conn: &Connection,
    input: &BookingInput,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let honeypot = input.company.as_deref().unwrap_or("");
    if !validation::validate_honeypot(honeypot) {
        return Err(AppError::invalid("company", "invalid submission detected"));
    }

    let name = required_field("name", input.name.as_deref())?;
    if name.len() > MAX_NAME_LEN {
        return Err(AppError::invalid("name", "name is too long"));
    }
    let phone = required_field("phone", input.phone.as_deref())?;
    if !validation::is_valid_phone(&phone) {
        return Err(AppError::invalid(
            "phone",
            "enter a valid 7-digit phone number",
        ));
    }
    let bike_model = required_field("bike_model", input.bike_model.as_deref())?;
    let service_type = required_field("service_type", input.service_type.as_deref())?;

    let pickup = validate_pickup(input, now)?;

    let tracking_code =
        allocate_tracking_code(|code| queries::tracking_code_exists(conn, code))?;

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        name,
        phone,
        bike_model,
        service_type,
        notes: input
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        status: BookingStatus::Pending,
        tracking_code,
        pickup,
        created_at: now,
        updated_at: now,
    };

    queries::insert_booking(conn, &booking)?;
    tracing::info!(tracking_code = %booking.tracking_code, "booking created");
    Ok(booking)
}

/// Sets the booking status and refreshes `updated_at`. Any of the three known
/// statuses may be set from any prior status; the admin flow relies on being
/// able to correct a mis-click.
pub fn transition(
    conn: &Connection,
    id: &str,
    new_status: BookingStatus,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if !queries::update_booking_status(conn, id, new_status, now)? {
        return Err(AppError::NotFound(format!("booking {id}")));
    }
    let booking = queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
    tracing::info!(id = %id, status = %new_status.as_str(), "booking status updated");
    Ok(booking)
}

/// Case-insensitive, whitespace-trimmed exact match on the tracking code.
pub fn lookup_by_code(conn: &Connection, code: &str) -> Result<Booking, AppError> {
    let normalized = code.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(AppError::invalid("tracking_code", "tracking code is required"));
    }

    queries::get_booking_by_tracking_code(conn, &normalized)?
        .ok_or_else(|| AppError::NotFound("no booking found with that tracking code".to_string()))
}

/// Deletes a booking only when the work is completed and at least 7 days have
/// passed since the last update. Eligibility is re-checked against the stored
/// record here, not against whatever the caller last saw.
pub fn delete_if_eligible(
    conn: &Connection,
    id: &str,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let booking = queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    if booking.status != BookingStatus::WorkCompleted {
        return Err(AppError::PolicyViolation(
            "only completed bookings can be deleted".to_string(),
        ));
    }
    if now - booking.updated_at < Duration::days(DELETION_HOLD_DAYS) {
        return Err(AppError::PolicyViolation(format!(
            "completed bookings are kept for {DELETION_HOLD_DAYS} days before deletion"
        )));
    }

    queries::delete_booking(conn, id)?;
    tracing::info!(id = %id, "booking deleted");
    Ok(())
}

/// Newest first, optional substring filter over the tracking code.
pub fn list_bookings(
    conn: &Connection,
    code_filter: Option<&str>,
    page: i64,
    page_size: i64,
) -> Result<BookingPage, AppError> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, 100);
    let offset = (page - 1) * page_size;

    let filter = code_filter.map(str::trim).filter(|q| !q.is_empty());
    let total = queries::count_bookings(conn, filter)?;
    let bookings = queries::list_bookings(conn, filter, page_size, offset)?;

    Ok(BookingPage {
        bookings,
        total,
        page,
        page_size,
    })
}

/// Human-readable summary sent to the workshop channel after a booking is
/// persisted.
pub fn creation_notice(booking: &Booking) -> String {
    let mut text = format!(
        "New service booking\n\nName: {}\nPhone: {}\nBike: {}\nService: {}\nTracking code: {}",
        booking.name, booking.phone, booking.bike_model, booking.service_type, booking.tracking_code,
    );
    if let Some(notes) = &booking.notes {
        text.push_str(&format!("\nNotes: {notes}"));
    }
    if let Some(pickup) = &booking.pickup {
        text.push_str(&format!(
            "\nPickup: {} at {}",
            pickup.address,
            maldives_time(pickup.datetime)
        ));
    }
    text.push_str(&format!(
        "\n\nReceived: {} (Maldives time)",
        maldives_time(booking.created_at)
    ));
    text
}

pub fn transition_notice(booking: &Booking) -> String {
    format!(
        "Booking {} ({}, {}) is now: {}",
        booking.tracking_code,
        booking.name,
        booking.bike_model,
        booking.status.label(),
    )
}

fn maldives_time(utc: NaiveDateTime) -> String {
    // UTC+5, no DST.
    let offset = FixedOffset::east_opt(5 * 3600).expect("valid offset");
    let local: DateTime<FixedOffset> = offset.from_utc_datetime(&utc);
    local.format("%d %b %Y, %H:%M").to_string()
}

fn required_field(field: &'static str, value: Option<&str>) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::invalid(field, format!("{field} is required"))),
    }
}

/// Pickup scheduling is all-or-nothing: either every field of the group is
/// present and valid, or none of them are supplied.
fn validate_pickup(input: &BookingInput, now: NaiveDateTime) -> Result<Option<Pickup>, AppError> {
    let any_present = input.pickup_datetime.as_deref().is_some_and(|s| !s.trim().is_empty())
        || input.pickup_address.as_deref().is_some_and(|s| !s.trim().is_empty())
        || input.pickup_lat.is_some()
        || input.pickup_lng.is_some()
        || input.pickup_place_id.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !any_present {
        return Ok(None);
    }

    let datetime_str = required_field("pickup_datetime", input.pickup_datetime.as_deref())?;
    let address = required_field("pickup_address", input.pickup_address.as_deref())?;
    let place_id = required_field("pickup_place_id", input.pickup_place_id.as_deref())?;
    let lat = input
        .pickup_lat
        .ok_or_else(|| AppError::invalid("pickup_lat", "pickup coordinates are required"))?;
    let lng = input
        .pickup_lng
        .ok_or_else(|| AppError::invalid("pickup_lng", "pickup coordinates are required"))?;

    if !validation::is_within_geofence(lat, lng, &MALE_AREA) {
        return Err(AppError::invalid(
            "pickup_address",
            "pickup location must be within the Malé, Hulhumalé or Vilimalé area",
        ));
    }

    let datetime = parse_pickup_datetime(&datetime_str)
        .ok_or_else(|| AppError::invalid("pickup_datetime", "invalid pickup date and time"))?;
    if datetime <= now {
        return Err(AppError::invalid(
            "pickup_datetime",
            "pickup date and time must be in the future",
        ));
    }

    Ok(Some(Pickup {
        datetime,
        address,
        lat,
        lng,
        place_id,
    }))
}

/// Accepts RFC 3339 (what the form submits after UTC conversion) and the bare
/// `datetime-local` shape without an offset, treated as UTC.
fn parse_pickup_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Draws candidate codes until one is free in the store, up to a small cap.
/// The UNIQUE constraint on `tracking_code` remains the final arbiter for
/// concurrent inserts.
fn allocate_tracking_code<F>(mut exists: F) -> Result<String, AppError>
where
    F: FnMut(&str) -> rusqlite::Result<bool>,
{
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = tracking::generate_tracking_code();
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(code = %candidate, "tracking code collision, retrying");
    }
    Err(AppError::Config(
        "failed to allocate a unique tracking code".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_conn() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn t0() -> NaiveDateTime {
        "2025-06-01T10:00:00"
            .parse::<NaiveDateTime>()
            .unwrap()
    }

    fn valid_input() -> BookingInput {
        BookingInput {
            name: Some("Ahmed".to_string()),
            phone: Some("9996210".to_string()),
            bike_model: Some("Honda Wave 125".to_string()),
            service_type: Some("Full Service".to_string()),
            notes: Some("rattling noise at low rpm".to_string()),
            ..Default::default()
        }
    }

    fn valid_pickup_input() -> BookingInput {
        BookingInput {
            pickup_datetime: Some("2025-06-02T09:30:00Z".to_string()),
            pickup_address: Some("Majeedhee Magu, Malé".to_string()),
            pickup_lat: Some(4.1755),
            pickup_lng: Some(73.5093),
            pickup_place_id: Some("place-123".to_string()),
            ..valid_input()
        }
    }

    #[test]
    fn create_sets_pending_and_equal_timestamps() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_input(), t0()).unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.created_at, booking.updated_at);
        assert!(booking.tracking_code.starts_with("MMG"));

        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.tracking_code, booking.tracking_code);
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[test]
    fn create_rejects_invalid_phone_without_persisting() {
        let conn = test_conn();
        let input = BookingInput {
            phone: Some("12345".to_string()),
            ..valid_input()
        };

        let err = create_booking(&conn, &input, t0()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "phone", .. }));
        assert_eq!(queries::count_bookings(&conn, None).unwrap(), 0);
    }

    #[test]
    fn create_rejects_honeypot_regardless_of_other_fields() {
        let conn = test_conn();
        let input = BookingInput {
            company: Some("definitely a human".to_string()),
            ..valid_input()
        };

        let err = create_booking(&conn, &input, t0()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "company", .. }));
        assert_eq!(queries::count_bookings(&conn, None).unwrap(), 0);
    }

    #[test]
    fn create_rejects_partial_pickup_group() {
        let conn = test_conn();
        let input = BookingInput {
            pickup_address: Some("Majeedhee Magu, Malé".to_string()),
            ..valid_input()
        };

        let err = create_booking(&conn, &input, t0()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
        assert_eq!(queries::count_bookings(&conn, None).unwrap(), 0);
    }

    #[test]
    fn create_rejects_pickup_outside_geofence() {
        let conn = test_conn();
        let input = BookingInput {
            pickup_lat: Some(3.2028), // Addu, well south of Malé
            pickup_lng: Some(73.2207),
            ..valid_pickup_input()
        };

        let err = create_booking(&conn, &input, t0()).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidInput { field: "pickup_address", .. }
        ));
    }

    #[test]
    fn create_rejects_pickup_in_the_past() {
        let conn = test_conn();
        let input = BookingInput {
            pickup_datetime: Some("2025-05-31T09:30:00Z".to_string()),
            ..valid_pickup_input()
        };

        let err = create_booking(&conn, &input, t0()).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidInput { field: "pickup_datetime", .. }
        ));
    }

    #[test]
    fn create_accepts_full_pickup_group() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_pickup_input(), t0()).unwrap();

        let pickup = booking.pickup.expect("pickup stored");
        assert_eq!(pickup.address, "Majeedhee Magu, Malé");
        assert_eq!(pickup.place_id, "place-123");

        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert!(stored.pickup.is_some());
    }

    #[test]
    fn lookup_normalizes_case_and_whitespace() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_input(), t0()).unwrap();

        let sloppy = format!("  {}  ", booking.tracking_code.to_lowercase());
        let found = lookup_by_code(&conn, &sloppy).unwrap();
        assert_eq!(found.id, booking.id);
    }

    #[test]
    fn lookup_never_matches_prefixes() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_input(), t0()).unwrap();

        let prefix = &booking.tracking_code[..booking.tracking_code.len() - 1];
        let err = lookup_by_code(&conn, prefix).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn lookup_miss_is_not_found() {
        let conn = test_conn();
        let err = lookup_by_code(&conn, "MMGZZZ").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn transition_updates_status_and_advances_updated_at() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_input(), t0()).unwrap();

        let later = t0() + Duration::hours(2);
        let updated = transition(&conn, &booking.id, BookingStatus::WorkCompleted, later).unwrap();

        assert_eq!(updated.status, BookingStatus::WorkCompleted);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, booking.created_at);
    }

    #[test]
    fn backward_transitions_are_allowed() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_input(), t0()).unwrap();

        transition(&conn, &booking.id, BookingStatus::WorkCompleted, t0()).unwrap();
        let back = transition(&conn, &booking.id, BookingStatus::Pending, t0()).unwrap();
        assert_eq!(back.status, BookingStatus::Pending);
    }

    #[test]
    fn transition_on_unknown_id_is_not_found() {
        let conn = test_conn();
        let err = transition(&conn, "nope", BookingStatus::WorkStarted, t0()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn delete_refused_until_seven_days_after_completion() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_input(), t0()).unwrap();

        // Not completed yet.
        let err = delete_if_eligible(&conn, &booking.id, t0()).unwrap_err();
        assert!(matches!(err, AppError::PolicyViolation(_)));

        let completed_at = t0() + Duration::hours(1);
        transition(&conn, &booking.id, BookingStatus::WorkCompleted, completed_at).unwrap();

        // Completed, but inside the hold window.
        let early = completed_at + Duration::days(6);
        let err = delete_if_eligible(&conn, &booking.id, early).unwrap_err();
        assert!(matches!(err, AppError::PolicyViolation(_)));

        // Hold elapsed.
        let eligible = completed_at + Duration::days(7);
        delete_if_eligible(&conn, &booking.id, eligible).unwrap();
        assert!(queries::get_booking_by_id(&conn, &booking.id).unwrap().is_none());
    }

    #[test]
    fn delete_recheck_catches_status_change_after_render() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_input(), t0()).unwrap();
        transition(&conn, &booking.id, BookingStatus::WorkCompleted, t0()).unwrap();

        // The delete affordance was rendered while completed, but the booking
        // went back to pending before the delete arrived.
        transition(&conn, &booking.id, BookingStatus::Pending, t0() + Duration::days(1)).unwrap();

        let err = delete_if_eligible(&conn, &booking.id, t0() + Duration::days(30)).unwrap_err();
        assert!(matches!(err, AppError::PolicyViolation(_)));
    }

    #[test]
    fn list_orders_newest_first_and_paginates() {
        let conn = test_conn();
        let mut ids = vec![];
        for i in 0..7 {
            let booking =
                create_booking(&conn, &valid_input(), t0() + Duration::minutes(i)).unwrap();
            ids.push(booking.id);
        }

        let first = list_bookings(&conn, None, 1, 5).unwrap();
        assert_eq!(first.total, 7);
        assert_eq!(first.bookings.len(), 5);
        assert_eq!(first.bookings[0].id, ids[6]);

        let second = list_bookings(&conn, None, 2, 5).unwrap();
        assert_eq!(second.bookings.len(), 2);
        assert_eq!(second.bookings[1].id, ids[0]);
    }

    #[test]
    fn list_filters_by_tracking_code_substring() {
        let conn = test_conn();
        let booking = create_booking(&conn, &valid_input(), t0()).unwrap();
        create_booking(&conn, &valid_input(), t0()).unwrap();

        let suffix = booking.tracking_code[3..].to_lowercase();
        let page = list_bookings(&conn, Some(&suffix), 1, 5).unwrap();
        assert!(page.bookings.iter().any(|b| b.id == booking.id));
        assert!(page.total >= 1);
    }

    #[test]
    fn allocate_skips_codes_already_in_store() {
        let mut rejected = std::collections::HashSet::new();
        let code = allocate_tracking_code(|candidate| {
            // Treat the first two draws as collisions.
            if rejected.len() < 2 {
                rejected.insert(candidate.to_string());
                return Ok(true);
            }
            Ok(false)
        })
        .unwrap();
        assert!(!rejected.contains(&code));
    }

    #[test]
    fn allocate_gives_up_after_retry_cap() {
        let err = allocate_tracking_code(|_| Ok(true)).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
