use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Pickup};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const BOOKING_COLUMNS: &str = "id, name, phone, bike_model, service_type, notes, status, \
     tracking_code, pickup_datetime, pickup_address, pickup_lat, pickup_lng, pickup_place_id, \
     created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    let pickup_datetime = booking
        .pickup
        .as_ref()
        .map(|p| p.datetime.format(DATETIME_FMT).to_string());

    conn.execute(
        "INSERT INTO bookings (id, name, phone, bike_model, service_type, notes, status, \
         tracking_code, pickup_datetime, pickup_address, pickup_lat, pickup_lng, pickup_place_id, \
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            booking.id,
            booking.name,
            booking.phone,
            booking.bike_model,
            booking.service_type,
            booking.notes,
            booking.status.as_str(),
            booking.tracking_code,
            pickup_datetime,
            booking.pickup.as_ref().map(|p| p.address.clone()),
            booking.pickup.as_ref().map(|p| p.lat),
            booking.pickup.as_ref().map(|p| p.lng),
            booking.pickup.as_ref().map(|p| p.place_id.clone()),
            booking.created_at.format(DATETIME_FMT).to_string(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    match conn.query_row(&sql, params![id], parse_booking_row) {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Exact match on the unique tracking-code index. Callers normalize the code
/// (trim + uppercase) before lookup; prefix matches are never returned.
pub fn get_booking_by_tracking_code(
    conn: &Connection,
    code: &str,
) -> rusqlite::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE tracking_code = ?1");
    match conn.query_row(&sql, params![code], parse_booking_row) {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn tracking_code_exists(conn: &Connection, code: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE tracking_code = ?1",
        params![code],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: NaiveDateTime,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now.format(DATETIME_FMT).to_string(), id],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn list_bookings(
    conn: &Connection,
    code_filter: Option<&str>,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<Vec<Booking>> {
    let (sql, filter) = match code_filter {
        Some(q) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 WHERE instr(upper(tracking_code), ?1) > 0 \
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
            ),
            Some(q.trim().to_uppercase()),
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
            ),
            None,
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let mut bookings = vec![];
    match filter {
        Some(q) => {
            let rows = stmt.query_map(params![q, limit, offset], parse_booking_row)?;
            for row in rows {
                bookings.push(row?);
            }
        }
        None => {
            let rows = stmt.query_map(params![limit, offset], parse_booking_row)?;
            for row in rows {
                bookings.push(row?);
            }
        }
    }
    Ok(bookings)
}

pub fn count_bookings(conn: &Connection, code_filter: Option<&str>) -> rusqlite::Result<i64> {
    match code_filter {
        Some(q) => conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE instr(upper(tracking_code), ?1) > 0",
            params![q.trim().to_uppercase()],
            |row| row.get(0),
        ),
        None => conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0)),
    }
}

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let pickup_datetime: Option<String> = row.get(8)?;
    let pickup_address: Option<String> = row.get(9)?;
    let pickup_lat: Option<f64> = row.get(10)?;
    let pickup_lng: Option<f64> = row.get(11)?;
    let pickup_place_id: Option<String> = row.get(12)?;

    // The controller only ever writes the pickup group whole, so a row either
    // has all five columns or none of them.
    let pickup = match (
        pickup_datetime,
        pickup_address,
        pickup_lat,
        pickup_lng,
        pickup_place_id,
    ) {
        (Some(dt), Some(address), Some(lat), Some(lng), Some(place_id)) => Some(Pickup {
            datetime: parse_datetime(&dt),
            address,
            lat,
            lng,
            place_id,
        }),
        _ => None,
    };

    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;

    Ok(Booking {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        bike_model: row.get(3)?,
        service_type: row.get(4)?,
        notes: row.get(5)?,
        status: BookingStatus::parse(&status_str).unwrap_or(BookingStatus::Pending),
        tracking_code: row.get(7)?,
        pickup,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}
