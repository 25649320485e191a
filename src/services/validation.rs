/// Pure input checks shared by the contact and booking flows.

/// Rectangular latitude/longitude bounding box for valid pickup locations.
#[derive(Debug, Clone, Copy)]
pub struct GeofenceBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Covers Malé, Hulhumalé and Vilimalé.
pub const MALE_AREA: GeofenceBounds = GeofenceBounds {
    south: 4.150,
    west: 73.455,
    north: 4.235,
    east: 73.560,
};

/// Local subscriber numbers are a fixed 7 digits; formatting characters are
/// ignored.
pub fn is_valid_phone(phone: &str) -> bool {
    phone.chars().filter(|c| c.is_ascii_digit()).count() == 7
}

/// The hidden field must stay empty; anything else is an automated submission.
pub fn validate_honeypot(value: &str) -> bool {
    value.is_empty()
}

pub fn is_within_geofence(lat: f64, lng: f64, bounds: &GeofenceBounds) -> bool {
    lat >= bounds.south && lat <= bounds.north && lng >= bounds.west && lng <= bounds.east
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_accepts_exactly_seven_digits() {
        assert!(is_valid_phone("9996210"));
        assert!(is_valid_phone("999-6210"));
        assert!(is_valid_phone(" 999 62 10 "));
    }

    #[test]
    fn phone_rejects_other_digit_counts() {
        assert!(!is_valid_phone(""));
        assert!(!is_valid_phone("999621"));
        assert!(!is_valid_phone("99962100"));
        assert!(!is_valid_phone("+960 9996210"));
        assert!(!is_valid_phone("abcdefg"));
    }

    #[test]
    fn honeypot_valid_only_when_empty() {
        assert!(validate_honeypot(""));
        assert!(!validate_honeypot(" "));
        assert!(!validate_honeypot("http://spam.example"));
    }

    #[test]
    fn geofence_contains_interior_points() {
        assert!(is_within_geofence(4.1755, 73.5093, &MALE_AREA));
    }

    #[test]
    fn geofence_edges_are_inclusive() {
        assert!(is_within_geofence(MALE_AREA.south, MALE_AREA.west, &MALE_AREA));
        assert!(is_within_geofence(MALE_AREA.north, MALE_AREA.east, &MALE_AREA));
    }

    #[test]
    fn geofence_rejects_outside_points() {
        assert!(!is_within_geofence(4.1499, 73.5, &MALE_AREA));
        assert!(!is_within_geofence(4.2, 73.561, &MALE_AREA));
        assert!(!is_within_geofence(-4.2, -73.5, &MALE_AREA));
    }
}
