use uuid::Uuid;

pub const TRACKING_PREFIX: &str = "MMG";
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 3;

/// Returns a candidate tracking code: `MMG` + 3 uppercase alphanumerics.
///
/// Uniqueness is not guaranteed here (the code space is 36^3 per prefix);
/// the booking controller checks the store and retries on collision.
pub fn generate_tracking_code() -> String {
    let entropy = Uuid::new_v4();
    let bytes = entropy.as_bytes();

    let mut code = String::with_capacity(TRACKING_PREFIX.len() + SUFFIX_LEN);
    code.push_str(TRACKING_PREFIX);
    for byte in bytes.iter().take(SUFFIX_LEN) {
        code.push(ALPHABET[*byte as usize % ALPHABET.len()] as char);
    }
    code
}
