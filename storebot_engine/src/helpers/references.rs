use chrono::Utc;
use rand::Rng;

const REF_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates a fresh order reference: `ORD-` followed by the current unix millisecond timestamp in base 36
/// and a 4-character random suffix. The timestamp keeps references sortable; the suffix guards against two
/// orders landing in the same millisecond.
pub fn new_order_ref() -> String {
    format!("ORD-{}{}", to_base36(Utc::now().timestamp_millis()), random_suffix(4))
}

/// Generates a fresh top-up reference. Same shape as an order reference, but with the `TOPUP-` prefix that
/// the webhook reconciler dispatches on.
pub fn new_topup_ref() -> String {
    format!("TOPUP-{}{}", to_base36(Utc::now().timestamp_millis()), random_suffix(4))
}

fn to_base36(mut value: i64) -> String {
    if value <= 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(REF_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| REF_ALPHABET[rng.gen_range(0..REF_ALPHABET.len())] as char).collect()
}
