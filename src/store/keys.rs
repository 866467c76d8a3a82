//! Key layout and encoding for the job store's Fjall partitions.
//!
//! Partition structure:
//! - `jobs`: job:{request_id} -> Job (JSON)
//! - `by_status`: status:{status}:{inv_updated_at:020}:{request_id} -> request_id
//! - `by_vendor`: vendor:{vendor}:{status}:{request_id} -> request_id
//! - `metadata`: meta:{key} -> value

use chrono::{DateTime, Utc};

pub fn encode_job_key(request_id: &str) -> Vec<u8> {
    format!("job:{}", request_id).into_bytes()
}

pub fn decode_job_key(key: &[u8]) -> Option<String> {
    std::str::from_utf8(key)
        .ok()?
        .strip_prefix("job:")
        .map(String::from)
}

/// Encodes a timestamp so ascending byte order corresponds to descending time,
/// giving `{status, updatedAt desc}` range scans for free from a forward iterator.
fn inverted_millis(at: DateTime<Utc>) -> u64 {
    let millis = at.timestamp_millis().max(0) as u64;
    u64::MAX - millis
}

pub fn encode_status_key(status: &str, updated_at: DateTime<Utc>, request_id: &str) -> Vec<u8> {
    format!(
        "status:{}:{:020}:{}",
        status,
        inverted_millis(updated_at),
        request_id
    )
    .into_bytes()
}

pub fn encode_status_prefix(status: &str) -> Vec<u8> {
    format!("status:{}:", status).into_bytes()
}

pub fn encode_vendor_key(vendor: &str, status: &str, request_id: &str) -> Vec<u8> {
    format!("vendor:{}:{}:{}", vendor, status, request_id).into_bytes()
}

pub fn encode_vendor_prefix(vendor: &str) -> Vec<u8> {
    format!("vendor:{}:", vendor).into_bytes()
}

pub fn encode_meta_key(key: &str) -> Vec<u8> {
    format!("meta:{}", key).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn job_key_roundtrips() {
        let key = encode_job_key("abc-123");
        assert_eq!(key, b"job:abc-123");
        assert_eq!(decode_job_key(&key).unwrap(), "abc-123");
    }

    #[test]
    fn status_key_orders_newest_first() {
        let older = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let k_older = encode_status_key("pending", older, "a");
        let k_newer = encode_status_key("pending", newer, "b");
        assert!(k_newer < k_older, "newer timestamp must sort first");
    }

    #[test]
    fn vendor_prefix_matches_its_own_keys() {
        let key = encode_vendor_key("syncVendor", "complete", "req-1");
        let prefix = encode_vendor_prefix("syncVendor");
        assert!(key.starts_with(&prefix[..]));
    }
}
