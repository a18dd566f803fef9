//! Record families stored in the vault and their write rules.

pub mod ideas;
pub mod journal;
pub mod projects;
pub mod tasks;

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use rand::Rng;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `{prefix}_{unix_ms}_{6 random base36 chars}`
pub fn generate_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix)
}

/// Millisecond UTC timestamp, e.g. `2024-05-01T10:00:00.000Z`
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// Shard for records whose creation time cannot be read
pub const UNDATED_SHARD: &str = "undated";

/// `yyyy/mm` shard of a creation timestamp (UTC)
pub fn month_shard(created_at: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(created_at) {
        return parsed.with_timezone(&Utc).format("%Y/%m").to_string();
    }
    match created_at.get(..7) {
        Some(ym) if NaiveDate::parse_from_str(&format!("{}-01", ym), "%Y-%m-%d").is_ok() => ym.replace('-', "/"),
        _ => UNDATED_SHARD.to_string(),
    }
}

/// `{dir}/{yyyy}/{mm}/{name}.{ext}`
pub fn sharded_path(dir: &str, name: &str, created_at: &str, ext: &str) -> String {
    format!("{}/{}/{}.{}", dir, month_shard(created_at), name, ext)
}

/// Calendar day of a date or timestamp string, `None` when unparseable.
pub fn day_of(value: &str) -> Option<NaiveDate> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc).date_naive());
    }
    value
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}
