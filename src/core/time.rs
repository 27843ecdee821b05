//! Shared timestamp/event helpers for backups, run ids and CLI envelopes.

use chrono::{DateTime, Local};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Sortable local timestamp used in backup file names (`YYYYMMDD_HHMMSS`).
pub fn backup_stamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    format!("{}Z", chrono::Utc::now().timestamp())
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_epoch_z(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backup_stamp_format() {
        let at = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(backup_stamp(&at), "20250307_090501");
    }

    #[test]
    fn test_backup_stamps_sort_chronologically() {
        let earlier = Local.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let later = Local.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(backup_stamp(&earlier) < backup_stamp(&later));
    }

    #[test]
    fn test_now_epoch_z_format() {
        let result = now_epoch_z();
        assert!(result.ends_with('Z'));
        let numeric_part = result.trim_end_matches('Z');
        assert!(numeric_part.parse::<u64>().is_ok());
    }

    #[test]
    fn test_new_event_id_is_valid_ulid() {
        let id = new_event_id();
        assert!(ulid::Ulid::from_string(&id).is_ok());
        assert_ne!(id, new_event_id());
    }

    #[test]
    fn test_command_envelope_with_extra() {
        let envelope = command_envelope("migrate", "ok", serde_json::json!({"to_version": 2}));
        assert_eq!(envelope["cmd"], "migrate");
        assert_eq!(envelope["status"], "ok");
        assert_eq!(envelope["to_version"], 2);
        assert_eq!(envelope["envelope_version"], "1.0.0");
    }
}
