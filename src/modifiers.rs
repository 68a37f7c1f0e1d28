//! Runtime configuration supplied by the caller.
//!
//! Consumed as an opaque record: each component reads only the fields it
//! declares. Unknown fields in serialized form are ignored so older callers
//! keep working.

use serde::{Deserialize, Serialize};

/// Which backing strategy person fields on events resolve through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonsMode {
    /// Join through the distinct-id mapping table.
    #[default]
    DistinctIdJoin,
    /// Read the person columns denormalized onto the events table.
    OnEvents,
}

/// Which version of the sessions backing query to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTableVersion {
    #[default]
    Auto,
    V1,
    V2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    /// IANA timezone name appended to timezone-aware function calls.
    pub timezone: String,
    /// Master switch for the preaggregation substitution pass.
    pub use_preaggregated_tables: bool,
    pub persons_mode: PersonsMode,
    pub session_table_version: SessionTableVersion,
}

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers {
            timezone: "UTC".to_string(),
            use_preaggregated_tables: false,
            persons_mode: PersonsMode::default(),
            session_table_version: SessionTableVersion::default(),
        }
    }
}

impl Modifiers {
    /// The timezone to emit. Falls back to UTC when the configured value is
    /// obviously malformed.
    pub fn effective_timezone(&self) -> &str {
        let tz = self.timezone.trim();
        let plausible = !tz.is_empty()
            && tz.is_ascii()
            && tz
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '+' | '-' | ':'));
        if plausible {
            tz
        } else {
            log::warn!("invalid timezone modifier {:?}, falling back to UTC", self.timezone);
            "UTC"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let m = Modifiers::default();
        assert_eq!(m.timezone, "UTC");
        assert!(!m.use_preaggregated_tables);
    }

    #[test]
    fn test_effective_timezone_fallback() {
        let m = Modifiers {
            timezone: "not a timezone!".to_string(),
            ..Default::default()
        };
        assert_eq!(m.effective_timezone(), "UTC");
        let m = Modifiers {
            timezone: "Europe/Berlin".to_string(),
            ..Default::default()
        };
        assert_eq!(m.effective_timezone(), "Europe/Berlin");
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let m: Modifiers = serde_json::from_str(
            r#"{"timezone": "US/Pacific", "future_flag": true}"#,
        )
        .unwrap();
        assert_eq!(m.timezone, "US/Pacific");
    }
}
