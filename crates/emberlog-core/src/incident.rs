use crate::error::{IncidentError, IncidentResult};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

/// One emergency-dispatch record as served by the incidents API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    /// ISO-8601 in UTC
    pub dispatched_at: String,
    pub incident_type: String,
    pub address: String,
    /// Dispatch order
    pub units: Vec<String>,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

/// Parse an untrusted text payload (an SSE `data` field, a stored blob) into an incident.
///
/// Failures are returned, never panicked; callers are expected to log and drop.
pub fn parse_incident(raw: &str) -> IncidentResult<Incident> {
    let value: Value = serde_json::from_str(raw).map_err(IncidentError::Malformed)?;
    Incident::from_value(value)
}

impl Incident {
    /// Validate an already-decoded JSON value, e.g. one item of a page response.
    pub fn from_value(value: Value) -> IncidentResult<Self> {
        let incident: Incident = serde_json::from_value(value).map_err(IncidentError::Schema)?;
        incident.validate()?;
        Ok(incident)
    }

    fn validate(&self) -> IncidentResult<()> {
        if let Some(url) = &self.source_audio {
            if Url::parse(url).is_err() {
                return Err(IncidentError::InvalidAudioUrl { url: url.clone() });
            }
        }
        Ok(())
    }

    pub fn dispatched_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.dispatched_at)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Local wall-clock rendering for tables, e.g. "Sep 29, 2025 02:18 AM".
    pub fn display_time(&self) -> String {
        match self.dispatched_at_utc() {
            Some(ts) => ts.with_timezone(&Local).format("%b %d, %Y %I:%M %p").to_string(),
            None => self.dispatched_at.clone(),
        }
    }

    pub fn units_label(&self) -> String {
        self.units.join(" ")
    }

    pub fn maps_link(&self) -> String {
        match Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", self.address.as_str())]) {
            Ok(url) => url.to_string(),
            Err(_) => MAPS_SEARCH_URL.to_string(),
        }
    }

    /// Case-insensitive substring match on the address, mirroring `address_search`.
    pub fn address_matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        needle.is_empty() || self.address.to_lowercase().contains(&needle.to_lowercase())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn incident(id: i64, dispatched_at: &str) -> Incident {
        Incident {
            id,
            dispatched_at: dispatched_at.to_string(),
            incident_type: "MEDICAL".to_string(),
            address: "2401 E Van Buren St, Phoenix, AZ".to_string(),
            units: vec!["R1".to_string(), "E1".to_string()],
            channel: "PRWC J".to_string(),
            source_audio: None,
            transcript: None,
        }
    }

    fn full_payload() -> Value {
        json!({
            "id": 101,
            "dispatched_at": "2025-09-29T02:18:45Z",
            "incident_type": "STRUCTURE FIRE",
            "address": "1234 W Camelback Rd, Phoenix, AZ",
            "units": ["E12", "L9", "R12", "BC1"],
            "channel": "PRWC G",
            "source_audio": "https://audio.example.com/2025-09-29/101.wav",
            "transcript": "E12, L9, R12, Battalion 1, respond to a reported structure fire."
        })
    }

    #[test]
    fn test_accepts_full_record() {
        let parsed = parse_incident(&full_payload().to_string()).unwrap();
        assert_eq!(parsed.id, 101);
        assert_eq!(parsed.units, vec!["E12", "L9", "R12", "BC1"]);
        assert_eq!(
            parsed.source_audio.as_deref(),
            Some("https://audio.example.com/2025-09-29/101.wav")
        );
        assert!(parsed.transcript.is_some());
    }

    #[test]
    fn test_accepts_record_without_optionals() {
        let mut payload = full_payload();
        let obj = payload.as_object_mut().unwrap();
        obj.remove("source_audio");
        obj.remove("transcript");

        let parsed = parse_incident(&payload.to_string()).unwrap();
        assert_eq!(parsed.source_audio, None);
        assert_eq!(parsed.transcript, None);
    }

    #[test]
    fn test_null_optionals_are_absent() {
        let mut payload = full_payload();
        payload["source_audio"] = Value::Null;
        payload["transcript"] = Value::Null;

        let parsed = parse_incident(&payload.to_string()).unwrap();
        assert_eq!(parsed.source_audio, None);
        assert_eq!(parsed.transcript, None);
    }

    #[test]
    fn test_rejects_non_json() {
        let err = parse_incident("definitely not json").unwrap_err();
        assert!(matches!(err, IncidentError::Malformed(_)));
    }

    #[test]
    fn test_rejects_missing_id() {
        let mut payload = full_payload();
        payload.as_object_mut().unwrap().remove("id");
        let err = parse_incident(&payload.to_string()).unwrap_err();
        assert!(matches!(err, IncidentError::Schema(_)));
    }

    #[test]
    fn test_rejects_units_not_array() {
        let mut payload = full_payload();
        payload["units"] = json!("E12 L9");
        let err = parse_incident(&payload.to_string()).unwrap_err();
        assert!(matches!(err, IncidentError::Schema(_)));
    }

    #[test]
    fn test_rejects_bad_audio_url() {
        let mut payload = full_payload();
        payload["source_audio"] = json!("not-a-url");
        let err = parse_incident(&payload.to_string()).unwrap_err();
        assert!(matches!(err, IncidentError::InvalidAudioUrl { .. }));
    }

    #[test]
    fn test_rejects_wrong_field_types() {
        let mut payload = full_payload();
        payload["transcript"] = json!(42);
        assert!(parse_incident(&payload.to_string()).is_err());

        let mut payload = full_payload();
        payload["id"] = json!("101");
        assert!(parse_incident(&payload.to_string()).is_err());

        assert!(parse_incident("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_ignores_unknown_fields() {
        let mut payload = full_payload();
        payload["priority"] = json!("high");
        assert!(parse_incident(&payload.to_string()).is_ok());
    }

    #[test]
    fn test_serialize_omits_absent_optionals() {
        let value = serde_json::to_value(incident(7, "2025-01-01T00:00:00Z")).unwrap();
        assert!(value.get("source_audio").is_none());
        assert!(value.get("transcript").is_none());
    }

    #[test]
    fn test_helpers() {
        let inc = incident(1, "2025-09-29T03:05:09Z");
        assert!(inc.dispatched_at_utc().is_some());
        assert_eq!(inc.units_label(), "R1 E1");
        assert!(inc.address_matches("van buren"));
        assert!(inc.address_matches("  "));
        assert!(!inc.address_matches("camelback"));

        let link = inc.maps_link();
        assert!(link.starts_with("https://www.google.com/maps/search/?api=1&query="));
        assert!(link.contains("Van+Buren"));

        let odd = incident(2, "yesterday-ish");
        assert_eq!(odd.dispatched_at_utc(), None);
        assert_eq!(odd.display_time(), "yesterday-ish");
    }
}
