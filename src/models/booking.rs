use serde::{Serialize, Deserialize};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::TokenId;

/// Incoming booking request as posted by a client. Not persisted;
/// validated and normalized into a `BookingRecord` at admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub service: String,
    #[serde(default)]
    pub addon: Option<String>,
    pub total_price: f64,
    pub date: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    pub token: TokenId,
}

/// Identifies one bookable appointment window. The full
/// (date, start, end) triple is the conflict key everywhere; a request
/// without an end time normalizes it to the empty string so the key
/// shape is uniform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

impl SlotKey {
    pub fn new(date: &str, start_time: &str, end_time: &str) -> Self {
        SlotKey {
            date: date.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.end_time.is_empty() {
            write!(f, "{} {}", self.date, self.start_time)
        } else {
            write!(f, "{} {}-{}", self.date, self.start_time, self.end_time)
        }
    }
}

/// Committed booking. Immutable once written; exactly one exists per
/// consumed token and per slot key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub service: String,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub addon: Option<String>,
    #[serde(default)]
    pub addon_name: Option<String>,
    pub total_price: f64,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub token: TokenId,
    pub created_at: DateTime<Utc>,
}

impl BookingRecord {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(&self.date, &self.start_time, &self.end_time)
    }
}

impl BookingRequest {
    /// Field-level validation. Runs before any state is touched; the
    /// returned message goes to the caller verbatim.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.service.trim().is_empty() {
            return Err("service must not be empty".to_string());
        }
        if self.token.as_str().trim().is_empty() {
            return Err("token must not be empty".to_string());
        }
        if NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").is_err() {
            return Err(format!("invalid date '{}', expected YYYY-MM-DD", self.date));
        }
        if NaiveTime::parse_from_str(&self.start_time, "%H:%M").is_err() {
            return Err(format!("invalid start_time '{}', expected HH:MM", self.start_time));
        }
        if let Some(end) = &self.end_time {
            if NaiveTime::parse_from_str(end, "%H:%M").is_err() {
                return Err(format!("invalid end_time '{}', expected HH:MM", end));
            }
        }
        if !self.total_price.is_finite() || self.total_price < 0.0 {
            return Err("total_price must be a non-negative number".to_string());
        }
        Ok(())
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(
            &self.date,
            &self.start_time,
            self.end_time.as_deref().unwrap_or(""),
        )
    }

    /// Builds the record that admission will commit. Display names stay
    /// empty here; the catalog fills them in later if it can.
    pub fn into_record(self) -> BookingRecord {
        let end_time = self.end_time.unwrap_or_default();
        BookingRecord {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            phone: self.phone,
            service: self.service,
            service_name: None,
            addon: self.addon,
            addon_name: None,
            total_price: self.total_price,
            date: self.date,
            start_time: self.start_time,
            end_time,
            token: self.token,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BookingRequest {
        BookingRequest {
            name: "A".to_string(),
            phone: None,
            service: "lash-fill".to_string(),
            addon: None,
            total_price: 500.0,
            date: "2024-05-01".to_string(),
            start_time: "10:00".to_string(),
            end_time: Some("10:30".to_string()),
            token: TokenId::new("tok-1"),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn bad_date_rejected() {
        let mut req = request();
        req.date = "01.05.2024".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn bad_time_rejected() {
        let mut req = request();
        req.start_time = "10am".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn negative_price_rejected() {
        let mut req = request();
        req.total_price = -1.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn missing_end_time_normalizes_to_empty() {
        let mut req = request();
        req.end_time = None;
        assert_eq!(req.slot_key(), SlotKey::new("2024-05-01", "10:00", ""));
    }
}
