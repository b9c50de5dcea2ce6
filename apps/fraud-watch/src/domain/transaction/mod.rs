//! Scored Transaction Types
//!
//! Canonical representation of a transaction scored by the external
//! prediction service, and the normalization of its loosely-typed fraud
//! fields into a single [`RiskSignal`].
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "id": "TX17195321450001",
//!   "source": "ACC482913",
//!   "target": "ACC193844",
//!   "amount": 1284.55,
//!   "timestamp": 1719532145000,
//!   "source_latitude": 48.85, "source_longitude": 2.35,
//!   "target_latitude": 40.71, "target_longitude": -74.00,
//!   "is_fraud": false,
//!   "prediction": true,
//!   "fraud_probability": 0.82,
//!   "status": "hot_potential",
//!   "features": { "risk_score": 0.77 }
//! }
//! ```
//!
//! Every fraud field is optional; at least `source`, `target` and `amount`
//! must be present.

mod signal;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use signal::{FraudSignal, FraudStatus, RiskBand, RiskSignal};

/// Account identifier as reported by the feed.
pub type AccountId = String;

/// Epoch values at or above this are interpreted as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

// =============================================================================
// Errors
// =============================================================================

/// Reasons a payload cannot become a [`TransactionRecord`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// A required identifier is empty.
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// Amount is negative.
    #[error("amount must not be negative: {0}")]
    NegativeAmount(Decimal),

    /// Probability outside `[0, 1]` or not a number.
    #[error("`{field}` must be within [0, 1], got {value}")]
    ProbabilityOutOfRange {
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Coordinate outside the valid range.
    #[error("invalid {field}: {value}")]
    InvalidCoordinate {
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Timestamp could not be interpreted.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Identifier is neither a string nor a number.
    #[error("invalid transaction id: {0}")]
    InvalidId(String),
}

// =============================================================================
// Geo
// =============================================================================

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in [-90, 90].
    pub latitude: f64,
    /// Longitude in [-180, 180].
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point from optional wire fields.
    ///
    /// Returns `Ok(None)` unless both components are present.
    fn from_parts(
        latitude: Option<f64>,
        longitude: Option<f64>,
        lat_field: &'static str,
        lon_field: &'static str,
    ) -> Result<Option<Self>, RecordError> {
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            return Ok(None);
        };
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(RecordError::InvalidCoordinate {
                field: lat_field,
                value: latitude,
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(RecordError::InvalidCoordinate {
                field: lon_field,
                value: longitude,
            });
        }
        Ok(Some(Self {
            latitude,
            longitude,
        }))
    }
}

// =============================================================================
// Transaction Record
// =============================================================================

/// Predictor feature block; only the risk score is consumed.
#[derive(Debug, Clone, Default, Deserialize)]
struct PredictorFeatures {
    #[serde(default)]
    risk_score: Option<f64>,
}

/// Transaction exactly as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
struct RawTransaction {
    id: serde_json::Value,
    source: String,
    target: String,
    amount: Decimal,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
    #[serde(default)]
    source_latitude: Option<f64>,
    #[serde(default)]
    source_longitude: Option<f64>,
    #[serde(default)]
    target_latitude: Option<f64>,
    #[serde(default)]
    target_longitude: Option<f64>,
    #[serde(default)]
    is_fraud: Option<bool>,
    #[serde(default)]
    prediction: Option<bool>,
    #[serde(default)]
    fraud_probability: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    features: Option<PredictorFeatures>,
}

/// A validated, scored transaction.
///
/// Deserializes from the feed's JSON shape; invalid payloads are rejected
/// with a [`RecordError`] message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawTransaction")]
pub struct TransactionRecord {
    /// Transaction identifier (not necessarily unique across the feed).
    pub id: String,
    /// Paying account.
    pub source: AccountId,
    /// Receiving account.
    pub target: AccountId,
    /// Transferred amount.
    pub amount: Decimal,
    /// Event time, when the feed provides one.
    pub timestamp: Option<DateTime<Utc>>,
    /// Location of the paying account.
    pub source_location: Option<GeoPoint>,
    /// Location of the receiving account.
    pub target_location: Option<GeoPoint>,
    /// Raw fraud fields from the predictor.
    pub signal: FraudSignal,
}

impl TryFrom<RawTransaction> for TransactionRecord {
    type Error = RecordError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        let id = match raw.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(RecordError::InvalidId(other.to_string())),
        };
        if id.is_empty() {
            return Err(RecordError::EmptyField("id"));
        }
        if raw.source.is_empty() {
            return Err(RecordError::EmptyField("source"));
        }
        if raw.target.is_empty() {
            return Err(RecordError::EmptyField("target"));
        }
        if raw.amount.is_sign_negative() && !raw.amount.is_zero() {
            return Err(RecordError::NegativeAmount(raw.amount));
        }

        let fraud_probability = check_probability("fraud_probability", raw.fraud_probability)?;
        let risk_score = check_probability(
            "features.risk_score",
            raw.features.and_then(|f| f.risk_score),
        )?;

        let source_location = GeoPoint::from_parts(
            raw.source_latitude,
            raw.source_longitude,
            "source_latitude",
            "source_longitude",
        )?;
        let target_location = GeoPoint::from_parts(
            raw.target_latitude,
            raw.target_longitude,
            "target_latitude",
            "target_longitude",
        )?;

        let timestamp = raw.timestamp.map(parse_timestamp).transpose()?.flatten();

        Ok(Self {
            id,
            source: raw.source,
            target: raw.target,
            amount: raw.amount,
            timestamp,
            source_location,
            target_location,
            signal: FraudSignal {
                is_fraud: raw.is_fraud,
                prediction: raw.prediction,
                fraud_probability,
                status: raw.status.as_deref().map(FraudStatus::parse),
                risk_score,
            },
        })
    }
}

impl TransactionRecord {
    /// Create a record with no fraud fields, location or timestamp.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source: impl Into<AccountId>,
        target: impl Into<AccountId>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            amount,
            timestamp: None,
            source_location: None,
            target_location: None,
            signal: FraudSignal::default(),
        }
    }

    /// Set the fraud probability.
    #[must_use]
    pub const fn with_probability(mut self, probability: f64) -> Self {
        self.signal.fraud_probability = Some(probability);
        self
    }

    /// Set the confirmed-fraud flag.
    #[must_use]
    pub const fn with_fraud_flag(mut self, is_fraud: bool) -> Self {
        self.signal.is_fraud = Some(is_fraud);
        self
    }

    /// Set the predictor's boolean prediction.
    #[must_use]
    pub const fn with_prediction(mut self, prediction: bool) -> Self {
        self.signal.prediction = Some(prediction);
        self
    }

    /// Set the status enum.
    #[must_use]
    pub fn with_status(mut self, status: FraudStatus) -> Self {
        self.signal.status = Some(status);
        self
    }

    /// Set the event timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set both endpoint locations.
    #[must_use]
    pub const fn with_locations(mut self, source: GeoPoint, target: GeoPoint) -> Self {
        self.source_location = Some(source);
        self.target_location = Some(target);
        self
    }

    /// Decode one record from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error, which carries the [`RecordError`]
    /// message when validation fails.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn check_probability(field: &'static str, value: Option<f64>) -> Result<Option<f64>, RecordError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => {
            Err(RecordError::ProbabilityOutOfRange { field, value: v })
        }
        other => Ok(other),
    }
}

/// Interpret the feed's timestamp.
///
/// Numbers are Unix epoch seconds, or milliseconds when large enough to
/// be. Strings may be RFC 3339, a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` taken as
/// UTC, or a number in text form. `null` means no timestamp.
fn parse_timestamp(value: serde_json::Value) -> Result<Option<DateTime<Utc>>, RecordError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch)
            .map(Some)
            .ok_or_else(|| RecordError::InvalidTimestamp(n.to_string())),
        serde_json::Value::String(s) => parse_timestamp_str(&s)
            .map(Some)
            .ok_or(RecordError::InvalidTimestamp(s)),
        other => Err(RecordError::InvalidTimestamp(other.to_string())),
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    s.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    use super::*;

    fn decode(value: serde_json::Value) -> Result<TransactionRecord, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn decodes_feed_transaction() {
        let record = decode(json!({
            "id": "TX1",
            "source": "ACC1",
            "target": "ACC2",
            "amount": 1284.55,
            "timestamp": 1_719_532_145_000_i64,
            "source_latitude": 48.85,
            "source_longitude": 2.35,
            "target_latitude": 40.71,
            "target_longitude": -74.0,
            "is_fraud": false,
            "prediction": true,
            "type": "transaction",
            "features": { "risk_score": 0.77, "hour": 3 }
        }))
        .unwrap();

        assert_eq!(record.id, "TX1");
        assert_eq!(record.amount, Decimal::new(128_455, 2));
        assert_eq!(record.signal.prediction, Some(true));
        assert_eq!(record.signal.risk_score, Some(0.77));
        assert_eq!(record.source_location.unwrap().latitude, 48.85);
        assert_eq!(record.timestamp.unwrap().year(), 2024);
    }

    #[test]
    fn numeric_id_is_stringified() {
        let record = decode(json!({"id": 42, "source": "A", "target": "B", "amount": 1})).unwrap();
        assert_eq!(record.id, "42");
    }

    #[test]
    fn missing_target_is_rejected() {
        assert!(decode(json!({"id": "t", "source": "A", "amount": 1})).is_err());
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = decode(json!({"id": "t", "source": "", "target": "B", "amount": 1})).unwrap_err();
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn probability_out_of_range_is_rejected() {
        let err = decode(json!({
            "id": "t", "source": "A", "target": "B", "amount": 1, "fraud_probability": 1.5
        }))
        .unwrap_err();
        assert!(err.to_string().contains("fraud_probability"));
    }

    #[test]
    fn partial_coordinates_are_ignored() {
        let record = decode(json!({
            "id": "t", "source": "A", "target": "B", "amount": 1, "source_latitude": 10.0
        }))
        .unwrap();
        assert!(record.source_location.is_none());
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        assert!(
            decode(json!({
                "id": "t", "source": "A", "target": "B", "amount": 1,
                "target_latitude": 91.0, "target_longitude": 0.0
            }))
            .is_err()
        );
    }

    #[test]
    fn timestamp_formats() {
        let rfc = parse_timestamp(json!("2024-06-28T03:15:00Z")).unwrap().unwrap();
        assert_eq!(rfc.hour(), 3);

        let naive = parse_timestamp(json!("2024-06-28 17:15:00")).unwrap().unwrap();
        assert_eq!(naive.hour(), 17);

        let seconds = parse_timestamp(json!(1_719_544_500)).unwrap().unwrap();
        let millis = parse_timestamp(json!(1_719_544_500_000_i64)).unwrap().unwrap();
        assert_eq!(seconds, millis);

        assert!(parse_timestamp(json!(null)).unwrap().is_none());
        assert!(parse_timestamp(json!("yesterday")).is_err());
    }

    #[test]
    fn status_is_parsed() {
        let record = decode(json!({
            "id": "t", "source": "A", "target": "B", "amount": "10.50", "status": "HOT_POTENTIAL"
        }))
        .unwrap();
        assert_eq!(record.signal.status, Some(FraudStatus::HotPotential));
        assert_eq!(record.amount, Decimal::new(1050, 2));
    }
}
