pub mod cluster;
pub mod details;
pub mod format;
pub mod shape;

pub use cluster::*;
pub use details::*;
pub use shape::*;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute names used by the backend payloads.
pub mod field {
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const AGE: &str = "age";
    pub const GENDER: &str = "gender";
    pub const COUNTRY: &str = "country";
    pub const REGISTRATION_DATE: &str = "registration_date";

    pub const PREMIUM_AMOUNT: &str = "premium_amount";
    pub const RISK_PROFILE: &str = "risk_profile";
    pub const COVERAGE_LEVEL: &str = "coverage_level";
    pub const CAR_BRAND: &str = "car_brand";
    pub const SIMILARITY_SCORE: &str = "similarity_score";
    pub const CLUSTER_NAME: &str = "cluster_name";

    pub const POLICY_ID: &str = "policy_id";
    pub const START_DATE: &str = "start_date";
    pub const PAYMENT_FREQUENCY: &str = "payment_frequency";
    pub const DEDUCTIBLE: &str = "deductible";
    pub const HAS_SECOND_DRIVER: &str = "has_second_driver";
    pub const NUM_ACCIDENTS: &str = "num_accidents";
    pub const YEARS_WITH_LICENSE: &str = "years_with_license";
    pub const HAS_GARAGE: &str = "has_garage";
    pub const CAR_MODEL: &str = "car_model";
    pub const CAR_YEAR: &str = "car_year";
    pub const CUSTOMER_DESCRIPTION: &str = "customer_description";
}

/// One customer row as returned by the backend.
///
/// The payload shape varies by endpoint, so the record keeps the raw JSON
/// object and exposes typed accessors. A `null` value is treated exactly like
/// a missing key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerRecord(Map<String, Value>);

impl CustomerRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn customer_id(&self) -> Option<String> {
        self.text(field::CUSTOMER_ID)
    }

    /// Scalar value rendered as plain text. Objects and arrays yield `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(num) => Some(format::number(num)),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    /// Numeric value; numeric strings are accepted since some backends
    /// serialize decimals as text.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(num) => num.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|value| value.is_finite())
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(flag) => Some(*flag),
            Value::Number(num) => num.as_i64().map(|value| value != 0),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for CustomerRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}
