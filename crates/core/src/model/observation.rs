//! Measurements and attachments logged against a record: vital signs, body-map pain
//! entries and document metadata. They are only ever added, never edited.

use chrono::{DateTime, Utc};
use fisio_types::{NonEmptyText, VasScore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{PatientError, PatientResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSigns {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub record_id: Option<Uuid>,
    #[serde(default)]
    pub systolic_pressure: Option<u16>,
    #[serde(default)]
    pub diastolic_pressure: Option<u16>,
    #[serde(default)]
    pub heart_rate: Option<u16>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub oxygen_saturation: Option<u8>,
    #[serde(default)]
    pub weight_kg: Option<f32>,
    #[serde(default)]
    pub height_cm: Option<f32>,
    #[serde(default)]
    pub notes: Option<String>,
    pub measured_at: DateTime<Utc>,
}

impl VitalSigns {
    /// "120/80" when both pressures are known.
    pub fn blood_pressure(&self) -> Option<String> {
        Some(format!(
            "{}/{}",
            self.systolic_pressure?, self.diastolic_pressure?
        ))
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(bp) = self.blood_pressure() {
            parts.push(format!("PA {bp} mmHg"));
        }
        if let Some(hr) = self.heart_rate {
            parts.push(format!("FC {hr} bpm"));
        }
        if let Some(t) = self.temperature {
            parts.push(format!("T {t:.1} °C"));
        }
        if let Some(spo2) = self.oxygen_saturation {
            parts.push(format!("SpO2 {spo2}%"));
        }
        if let Some(w) = self.weight_kg {
            parts.push(format!("peso {w:.1} kg"));
        }
        if parts.is_empty() {
            "Vital signs recorded".to_owned()
        } else {
            parts.join(", ")
        }
    }
}

/// Input for logging vital signs.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVitalSigns {
    pub systolic_pressure: Option<u16>,
    pub diastolic_pressure: Option<u16>,
    pub heart_rate: Option<u16>,
    pub temperature: Option<f32>,
    pub oxygen_saturation: Option<u8>,
    pub weight_kg: Option<f32>,
    pub height_cm: Option<f32>,
    pub notes: Option<String>,
    /// Defaults to now.
    pub measured_at: Option<DateTime<Utc>>,
}

impl NewVitalSigns {
    pub(crate) fn validate(&self) -> PatientResult<()> {
        if let (Some(sys), Some(dia)) = (self.systolic_pressure, self.diastolic_pressure) {
            if dia >= sys {
                return Err(PatientError::InvalidInput(format!(
                    "diastolic pressure {dia} must be below systolic {sys}"
                )));
            }
        }
        if self.oxygen_saturation.is_some_and(|s| s > 100) {
            return Err(PatientError::InvalidInput(
                "oxygen saturation is a percentage (0-100)".into(),
            ));
        }
        if self.temperature.is_some_and(|t| !(30.0..=45.0).contains(&t)) {
            return Err(PatientError::InvalidInput(
                "temperature must be between 30 and 45 °C".into(),
            ));
        }
        let positive = |v: Option<f32>| v.map_or(true, |v| v > 0.0);
        if !positive(self.weight_kg) || !positive(self.height_cm) {
            return Err(PatientError::InvalidInput(
                "weight and height must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodySide {
    Left,
    Right,
    Bilateral,
    Central,
}

impl FromStr for BodySide {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LEFT" | "L" | "SX" => Ok(BodySide::Left),
            "RIGHT" | "R" | "DX" => Ok(BodySide::Right),
            "BILATERAL" | "B" => Ok(BodySide::Bilateral),
            "CENTRAL" | "C" => Ok(BodySide::Central),
            other => Err(PatientError::InvalidInput(format!("unknown body side '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyMapping {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub record_id: Uuid,
    pub body_region: NonEmptyText,
    #[serde(default)]
    pub side: Option<BodySide>,
    #[serde(default)]
    pub pain_intensity: Option<VasScore>,
    #[serde(default)]
    pub pain_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBodyMapping {
    pub body_region: String,
    pub side: Option<BodySide>,
    pub pain_intensity: Option<i64>,
    pub pain_type: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentCategory {
    Referral,
    Imaging,
    Report,
    Consent,
    Invoice,
    Other,
}

impl FromStr for DocumentCategory {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REFERRAL" => Ok(DocumentCategory::Referral),
            "IMAGING" => Ok(DocumentCategory::Imaging),
            "REPORT" => Ok(DocumentCategory::Report),
            "CONSENT" => Ok(DocumentCategory::Consent),
            "INVOICE" => Ok(DocumentCategory::Invoice),
            "OTHER" => Ok(DocumentCategory::Other),
            other => Err(PatientError::InvalidInput(format!(
                "unknown document category '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentCategory::Referral => "REFERRAL",
            DocumentCategory::Imaging => "IMAGING",
            DocumentCategory::Report => "REPORT",
            DocumentCategory::Consent => "CONSENT",
            DocumentCategory::Invoice => "INVOICE",
            DocumentCategory::Other => "OTHER",
        })
    }
}

/// Metadata of an uploaded file. The bytes live elsewhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub record_id: Option<Uuid>,
    pub file_name: NonEmptyText,
    pub category: DocumentCategory,
    #[serde(default)]
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub file_name: String,
    pub category: DocumentCategory,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}
