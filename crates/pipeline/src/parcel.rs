//! Land-parcel input: the loose wire form and the validated domain form.
//!
//! [`ParcelSubmission`] is what the HTTP boundary deserializes. Every field is
//! optional so that a missing attribute is reported by name instead of
//! surfacing as an opaque JSON error. [`ParcelSubmission::validate`] turns it
//! into a [`LandParcel`]; blank optional classification fields stay blank
//! until [`LandParcel::with_defaults`] fills them when a task is normalized.
//!
//! Field names are accepted in snake_case, camelCase, and the Korean labels
//! used by the land registry forms the service was originally built around.

use serde::{Deserialize, Serialize};

use crate::errors::InvalidParcel;
use crate::types::{AssessmentScores, Score};

/// Default for [`LandParcel::land_category`] when the submission omits it.
pub const DEFAULT_LAND_CATEGORY: &str = "unspecified";

/// Default for [`LandParcel::zoning_district`] when the submission omits it.
pub const DEFAULT_ZONING_DISTRICT: &str = "not designated";

/// Raw parcel attributes as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParcelSubmission {
    /// Street or lot address (주소).
    #[serde(default, alias = "주소")]
    pub address: Option<String>,

    /// Cadastral land category (지목).
    #[serde(default, alias = "landCategory", alias = "지목")]
    pub land_category: Option<String>,

    /// Zoning classification (용도지역).
    #[serde(default, alias = "zone", alias = "용도지역")]
    pub zoning: Option<String>,

    /// Zoning district overlay (용도지구).
    #[serde(default, alias = "zoningDistrict", alias = "용도지구")]
    pub zoning_district: Option<String>,

    /// Current land-use category (토지이용상황).
    #[serde(default, alias = "landUse", alias = "토지이용상황")]
    pub land_use: Option<String>,

    /// Terrain elevation class (지형고저).
    #[serde(default, alias = "지형고저")]
    pub terrain: Option<String>,

    /// Lot shape (형상).
    #[serde(default, alias = "형상")]
    pub shape: Option<String>,

    /// Road frontage type (도로접면).
    #[serde(default, alias = "roadFrontage", alias = "도로접면")]
    pub road_frontage: Option<String>,

    /// Assessed official unit price in KRW per square metre (공시지가).
    #[serde(default, alias = "unitPrice", alias = "공시지가")]
    pub unit_price: Option<u64>,

    /// Optional location ratings.
    #[serde(default, alias = "analyze_data", alias = "analyzeData")]
    pub scores: Option<ScoreSubmission>,
}

/// Raw assessment scores; each missing score falls back to its default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ScoreSubmission {
    #[serde(default, alias = "입지조건")]
    pub location: Option<Score>,
    #[serde(default, alias = "인프라")]
    pub infrastructure: Option<Score>,
    #[serde(default, alias = "안정성")]
    pub stability: Option<Score>,
}

impl ScoreSubmission {
    fn resolve(self) -> AssessmentScores {
        let defaults = AssessmentScores::default();
        AssessmentScores {
            location: self.location.unwrap_or(defaults.location),
            infrastructure: self.infrastructure.unwrap_or(defaults.infrastructure),
            stability: self.stability.unwrap_or(defaults.stability),
        }
    }
}

/// A validated land parcel. Immutable once a task has been created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandParcel {
    pub address: String,
    pub land_category: String,
    pub zoning: String,
    pub zoning_district: String,
    pub land_use: String,
    pub terrain: String,
    pub shape: String,
    pub road_frontage: String,
    pub unit_price: u64,
    pub scores: AssessmentScores,
}

impl ParcelSubmission {
    /// Checks structural completeness and produces a [`LandParcel`].
    ///
    /// A required text field that is absent or blank is reported as missing.
    /// All missing fields are collected so the caller can fix them in one go.
    pub fn validate(self) -> Result<LandParcel, InvalidParcel> {
        let mut missing = Vec::new();

        let mut required = |name: &'static str, value: Option<String>| -> String {
            match value.map(|v| v.trim().to_string()) {
                Some(v) if !v.is_empty() => v,
                _ => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let address = required("address", self.address);
        let zoning = required("zoning", self.zoning);
        let land_use = required("land_use", self.land_use);
        let terrain = required("terrain", self.terrain);
        let shape = required("shape", self.shape);
        let road_frontage = required("road_frontage", self.road_frontage);

        let unit_price = match self.unit_price {
            Some(price) => price,
            None => {
                missing.push("unit_price");
                0
            }
        };

        if !missing.is_empty() {
            return Err(InvalidParcel { missing });
        }

        Ok(LandParcel {
            address,
            land_category: trimmed(self.land_category),
            zoning,
            zoning_district: trimmed(self.zoning_district),
            land_use,
            terrain,
            shape,
            road_frontage,
            unit_price,
            scores: self.scores.unwrap_or_default().resolve(),
        })
    }
}

impl LandParcel {
    /// Fills blank optional classification fields with their defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.land_category.is_empty() {
            self.land_category = DEFAULT_LAND_CATEGORY.to_string();
        }
        if self.zoning_district.is_empty() {
            self.zoning_district = DEFAULT_ZONING_DISTRICT.to_string();
        }
        self
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn complete() -> ParcelSubmission {
        ParcelSubmission {
            address: Some("Dongin-dong 1-ga 2-1, Jung-gu, Daegu".into()),
            land_category: None,
            zoning: Some("central commercial".into()),
            zoning_district: None,
            land_use: Some("business".into()),
            terrain: Some("flat".into()),
            shape: Some("vertical rectangle".into()),
            road_frontage: Some("wide road corner".into()),
            unit_price: Some(3_735_000),
            scores: None,
        }
    }

    #[test]
    fn validation_leaves_optional_classification_blank() {
        let parcel = complete().validate().unwrap();
        assert_eq!(parcel.land_category, "");
        assert_eq!(parcel.zoning_district, "");
        assert_eq!(parcel.scores, AssessmentScores::default());
    }

    #[test]
    fn with_defaults_fills_only_blank_fields() {
        let parcel = ParcelSubmission {
            land_category: Some("  대 ".into()),
            ..complete()
        }
        .validate()
        .unwrap()
        .with_defaults();
        assert_eq!(parcel.land_category, "대");
        assert_eq!(parcel.zoning_district, DEFAULT_ZONING_DISTRICT);
        assert_eq!(parcel.clone().with_defaults(), parcel);
    }

    #[test]
    fn blank_required_fields_are_reported_as_missing() {
        let submission = ParcelSubmission {
            address: Some("   ".into()),
            shape: None,
            unit_price: None,
            ..complete()
        };
        let err = submission.validate().unwrap_err();
        assert_eq!(err.missing, vec!["address", "shape", "unit_price"]);
    }

    #[test]
    fn korean_field_names_are_accepted() {
        let json = serde_json::json!({
            "주소": "대구광역시 중구 동인동1가 2-1",
            "지목": "대",
            "용도지역": "중심상업지역",
            "용도지구": "지정되지않음",
            "토지이용상황": "업무용",
            "지형고저": "평지",
            "형상": "세로장방",
            "도로접면": "광대소각",
            "공시지가": 3735000
        });
        let parcel = serde_json::from_value::<ParcelSubmission>(json)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(parcel.address, "대구광역시 중구 동인동1가 2-1");
        assert_eq!(parcel.land_category, "대");
        assert_eq!(parcel.zoning_district, "지정되지않음");
        assert_eq!(parcel.unit_price, 3_735_000);
    }

    #[test]
    fn partial_scores_keep_remaining_defaults() {
        let json = serde_json::json!({ "location": 86 });
        let scores: ScoreSubmission = serde_json::from_value(json).unwrap();
        let submission = ParcelSubmission {
            scores: Some(scores),
            ..complete()
        };
        let parcel = submission.validate().unwrap();
        assert_eq!(parcel.scores.location.as_u8(), 86);
        assert_eq!(parcel.scores.infrastructure.as_u8(), 70);
        assert_eq!(parcel.scores.stability.as_u8(), 65);
    }
}
