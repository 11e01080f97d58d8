use serde::{Deserialize, Serialize};
use std::path::Path;
use voyage_core::domain::VesselKind;
use voyage_core::{ImportError, Result};

/// Operator-supplied structured document describing one trip to import.
/// All date/time fields are plain strings; nothing here is parsed into a
/// timezone-aware value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub trip: SourceTrip,
    #[serde(default)]
    pub stops: Vec<SourceStop>,
    #[serde(default)]
    pub venues: Vec<SourceVenue>,
    #[serde(default)]
    pub amenities: Vec<SourceAmenity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTrip {
    pub name: String,
    pub slug: String,
    pub operator_name: String,
    pub vessel_name: String,
    #[serde(default = "default_vessel_kind")]
    pub vessel_kind: VesselKind,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub hero_image_url: Option<String>,
}

fn default_vessel_kind() -> VesselKind {
    VesselKind::Ship
}

/// One itinerary row as extracted from the source description. A sea day
/// carries no location name; everything else names a place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStop {
    pub day: u32,
    #[serde(default)]
    pub sea_day: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub top_attractions: Vec<String>,
    #[serde(default)]
    pub venues_of_interest: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVenue {
    pub name: String,
    pub venue_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAmenity {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SourceDocument {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let doc: SourceDocument = serde_json::from_slice(bytes)?;
        if doc.stops.is_empty() {
            return Err(ImportError::Source(
                "source document has no stops".to_string(),
            ));
        }
        Ok(doc)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_deserializes_with_defaults() {
        let json = r#"{
            "trip": {
                "name": "Aegean Odyssey",
                "slug": "aegean-odyssey",
                "operator_name": "Azure Lines",
                "vessel_name": "MV Meltemi",
                "start_date": "2025-08-21",
                "end_date": "2025-08-25"
            },
            "stops": [
                { "day": 1, "location": "Athens" }
            ]
        }"#;
        let doc = SourceDocument::from_json_slice(json.as_bytes()).unwrap();
        assert_eq!(doc.trip.vessel_kind, VesselKind::Ship);
        assert_eq!(doc.stops.len(), 1);
        assert!(!doc.stops[0].sea_day);
        assert!(doc.venues.is_empty());
    }

    #[test]
    fn document_without_stops_is_rejected() {
        let json = r#"{
            "trip": {
                "name": "Empty",
                "slug": "empty",
                "operator_name": "Azure Lines",
                "vessel_name": "MV Meltemi",
                "start_date": "2025-08-21",
                "end_date": "2025-08-25"
            }
        }"#;
        let err = SourceDocument::from_json_slice(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::Source(_)));
    }
}
