use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trip visibility. The import pipeline only ever writes `Preview`;
/// publishing is a separate editorial action outside the importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Preview,
    Published,
}

/// The role one itinerary day plays within a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Embarkation,
    Disembarkation,
    PortOfCall,
    SeaDay,
    OvernightArrival,
    OvernightDeparture,
}

/// Catalog locations are either real ports or one of the fixed sea-day
/// placeholder slots. The pipeline never creates placeholder members;
/// it only consumes them in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Port,
    SeaDayPlaceholder { slot: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VesselKind {
    Ship,
    Resort,
}

/// A reusable place in the catalog. Created once, referenced by many
/// stops across many trips. Research fields are merged in place only
/// when an operator approves an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Option<Uuid>,
    pub name: String,
    pub country: String,
    pub region: Option<String>,
    pub top_attractions: Vec<String>,
    pub venues_of_interest: Vec<String>,
    pub image_url: Option<String>,
    pub kind: LocationKind,
    pub created_at: DateTime<Utc>,
}

impl Location {
    /// Merge newly supplied research into this location. Union semantics:
    /// list entries are appended when unseen (case-insensitive), and a
    /// non-empty existing value is never overwritten by an empty one.
    /// Returns true when anything changed.
    pub fn merge_research(
        &mut self,
        attractions: &[String],
        venues_of_interest: &[String],
        country: Option<&str>,
        region: Option<&str>,
        image_url: Option<&str>,
    ) -> bool {
        let mut changed = false;
        changed |= union_into(&mut self.top_attractions, attractions);
        changed |= union_into(&mut self.venues_of_interest, venues_of_interest);

        if self.country.trim().is_empty() {
            if let Some(c) = country.filter(|c| !c.trim().is_empty()) {
                self.country = c.trim().to_string();
                changed = true;
            }
        }
        if self.region.is_none() {
            if let Some(r) = region.filter(|r| !r.trim().is_empty()) {
                self.region = Some(r.trim().to_string());
                changed = true;
            }
        }
        if self.image_url.is_none() {
            if let Some(u) = image_url.filter(|u| !u.trim().is_empty()) {
                self.image_url = Some(u.trim().to_string());
                changed = true;
            }
        }
        changed
    }
}

fn union_into(existing: &mut Vec<String>, incoming: &[String]) -> bool {
    let mut changed = false;
    for item in incoming {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let seen = existing
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(item));
        if !seen {
            existing.push(item.to_string());
            changed = true;
        }
    }
    changed
}

/// Cruise line or resort brand; parent of a [`Vessel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: Option<Uuid>,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A ship or resort. Venues and amenities are scoped to one vessel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vessel {
    pub id: Option<Uuid>,
    pub name: String,
    pub kind: VesselKind,
    pub operator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Option<Uuid>,
    pub vessel_id: Uuid,
    pub name: String,
    pub venue_type: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amenity {
    pub id: Option<Uuid>,
    pub vessel_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One imported trip. Date fields are destination-local wall-clock
/// strings in `YYYY-MM-DD HH:MM:SS` form and are never parsed into
/// timezone-aware instants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub vessel_id: Uuid,
    pub start_date: String,
    pub end_date: String,
    pub status: TripStatus,
    pub hero_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One itinerary day. `(trip_id, day)` is unique; days are dense 1..N.
/// Times are wall-clock `HH:MM` strings stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryStop {
    pub id: Option<Uuid>,
    pub trip_id: Uuid,
    pub day: u32,
    pub location_id: Uuid,
    pub kind: StopKind,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub all_aboard_time: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit row for one pipeline run, persisted with the batch so operator
/// decisions made during resolution remain traceable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: Option<Uuid>,
    pub name: String,
    pub decision_log: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str) -> Location {
        Location {
            id: Some(Uuid::new_v4()),
            name: name.to_string(),
            country: "Greece".to_string(),
            region: None,
            top_attractions: vec!["Acropolis".to_string()],
            venues_of_interest: Vec::new(),
            image_url: None,
            kind: LocationKind::Port,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn merge_unions_lists_without_duplicates() {
        let mut loc = port("Athens");
        let changed = loc.merge_research(
            &["acropolis".to_string(), "Plaka".to_string()],
            &["Taverna X".to_string()],
            None,
            None,
            None,
        );
        assert!(changed);
        // case-insensitive dedupe keeps the existing entry
        assert_eq!(loc.top_attractions, vec!["Acropolis", "Plaka"]);
        assert_eq!(loc.venues_of_interest, vec!["Taverna X"]);
    }

    #[test]
    fn merge_never_overwrites_non_empty_with_empty() {
        let mut loc = port("Athens");
        let changed = loc.merge_research(&[], &[], Some(""), None, None);
        assert!(!changed);
        assert_eq!(loc.country, "Greece");
    }

    #[test]
    fn merge_fills_missing_scalar_fields() {
        let mut loc = port("Athens");
        loc.country = String::new();
        let changed = loc.merge_research(
            &[],
            &[],
            Some("Greece"),
            Some("Attica"),
            Some("https://example.com/athens.jpg"),
        );
        assert!(changed);
        assert_eq!(loc.country, "Greece");
        assert_eq!(loc.region.as_deref(), Some("Attica"));
        assert!(loc.image_url.is_some());
    }
}
