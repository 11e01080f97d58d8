//! Renders the full-batch preview shown at the single human checkpoint
//! before any persistence occurs.

use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;
use voyage_core::domain::StopKind;
use voyage_core::storage::Catalog;
use voyage_core::Result;

use crate::draft::{Draft, LocationRef};
use crate::pipeline::resolve::LocationPlan;

#[derive(Debug, Clone)]
pub struct PreviewStop {
    pub day: u32,
    pub location_name: String,
    pub kind: StopKind,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub all_aboard_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PreviewSummary {
    pub trip_name: String,
    pub trip_slug: String,
    pub vessel_name: String,
    pub start_date: String,
    pub end_date: String,
    pub stops: Vec<PreviewStop>,
    pub new_locations: Vec<String>,
    pub updated_locations: Vec<String>,
    pub venue_count: usize,
    pub amenity_count: usize,
    pub hero_image_url: Option<String>,
}

impl PreviewSummary {
    /// Assemble the preview from the sequenced draft and the resolution
    /// plan. Names for pool-assigned sea days come from the catalog.
    pub async fn build(
        draft: &Draft,
        plans: &[LocationPlan],
        catalog: &dyn Catalog,
    ) -> Result<Self> {
        let mut names: HashMap<Uuid, String> = plans
            .iter()
            .map(|p| (p.location_id(), p.display_name().to_string()))
            .collect();

        let mut stops = Vec::with_capacity(draft.stops().len());
        for stop in draft.stops() {
            let location_name = match &stop.location {
                LocationRef::Resolved(id) => match names.get(id) {
                    Some(name) => name.clone(),
                    None => {
                        let name = catalog
                            .get_location_by_id(*id)
                            .await?
                            .map(|l| l.name)
                            .unwrap_or_else(|| id.to_string());
                        names.insert(*id, name.clone());
                        name
                    }
                },
                LocationRef::SeaDay => "Day at Sea".to_string(),
                LocationRef::Unresolved(name) => name.clone(),
            };
            stops.push(PreviewStop {
                day: stop.day,
                location_name,
                kind: stop.kind.unwrap_or(StopKind::PortOfCall),
                arrival_time: stop.arrival_time.clone(),
                departure_time: stop.departure_time.clone(),
                all_aboard_time: stop.all_aboard_time.clone(),
            });
        }

        Ok(Self {
            trip_name: draft.trip().name.clone(),
            trip_slug: draft.trip().slug.clone(),
            vessel_name: draft.trip().vessel_name.clone(),
            start_date: draft.trip().start_date.clone(),
            end_date: draft.trip().end_date.clone(),
            stops,
            new_locations: plans
                .iter()
                .filter(|p| matches!(p, LocationPlan::Create { .. }))
                .map(|p| p.display_name().to_string())
                .collect(),
            updated_locations: plans
                .iter()
                .filter(|p| matches!(p, LocationPlan::Merge { .. }))
                .map(|p| p.display_name().to_string())
                .collect(),
            venue_count: draft.venues().len(),
            amenity_count: draft.amenities().len(),
            hero_image_url: draft.trip().hero_image_url.clone(),
        })
    }
}

impl fmt::Display for PreviewSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Import preview: {} ({}) aboard {}",
            self.trip_name, self.trip_slug, self.vessel_name
        )?;
        writeln!(f, "  {} through {}", self.start_date, self.end_date)?;
        writeln!(f, "  Itinerary:")?;
        for stop in &self.stops {
            writeln!(
                f,
                "    day {:>2}  {:<24} {:<20} arrive {:<6} depart {:<6} all aboard {}",
                stop.day,
                stop.location_name,
                format!("{:?}", stop.kind),
                stop.arrival_time.as_deref().unwrap_or("-"),
                stop.departure_time.as_deref().unwrap_or("-"),
                stop.all_aboard_time.as_deref().unwrap_or("-"),
            )?;
        }
        if !self.new_locations.is_empty() {
            writeln!(f, "  New locations: {}", self.new_locations.join(", "))?;
        }
        if !self.updated_locations.is_empty() {
            writeln!(
                f,
                "  Updated locations: {}",
                self.updated_locations.join(", ")
            )?;
        }
        writeln!(
            f,
            "  {} venue(s), {} amenity(ies)",
            self.venue_count, self.amenity_count
        )?;
        if let Some(hero) = &self.hero_image_url {
            writeln!(f, "  Hero image: {}", hero)?;
        }
        write!(f, "  Trip will be created with status: preview")
    }
}
