//! In-memory staged representation of one import batch. Built fresh per
//! run from a [`SourceDocument`], then either fully committed or fully
//! discarded; never partially retained.

use uuid::Uuid;
use voyage_core::domain::{StopKind, TripStatus, VesselKind};
use voyage_core::{ImportError, Result};

use crate::source::{SourceDocument, SourceStop};

/// Resolution progress of one staged stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    Unresolved,
    LocationAssigned,
    Sequenced,
}

/// Where a staged stop points: a raw place name awaiting resolution, the
/// sea-day sentinel awaiting a pool slot, or a catalog location id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationRef {
    Unresolved(String),
    SeaDay,
    Resolved(Uuid),
}

#[derive(Debug, Clone)]
pub struct DraftTrip {
    pub name: String,
    pub slug: String,
    pub operator_name: String,
    pub vessel_name: String,
    pub vessel_kind: VesselKind,
    /// Canonical `YYYY-MM-DD HH:MM:SS` wall-clock string.
    pub start_date: String,
    pub end_date: String,
    pub status: TripStatus,
    pub hero_image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DraftStop {
    pub day: u32,
    pub location: LocationRef,
    pub stage: ResolutionStage,
    pub kind: Option<StopKind>,
    /// Wall-clock `HH:MM`, destination-local, stored verbatim.
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub all_aboard_time: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub top_attractions: Vec<String>,
    pub venues_of_interest: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DraftVenue {
    pub name: String,
    pub venue_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DraftAmenity {
    pub name: String,
    pub description: Option<String>,
}

/// The unit of work for one import run. Read accessors only; mutation
/// happens through the pipeline components via the crate-visible
/// mutators.
#[derive(Debug, Clone)]
pub struct Draft {
    trip: DraftTrip,
    stops: Vec<DraftStop>,
    venues: Vec<DraftVenue>,
    amenities: Vec<DraftAmenity>,
}

impl Draft {
    /// Build a draft from the source description, normalizing obvious
    /// representational issues: whitespace is trimmed, trip dates are
    /// coerced to canonical `YYYY-MM-DD HH:MM:SS` strings, stop times to
    /// `HH:MM`. Stops are ordered by day and given provisional kinds
    /// (first day embarkation, last day disembarkation, sea days, ports)
    /// that the sequencer later finalizes.
    pub fn from_source(doc: &SourceDocument) -> Result<Self> {
        let trip = DraftTrip {
            name: require_text(&doc.trip.name, "trip name")?,
            slug: require_text(&doc.trip.slug, "trip slug")?,
            operator_name: require_text(&doc.trip.operator_name, "operator name")?,
            vessel_name: require_text(&doc.trip.vessel_name, "vessel name")?,
            vessel_kind: doc.trip.vessel_kind,
            start_date: normalize_datetime(&doc.trip.start_date)?,
            end_date: normalize_datetime(&doc.trip.end_date)?,
            status: TripStatus::Preview,
            hero_image_url: trimmed_opt(doc.trip.hero_image_url.as_deref()),
        };

        let mut stops = doc
            .stops
            .iter()
            .map(stop_from_source)
            .collect::<Result<Vec<_>>>()?;
        stops.sort_by_key(|s| s.day);

        let last = stops.len().saturating_sub(1);
        for (i, stop) in stops.iter_mut().enumerate() {
            stop.kind = Some(match (&stop.location, i) {
                (LocationRef::SeaDay, _) => StopKind::SeaDay,
                (_, 0) => StopKind::Embarkation,
                (_, n) if n == last => StopKind::Disembarkation,
                _ => StopKind::PortOfCall,
            });
        }

        let venues = doc
            .venues
            .iter()
            .map(|v| {
                Ok(DraftVenue {
                    name: require_text(&v.name, "venue name")?,
                    venue_type: v.venue_type.trim().to_string(),
                    description: trimmed_opt(v.description.as_deref()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let amenities = doc
            .amenities
            .iter()
            .map(|a| {
                Ok(DraftAmenity {
                    name: require_text(&a.name, "amenity name")?,
                    description: trimmed_opt(a.description.as_deref()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trip,
            stops,
            venues,
            amenities,
        })
    }

    pub fn trip(&self) -> &DraftTrip {
        &self.trip
    }

    pub fn stops(&self) -> &[DraftStop] {
        &self.stops
    }

    pub fn venues(&self) -> &[DraftVenue] {
        &self.venues
    }

    pub fn amenities(&self) -> &[DraftAmenity] {
        &self.amenities
    }

    pub(crate) fn trip_mut(&mut self) -> &mut DraftTrip {
        &mut self.trip
    }

    pub(crate) fn stops_mut(&mut self) -> &mut [DraftStop] {
        &mut self.stops
    }
}

fn stop_from_source(row: &SourceStop) -> Result<DraftStop> {
    if row.day == 0 {
        return Err(ImportError::Source(
            "stop day numbers start at 1".to_string(),
        ));
    }
    let location = if row.sea_day {
        LocationRef::SeaDay
    } else {
        let name = row
            .location
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ImportError::Source(format!("stop on day {} has no location name", row.day))
            })?;
        LocationRef::Unresolved(name.to_string())
    };

    Ok(DraftStop {
        day: row.day,
        location,
        stage: ResolutionStage::Unresolved,
        kind: None,
        arrival_time: row
            .arrival_time
            .as_deref()
            .map(normalize_time)
            .transpose()?,
        departure_time: row
            .departure_time
            .as_deref()
            .map(normalize_time)
            .transpose()?,
        all_aboard_time: None,
        country: trimmed_opt(row.country.as_deref()),
        region: trimmed_opt(row.region.as_deref()),
        top_attractions: trimmed_list(&row.top_attractions),
        venues_of_interest: trimmed_list(&row.venues_of_interest),
        image_url: trimmed_opt(row.image_url.as_deref()),
    })
}

fn require_text(raw: &str, what: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ImportError::Source(format!("{} is empty", what)));
    }
    Ok(trimmed.to_string())
}

fn trimmed_opt(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn trimmed_list(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Coerce a date-like string into the canonical `YYYY-MM-DD HH:MM:SS`
/// wall-clock form. Accepts date-only, minute precision, and ISO `T`
/// separators. Never produces a timezone-aware value.
pub fn normalize_datetime(raw: &str) -> Result<String> {
    use chrono::{NaiveDate, NaiveDateTime};

    let raw = raw.trim();
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(format!("{} 00:00:00", d.format("%Y-%m-%d")));
    }
    Err(ImportError::Source(format!(
        "unrecognized date/time: '{}'",
        raw
    )))
}

/// Coerce a wall-clock time into `HH:MM`.
pub fn normalize_time(raw: &str) -> Result<String> {
    use chrono::NaiveTime;

    let raw = raw.trim();
    const TIME_FORMATS: [&str; 4] = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];
    for fmt in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
            return Ok(t.format("%H:%M").to_string());
        }
    }
    Err(ImportError::Source(format!(
        "unrecognized wall-clock time: '{}'",
        raw
    )))
}

/// Derive the all-aboard time: departure minus the fixed buffer.
pub fn all_aboard_from(departure: &str, buffer_minutes: i64) -> Result<String> {
    use chrono::{Duration, NaiveTime};

    let t = NaiveTime::parse_from_str(departure.trim(), "%H:%M").map_err(|_| {
        ImportError::Source(format!("unparseable departure time: '{}'", departure))
    })?;
    let all_aboard = t - Duration::minutes(buffer_minutes);
    Ok(all_aboard.format("%H:%M").to_string())
}
