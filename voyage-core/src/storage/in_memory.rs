use super::traits::{Catalog, CatalogTransaction};
use crate::common::error::{ImportError, Result};
use crate::domain::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogState {
    operators: HashMap<Uuid, Operator>,
    vessels: HashMap<Uuid, Vessel>,
    venues: HashMap<Uuid, Venue>,
    amenities: HashMap<Uuid, Amenity>,
    locations: HashMap<Uuid, Location>,
    trips: HashMap<Uuid, Trip>,
    stops: HashMap<Uuid, ItineraryStop>,
    import_runs: HashMap<Uuid, ImportRun>,
}

/// In-memory catalog with snapshot-commit write transactions: a
/// transaction works on a private copy of the state and swaps it in on
/// commit, so readers never observe a partially applied import.
///
/// Doubles as the CLI's persistent catalog through a JSON snapshot on
/// disk ([`InMemoryCatalog::load_from_path`] / [`save_to_path`]).
pub struct InMemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
    // When Some(n), the nth subsequent transactional write fails. Used by
    // tests to prove commit atomicity.
    write_budget: Arc<Mutex<Option<u32>>>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CatalogState::default())),
            write_budget: Arc::new(Mutex::new(None)),
        }
    }

    /// Load a catalog snapshot, or start empty when the file is missing.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No catalog snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let bytes = std::fs::read(path)?;
        let state: CatalogState = serde_json::from_slice(&bytes)?;
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            write_budget: Arc::new(Mutex::new(None)),
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let state = self.state.lock().unwrap();
        let bytes = serde_json::to_vec_pretty(&*state)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Seed one location directly, outside any import run. Bootstrap and
    /// test helper; pipeline writes go through [`Catalog::begin`].
    pub fn seed_location(&self, mut location: Location) -> Uuid {
        let id = location.id.unwrap_or_else(Uuid::new_v4);
        location.id = Some(id);
        self.state.lock().unwrap().locations.insert(id, location);
        id
    }

    /// Seed `count` sea-day placeholder slots (slot 1..=count), skipping
    /// slots that already exist.
    pub fn seed_sea_day_pool(&self, count: u8) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for slot in 1..=count {
            let existing = {
                let state = self.state.lock().unwrap();
                state
                    .locations
                    .values()
                    .find(|l| l.kind == LocationKind::SeaDayPlaceholder { slot })
                    .and_then(|l| l.id)
            };
            let id = match existing {
                Some(id) => id,
                None => self.seed_location(Location {
                    id: None,
                    name: format!("Day at Sea {}", slot),
                    country: String::new(),
                    region: None,
                    top_attractions: Vec::new(),
                    venues_of_interest: Vec::new(),
                    image_url: None,
                    kind: LocationKind::SeaDayPlaceholder { slot },
                    created_at: chrono::Utc::now(),
                }),
            };
            ids.push(id);
        }
        ids
    }

    /// Make the nth subsequent transactional write fail with a
    /// persistence error. Test hook for atomicity scenarios.
    pub fn fail_after_writes(&self, n: u32) {
        *self.write_budget.lock().unwrap() = Some(n);
    }

    pub fn trip_count(&self) -> usize {
        self.state.lock().unwrap().trips.len()
    }

    pub fn location_count(&self) -> usize {
        self.state.lock().unwrap().locations.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn list_port_locations(&self) -> Result<Vec<Location>> {
        let state = self.state.lock().unwrap();
        let mut ports: Vec<Location> = state
            .locations
            .values()
            .filter(|l| l.kind == LocationKind::Port)
            .cloned()
            .collect();
        ports.sort_by_key(|l| l.id);
        Ok(ports)
    }

    async fn get_location_by_id(&self, id: Uuid) -> Result<Option<Location>> {
        Ok(self.state.lock().unwrap().locations.get(&id).cloned())
    }

    async fn sea_day_pool(&self) -> Result<Vec<Location>> {
        let state = self.state.lock().unwrap();
        let mut pool: Vec<(u8, Location)> = state
            .locations
            .values()
            .filter_map(|l| match l.kind {
                LocationKind::SeaDayPlaceholder { slot } => Some((slot, l.clone())),
                LocationKind::Port => None,
            })
            .collect();
        pool.sort_by_key(|(slot, _)| *slot);
        Ok(pool.into_iter().map(|(_, l)| l).collect())
    }

    async fn get_trip_by_slug(&self, slug: &str) -> Result<Option<Trip>> {
        let state = self.state.lock().unwrap();
        Ok(state.trips.values().find(|t| t.slug == slug).cloned())
    }

    async fn get_stops_by_trip_id(&self, trip_id: Uuid) -> Result<Vec<ItineraryStop>> {
        let state = self.state.lock().unwrap();
        let mut stops: Vec<ItineraryStop> = state
            .stops
            .values()
            .filter(|s| s.trip_id == trip_id)
            .cloned()
            .collect();
        stops.sort_by_key(|s| s.day);
        Ok(stops)
    }

    async fn get_venues_by_vessel_id(&self, vessel_id: Uuid) -> Result<Vec<Venue>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .venues
            .values()
            .filter(|v| v.vessel_id == vessel_id)
            .cloned()
            .collect())
    }

    async fn get_amenities_by_vessel_id(&self, vessel_id: Uuid) -> Result<Vec<Amenity>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .amenities
            .values()
            .filter(|a| a.vessel_id == vessel_id)
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>> {
        let working = self.state.lock().unwrap().clone();
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.state),
            working,
            write_budget: Arc::clone(&self.write_budget),
        }))
    }
}

struct InMemoryTransaction {
    shared: Arc<Mutex<CatalogState>>,
    working: CatalogState,
    write_budget: Arc<Mutex<Option<u32>>>,
}

impl InMemoryTransaction {
    fn charge_write(&self) -> Result<()> {
        let mut budget = self.write_budget.lock().unwrap();
        if let Some(remaining) = budget.as_mut() {
            if *remaining == 0 {
                return Err(ImportError::Persistence(
                    "simulated write failure".to_string(),
                ));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogTransaction for InMemoryTransaction {
    async fn find_or_create_operator(&mut self, name: &str) -> Result<(Uuid, bool)> {
        if let Some(existing) = self
            .working
            .operators
            .values()
            .find(|o| o.name.eq_ignore_ascii_case(name))
        {
            return Ok((existing.id.expect("persisted operator has id"), false));
        }
        self.charge_write()?;
        let id = Uuid::new_v4();
        self.working.operators.insert(
            id,
            Operator {
                id: Some(id),
                name: name.to_string(),
                created_at: chrono::Utc::now(),
            },
        );
        debug!("Created operator: {} with id {}", name, id);
        Ok((id, true))
    }

    async fn find_or_create_vessel(
        &mut self,
        name: &str,
        kind: VesselKind,
        operator_id: Uuid,
    ) -> Result<(Uuid, bool)> {
        if let Some(existing) = self
            .working
            .vessels
            .values()
            .find(|v| v.name.eq_ignore_ascii_case(name) && v.operator_id == operator_id)
        {
            return Ok((existing.id.expect("persisted vessel has id"), false));
        }
        self.charge_write()?;
        let id = Uuid::new_v4();
        self.working.vessels.insert(
            id,
            Vessel {
                id: Some(id),
                name: name.to_string(),
                kind,
                operator_id,
                created_at: chrono::Utc::now(),
            },
        );
        debug!("Created vessel: {} with id {}", name, id);
        Ok((id, true))
    }

    async fn find_or_create_venue(&mut self, venue: &Venue) -> Result<(Uuid, bool)> {
        if let Some(existing) = self.working.venues.values().find(|v| {
            v.vessel_id == venue.vessel_id && v.name.eq_ignore_ascii_case(&venue.name)
        }) {
            return Ok((existing.id.expect("persisted venue has id"), false));
        }
        self.charge_write()?;
        let id = venue.id.unwrap_or_else(Uuid::new_v4);
        let mut venue = venue.clone();
        venue.id = Some(id);
        self.working.venues.insert(id, venue);
        Ok((id, true))
    }

    async fn find_or_create_amenity(&mut self, amenity: &Amenity) -> Result<(Uuid, bool)> {
        if let Some(existing) = self.working.amenities.values().find(|a| {
            a.vessel_id == amenity.vessel_id && a.name.eq_ignore_ascii_case(&amenity.name)
        }) {
            return Ok((existing.id.expect("persisted amenity has id"), false));
        }
        self.charge_write()?;
        let id = amenity.id.unwrap_or_else(Uuid::new_v4);
        let mut amenity = amenity.clone();
        amenity.id = Some(id);
        self.working.amenities.insert(id, amenity);
        Ok((id, true))
    }

    async fn create_location(&mut self, location: &Location) -> Result<Uuid> {
        self.charge_write()?;
        let id = location.id.unwrap_or_else(Uuid::new_v4);
        if self.working.locations.contains_key(&id) {
            return Err(ImportError::Persistence(format!(
                "location {} already exists",
                id
            )));
        }
        let mut location = location.clone();
        location.id = Some(id);
        debug!("Created location: {} with id {}", location.name, id);
        self.working.locations.insert(id, location);
        Ok(id)
    }

    async fn update_location(&mut self, location: &Location) -> Result<()> {
        self.charge_write()?;
        let id = location
            .id
            .ok_or_else(|| ImportError::Persistence("location update without id".to_string()))?;
        if !self.working.locations.contains_key(&id) {
            return Err(ImportError::Persistence(format!(
                "location {} not found for update",
                id
            )));
        }
        self.working.locations.insert(id, location.clone());
        Ok(())
    }

    async fn create_trip(&mut self, trip: &Trip) -> Result<Uuid> {
        self.charge_write()?;
        if self.working.trips.values().any(|t| t.slug == trip.slug) {
            return Err(ImportError::Persistence(format!(
                "trip with slug '{}' already exists",
                trip.slug
            )));
        }
        let id = trip.id.unwrap_or_else(Uuid::new_v4);
        let mut trip = trip.clone();
        trip.id = Some(id);
        debug!("Created trip: {} with id {}", trip.name, id);
        self.working.trips.insert(id, trip);
        Ok(id)
    }

    async fn create_stop(&mut self, stop: &ItineraryStop) -> Result<Uuid> {
        self.charge_write()?;
        let duplicate = self
            .working
            .stops
            .values()
            .any(|s| s.trip_id == stop.trip_id && s.day == stop.day);
        if duplicate {
            return Err(ImportError::Persistence(format!(
                "stop for trip {} day {} already exists",
                stop.trip_id, stop.day
            )));
        }
        let id = stop.id.unwrap_or_else(Uuid::new_v4);
        let mut stop = stop.clone();
        stop.id = Some(id);
        self.working.stops.insert(id, stop);
        Ok(id)
    }

    async fn create_import_run(&mut self, run: &ImportRun) -> Result<Uuid> {
        self.charge_write()?;
        let id = run.id.unwrap_or_else(Uuid::new_v4);
        let mut run = run.clone();
        run.id = Some(id);
        self.working.import_runs.insert(id, run);
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        *shared = self.working;
        debug!("Committed catalog transaction");
        Ok(())
    }
}
