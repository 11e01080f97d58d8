use crate::common::error::Result;
use crate::domain::*;
use async_trait::async_trait;
use uuid::Uuid;

/// Read side of the persisted catalog (locations, venues, amenities,
/// trips, stops) plus the entry point for an atomic write transaction.
///
/// Find-or-create against this catalog is a read-modify-write pattern
/// that assumes a single operator and a single run at a time; concurrent
/// runs must be serialized by the caller.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_port_locations(&self) -> Result<Vec<Location>>;
    async fn get_location_by_id(&self, id: Uuid) -> Result<Option<Location>>;

    /// The fixed sea-day placeholder pool, ordered by slot. The pipeline
    /// never adds members to this set.
    async fn sea_day_pool(&self) -> Result<Vec<Location>>;

    async fn get_trip_by_slug(&self, slug: &str) -> Result<Option<Trip>>;
    async fn get_stops_by_trip_id(&self, trip_id: Uuid) -> Result<Vec<ItineraryStop>>;
    async fn get_venues_by_vessel_id(&self, vessel_id: Uuid) -> Result<Vec<Venue>>;
    async fn get_amenities_by_vessel_id(&self, vessel_id: Uuid) -> Result<Vec<Amenity>>;

    /// Open a write transaction. Nothing written through the transaction
    /// is visible to readers until [`CatalogTransaction::commit`] returns
    /// successfully; dropping the transaction discards every write.
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>>;
}

/// Write side of one import. Find-or-create operations return the entity
/// id plus whether a row was created.
#[async_trait]
pub trait CatalogTransaction: Send {
    async fn find_or_create_operator(&mut self, name: &str) -> Result<(Uuid, bool)>;
    async fn find_or_create_vessel(
        &mut self,
        name: &str,
        kind: VesselKind,
        operator_id: Uuid,
    ) -> Result<(Uuid, bool)>;
    async fn find_or_create_venue(&mut self, venue: &Venue) -> Result<(Uuid, bool)>;
    async fn find_or_create_amenity(&mut self, amenity: &Amenity) -> Result<(Uuid, bool)>;

    async fn create_location(&mut self, location: &Location) -> Result<Uuid>;
    async fn update_location(&mut self, location: &Location) -> Result<()>;

    /// Fails when a trip with the same slug already exists.
    async fn create_trip(&mut self, trip: &Trip) -> Result<Uuid>;

    /// Fails on a duplicate `(trip_id, day)` pair.
    async fn create_stop(&mut self, stop: &ItineraryStop) -> Result<Uuid>;

    async fn create_import_run(&mut self, run: &ImportRun) -> Result<Uuid>;

    /// Publish every write of this transaction as one unit.
    async fn commit(self: Box<Self>) -> Result<()>;
}
