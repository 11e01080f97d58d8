//! Applies a verified, resolved, sequenced, operator-confirmed draft to
//! the catalog in dependency order inside one transaction, then re-reads
//! what was written and asserts it matches the draft.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use voyage_core::domain::{Amenity, ImportRun, ItineraryStop, Location, Trip, TripStatus, Venue};
use voyage_core::storage::Catalog;
use voyage_core::{ImportError, Result};

use super::resolve::LocationPlan;
use super::DecisionLog;
use crate::draft::{Draft, LocationRef, ResolutionStage};

/// What one committed import produced.
#[derive(Debug, Clone)]
pub struct ImportReceipt {
    pub trip_id: Uuid,
    pub run_id: Uuid,
    pub stop_count: usize,
    pub locations_created: usize,
    pub locations_updated: usize,
    pub venues_created: usize,
    pub amenities_created: usize,
}

pub struct ImportExecutor<'a> {
    catalog: &'a dyn Catalog,
}

fn stop_images_by_location(draft: &Draft) -> HashMap<Uuid, String> {
    let mut images = HashMap::new();
    for stop in draft.stops() {
        if let (LocationRef::Resolved(id), Some(url)) = (&stop.location, &stop.image_url) {
            images.entry(*id).or_insert_with(|| url.clone());
        }
    }
    images
}

fn attach_stop_image(location: &mut Location, images: &HashMap<Uuid, String>) {
    if location.image_url.is_some() {
        return;
    }
    if let Some(url) = location.id.and_then(|id| images.get(&id)) {
        location.image_url = Some(url.clone());
    }
}

impl<'a> ImportExecutor<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    /// Persist the draft as one logical unit. Dependency order: operator
    /// and vessel, venues and amenities, locations, the trip row (status
    /// fixed to preview), then stops with strictly increasing unique
    /// `(trip, day)` pairs, plus the audit row. If any step fails the
    /// transaction is dropped and no effect is visible to readers.
    pub async fn execute(
        &self,
        draft: &Draft,
        plans: &[LocationPlan],
        log: &DecisionLog,
    ) -> Result<ImportReceipt> {
        self.ensure_ready(draft)?;
        let started_at = Utc::now();

        let mut txn = self.catalog.begin().await?;

        let (operator_id, _) = txn
            .find_or_create_operator(&draft.trip().operator_name)
            .await?;
        let (vessel_id, _) = txn
            .find_or_create_vessel(
                &draft.trip().vessel_name,
                draft.trip().vessel_kind,
                operator_id,
            )
            .await?;

        let mut venues_created = 0usize;
        for venue in draft.venues() {
            let (_, created) = txn
                .find_or_create_venue(&Venue {
                    id: None,
                    vessel_id,
                    name: venue.name.clone(),
                    venue_type: venue.venue_type.clone(),
                    description: venue.description.clone(),
                    created_at: Utc::now(),
                })
                .await?;
            if created {
                venues_created += 1;
            }
        }

        let mut amenities_created = 0usize;
        for amenity in draft.amenities() {
            let (_, created) = txn
                .find_or_create_amenity(&Amenity {
                    id: None,
                    vessel_id,
                    name: amenity.name.clone(),
                    description: amenity.description.clone(),
                    created_at: Utc::now(),
                })
                .await?;
            if created {
                amenities_created += 1;
            }
        }

        // Stop images were rewritten to internal URLs after the plans
        // were drawn up, so fold them in here before the writes.
        let stop_images = stop_images_by_location(draft);
        let mut locations_created = 0usize;
        let mut locations_updated = 0usize;
        for plan in plans {
            match plan {
                LocationPlan::Create { location } => {
                    let mut location = location.clone();
                    attach_stop_image(&mut location, &stop_images);
                    txn.create_location(&location).await?;
                    locations_created += 1;
                }
                LocationPlan::Merge { location } => {
                    let mut location = location.clone();
                    attach_stop_image(&mut location, &stop_images);
                    txn.update_location(&location).await?;
                    locations_updated += 1;
                }
                LocationPlan::UseExisting { id, .. } => {
                    // no research changed, but a relocated stop image may
                    // still belong on a location that has none
                    if let Some(url) = stop_images.get(id) {
                        if let Some(mut location) = self.catalog.get_location_by_id(*id).await? {
                            if location.image_url.is_none() {
                                location.image_url = Some(url.clone());
                                txn.update_location(&location).await?;
                                locations_updated += 1;
                            }
                        }
                    }
                }
            }
        }

        // Status is pinned here: an import never creates a published trip.
        let trip_id = txn
            .create_trip(&Trip {
                id: None,
                name: draft.trip().name.clone(),
                slug: draft.trip().slug.clone(),
                vessel_id,
                start_date: draft.trip().start_date.clone(),
                end_date: draft.trip().end_date.clone(),
                status: TripStatus::Preview,
                hero_image_url: draft.trip().hero_image_url.clone(),
                created_at: Utc::now(),
            })
            .await?;

        for stop in draft.stops() {
            let location_id = match &stop.location {
                LocationRef::Resolved(id) => *id,
                _ => {
                    return Err(ImportError::Persistence(format!(
                        "stop on day {} reached the executor unresolved",
                        stop.day
                    )))
                }
            };
            let kind = stop.kind.ok_or_else(|| {
                ImportError::Persistence(format!("stop on day {} has no kind", stop.day))
            })?;
            txn.create_stop(&ItineraryStop {
                id: None,
                trip_id,
                day: stop.day,
                location_id,
                kind,
                arrival_time: stop.arrival_time.clone(),
                departure_time: stop.departure_time.clone(),
                all_aboard_time: stop.all_aboard_time.clone(),
                created_at: Utc::now(),
            })
            .await?;
        }

        let run_id = txn
            .create_import_run(&ImportRun {
                id: None,
                name: format!("import:{}", draft.trip().slug),
                decision_log: log.entries().to_vec(),
                started_at,
                finished_at: Some(Utc::now()),
            })
            .await?;

        txn.commit().await?;
        debug!("Import transaction committed for trip {}", trip_id);

        let receipt = ImportReceipt {
            trip_id,
            run_id,
            stop_count: draft.stops().len(),
            locations_created,
            locations_updated,
            venues_created,
            amenities_created,
        };
        self.post_commit_check(draft, vessel_id, &receipt).await?;

        info!(
            "Imported trip '{}': {} stop(s), {} location(s) created, {} updated",
            draft.trip().name,
            receipt.stop_count,
            receipt.locations_created,
            receipt.locations_updated
        );
        Ok(receipt)
    }

    fn ensure_ready(&self, draft: &Draft) -> Result<()> {
        if draft.trip().status != TripStatus::Preview {
            return Err(ImportError::Persistence(
                "drafts are only ever imported in preview status".to_string(),
            ));
        }
        for stop in draft.stops() {
            if stop.stage != ResolutionStage::Sequenced {
                return Err(ImportError::Persistence(format!(
                    "stop on day {} has not been sequenced",
                    stop.day
                )));
            }
        }
        Ok(())
    }

    /// Re-read what was written and assert it matches the draft counts.
    /// A mismatch fails the run even though the statements succeeded.
    async fn post_commit_check(
        &self,
        draft: &Draft,
        vessel_id: Uuid,
        receipt: &ImportReceipt,
    ) -> Result<()> {
        let trip = self
            .catalog
            .get_trip_by_slug(&draft.trip().slug)
            .await?
            .ok_or_else(|| {
                ImportError::Persistence(format!(
                    "post-commit check: trip '{}' not readable after commit",
                    draft.trip().slug
                ))
            })?;
        if trip.status != TripStatus::Preview {
            return Err(ImportError::Persistence(
                "post-commit check: trip was not stored in preview status".to_string(),
            ));
        }

        let stops = self.catalog.get_stops_by_trip_id(receipt.trip_id).await?;
        if stops.len() != draft.stops().len() {
            return Err(ImportError::Persistence(format!(
                "post-commit check: expected {} stop(s), found {}",
                draft.stops().len(),
                stops.len()
            )));
        }
        for (i, stop) in stops.iter().enumerate() {
            let expected_day = (i + 1) as u32;
            if stop.day != expected_day {
                return Err(ImportError::Persistence(format!(
                    "post-commit check: stop days not dense, found day {} at position {}",
                    stop.day,
                    i + 1
                )));
            }
        }

        let venues = self.catalog.get_venues_by_vessel_id(vessel_id).await?;
        if venues.len() < draft.venues().len() {
            return Err(ImportError::Persistence(format!(
                "post-commit check: expected at least {} venue(s), found {}",
                draft.venues().len(),
                venues.len()
            )));
        }
        let amenities = self.catalog.get_amenities_by_vessel_id(vessel_id).await?;
        if amenities.len() < draft.amenities().len() {
            return Err(ImportError::Persistence(format!(
                "post-commit check: expected at least {} amenity(ies), found {}",
                draft.amenities().len(),
                amenities.len()
            )));
        }
        debug!("Post-commit check passed for trip {}", receipt.trip_id);
        Ok(())
    }
}
