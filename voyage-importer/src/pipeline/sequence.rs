//! Final day numbering and stop-kind assignment: embarkation and
//! disembarkation bookends, overnight-pair rewriting, sea-day pool
//! allocation, and all-aboard derivation. Operates only on stops the
//! resolver has already assigned (or sea-day sentinels); violations are
//! hard errors, never auto-fixed.

use tracing::{debug, info};
use voyage_core::domain::StopKind;
use voyage_core::storage::Catalog;
use voyage_core::{ImportError, Result};

use crate::draft::{all_aboard_from, Draft, LocationRef, ResolutionStage};

pub const DEFAULT_ALL_ABOARD_BUFFER_MINUTES: i64 = 30;

pub struct ItinerarySequencer {
    all_aboard_buffer_minutes: i64,
}

impl Default for ItinerarySequencer {
    fn default() -> Self {
        Self::new(DEFAULT_ALL_ABOARD_BUFFER_MINUTES)
    }
}

impl ItinerarySequencer {
    pub fn new(all_aboard_buffer_minutes: i64) -> Self {
        Self {
            all_aboard_buffer_minutes,
        }
    }

    /// Sequence the draft in place. Idempotent: re-running over an
    /// already-sequenced draft yields the same stops.
    pub async fn sequence(&self, draft: &mut Draft, catalog: &dyn Catalog) -> Result<()> {
        self.ensure_resolved(draft)?;
        self.ensure_contiguous_days(draft)?;
        self.allocate_sea_days(draft, catalog).await?;
        self.assign_base_kinds(draft);
        self.pair_overnights(draft)?;
        self.derive_all_aboard(draft)?;

        for stop in draft.stops_mut() {
            stop.stage = ResolutionStage::Sequenced;
        }
        info!("Sequenced {} stop(s)", draft.stops().len());
        Ok(())
    }

    fn ensure_resolved(&self, draft: &Draft) -> Result<()> {
        for stop in draft.stops() {
            if let LocationRef::Unresolved(name) = &stop.location {
                return Err(ImportError::Sequencing(format!(
                    "stop on day {} ('{}') has not been resolved",
                    stop.day, name
                )));
            }
        }
        Ok(())
    }

    fn ensure_contiguous_days(&self, draft: &Draft) -> Result<()> {
        let mut days: Vec<u32> = draft.stops().iter().map(|s| s.day).collect();
        days.sort_unstable();
        for (i, day) in days.iter().enumerate() {
            let expected = (i + 1) as u32;
            if *day != expected {
                return Err(ImportError::Sequencing(format!(
                    "day numbers must be contiguous 1..{}, found {:?}",
                    draft.stops().len(),
                    days
                )));
            }
        }
        Ok(())
    }

    /// Replace sea-day sentinels, strictly in trip order, with successive
    /// members of the placeholder pool. The pool is never grown.
    async fn allocate_sea_days(&self, draft: &mut Draft, catalog: &dyn Catalog) -> Result<()> {
        let pool = catalog.sea_day_pool().await?;
        let needed = draft
            .stops()
            .iter()
            .filter(|s| s.location == LocationRef::SeaDay)
            .count();
        if needed > pool.len() {
            return Err(ImportError::Sequencing(format!(
                "sea-day pool exhausted: trip requires {} sea day(s), pool has {} slot(s)",
                needed,
                pool.len()
            )));
        }

        let mut next_slot = 0usize;
        for stop in draft.stops_mut() {
            if stop.location == LocationRef::SeaDay {
                let placeholder = &pool[next_slot];
                let id = placeholder.id.ok_or_else(|| {
                    ImportError::Sequencing("sea-day pool member has no id".to_string())
                })?;
                debug!(
                    "Sea day on day {} assigned pool slot {} ({})",
                    stop.day,
                    next_slot + 1,
                    placeholder.name
                );
                stop.location = LocationRef::Resolved(id);
                stop.kind = Some(StopKind::SeaDay);
                stop.stage = ResolutionStage::LocationAssigned;
                next_slot += 1;
            }
        }
        Ok(())
    }

    fn assign_base_kinds(&self, draft: &mut Draft) {
        let last = draft.stops().len().saturating_sub(1);
        for (i, stop) in draft.stops_mut().iter_mut().enumerate() {
            if stop.kind == Some(StopKind::SeaDay) {
                continue;
            }
            stop.kind = Some(if i == 0 {
                StopKind::Embarkation
            } else if i == last {
                StopKind::Disembarkation
            } else {
                StopKind::PortOfCall
            });
        }
    }

    /// Two consecutive port-of-call stops at the same location form one
    /// overnight stay: the first keeps its arrival, the second keeps its
    /// departure. Only `PortOfCall` pairs are rewritten, so embarkation
    /// and disembarkation days are never absorbed and re-running the
    /// pairing is idempotent.
    fn pair_overnights(&self, draft: &mut Draft) -> Result<()> {
        let stops = draft.stops_mut();
        let mut i = 0;
        while i + 1 < stops.len() {
            let same_location = matches!(
                (&stops[i].location, &stops[i + 1].location),
                (LocationRef::Resolved(a), LocationRef::Resolved(b)) if a == b
            );
            let both_ports = stops[i].kind == Some(StopKind::PortOfCall)
                && stops[i + 1].kind == Some(StopKind::PortOfCall);
            if same_location && both_ports {
                debug!(
                    "Overnight stay across days {} and {}",
                    stops[i].day,
                    stops[i + 1].day
                );
                stops[i].kind = Some(StopKind::OvernightArrival);
                stops[i].departure_time = None;
                stops[i].all_aboard_time = None;
                stops[i + 1].kind = Some(StopKind::OvernightDeparture);
                stops[i + 1].arrival_time = None;
                i += 2;
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    fn derive_all_aboard(&self, draft: &mut Draft) -> Result<()> {
        let buffer = self.all_aboard_buffer_minutes;
        for stop in draft.stops_mut() {
            stop.all_aboard_time = match &stop.departure_time {
                Some(dep) => Some(all_aboard_from(dep, buffer)?),
                None => None,
            };
        }
        Ok(())
    }
}
