//! Fuzzy entity resolution: match staged place names against the
//! persisted catalog so locations are never duplicated, escalating
//! ambiguous cases to the operator. The resolver performs no catalog
//! writes; it produces a plan the executor applies inside the commit
//! transaction.

use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;
use voyage_core::domain::{Location, LocationKind};
use voyage_core::storage::Catalog;
use voyage_core::{ImportError, Result};

use super::DecisionLog;
use crate::draft::{Draft, LocationRef, ResolutionStage};
use crate::operator::OperatorChannel;

/// Maximum candidates shown to the operator for one ambiguous name.
pub const MAX_PRESENTED_CANDIDATES: usize = 5;

/// One scored catalog match for a staged place name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCandidate {
    pub location_id: Uuid,
    pub name: String,
    pub score: u8,
}

/// The operator's verdict on an ambiguous name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateChoice {
    Existing(Uuid),
    CreateNew,
}

/// What the executor must do to the catalog for one staged place name.
#[derive(Debug, Clone)]
pub enum LocationPlan {
    /// Matched an existing location; nothing to write.
    UseExisting { id: Uuid, name: String },
    /// Matched an existing location and newly supplied research is
    /// merged into it (union, never overwriting non-empty with empty).
    Merge { location: Location },
    /// A new location, id pre-allocated so stops can reference it
    /// before anything is persisted.
    Create { location: Location },
}

impl LocationPlan {
    pub fn location_id(&self) -> Uuid {
        match self {
            LocationPlan::UseExisting { id, .. } => *id,
            LocationPlan::Merge { location } | LocationPlan::Create { location } => {
                location.id.expect("planned location has id")
            }
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            LocationPlan::UseExisting { name, .. } => name,
            LocationPlan::Merge { location } | LocationPlan::Create { location } => &location.name,
        }
    }
}

pub struct EntityResolver<'a> {
    catalog: &'a dyn Catalog,
    channel: &'a dyn OperatorChannel,
}

impl<'a> EntityResolver<'a> {
    pub fn new(catalog: &'a dyn Catalog, channel: &'a dyn OperatorChannel) -> Self {
        Self { catalog, channel }
    }

    /// Resolve every stop whose location is an unmatched name. Exact
    /// matches (score 100) resolve automatically; anything else goes to
    /// the operator, whose choice is final and recorded in the decision
    /// log. Sea-day sentinels are left for the sequencer's pool
    /// allocation.
    pub async fn resolve(
        &self,
        draft: &mut Draft,
        log: &mut DecisionLog,
    ) -> Result<Vec<LocationPlan>> {
        let ports = self.catalog.list_port_locations().await?;
        let mut plans: Vec<LocationPlan> = Vec::new();
        // staged name (lowercased) -> index into plans
        let mut planned: HashMap<String, usize> = HashMap::new();

        for idx in 0..draft.stops().len() {
            let name = match &draft.stops()[idx].location {
                LocationRef::Unresolved(name) => name.clone(),
                LocationRef::SeaDay | LocationRef::Resolved(_) => continue,
            };
            let key = name.to_lowercase();

            let plan_idx = match planned.get(&key) {
                Some(&existing) => {
                    // Same name staged twice (e.g. an overnight pair):
                    // fold this stop's research into the existing plan.
                    self.merge_stop_research(&mut plans[existing], draft, idx)
                        .await?;
                    existing
                }
                None => {
                    let plan = self.plan_for_name(&name, &ports, draft, idx, log).await?;
                    plans.push(plan);
                    planned.insert(key, plans.len() - 1);
                    plans.len() - 1
                }
            };

            let id = plans[plan_idx].location_id();
            let stop = &mut draft.stops_mut()[idx];
            stop.location = LocationRef::Resolved(id);
            stop.stage = ResolutionStage::LocationAssigned;
        }

        info!(
            "Resolved {} staged name(s): {} reused, {} merged, {} created",
            plans.len(),
            plans
                .iter()
                .filter(|p| matches!(p, LocationPlan::UseExisting { .. }))
                .count(),
            plans
                .iter()
                .filter(|p| matches!(p, LocationPlan::Merge { .. }))
                .count(),
            plans
                .iter()
                .filter(|p| matches!(p, LocationPlan::Create { .. }))
                .count(),
        );
        Ok(plans)
    }

    async fn plan_for_name(
        &self,
        name: &str,
        ports: &[Location],
        draft: &Draft,
        stop_idx: usize,
        log: &mut DecisionLog,
    ) -> Result<LocationPlan> {
        let ranked = rank_candidates(ports, name);
        debug!("'{}' has {} candidate(s)", name, ranked.len());

        let choice = match ranked.first() {
            Some(best) if best.score == 100 => {
                log.record(format!(
                    "'{}' resolved automatically to existing location {} (score 100)",
                    name, best.location_id
                ));
                CandidateChoice::Existing(best.location_id)
            }
            Some(_) => {
                let presented: Vec<RankedCandidate> = ranked
                    .iter()
                    .take(MAX_PRESENTED_CANDIDATES)
                    .cloned()
                    .collect();
                let choice = self.channel.choose_candidate(name, &presented).await?;
                match choice {
                    CandidateChoice::Existing(id) => {
                        if !presented.iter().any(|c| c.location_id == id) {
                            return Err(ImportError::Operator(format!(
                                "operator selected {} which was not a presented candidate",
                                id
                            )));
                        }
                        log.record(format!(
                            "operator matched '{}' to existing location {}",
                            name, id
                        ));
                    }
                    CandidateChoice::CreateNew => {
                        log.record(format!("operator chose to create a new location for '{}'", name));
                    }
                }
                choice
            }
            None => {
                log.record(format!(
                    "no catalog candidates for '{}'; creating new location",
                    name
                ));
                CandidateChoice::CreateNew
            }
        };

        let stop = &draft.stops()[stop_idx];
        match choice {
            CandidateChoice::Existing(id) => {
                let mut location = self
                    .catalog
                    .get_location_by_id(id)
                    .await?
                    .ok_or_else(|| {
                        ImportError::Operator(format!("selected location {} no longer exists", id))
                    })?;
                let changed = location.merge_research(
                    &stop.top_attractions,
                    &stop.venues_of_interest,
                    stop.country.as_deref(),
                    stop.region.as_deref(),
                    None,
                );
                if changed {
                    Ok(LocationPlan::Merge { location })
                } else {
                    Ok(LocationPlan::UseExisting {
                        id,
                        name: location.name,
                    })
                }
            }
            CandidateChoice::CreateNew => Ok(LocationPlan::Create {
                location: Location {
                    id: Some(Uuid::new_v4()),
                    name: name.to_string(),
                    country: stop.country.clone().unwrap_or_default(),
                    region: stop.region.clone(),
                    top_attractions: stop.top_attractions.clone(),
                    venues_of_interest: stop.venues_of_interest.clone(),
                    image_url: None,
                    kind: LocationKind::Port,
                    created_at: chrono::Utc::now(),
                },
            }),
        }
    }

    /// Fold a later stop's research into an already drawn-up plan for
    /// the same name. A `UseExisting` plan is upgraded to `Merge` when
    /// the new stop actually changes the stored location; an earlier
    /// no-op merge must not swallow research supplied later.
    async fn merge_stop_research(
        &self,
        plan: &mut LocationPlan,
        draft: &Draft,
        stop_idx: usize,
    ) -> Result<()> {
        let stop = &draft.stops()[stop_idx];
        match plan {
            LocationPlan::Merge { location } | LocationPlan::Create { location } => {
                location.merge_research(
                    &stop.top_attractions,
                    &stop.venues_of_interest,
                    stop.country.as_deref(),
                    stop.region.as_deref(),
                    None,
                );
            }
            LocationPlan::UseExisting { id, .. } => {
                let id = *id;
                let mut location =
                    self.catalog.get_location_by_id(id).await?.ok_or_else(|| {
                        ImportError::Operator(format!(
                            "matched location {} no longer exists",
                            id
                        ))
                    })?;
                let changed = location.merge_research(
                    &stop.top_attractions,
                    &stop.venues_of_interest,
                    stop.country.as_deref(),
                    stop.region.as_deref(),
                    None,
                );
                if changed {
                    *plan = LocationPlan::Merge { location };
                }
            }
        }
        Ok(())
    }
}

/// Score every catalog port against `search` and return the candidates
/// in a deterministic total order: score descending, ties broken by
/// catalog id ascending.
pub fn rank_candidates(ports: &[Location], search: &str) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = ports
        .iter()
        .filter_map(|port| {
            let id = port.id?;
            score(&port.name, search).map(|score| RankedCandidate {
                location_id: id,
                name: port.name.clone(),
                score,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.location_id.cmp(&b.location_id))
    });
    ranked
}

/// Deterministic name score:
/// 100 exact (case-insensitive), 95 equal after stripping a trailing
/// `", <region>"` suffix, 90 candidate contains the search term, 85
/// search term contains the candidate, 80 first-word equality.
fn score(candidate: &str, search: &str) -> Option<u8> {
    let c = candidate.trim().to_lowercase();
    let s = search.trim().to_lowercase();
    if c.is_empty() || s.is_empty() {
        return None;
    }
    if c == s {
        return Some(100);
    }
    if strip_region(&c) == s || c == strip_region(&s) {
        return Some(95);
    }
    if c.contains(&s) {
        return Some(90);
    }
    if s.contains(&c) {
        return Some(85);
    }
    if first_word(&c) == first_word(&s) {
        return Some(80);
    }
    None
}

fn strip_region(name: &str) -> &str {
    match name.rsplit_once(',') {
        Some((head, _)) => head.trim(),
        None => name,
    }
}

fn first_word(name: &str) -> &str {
    name.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn port(name: &str) -> Location {
        Location {
            id: Some(Uuid::new_v4()),
            name: name.to_string(),
            country: "Greece".to_string(),
            region: None,
            top_attractions: Vec::new(),
            venues_of_interest: Vec::new(),
            image_url: None,
            kind: LocationKind::Port,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn exact_match_scores_100_case_insensitively() {
        assert_eq!(score("Athens", "athens"), Some(100));
        assert_eq!(score(" Athens ", "ATHENS"), Some(100));
    }

    #[test]
    fn region_suffix_strip_scores_95() {
        assert_eq!(score("Mykonos, Greece", "Mykonos"), Some(95));
        assert_eq!(score("Mykonos", "Mykonos, Greece"), Some(95));
    }

    #[test]
    fn containment_scores_90_and_85() {
        assert_eq!(score("Bora Bora Lagoon", "Bora Bora"), Some(90));
        assert_eq!(score("Bora", "Bora Bora"), Some(85));
    }

    #[test]
    fn first_word_equality_scores_80() {
        // neither side contains the other, but the first words agree
        assert_eq!(score("Mykonos Town Harbour", "Mykonos Island"), Some(80));
    }

    #[test]
    fn unrelated_names_do_not_rank() {
        assert_eq!(score("Athens", "Bora Bora"), None);
    }

    #[test]
    fn ranking_is_deterministic_with_id_tiebreak() {
        let mut a = port("Mykonos, Greece");
        let mut b = port("Mykonos, Cyclades");
        // force a known id order
        let (low, high) = (Uuid::from_u128(1), Uuid::from_u128(2));
        a.id = Some(high);
        b.id = Some(low);
        let ports = vec![a, b];

        let first = rank_candidates(&ports, "Mykonos");
        let second = rank_candidates(&ports, "Mykonos");
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].score, 95);
        assert_eq!(first[0].location_id, low);
        assert_eq!(first[1].location_id, high);
    }

    #[test]
    fn sea_day_placeholders_are_not_candidates() {
        // rank_candidates only ever sees ports; guard the filter shape here
        let ports = vec![port("Athens")];
        let ranked = rank_candidates(&ports, "Athens");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 100);
    }
}
