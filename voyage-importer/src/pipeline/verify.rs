//! Self-verification: re-derive facts from the draft and flag
//! inconsistencies before any destructive action. Passing is necessary
//! but not sufficient for import; it only gates progression to
//! resolution. No automatic correction is ever attempted.

use chrono::{NaiveDateTime, NaiveTime};
use tracing::info;
use voyage_core::domain::StopKind;
use voyage_core::{CheckFailure, ImportError, Result};

use crate::draft::{Draft, LocationRef};
use crate::source::SourceDocument;

/// Outcome of one checklist assertion.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub check_name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub checks: Vec<CheckResult>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    fn push(&mut self, check_name: &str, passed: bool, detail: impl Into<String>) {
        self.checks.push(CheckResult {
            check_name: check_name.to_string(),
            passed,
            detail: detail.into(),
        });
    }
}

pub struct SelfVerifier;

impl SelfVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Run the fixed checklist against the draft and the original source
    /// description, producing a structured report.
    pub fn verify(&self, draft: &Draft, source: &SourceDocument) -> VerificationReport {
        let mut report = VerificationReport::default();

        self.check_date_range(draft, &mut report);
        self.check_stop_count(draft, source, &mut report);
        self.check_stop_times(draft, &mut report);
        self.check_venue_amenity_completeness(draft, source, &mut report);
        self.check_research_completeness(draft, &mut report);
        self.check_day_contiguity(draft, &mut report);
        self.check_stop_kinds(draft, &mut report);
        self.check_sea_days_unassigned(draft, &mut report);

        let failed = report.failures().len();
        if failed == 0 {
            info!("Self-verification passed all {} checks", report.checks.len());
        } else {
            info!(
                "Self-verification found {} failing check(s) of {}",
                failed,
                report.checks.len()
            );
        }
        report
    }

    /// Like [`verify`](Self::verify), but map a failing report to
    /// [`ImportError::Validation`] so the pipeline halts before any write.
    pub fn verify_or_halt(
        &self,
        draft: &Draft,
        source: &SourceDocument,
    ) -> Result<VerificationReport> {
        let report = self.verify(draft, source);
        if report.passed() {
            return Ok(report);
        }
        let failures = report
            .failures()
            .into_iter()
            .map(|c| CheckFailure {
                check_name: c.check_name.clone(),
                detail: c.detail.clone(),
            })
            .collect();
        Err(ImportError::Validation(failures))
    }

    fn check_date_range(&self, draft: &Draft, report: &mut VerificationReport) {
        let start = parse_canonical(&draft.trip().start_date);
        let end = parse_canonical(&draft.trip().end_date);
        match (start, end) {
            (Some(start), Some(end)) => {
                if end < start {
                    report.push(
                        "trip_date_range",
                        false,
                        format!(
                            "end date {} precedes start date {}",
                            draft.trip().end_date,
                            draft.trip().start_date
                        ),
                    );
                    return;
                }
                let span_days = (end.date() - start.date()).num_days() + 1;
                let stops = draft.stops().len() as i64;
                report.push(
                    "trip_date_range",
                    span_days == stops,
                    format!("date range covers {} day(s), draft has {} stop(s)", span_days, stops),
                );
            }
            _ => report.push(
                "trip_date_range",
                false,
                "trip start or end date is not a canonical wall-clock string",
            ),
        }
    }

    fn check_stop_count(
        &self,
        draft: &Draft,
        source: &SourceDocument,
        report: &mut VerificationReport,
    ) {
        let staged = draft.stops().len();
        let described = source.stops.len();
        report.push(
            "stop_count",
            staged == described,
            format!("source describes {} stop(s), draft staged {}", described, staged),
        );
    }

    fn check_stop_times(&self, draft: &Draft, report: &mut VerificationReport) {
        for stop in draft.stops() {
            for (label, value) in [
                ("arrival", &stop.arrival_time),
                ("departure", &stop.departure_time),
            ] {
                if let Some(raw) = value {
                    if NaiveTime::parse_from_str(raw, "%H:%M").is_err() {
                        report.push(
                            "stop_times",
                            false,
                            format!("day {} has unparseable {} time '{}'", stop.day, label, raw),
                        );
                        return;
                    }
                }
            }
            if let (Some(arr), Some(dep)) = (&stop.arrival_time, &stop.departure_time) {
                let arr = NaiveTime::parse_from_str(arr, "%H:%M");
                let dep = NaiveTime::parse_from_str(dep, "%H:%M");
                if let (Ok(arr), Ok(dep)) = (arr, dep) {
                    if arr >= dep {
                        report.push(
                            "stop_times",
                            false,
                            format!("day {} arrives at or after its departure", stop.day),
                        );
                        return;
                    }
                }
            }
        }
        report.push("stop_times", true, "all stop times plausible");
    }

    fn check_venue_amenity_completeness(
        &self,
        draft: &Draft,
        source: &SourceDocument,
        report: &mut VerificationReport,
    ) {
        let venues_ok = draft.venues().len() == source.venues.len()
            && draft
                .venues()
                .iter()
                .all(|v| !v.name.is_empty() && !v.venue_type.is_empty());
        let amenities_ok = draft.amenities().len() == source.amenities.len()
            && draft.amenities().iter().all(|a| !a.name.is_empty());
        report.push(
            "venue_amenity_completeness",
            venues_ok && amenities_ok,
            format!(
                "{} venue(s) and {} amenity(ies) staged",
                draft.venues().len(),
                draft.amenities().len()
            ),
        );
    }

    fn check_research_completeness(&self, draft: &Draft, report: &mut VerificationReport) {
        for stop in draft.stops() {
            if matches!(stop.location, LocationRef::SeaDay) {
                continue;
            }
            if stop.top_attractions.is_empty() || stop.venues_of_interest.is_empty() {
                report.push(
                    "research_completeness",
                    false,
                    format!(
                        "day {} is missing attraction or venue-of-interest research",
                        stop.day
                    ),
                );
                return;
            }
        }
        report.push(
            "research_completeness",
            true,
            "every port stop carries research",
        );
    }

    fn check_day_contiguity(&self, draft: &Draft, report: &mut VerificationReport) {
        let mut days: Vec<u32> = draft.stops().iter().map(|s| s.day).collect();
        days.sort_unstable();
        let expected: Vec<u32> = (1..=draft.stops().len() as u32).collect();
        report.push(
            "day_contiguity",
            days == expected,
            format!("days present: {:?}", days),
        );
    }

    fn check_stop_kinds(&self, draft: &Draft, report: &mut VerificationReport) {
        match draft.stops().iter().find(|s| s.kind.is_none()) {
            Some(stop) => report.push(
                "stop_kind_present",
                false,
                format!("day {} has no stop kind", stop.day),
            ),
            None => report.push("stop_kind_present", true, "every stop has a kind"),
        }
    }

    fn check_sea_days_unassigned(&self, draft: &Draft, report: &mut VerificationReport) {
        for stop in draft.stops() {
            if stop.kind == Some(StopKind::SeaDay)
                && matches!(stop.location, LocationRef::Unresolved(_))
            {
                report.push(
                    "sea_day_unassigned",
                    false,
                    format!("sea day {} carries a pre-assigned location name", stop.day),
                );
                return;
            }
        }
        report.push(
            "sea_day_unassigned",
            true,
            "sea days carry no pre-assigned real location",
        );
    }
}

impl Default for SelfVerifier {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_canonical(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceStop, SourceTrip};
    use voyage_core::domain::VesselKind;

    fn doc(days: u32) -> SourceDocument {
        let stops = (1..=days)
            .map(|day| SourceStop {
                day,
                sea_day: false,
                location: Some(format!("Port {}", day)),
                country: Some("Greece".to_string()),
                region: None,
                arrival_time: Some("08:00".to_string()),
                departure_time: Some("17:00".to_string()),
                top_attractions: vec!["Old town".to_string()],
                venues_of_interest: vec!["Cafe".to_string()],
                image_url: None,
            })
            .collect();
        SourceDocument {
            trip: SourceTrip {
                name: "Aegean Odyssey".to_string(),
                slug: "aegean-odyssey".to_string(),
                operator_name: "Azure Lines".to_string(),
                vessel_name: "MV Meltemi".to_string(),
                vessel_kind: VesselKind::Ship,
                start_date: "2025-08-21".to_string(),
                end_date: "2025-08-25".to_string(),
                hero_image_url: None,
            },
            stops,
            venues: Vec::new(),
            amenities: Vec::new(),
        }
    }

    #[test]
    fn clean_five_day_draft_passes_every_check() {
        let source = doc(5);
        let draft = Draft::from_source(&source).unwrap();
        let report = SelfVerifier::new().verify(&draft, &source);
        assert!(report.passed(), "failures: {:?}", report.failures());
        // passing implies kinds assigned and days contiguous
        assert!(draft.stops().iter().all(|s| s.kind.is_some()));
    }

    #[test]
    fn date_range_mismatch_fails() {
        let source = doc(3); // range still covers 5 days
        let draft = Draft::from_source(&source).unwrap();
        let report = SelfVerifier::new().verify(&draft, &source);
        assert!(!report.passed());
        assert!(report
            .failures()
            .iter()
            .any(|c| c.check_name == "trip_date_range"));
    }

    #[test]
    fn arrival_after_departure_fails_time_plausibility() {
        let mut source = doc(5);
        source.stops[2].arrival_time = Some("18:00".to_string());
        let draft = Draft::from_source(&source).unwrap();
        let report = SelfVerifier::new().verify(&draft, &source);
        assert!(report
            .failures()
            .iter()
            .any(|c| c.check_name == "stop_times"));
    }

    #[test]
    fn missing_research_fails() {
        let mut source = doc(5);
        source.stops[1].top_attractions.clear();
        let draft = Draft::from_source(&source).unwrap();
        let report = SelfVerifier::new().verify(&draft, &source);
        assert!(report
            .failures()
            .iter()
            .any(|c| c.check_name == "research_completeness"));
    }

    #[test]
    fn non_contiguous_days_fail() {
        let mut source = doc(5);
        source.stops[4].day = 7;
        let draft = Draft::from_source(&source).unwrap();
        let report = SelfVerifier::new().verify(&draft, &source);
        assert!(report
            .failures()
            .iter()
            .any(|c| c.check_name == "day_contiguity"));
    }

    #[test]
    fn verify_or_halt_surfaces_all_failures() {
        let mut source = doc(5);
        source.stops[4].day = 7;
        source.stops[1].top_attractions.clear();
        let draft = Draft::from_source(&source).unwrap();
        let err = SelfVerifier::new()
            .verify_or_halt(&draft, &source)
            .unwrap_err();
        match err {
            ImportError::Validation(failures) => assert!(failures.len() >= 2),
            other => panic!("expected validation error, got {other}"),
        }
    }
}
