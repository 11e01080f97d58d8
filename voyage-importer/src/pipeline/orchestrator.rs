//! Drives one source document through the whole pipeline: draft,
//! verification, resolution, sequencing, preview confirmation, asset
//! relocation, then the transactional import.

use std::sync::Arc;

use tracing::info;
use voyage_core::storage::assets::AssetStore;
use voyage_core::storage::Catalog;
use voyage_core::{ImportError, Result};

use super::assets::{AssetFetcher, AssetRelocator};
use super::executor::{ImportExecutor, ImportReceipt};
use super::resolve::EntityResolver;
use super::sequence::ItinerarySequencer;
use super::verify::{SelfVerifier, VerificationReport};
use super::DecisionLog;
use crate::draft::Draft;
use crate::operator::OperatorChannel;
use crate::preview::PreviewSummary;
use crate::source::SourceDocument;

/// Everything a finished run hands back to the caller.
#[derive(Debug)]
pub struct ImportReport {
    pub receipt: ImportReceipt,
    pub verification: VerificationReport,
    pub decisions: Vec<String>,
}

pub struct ImportPipeline<'a> {
    catalog: &'a dyn Catalog,
    channel: &'a dyn OperatorChannel,
    relocator: AssetRelocator,
    sequencer: ItinerarySequencer,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        channel: &'a dyn OperatorChannel,
        fetcher: Arc<dyn AssetFetcher>,
        store: Arc<dyn AssetStore>,
        internal_prefix: impl Into<String>,
        all_aboard_buffer_minutes: i64,
        fetch_retries: u32,
        fetch_workers: usize,
    ) -> Self {
        Self {
            catalog,
            channel,
            relocator: AssetRelocator::new(
                fetcher,
                store,
                internal_prefix,
                fetch_retries,
                fetch_workers,
            ),
            sequencer: ItinerarySequencer::new(all_aboard_buffer_minutes),
        }
    }

    /// Run the full import. Stops at the first failed phase; nothing is
    /// written to the catalog until every earlier phase has passed and
    /// the operator has confirmed the preview.
    pub async fn run(&self, source: &SourceDocument) -> Result<ImportReport> {
        let mut log = DecisionLog::new();

        info!("📄 Building draft for trip '{}'", source.trip.name);
        let mut draft = Draft::from_source(source)?;

        info!("🔍 Verifying draft against its source");
        let verification = SelfVerifier::new().verify_or_halt(&draft, source)?;
        log.record(format!(
            "verification passed with {} check(s)",
            verification.checks.len()
        ));

        info!("🧭 Resolving locations against the catalog");
        let resolver = EntityResolver::new(self.catalog, self.channel);
        let plans = resolver.resolve(&mut draft, &mut log).await?;

        info!("🗓️ Sequencing the itinerary");
        self.sequencer.sequence(&mut draft, self.catalog).await?;

        let preview = PreviewSummary::build(&draft, &plans, self.catalog).await?;
        info!("🛳️ Presenting preview for '{}'", preview.trip_name);
        if !self.channel.confirm(&preview).await? {
            info!("Operator declined the preview, nothing was written");
            return Err(ImportError::Cancelled);
        }
        log.record("operator confirmed preview");

        info!("🖼️ Relocating external assets");
        self.relocator.relocate(&mut draft).await?;

        info!("💾 Committing import");
        let receipt = ImportExecutor::new(self.catalog)
            .execute(&draft, &plans, &log)
            .await?;

        Ok(ImportReport {
            receipt,
            verification,
            decisions: log.entries().to_vec(),
        })
    }
}
