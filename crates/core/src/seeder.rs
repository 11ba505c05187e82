//! Asset registry seeding.
//!
//! Lists every category from the provider and upserts the classified
//! records, so category detection and local search work before the first
//! request for a symbol.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use vnmarket_market_data::AssetCategory;

use crate::assets::{AssetRecord, AssetStore};
use crate::config::SeedConfig;
use crate::errors::Result;
use crate::upstream::ProtectedUpstream;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub stocks: usize,
    pub funds: usize,
    pub indices: usize,
    pub gold: usize,
    pub total: usize,
    /// True when seeding was skipped because the registry was populated.
    pub skipped: bool,
}

impl SeedReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

pub struct AssetSeeder {
    assets: Arc<dyn AssetStore>,
    upstream: Arc<ProtectedUpstream>,
    config: SeedConfig,
}

impl AssetSeeder {
    pub fn new(assets: Arc<dyn AssetStore>, upstream: Arc<ProtectedUpstream>, config: SeedConfig) -> Self {
        Self {
            assets,
            upstream,
            config,
        }
    }

    pub async fn seed(&self, force_refresh: bool) -> Result<SeedReport> {
        if !force_refresh {
            let existing = self.assets.count_assets().await?;
            if existing > self.config.skip_threshold {
                debug!("Asset registry holds {} assets, skipping seed", existing);
                return Ok(SeedReport::skipped());
            }
        }

        info!("Seeding asset registry (force_refresh={})", force_refresh);
        let (stocks, funds, indices, gold) = futures::join!(
            self.seed_category(AssetCategory::Stock),
            self.seed_category(AssetCategory::Fund),
            self.seed_category(AssetCategory::Index),
            self.seed_category(AssetCategory::Gold),
        );

        let report = SeedReport {
            stocks,
            funds,
            indices,
            gold,
            total: stocks + funds + indices + gold,
            skipped: false,
        };
        info!(
            "Seeding finished: {} stocks, {} funds, {} indices, {} gold ({} total)",
            report.stocks, report.funds, report.indices, report.gold, report.total
        );
        Ok(report)
    }

    /// A failing category counts as zero; the others still seed.
    async fn seed_category(&self, category: AssetCategory) -> usize {
        let listed = match self.upstream.list_assets(category).await {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Listing {} assets failed: {}", category, e);
                return 0;
            }
        };

        let now = Utc::now();
        let records: Vec<AssetRecord> = listed
            .iter()
            .filter(|summary| summary.category == category)
            .map(|summary| AssetRecord::from_summary(summary, now))
            .collect();

        match self.assets.upsert_assets(records).await {
            Ok(written) => written,
            Err(e) => {
                warn!("Storing {} assets failed: {}", category, e);
                0
            }
        }
    }
}
