//! Pipeline orchestration.
//!
//! One implementation of the run — fetch collaborator snapshots, hand them
//! to the pure matching engine — with two thin callers: [`query`] returns
//! the report (serving a warm cache when possible) and [`precompute`]
//! writes the report to the cache and publishes a ready event. Keeping both
//! on the same `run` prevents the two paths from drifting.
//!
//! [`query`]: ReconciliationPipeline::query
//! [`precompute`]: ReconciliationPipeline::precompute

use crate::matching::{
    run_matching, MatchSettings, MatchThresholds, MatchWeights, ReconciliationReport,
};
use crate::models::{CustomerMapping, EntryType, LedgerEntry, ReconciliationRecord};
use crate::services::accounting::{AccountingApi, AccountingClient, LedgerEntryFilter};
use crate::services::database::Database;
use crate::services::directory::load_customer_directory;
use crate::services::events::{tenant_channel, ReconciliationEvent};
use crate::services::metrics::{
    record_accounting_fetch, record_cache_operation, record_pipeline_run, record_tier,
    PIPELINE_DURATION,
};
use chrono::NaiveDate;
use service_core::cache::Cache;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const LEDGER_PAGE_SIZE: u32 = 100;
const REPORT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Period and entry-type filter for one run.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub entry_type: Option<EntryType>,
}

pub fn report_cache_key(tenant_id: &str, params: &PipelineParams) -> String {
    format!(
        "recon:results:{}:{}:{}:{}",
        tenant_id,
        params.date_from,
        params.date_to,
        params.entry_type.map(|t| t.as_str()).unwrap_or("all")
    )
}

pub fn report_cache_pattern(tenant_id: &str) -> String {
    format!("recon:results:{}:*", tenant_id)
}

struct LedgerFetch {
    entries: Vec<LedgerEntry>,
    complete: bool,
}

pub struct ReconciliationPipeline {
    db: Arc<Database>,
    cache: Arc<dyn Cache>,
}

impl ReconciliationPipeline {
    pub fn new(db: Arc<Database>, cache: Arc<dyn Cache>) -> Self {
        Self { db, cache }
    }

    /// Synchronous query path. Serves the precomputed report when present
    /// (unless refresh is forced), else runs the pipeline and warms the
    /// cache. Returns the report plus whether it came from the cache.
    pub async fn query(
        &self,
        tenant_id: &str,
        params: &PipelineParams,
        force_refresh: bool,
    ) -> Result<(ReconciliationReport, bool), AppError> {
        let key = report_cache_key(tenant_id, params);

        if !force_refresh {
            match self.cache.get(&key).await {
                Ok(Some(raw)) => match serde_json::from_str::<ReconciliationReport>(&raw) {
                    Ok(report) => {
                        record_cache_operation("report", "hit");
                        return Ok((report, true));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Discarding undecodable cached report");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Report cache read failed");
                }
            }
            record_cache_operation("report", "miss");
        }

        let timer = PIPELINE_DURATION.with_label_values(&["query"]).start_timer();
        let outcome = self.run(tenant_id, params).await;
        timer.observe_duration();

        let (report, ledger_complete) = match outcome {
            Ok(result) => {
                record_pipeline_run("query", "success");
                result
            }
            Err(e) => {
                record_pipeline_run("query", "failed");
                return Err(e);
            }
        };

        if ledger_complete {
            self.store_report(&key, &report).await;
        }

        Ok((report, false))
    }

    /// Asynchronous precompute path: same run, but the result is written to
    /// the cache and announced on the tenant channel instead of returned.
    pub async fn precompute(&self, tenant_id: &str, params: &PipelineParams) -> Result<(), AppError> {
        let timer = PIPELINE_DURATION
            .with_label_values(&["precompute"])
            .start_timer();
        let outcome = self.run(tenant_id, params).await;
        timer.observe_duration();

        let (report, ledger_complete) = match outcome {
            Ok(result) => {
                record_pipeline_run("precompute", "success");
                result
            }
            Err(e) => {
                record_pipeline_run("precompute", "failed");
                return Err(e);
            }
        };

        if ledger_complete {
            self.store_report(&report_cache_key(tenant_id, params), &report)
                .await;
        }

        let event = ReconciliationEvent::ReconciliationReady {
            date_from: params.date_from,
            date_to: params.date_to,
            entry_type: params.entry_type,
            summary: report.summary.clone(),
        };
        let payload = serde_json::to_string(&event)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode event: {}", e)))?;
        self.cache
            .publish(&tenant_channel(tenant_id), &payload)
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            total = report.summary.total_count,
            auto = report.summary.auto_count,
            "Precomputed reconciliation published"
        );

        Ok(())
    }

    /// Invalidate every cached report for the tenant; called after any
    /// durable mutation (confirm, unconfirm, link).
    pub async fn invalidate_reports(&self, tenant_id: &str) {
        if let Err(e) = self
            .cache
            .delete_pattern(&report_cache_pattern(tenant_id))
            .await
        {
            tracing::warn!(tenant_id = %tenant_id, error = %e, "Report cache invalidation failed");
        }
    }

    /// The shared run: snapshot collaborators, then the pure engine.
    async fn run(
        &self,
        tenant_id: &str,
        params: &PipelineParams,
    ) -> Result<(ReconciliationReport, bool), AppError> {
        let integration = self
            .db
            .get_accounting_integration(tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::NotConfigured(anyhow::anyhow!(
                    "No accounting integration configured for this tenant"
                ))
            })?;
        let accounting = AccountingClient::new(&integration)?;

        let transactions = self
            .db
            .list_bank_transactions(tenant_id, params.date_from, params.date_to)
            .await?;

        let filter = LedgerEntryFilter {
            date_from: params.date_from,
            date_to: params.date_to,
            entry_type: params.entry_type,
        };
        let ledger = fetch_all_ledger_entries(&accounting, &filter).await;

        let directory = load_customer_directory(&accounting, self.cache.as_ref(), tenant_id).await?;

        let transaction_ids: Vec<Uuid> = transactions.iter().map(|t| t.transaction_id).collect();
        let records: HashMap<Uuid, ReconciliationRecord> = self
            .db
            .list_reconciliation_records(tenant_id, &transaction_ids)
            .await?
            .into_iter()
            .map(|r| (r.bank_transaction_id, r))
            .collect();

        let mappings: HashMap<String, CustomerMapping> = self
            .db
            .list_customer_mappings(tenant_id)
            .await?
            .into_iter()
            .map(|m| (m.payer_document.clone(), m))
            .collect();

        let settings = self.load_match_settings(tenant_id).await?;

        let report = run_matching(
            &transactions,
            &ledger.entries,
            &directory,
            &mappings,
            &records,
            &settings,
        );

        record_tier("reconciled", report.summary.reconciled_count);
        record_tier("auto", report.summary.auto_count);
        record_tier("partial", report.summary.partial_count);
        record_tier("none", report.summary.none_count);

        tracing::info!(
            tenant_id = %tenant_id,
            transactions = transactions.len(),
            ledger_entries = ledger.entries.len(),
            customers = directory.len(),
            ledger_complete = ledger.complete,
            "Matching pipeline run finished"
        );

        Ok((report, ledger.complete))
    }

    async fn load_match_settings(&self, tenant_id: &str) -> Result<MatchSettings, AppError> {
        let Some(row) = self.db.get_match_settings(tenant_id).await? else {
            return Ok(MatchSettings::default());
        };

        let Some(thresholds) = MatchThresholds::new(row.high_threshold, row.medium_threshold)
        else {
            tracing::warn!(
                tenant_id = %tenant_id,
                high = row.high_threshold,
                medium = row.medium_threshold,
                "Invalid confidence thresholds, using defaults"
            );
            return Ok(MatchSettings::default());
        };

        let weights = MatchWeights {
            identity: row.identity_weight,
            name: row.name_weight,
            contact: row.contact_weight,
            amount: row.amount_weight,
        };
        if weights.total() != 100 {
            // not renormalized: thresholds are interpreted against the
            // configured sum, and silently rescaling would change outcomes
            tracing::warn!(
                tenant_id = %tenant_id,
                total = weights.total(),
                "Scoring weights do not sum to 100"
            );
        }

        Ok(MatchSettings { weights, thresholds })
    }

    async fn store_report(&self, key: &str, report: &ReconciliationReport) {
        match serde_json::to_string(report) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(key, &raw, REPORT_CACHE_TTL).await {
                    tracing::warn!(error = %e, "Failed to cache reconciliation report");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize reconciliation report");
            }
        }
    }
}

/// Paginate the ledger listing. A failed page degrades to what was fetched
/// so far; `complete` is false so callers skip caching the partial result.
async fn fetch_all_ledger_entries(
    accounting: &dyn AccountingApi,
    filter: &LedgerEntryFilter,
) -> LedgerFetch {
    let mut entries: Vec<LedgerEntry> = Vec::new();
    let mut offset = 0u32;
    let mut complete = true;

    loop {
        match accounting
            .fetch_ledger_entries(filter, offset, LEDGER_PAGE_SIZE)
            .await
        {
            Ok(page) => {
                record_accounting_fetch("ledger_entries", "success");
                let count = page.len() as u32;
                entries.extend(page);
                if count < LEDGER_PAGE_SIZE {
                    break;
                }
                offset += count;
            }
            Err(e) => {
                record_accounting_fetch("ledger_entries", "failed");
                tracing::warn!(
                    offset,
                    error = %e,
                    "Ledger entry fetch failed, continuing with partial candidates"
                );
                complete = false;
                break;
            }
        }
    }

    LedgerFetch { entries, complete }
}
