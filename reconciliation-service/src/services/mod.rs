//! Services module for reconciliation-service.

pub mod accounting;
pub mod database;
pub mod directory;
pub mod events;
pub mod metrics;
pub mod pipeline;

pub use accounting::{AccountingApi, AccountingClient, LedgerEntryFilter};
pub use database::{Database, NewBankTransaction};
pub use directory::load_customer_directory;
pub use events::{tenant_channel, ReconciliationEvent};
pub use metrics::{
    get_metrics, init_metrics, record_accounting_fetch, record_cache_operation, record_error,
    record_pipeline_run, record_store_operation, record_tier,
};
pub use pipeline::{PipelineParams, ReconciliationPipeline};
