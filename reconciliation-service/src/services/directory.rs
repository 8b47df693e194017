//! Customer directory loading and caching.
//!
//! Walking the full registry can take hundreds of rate-limited requests, so
//! the built directory is cached per tenant for a few minutes. A page fetch
//! failure degrades to whatever was fetched so far rather than failing the
//! run.

use crate::matching::CustomerDirectory;
use crate::models::Customer;
use crate::services::accounting::AccountingApi;
use crate::services::metrics::{record_accounting_fetch, record_cache_operation};
use service_core::cache::Cache;
use service_core::error::AppError;
use std::time::Duration;

const CUSTOMER_PAGE_SIZE: u32 = 100;
const DIRECTORY_CACHE_TTL: Duration = Duration::from_secs(300);

pub fn directory_cache_key(tenant_id: &str) -> String {
    format!("recon:customers:{}", tenant_id)
}

/// Load the tenant's customer directory, preferring the cached index.
pub async fn load_customer_directory(
    accounting: &dyn AccountingApi,
    cache: &dyn Cache,
    tenant_id: &str,
) -> Result<CustomerDirectory, AppError> {
    let key = directory_cache_key(tenant_id);

    match cache.get(&key).await {
        Ok(Some(raw)) => match serde_json::from_str::<CustomerDirectory>(&raw) {
            Ok(directory) => {
                record_cache_operation("customer_directory", "hit");
                return Ok(directory);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable cached customer directory");
            }
        },
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Customer directory cache read failed");
        }
    }
    record_cache_operation("customer_directory", "miss");

    let (customers, complete) = fetch_all_customers(accounting).await;
    let directory = CustomerDirectory::build(customers);

    // a partially-fetched registry is used for this run but not cached, so
    // the next run retries the full walk
    if complete {
        match serde_json::to_string(&directory) {
            Ok(raw) => {
                if let Err(e) = cache.set(&key, &raw, DIRECTORY_CACHE_TTL).await {
                    tracing::warn!(error = %e, "Failed to cache customer directory");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize customer directory for caching");
            }
        }
    }

    tracing::info!(
        tenant_id = %tenant_id,
        customers = directory.len(),
        "Customer directory built"
    );

    Ok(directory)
}

/// Paginate the full registry, degrading to partial data on fetch failure.
async fn fetch_all_customers(accounting: &dyn AccountingApi) -> (Vec<Customer>, bool) {
    let mut all: Vec<Customer> = Vec::new();
    let mut offset = 0u32;
    let mut complete = true;

    loop {
        match accounting.fetch_customers(offset, CUSTOMER_PAGE_SIZE).await {
            Ok(page) => {
                record_accounting_fetch("customers", "success");
                let count = page.len() as u32;
                all.extend(page);
                if count < CUSTOMER_PAGE_SIZE {
                    break;
                }
                offset += count;
            }
            Err(e) => {
                record_accounting_fetch("customers", "failed");
                tracing::warn!(
                    offset,
                    error = %e,
                    "Customer registry fetch failed, continuing with partial directory"
                );
                complete = false;
                break;
            }
        }
    }

    (all, complete)
}
