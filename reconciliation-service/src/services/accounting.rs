//! Accounting system HTTP client.
//!
//! The accounting system exposes offset-paginated customer and ledger-entry
//! listings. Credentials are per tenant (see `accounting_integrations`), so
//! a client is built per pipeline run. The trait seam lets the directory
//! builder and the tests substitute a stub registry.

use crate::models::{AccountingIntegration, Customer, EntryType, LedgerEntry};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use service_core::observability::TracedClientExt;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Filter for the ledger-entry listing.
#[derive(Debug, Clone)]
pub struct LedgerEntryFilter {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub entry_type: Option<EntryType>,
}

/// Read access to the accounting system's registry and ledger.
#[async_trait]
pub trait AccountingApi: Send + Sync {
    async fn fetch_customers(&self, offset: u32, limit: u32) -> Result<Vec<Customer>, AppError>;

    async fn fetch_ledger_entries(
        &self,
        filter: &LedgerEntryFilter,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, AppError>;
}

/// HTTP client for one tenant's accounting integration.
pub struct AccountingClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl AccountingClient {
    pub fn new(integration: &AccountingIntegration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: integration.base_url.trim_end_matches('/').to_string(),
            api_token: integration.api_token.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        resource: &str,
        offset: u32,
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .traced_get(&url)
            .query(query)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                AppError::BadGateway(format!("accounting {} request failed: {}", resource, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::BadGateway(format!(
                "accounting returned {} for {} at offset {}",
                status, resource, offset
            )));
        }

        response.json::<T>().await.map_err(|e| {
            AppError::BadGateway(format!(
                "malformed {} page at offset {}: {}",
                resource, offset, e
            ))
        })
    }
}

#[async_trait]
impl AccountingApi for AccountingClient {
    async fn fetch_customers(&self, offset: u32, limit: u32) -> Result<Vec<Customer>, AppError> {
        let query = [
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        let page: CustomersPage = self
            .get_json("/api/v1/customers", &query, "customers", offset)
            .await?;
        Ok(page.customers.into_iter().map(Customer::from).collect())
    }

    async fn fetch_ledger_entries(
        &self,
        filter: &LedgerEntryFilter,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let mut query = vec![
            ("date_from", filter.date_from.to_string()),
            ("date_to", filter.date_to.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(entry_type) = filter.entry_type {
            query.push(("entry_type", entry_type.as_str().to_string()));
        }

        let page: LedgerEntriesPage = self
            .get_json("/api/v1/ledger-entries", &query, "ledger entries", offset)
            .await?;
        Ok(page.entries.into_iter().map(LedgerEntry::from).collect())
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CustomersPage {
    #[serde(default)]
    customers: Vec<CustomerDto>,
}

#[derive(Debug, Deserialize)]
struct CustomerDto {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    document: String,
}

impl From<CustomerDto> for Customer {
    fn from(dto: CustomerDto) -> Self {
        Self {
            customer_id: dto.id,
            name: dto.name,
            document: dto.document,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LedgerEntriesPage {
    #[serde(default)]
    entries: Vec<LedgerEntryDto>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntryDto {
    id: i64,
    #[serde(rename = "type")]
    entry_type: EntryType,
    due_date: NaiveDate,
    #[serde(default)]
    payment_date: Option<NaiveDate>,
    amount: Decimal,
    #[serde(default)]
    description: String,
    #[serde(default)]
    customer_name: String,
    #[serde(default)]
    customer_document: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    reference: String,
}

impl From<LedgerEntryDto> for LedgerEntry {
    fn from(dto: LedgerEntryDto) -> Self {
        Self {
            entry_id: dto.id,
            entry_type: dto.entry_type,
            due_date: dto.due_date,
            payment_date: dto.payment_date,
            amount: dto.amount,
            description: dto.description,
            customer_name: dto.customer_name,
            customer_document: dto.customer_document,
            category: dto.category,
            reference: dto.reference,
        }
    }
}
