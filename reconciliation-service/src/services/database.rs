//! Database service for reconciliation-service.
//!
//! Holds the bank-transaction snapshot written by the sync pipeline, the
//! persisted reconciliation records and manual customer links, and the
//! per-tenant integration/settings rows.

#![allow(clippy::too_many_arguments)]

use crate::models::{
    AccountingIntegration, BankTransaction, CustomerMapping, MatchSettingsRow, PaymentMetadata,
    ReconciliationRecord,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// A transaction row as delivered by the sync pipeline.
#[derive(Debug, Clone)]
pub struct NewBankTransaction {
    pub transaction_id: Uuid,
    pub account_id: String,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: String,
    pub payment_metadata: Option<PaymentMetadata>,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "reconciliation-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Bank Transaction Snapshot
    // =========================================================================

    /// Insert one synced transaction. Synced rows are immutable, so a
    /// replayed sync event leaves the existing row untouched.
    #[instrument(skip(self, transaction), fields(tenant_id = %tenant_id))]
    pub async fn insert_bank_transaction(
        &self,
        tenant_id: &str,
        transaction: NewBankTransaction,
    ) -> Result<BankTransaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_bank_transaction"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;
        let metadata = transaction.payment_metadata.map(sqlx::types::Json);

        let inserted = sqlx::query_as::<_, BankTransaction>(
            r#"
            INSERT INTO bank_transactions (transaction_id, tenant_id, account_id, transaction_date, description, amount, direction, payment_metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (transaction_id) DO NOTHING
            RETURNING transaction_id, tenant_id, account_id, transaction_date, description, amount, direction, payment_metadata, created_utc
            "#,
        )
        .bind(transaction.transaction_id)
        .bind(tenant_uuid)
        .bind(&transaction.account_id)
        .bind(transaction.transaction_date)
        .bind(&transaction.description)
        .bind(transaction.amount)
        .bind(&transaction.direction)
        .bind(metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert bank transaction: {}", e)))?;

        timer.observe_duration();

        match inserted {
            Some(row) => Ok(row),
            None => self
                .get_bank_transaction(tenant_id, &transaction.transaction_id.to_string())
                .await?
                .ok_or_else(|| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Transaction exists but is not visible for tenant"
                    ))
                }),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, transaction_id = %transaction_id))]
    pub async fn get_bank_transaction(
        &self,
        tenant_id: &str,
        transaction_id: &str,
    ) -> Result<Option<BankTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_bank_transaction"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;
        let txn_uuid = Uuid::from_str(transaction_id)
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid transaction_id")))?;

        let transaction = sqlx::query_as::<_, BankTransaction>(
            r#"
            SELECT transaction_id, tenant_id, account_id, transaction_date, description, amount, direction, payment_metadata, created_utc
            FROM bank_transactions
            WHERE tenant_id = $1 AND transaction_id = $2
            "#,
        )
        .bind(tenant_uuid)
        .bind(txn_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get bank transaction: {}", e)))?;

        timer.observe_duration();

        Ok(transaction)
    }

    /// Transactions in the period, in a stable order so repeated runs over
    /// identical data visit them identically.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_bank_transactions(
        &self,
        tenant_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<Vec<BankTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_bank_transactions"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;

        let transactions = sqlx::query_as::<_, BankTransaction>(
            r#"
            SELECT transaction_id, tenant_id, account_id, transaction_date, description, amount, direction, payment_metadata, created_utc
            FROM bank_transactions
            WHERE tenant_id = $1 AND transaction_date BETWEEN $2 AND $3
            ORDER BY transaction_date, transaction_id
            "#,
        )
        .bind(tenant_uuid)
        .bind(date_from)
        .bind(date_to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list bank transactions: {}", e)))?;

        timer.observe_duration();

        Ok(transactions)
    }

    // =========================================================================
    // Reconciliation Records
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id, bank_transaction_id = %bank_transaction_id))]
    pub async fn get_reconciliation_record(
        &self,
        tenant_id: &str,
        bank_transaction_id: &str,
    ) -> Result<Option<ReconciliationRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_reconciliation_record"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;
        let txn_uuid = Uuid::from_str(bank_transaction_id)
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid bank_transaction_id")))?;

        let record = sqlx::query_as::<_, ReconciliationRecord>(
            r#"
            SELECT record_id, tenant_id, bank_transaction_id, ledger_entry_id, match_score, customer_id, entry_description, customer_name, paid_utc, created_utc
            FROM reconciliation_records
            WHERE tenant_id = $1 AND bank_transaction_id = $2
            "#,
        )
        .bind(tenant_uuid)
        .bind(txn_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get reconciliation record: {}", e)))?;

        timer.observe_duration();

        Ok(record)
    }

    /// Batch record lookup for one pipeline run.
    #[instrument(skip(self, bank_transaction_ids), fields(tenant_id = %tenant_id, count = bank_transaction_ids.len()))]
    pub async fn list_reconciliation_records(
        &self,
        tenant_id: &str,
        bank_transaction_ids: &[Uuid],
    ) -> Result<Vec<ReconciliationRecord>, AppError> {
        if bank_transaction_ids.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_reconciliation_records"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;

        let records = sqlx::query_as::<_, ReconciliationRecord>(
            r#"
            SELECT record_id, tenant_id, bank_transaction_id, ledger_entry_id, match_score, customer_id, entry_description, customer_name, paid_utc, created_utc
            FROM reconciliation_records
            WHERE tenant_id = $1 AND bank_transaction_id = ANY($2)
            "#,
        )
        .bind(tenant_uuid)
        .bind(bank_transaction_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list reconciliation records: {}", e)))?;

        timer.observe_duration();

        Ok(records)
    }

    /// Insert-if-absent confirm. The unique constraint per transaction makes
    /// this the idempotence guard: a second confirm for the same transaction
    /// is a conflict, never a second record.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, bank_transaction_id = %bank_transaction_id, ledger_entry_id = ledger_entry_id))]
    pub async fn create_reconciliation_record(
        &self,
        tenant_id: &str,
        bank_transaction_id: &str,
        ledger_entry_id: i64,
        match_score: i32,
        customer_id: Option<i64>,
        entry_description: &str,
        customer_name: Option<&str>,
    ) -> Result<ReconciliationRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_reconciliation_record"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;
        let txn_uuid = Uuid::from_str(bank_transaction_id)
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid bank_transaction_id")))?;
        let record_id = Uuid::new_v4();

        let record = sqlx::query_as::<_, ReconciliationRecord>(
            r#"
            INSERT INTO reconciliation_records (record_id, tenant_id, bank_transaction_id, ledger_entry_id, match_score, customer_id, entry_description, customer_name, paid_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (tenant_id, bank_transaction_id) DO NOTHING
            RETURNING record_id, tenant_id, bank_transaction_id, ledger_entry_id, match_score, customer_id, entry_description, customer_name, paid_utc, created_utc
            "#,
        )
        .bind(record_id)
        .bind(tenant_uuid)
        .bind(txn_uuid)
        .bind(ledger_entry_id)
        .bind(match_score)
        .bind(customer_id)
        .bind(entry_description)
        .bind(customer_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create reconciliation record: {}", e)))?;

        timer.observe_duration();

        match record {
            Some(record) => {
                info!(record_id = %record.record_id, "Reconciliation record created");
                Ok(record)
            }
            None => Err(AppError::Conflict(anyhow::anyhow!(
                "Bank transaction is already reconciled"
            ))),
        }
    }

    /// Delete a record, reverting the transaction to matching. Returns false
    /// when no record existed.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, bank_transaction_id = %bank_transaction_id))]
    pub async fn delete_reconciliation_record(
        &self,
        tenant_id: &str,
        bank_transaction_id: &str,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_reconciliation_record"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;
        let txn_uuid = Uuid::from_str(bank_transaction_id)
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid bank_transaction_id")))?;

        let result = sqlx::query(
            r#"
            DELETE FROM reconciliation_records
            WHERE tenant_id = $1 AND bank_transaction_id = $2
            "#,
        )
        .bind(tenant_uuid)
        .bind(txn_uuid)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete reconciliation record: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Customer Mappings
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_customer_mapping(
        &self,
        tenant_id: &str,
        payer_document: &str,
    ) -> Result<Option<CustomerMapping>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer_mapping"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;

        let mapping = sqlx::query_as::<_, CustomerMapping>(
            r#"
            SELECT mapping_id, tenant_id, payer_document, customer_id, customer_name, customer_document, created_utc
            FROM customer_mappings
            WHERE tenant_id = $1 AND payer_document = $2
            "#,
        )
        .bind(tenant_uuid)
        .bind(payer_document)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer mapping: {}", e)))?;

        timer.observe_duration();

        Ok(mapping)
    }

    /// All manual links for the tenant; the analyst-curated set is small.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_customer_mappings(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<CustomerMapping>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customer_mappings"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;

        let mappings = sqlx::query_as::<_, CustomerMapping>(
            r#"
            SELECT mapping_id, tenant_id, payer_document, customer_id, customer_name, customer_document, created_utc
            FROM customer_mappings
            WHERE tenant_id = $1
            ORDER BY payer_document
            "#,
        )
        .bind(tenant_uuid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customer mappings: {}", e)))?;

        timer.observe_duration();

        Ok(mappings)
    }

    /// Create or replace the manual link for a payer document. A new link
    /// supersedes the previous one; links are never auto-deleted.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = customer_id))]
    pub async fn upsert_customer_mapping(
        &self,
        tenant_id: &str,
        payer_document: &str,
        customer_id: i64,
        customer_name: &str,
        customer_document: &str,
    ) -> Result<CustomerMapping, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_customer_mapping"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;
        let mapping_id = Uuid::new_v4();

        let mapping = sqlx::query_as::<_, CustomerMapping>(
            r#"
            INSERT INTO customer_mappings (mapping_id, tenant_id, payer_document, customer_id, customer_name, customer_document)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, payer_document) DO UPDATE
                SET customer_id = EXCLUDED.customer_id,
                    customer_name = EXCLUDED.customer_name,
                    customer_document = EXCLUDED.customer_document
            RETURNING mapping_id, tenant_id, payer_document, customer_id, customer_name, customer_document, created_utc
            "#,
        )
        .bind(mapping_id)
        .bind(tenant_uuid)
        .bind(payer_document)
        .bind(customer_id)
        .bind(customer_name)
        .bind(customer_document)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to upsert customer mapping: {}", e)))?;

        timer.observe_duration();
        info!(mapping_id = %mapping.mapping_id, "Customer mapping saved");

        Ok(mapping)
    }

    // =========================================================================
    // Tenant Configuration
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_accounting_integration(
        &self,
        tenant_id: &str,
    ) -> Result<Option<AccountingIntegration>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_accounting_integration"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;

        let integration = sqlx::query_as::<_, AccountingIntegration>(
            r#"
            SELECT tenant_id, base_url, api_token, created_utc
            FROM accounting_integrations
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get accounting integration: {}", e)))?;

        timer.observe_duration();

        Ok(integration)
    }

    #[instrument(skip(self, api_token), fields(tenant_id = %tenant_id))]
    pub async fn upsert_accounting_integration(
        &self,
        tenant_id: &str,
        base_url: &str,
        api_token: &str,
    ) -> Result<AccountingIntegration, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_accounting_integration"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;

        let integration = sqlx::query_as::<_, AccountingIntegration>(
            r#"
            INSERT INTO accounting_integrations (tenant_id, base_url, api_token)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id) DO UPDATE
                SET base_url = EXCLUDED.base_url,
                    api_token = EXCLUDED.api_token
            RETURNING tenant_id, base_url, api_token, created_utc
            "#,
        )
        .bind(tenant_uuid)
        .bind(base_url)
        .bind(api_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to upsert accounting integration: {}", e)))?;

        timer.observe_duration();

        Ok(integration)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_match_settings(
        &self,
        tenant_id: &str,
    ) -> Result<Option<MatchSettingsRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_match_settings"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;

        let settings = sqlx::query_as::<_, MatchSettingsRow>(
            r#"
            SELECT tenant_id, identity_weight, name_weight, contact_weight, amount_weight, high_threshold, medium_threshold
            FROM reconciliation_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get match settings: {}", e)))?;

        timer.observe_duration();

        Ok(settings)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn upsert_match_settings(
        &self,
        tenant_id: &str,
        identity_weight: i32,
        name_weight: i32,
        contact_weight: i32,
        amount_weight: i32,
        high_threshold: i32,
        medium_threshold: i32,
    ) -> Result<MatchSettingsRow, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_match_settings"])
            .start_timer();

        let tenant_uuid = parse_tenant(tenant_id)?;

        let settings = sqlx::query_as::<_, MatchSettingsRow>(
            r#"
            INSERT INTO reconciliation_settings (tenant_id, identity_weight, name_weight, contact_weight, amount_weight, high_threshold, medium_threshold)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id) DO UPDATE
                SET identity_weight = EXCLUDED.identity_weight,
                    name_weight = EXCLUDED.name_weight,
                    contact_weight = EXCLUDED.contact_weight,
                    amount_weight = EXCLUDED.amount_weight,
                    high_threshold = EXCLUDED.high_threshold,
                    medium_threshold = EXCLUDED.medium_threshold,
                    updated_utc = now()
            RETURNING tenant_id, identity_weight, name_weight, contact_weight, amount_weight, high_threshold, medium_threshold
            "#,
        )
        .bind(tenant_uuid)
        .bind(identity_weight)
        .bind(name_weight)
        .bind(contact_weight)
        .bind(amount_weight)
        .bind(high_threshold)
        .bind(medium_threshold)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to upsert match settings: {}", e)))?;

        timer.observe_duration();

        Ok(settings)
    }
}

fn parse_tenant(tenant_id: &str) -> Result<Uuid, AppError> {
    Uuid::from_str(tenant_id).map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid tenant_id")))
}
