//! gRPC service implementation for ReconciliationService.

use crate::grpc::capability_check::{capabilities, CapabilityChecker};
use crate::grpc::proto::*;
use crate::matching::{normalize_document, MIN_DOCUMENT_LEN};
use crate::models::EntryType as DomainEntryType;
use crate::services::{
    record_error, record_store_operation, Database, PipelineParams, ReconciliationPipeline,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// ReconciliationService gRPC implementation.
pub struct ReconciliationServiceImpl {
    db: Arc<Database>,
    pipeline: Arc<ReconciliationPipeline>,
    capability_checker: Arc<CapabilityChecker>,
}

impl ReconciliationServiceImpl {
    pub fn new(
        db: Arc<Database>,
        pipeline: Arc<ReconciliationPipeline>,
        capability_checker: Arc<CapabilityChecker>,
    ) -> Self {
        Self {
            db,
            pipeline,
            capability_checker,
        }
    }
}

#[tonic::async_trait]
impl reconciliation_service_server::ReconciliationService for ReconciliationServiceImpl {
    // =========================================================================
    // Query
    // =========================================================================

    async fn query_reconciliation(
        &self,
        request: Request<QueryReconciliationRequest>,
    ) -> Result<Response<QueryReconciliationResponse>, Status> {
        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::RECONCILIATION_QUERY)?;

        let req = request.into_inner();
        let params = parse_params(&req.date_from, &req.date_to, req.entry_type)?;

        tracing::info!(
            tenant_id = %auth.tenant_id,
            date_from = %params.date_from,
            date_to = %params.date_to,
            force_refresh = req.force_refresh,
            "Querying reconciliation"
        );

        let (report, from_cache) = self
            .pipeline
            .query(&auth.tenant_id, &params, req.force_refresh)
            .await?;

        Ok(Response::new(QueryReconciliationResponse {
            items: report.items.into_iter().map(|i| i.into()).collect(),
            summary: Some(report.summary.into()),
            from_cache,
        }))
    }

    // =========================================================================
    // Confirm / Unconfirm
    // =========================================================================

    async fn confirm_match(
        &self,
        request: Request<ConfirmMatchRequest>,
    ) -> Result<Response<ConfirmMatchResponse>, Status> {
        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::RECONCILIATION_CONFIRM)?;

        let req = request.into_inner();
        if req.ledger_entry_id <= 0 {
            return Err(Status::invalid_argument("ledger_entry_id is required"));
        }

        // Distinguish "transaction not found" from the duplicate-confirm
        // conflict raised by the store.
        self.db
            .get_bank_transaction(&auth.tenant_id, &req.bank_transaction_id)
            .await?
            .ok_or_else(|| Status::not_found("Bank transaction not found"))?;

        tracing::info!(
            tenant_id = %auth.tenant_id,
            bank_transaction_id = %req.bank_transaction_id,
            ledger_entry_id = req.ledger_entry_id,
            score = req.score,
            "Confirming match"
        );

        let record = self
            .db
            .create_reconciliation_record(
                &auth.tenant_id,
                &req.bank_transaction_id,
                req.ledger_entry_id,
                req.score,
                req.customer_id,
                &req.entry_description,
                req.customer_name.as_deref(),
            )
            .await
            .map_err(|e| {
                record_store_operation("confirm", "failed");
                Status::from(e)
            })?;

        record_store_operation("confirm", "success");
        self.pipeline.invalidate_reports(&auth.tenant_id).await;

        Ok(Response::new(ConfirmMatchResponse {
            record: Some(record.into()),
        }))
    }

    async fn unconfirm_match(
        &self,
        request: Request<UnconfirmMatchRequest>,
    ) -> Result<Response<UnconfirmMatchResponse>, Status> {
        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::RECONCILIATION_UNCONFIRM)?;

        let req = request.into_inner();

        let deleted = self
            .db
            .delete_reconciliation_record(&auth.tenant_id, &req.bank_transaction_id)
            .await
            .map_err(|e| {
                record_store_operation("unconfirm", "failed");
                Status::from(e)
            })?;

        if !deleted {
            return Err(Status::not_found(
                "No reconciliation record for this transaction",
            ));
        }

        tracing::info!(
            tenant_id = %auth.tenant_id,
            bank_transaction_id = %req.bank_transaction_id,
            "Match unconfirmed"
        );

        record_store_operation("unconfirm", "success");
        self.pipeline.invalidate_reports(&auth.tenant_id).await;

        Ok(Response::new(UnconfirmMatchResponse { success: true }))
    }

    // =========================================================================
    // Manual Customer Links
    // =========================================================================

    async fn link_customer(
        &self,
        request: Request<LinkCustomerRequest>,
    ) -> Result<Response<LinkCustomerResponse>, Status> {
        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::RECONCILIATION_LINK)?;

        let req = request.into_inner();

        let payer_document = normalize_document(&req.payer_document);
        if payer_document.len() < MIN_DOCUMENT_LEN {
            return Err(Status::invalid_argument(
                "payer_document must contain at least 11 digits",
            ));
        }
        if req.customer_name.trim().is_empty() {
            return Err(Status::invalid_argument("customer_name cannot be empty"));
        }
        if req.customer_id <= 0 {
            return Err(Status::invalid_argument("customer_id is required"));
        }

        tracing::info!(
            tenant_id = %auth.tenant_id,
            customer_id = req.customer_id,
            "Linking payer document to customer"
        );

        let mapping = self
            .db
            .upsert_customer_mapping(
                &auth.tenant_id,
                &payer_document,
                req.customer_id,
                &req.customer_name,
                &normalize_document(&req.customer_document),
            )
            .await
            .map_err(|e| {
                record_store_operation("link", "failed");
                Status::from(e)
            })?;

        record_store_operation("link", "success");
        self.pipeline.invalidate_reports(&auth.tenant_id).await;

        Ok(Response::new(LinkCustomerResponse {
            mapping: Some(mapping.into()),
        }))
    }

    // =========================================================================
    // Precompute
    // =========================================================================

    async fn trigger_precompute(
        &self,
        request: Request<TriggerPrecomputeRequest>,
    ) -> Result<Response<TriggerPrecomputeResponse>, Status> {
        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::RECONCILIATION_PRECOMPUTE)?;

        let req = request.into_inner();
        let params = parse_params(&req.date_from, &req.date_to, req.entry_type)?;

        tracing::info!(
            tenant_id = %auth.tenant_id,
            date_from = %params.date_from,
            date_to = %params.date_to,
            "Precompute triggered"
        );

        // Fire-and-forget: the sync handler that triggered us never waits,
        // so failures are logged and dropped. The next sync event retries
        // naturally.
        let pipeline = self.pipeline.clone();
        let tenant_id = auth.tenant_id.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.precompute(&tenant_id, &params).await {
                record_error("precompute_failed");
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Precompute run failed"
                );
            }
        });

        Ok(Response::new(TriggerPrecomputeResponse { accepted: true }))
    }
}

/// Parse and validate the period filter shared by query and precompute.
#[allow(clippy::result_large_err)]
fn parse_params(
    date_from: &str,
    date_to: &str,
    entry_type: i32,
) -> Result<PipelineParams, Status> {
    let date_from: NaiveDate = date_from
        .parse()
        .map_err(|_| Status::invalid_argument("date_from must be YYYY-MM-DD"))?;
    let date_to: NaiveDate = date_to
        .parse()
        .map_err(|_| Status::invalid_argument("date_to must be YYYY-MM-DD"))?;
    if date_from > date_to {
        return Err(Status::invalid_argument("date_from must not exceed date_to"));
    }

    let entry_type = EntryType::try_from(entry_type)
        .map_err(|_| Status::invalid_argument("Invalid entry_type"))?;

    Ok(PipelineParams {
        date_from,
        date_to,
        entry_type: DomainEntryType::from_proto(entry_type),
    })
}
