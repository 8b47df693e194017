//! Integration tests for the gRPC surface.
//!
//! Require `TEST_DATABASE_URL`; each test skips itself when it is unset.

mod common;

use chrono::NaiveDate;
use common::{spawn_app, with_tenant};
use reconciliation_service::grpc::proto::*;
use reconciliation_service::models::PaymentMetadata;
use reconciliation_service::services::NewBankTransaction;
use serial_test::serial;
use uuid::Uuid;

/// Seed one synced bank transaction for the tenant.
async fn seed_transaction(app: &common::TestApp) -> Uuid {
    let transaction_id = Uuid::new_v4();
    app.db
        .insert_bank_transaction(
            &app.tenant_id.to_string(),
            NewBankTransaction {
                transaction_id,
                account_id: "acc-1".to_string(),
                transaction_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
                description: "PIX RECEBIDO MARIA DA SILVA 12/01".to_string(),
                amount: "500.00".parse().unwrap(),
                direction: "credit".to_string(),
                payment_metadata: Some(PaymentMetadata {
                    payer_document: Some("123.456.789-00".to_string()),
                    ..Default::default()
                }),
            },
        )
        .await
        .expect("seed transaction");
    transaction_id
}

#[tokio::test]
#[serial]
async fn query_without_integration_is_failed_precondition() {
    let Some(mut app) = spawn_app().await else { return };

    let request = with_tenant(
        QueryReconciliationRequest {
            date_from: "2026-01-01".to_string(),
            date_to: "2026-01-31".to_string(),
            entry_type: EntryType::Unspecified.into(),
            force_refresh: false,
        },
        &app.tenant_id,
    );

    let response = app.grpc_client.query_reconciliation(request).await;
    assert!(response.is_err());
    assert_eq!(
        response.unwrap_err().code(),
        tonic::Code::FailedPrecondition
    );
}

#[tokio::test]
#[serial]
async fn query_rejects_malformed_dates() {
    let Some(mut app) = spawn_app().await else { return };

    let request = with_tenant(
        QueryReconciliationRequest {
            date_from: "01/01/2026".to_string(),
            date_to: "2026-01-31".to_string(),
            entry_type: EntryType::Unspecified.into(),
            force_refresh: false,
        },
        &app.tenant_id,
    );

    let response = app.grpc_client.query_reconciliation(request).await;
    assert_eq!(response.unwrap_err().code(), tonic::Code::InvalidArgument);
}

#[tokio::test]
#[serial]
async fn query_requires_tenant_metadata() {
    let Some(mut app) = spawn_app().await else { return };

    let request = tonic::Request::new(QueryReconciliationRequest {
        date_from: "2026-01-01".to_string(),
        date_to: "2026-01-31".to_string(),
        entry_type: EntryType::Unspecified.into(),
        force_refresh: false,
    });

    let response = app.grpc_client.query_reconciliation(request).await;
    assert_eq!(response.unwrap_err().code(), tonic::Code::Unauthenticated);
}

#[tokio::test]
#[serial]
async fn confirm_requires_an_existing_transaction() {
    let Some(mut app) = spawn_app().await else { return };

    let request = with_tenant(
        ConfirmMatchRequest {
            bank_transaction_id: Uuid::new_v4().to_string(),
            ledger_entry_id: 42,
            score: 80,
            customer_id: None,
            entry_description: "Retainer".to_string(),
            customer_name: None,
        },
        &app.tenant_id,
    );

    let response = app.grpc_client.confirm_match(request).await;
    assert_eq!(response.unwrap_err().code(), tonic::Code::NotFound);
}

#[tokio::test]
#[serial]
async fn confirm_is_idempotent_per_transaction() {
    let Some(mut app) = spawn_app().await else { return };
    let transaction_id = seed_transaction(&app).await;

    fn confirm_request(
        transaction_id: Uuid,
        tenant_id: &Uuid,
    ) -> tonic::Request<ConfirmMatchRequest> {
        with_tenant(
            ConfirmMatchRequest {
                bank_transaction_id: transaction_id.to_string(),
                ledger_entry_id: 42,
                score: 80,
                customer_id: Some(7),
                entry_description: "Retainer".to_string(),
                customer_name: Some("Maria da Silva".to_string()),
            },
            tenant_id,
        )
    }

    let first = confirm_request(transaction_id, &app.tenant_id);
    let record = app
        .grpc_client
        .confirm_match(first)
        .await
        .unwrap()
        .into_inner()
        .record
        .unwrap();
    assert_eq!(record.bank_transaction_id, transaction_id.to_string());
    assert_eq!(record.ledger_entry_id, 42);

    // second confirm for the same transaction is a conflict, never a
    // second record
    let second = confirm_request(transaction_id, &app.tenant_id);
    let response = app.grpc_client.confirm_match(second).await;
    assert_eq!(response.unwrap_err().code(), tonic::Code::AlreadyExists);
}

#[tokio::test]
#[serial]
async fn unconfirm_reverts_a_confirmed_match() {
    let Some(mut app) = spawn_app().await else { return };
    let transaction_id = seed_transaction(&app).await;

    let request = with_tenant(
        ConfirmMatchRequest {
            bank_transaction_id: transaction_id.to_string(),
            ledger_entry_id: 42,
            score: 80,
            customer_id: None,
            entry_description: "Retainer".to_string(),
            customer_name: None,
        },
        &app.tenant_id,
    );
    app.grpc_client.confirm_match(request).await.unwrap();

    let request = with_tenant(
        UnconfirmMatchRequest {
            bank_transaction_id: transaction_id.to_string(),
        },
        &app.tenant_id,
    );
    let response = app.grpc_client.unconfirm_match(request).await.unwrap();
    assert!(response.into_inner().success);

    let record = app
        .db
        .get_reconciliation_record(&app.tenant_id.to_string(), &transaction_id.to_string())
        .await
        .unwrap();
    assert!(record.is_none());

    // the record is gone, so a second unconfirm finds nothing
    let request = with_tenant(
        UnconfirmMatchRequest {
            bank_transaction_id: transaction_id.to_string(),
        },
        &app.tenant_id,
    );
    let response = app.grpc_client.unconfirm_match(request).await;
    assert_eq!(response.unwrap_err().code(), tonic::Code::NotFound);
}

#[tokio::test]
#[serial]
async fn link_customer_normalizes_and_supersedes() {
    let Some(mut app) = spawn_app().await else { return };

    let request = with_tenant(
        LinkCustomerRequest {
            payer_document: "999.888.777-66".to_string(),
            customer_id: 7,
            customer_name: "Maria da Silva".to_string(),
            customer_document: "123.456.789-00".to_string(),
        },
        &app.tenant_id,
    );

    let mapping = app
        .grpc_client
        .link_customer(request)
        .await
        .unwrap()
        .into_inner()
        .mapping
        .unwrap();
    assert_eq!(mapping.payer_document, "99988877766");
    assert_eq!(mapping.customer_document, "12345678900");

    // a new link for the same document supersedes the old one
    let request = with_tenant(
        LinkCustomerRequest {
            payer_document: "99988877766".to_string(),
            customer_id: 8,
            customer_name: "Maria S. Advocacia".to_string(),
            customer_document: "123.456.789-00".to_string(),
        },
        &app.tenant_id,
    );
    app.grpc_client.link_customer(request).await.unwrap();

    let stored = app
        .db
        .get_customer_mapping(&app.tenant_id.to_string(), "99988877766")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.customer_id, 8);
}

#[tokio::test]
#[serial]
async fn link_rejects_short_documents() {
    let Some(mut app) = spawn_app().await else { return };

    let request = with_tenant(
        LinkCustomerRequest {
            payer_document: "123".to_string(),
            customer_id: 7,
            customer_name: "Maria da Silva".to_string(),
            customer_document: String::new(),
        },
        &app.tenant_id,
    );

    let response = app.grpc_client.link_customer(request).await;
    assert_eq!(response.unwrap_err().code(), tonic::Code::InvalidArgument);
}

#[tokio::test]
#[serial]
async fn precompute_trigger_never_propagates_run_failures() {
    let Some(mut app) = spawn_app().await else { return };

    // no accounting integration: the spawned run will fail, but the
    // trigger still reports accepted
    let request = with_tenant(
        TriggerPrecomputeRequest {
            date_from: "2026-01-01".to_string(),
            date_to: "2026-01-31".to_string(),
            entry_type: EntryType::Income.into(),
        },
        &app.tenant_id,
    );

    let response = app.grpc_client.trigger_precompute(request).await.unwrap();
    assert!(response.into_inner().accepted);
}

#[tokio::test]
#[serial]
async fn query_degrades_when_accounting_is_unreachable() {
    let Some(mut app) = spawn_app().await else { return };
    let tenant = app.tenant_id.to_string();

    // integration configured, but nothing listens there: ledger and
    // registry fetches degrade to empty snapshots instead of failing the run
    app.db
        .upsert_accounting_integration(&tenant, "http://127.0.0.1:9", "test-token")
        .await
        .unwrap();
    seed_transaction(&app).await;

    let request = with_tenant(
        QueryReconciliationRequest {
            date_from: "2026-01-01".to_string(),
            date_to: "2026-01-31".to_string(),
            entry_type: EntryType::Unspecified.into(),
            force_refresh: true,
        },
        &app.tenant_id,
    );

    let response = app
        .grpc_client
        .query_reconciliation(request)
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.items.len(), 1);
    let summary = response.summary.unwrap();
    assert_eq!(summary.total_count, 1);
    // no candidates were available, so nothing could match
    assert_eq!(summary.none_count, 1);
}

#[tokio::test]
#[serial]
async fn match_settings_round_trip_and_supersede() {
    let Some(app) = spawn_app().await else { return };
    let tenant = app.tenant_id.to_string();

    app.db
        .upsert_match_settings(&tenant, 50, 20, 10, 20, 70, 40)
        .await
        .unwrap();
    let row = app.db.get_match_settings(&tenant).await.unwrap().unwrap();
    assert_eq!(row.identity_weight, 50);
    assert_eq!(row.high_threshold, 70);

    app.db
        .upsert_match_settings(&tenant, 40, 25, 15, 20, 60, 35)
        .await
        .unwrap();
    let row = app.db.get_match_settings(&tenant).await.unwrap().unwrap();
    assert_eq!(row.identity_weight, 40);
    assert_eq!(row.medium_threshold, 35);
}

#[tokio::test]
#[serial]
async fn tenant_isolation_for_mappings() {
    let Some(mut app) = spawn_app().await else { return };
    let other_tenant = Uuid::new_v4();

    let request = with_tenant(
        LinkCustomerRequest {
            payer_document: "111.222.333-44".to_string(),
            customer_id: 7,
            customer_name: "Maria da Silva".to_string(),
            customer_document: String::new(),
        },
        &app.tenant_id,
    );
    app.grpc_client.link_customer(request).await.unwrap();

    let stored = app
        .db
        .get_customer_mapping(&other_tenant.to_string(), "11122233344")
        .await
        .unwrap();
    assert!(stored.is_none());
}
