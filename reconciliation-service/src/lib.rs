//! Reconciliation Service - pairs Open Finance bank transactions with
//! accounting ledger entries.

pub mod config;
pub mod grpc;
pub mod matching;
pub mod models;
pub mod services;
pub mod startup;
