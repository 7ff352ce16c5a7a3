//! HTTP gateway over the AIC token and usage-manager contracts.
//!
//! This crate provides:
//! - Quota/epoch accounting for authorize-usage requests
//! - A cooldown-gated faucet with rollback on failed mints
//! - Serialized transaction submission for the signing account
//! - The axum router exposing all of it

pub mod accounting;
pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod faucet;
pub mod metrics;
pub mod service;
pub mod submitter;

pub use accounting::{AllowanceCheck, UsageBreakdown};
pub use api::build_router;
pub use config::{AuthorizeEncoding, GatewayConfig};
pub use credentials::{CredentialSource, CredentialStore};
pub use error::{GatewayError, GatewayResult};
pub use faucet::{FaucetLimiter, FaucetPolicy};
pub use metrics::GatewayMetrics;
pub use service::{Clock, GatewayService, SystemClock, UnitsEncoding};
pub use submitter::TransactionSubmitter;
