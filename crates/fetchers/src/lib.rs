// ============================================================================
// TV FETCHERS - External Fact Gathering (spec C1)
// ============================================================================
// PURPOSE: hardened adapters over everything the verifier chain needs to
// read from the outside world.
//
// ADAPTERS:
// - attestation_client: cloud endpoint for SystemInfo / node Info RPC
// - gateway_client:     gateway ACME/app info
// - onchain_registry:   KMS registry reads over JSON-RPC `eth_call`
// - ct_log:             Certificate Transparency aggregator, rate-limited
// - ita:                Intel Trust Authority appraisal, cached + retried
// - tool_exec:          local DCAP/measurement CLI invocation via tempfile
// - image_repository:   content-addressed OS image cache
//
// Every suspension point here (spec §5) is an `async fn`; callers race them
// against their own deadlines rather than this crate imposing a single
// policy, except where spec.md pins an exact timeout (ITA 15s, image
// download 10m).
// ============================================================================

pub mod attestation_client;
pub mod ct_log;
pub mod error;
pub mod gateway_client;
pub mod image_repository;
pub mod ita;
pub mod onchain_registry;
pub mod rate_limiter;
pub mod retry;
pub mod tool_exec;

pub use attestation_client::{AttestationClient, AttestationClientError, HttpAttestationClient};
pub use ct_log::{CtLogClient, CtLogQueryResult, HttpCtLogClient};
pub use error::FetchError;
pub use gateway_client::{GatewayClient, HttpGatewayClient};
pub use image_repository::{FsImageRepository, ImageRepository};
pub use ita::{ItaAppraisal, ItaClient, ItaClientImpl};
pub use onchain_registry::{JsonRpcOnChainRegistry, OnChainRegistry};
pub use tool_exec::{LocalToolExec, ToolExec};
