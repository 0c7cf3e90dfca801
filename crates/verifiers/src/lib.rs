// ============================================================================
// TV VERIFIERS - KMS / Gateway / App Verifier Chain (spec C3)
// ============================================================================
// Three concrete verifiers (KMS, Gateway, App) plus two legacy stubs, all
// implementing the same `ChainVerifier` contract so `execute_chain` can
// drive any of them through the fixed step order (hardware, os, sourceCode,
// then Gateway's four domain-control steps). Chain selection itself
// (legacy stubs vs. the modern trio) is made by the caller (C4), which has
// the `VersionPolicy` and all the fetched facts in scope.
// ============================================================================

pub mod chain;
pub mod component;
pub mod dns;
pub mod flags;
pub mod gateway;
pub mod legacy;
pub mod measurement;
pub mod objects;
pub mod result;

pub use chain::{execute_chain, ChainVerifier};
pub use component::{ComponentVerifier, OnchainCoordinates};
pub use dns::{DnsCaaResolver, HttpDohCaaResolver};
pub use flags::{VerificationFlags, VerificationFlagsPatch};
pub use gateway::GatewayVerifier;
pub use legacy::{LegacyGatewayStub, LegacyKmsStub};
pub use result::{ChainOutcome, StepFailure, StepOutcome, TopLevelError, VerifyResult};
