// Path: crates/policy/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! Gas-metered policy enforcement.
//!
//! Three gates protect the core: preflight (cheap, cached, before publish),
//! ingress (full evaluation on receive, before dispatch), and the commit
//! gate (full evaluation plus claimed-vs-actual resource comparison inside
//! the ATTEST handler). Evaluation is a pure function of the envelope; a
//! hash of the serialized ruleset travels with every decision so receivers
//! can detect rule drift.

pub mod engine;
pub mod gas;
pub mod gates;

pub use engine::{PolicyEngine, PolicyInput, PolicyResult, PolicyRuleset};
pub use gas::GasMeter;
pub use gates::{GateEnforcer, PolicyDecision, PolicyGate};
