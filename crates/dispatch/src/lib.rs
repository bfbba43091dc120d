// Path: crates/dispatch/src/lib.rs
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

//! Verb dispatch: route validated envelopes to their handlers.
//!
//! The verb set is closed, so dispatch is a match, not a registry.
//! Handlers never mutate the envelope; they may append plan ops, touch the
//! lease registry, or emit new envelopes, and every one of them is
//! idempotent under replay: ids for anything a handler creates derive
//! from the envelope id, and the op-log ignores duplicate ops.

pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod ids;
pub mod pool;
pub mod release;

pub use context::HandlerContext;
pub use dispatcher::Dispatcher;
pub use pool::DispatchPool;
pub use release::SystemReleaseSink;
