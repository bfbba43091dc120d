// Path: crates/telemetry/src/lib.rs

//! Observability for the Swarm Kernel: structured JSON logging.

pub mod init;
