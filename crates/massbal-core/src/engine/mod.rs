//! # Engine Module
//!
//! The stateful layer of massbal: unit operations and their built-in
//! calculations, boundaries with their cut-sets and closures, the flowsheet
//! that owns the streams, and the reconciliation engine that computes
//! per-stream correction factors.
//!
//! ## Architecture
//!
//! - **Unit operations** ([`unit_op`]) - Named graph nodes and the
//!   [`UnitOperation`](unit_op::UnitOperation) extension point
//! - **Boundaries** ([`boundary`]) - Cut-set detection, mass and atom
//!   closures, conversion and selectivity
//! - **Flowsheet** ([`flowsheet`]) - Stream storage, execution order and the
//!   component invalidation cascade
//! - **Reconciliation** ([`reconcile`]) - Shared-factor least-squares
//!   correction of measured streams, driven by a BFGS minimiser
//! - **Configuration** ([`config`]) - Objective weights and solver settings
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod boundary;
pub mod config;
pub mod error;
pub mod flowsheet;
pub(crate) mod operations;
pub(crate) mod optimizer;
pub mod progress;
pub mod reconcile;
pub mod unit_op;
