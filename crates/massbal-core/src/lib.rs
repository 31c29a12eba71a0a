//! # massbal Core Library
//!
//! Stream arithmetic, boundary closure and mass-balance reconciliation for
//! chemical-process flowsheets.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models: the periodic table,
//!   components and their registry, streams and stream histories, and
//!   balanced reactions.
//!
//! - **[`engine`]: The Logic Core.** Unit operations, boundaries and their
//!   cut-sets, the [`Flowsheet`](engine::flowsheet::Flowsheet) that owns the
//!   streams, and the reconciliation engine that corrects measured flows so
//!   that they satisfy conservation.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built on the
//!   engine, such as closing the mass balance of a set of boundaries in one
//!   call.

pub mod core;
pub mod engine;
pub mod workflows;
