//! # Core Module
//!
//! Stateless data model for chemical-process flowsheets.
//!
//! ## Overview
//!
//! The core module defines the values every other layer works with: molecular
//! components and the registry that owns them, streams of per-component flows
//! (steady or time-indexed), and balanced reactions. Nothing here holds mutable
//! shared state; every flow operation returns a new [`stream::Stream`].
//!
//! ## Architecture
//!
//! - **Periodic Table** ([`elements`]) - Standard atomic weights by element symbol
//! - **Components** ([`components`]) - Immutable species and the insertion-ordered registry
//! - **Streams** ([`stream`]) - Flow matrices with derived mass, total and atom flows
//! - **Reactions** ([`reaction`]) - Stoichiometry validated for element conservation
//! - **Identifiers** ([`ids`]) - Slot-map keys used by the flowsheet tables
//! - **Errors** ([`error`]) - Definition and consistency failures

pub mod components;
pub mod elements;
pub mod error;
pub mod ids;
pub mod reaction;
pub mod stream;
