//! # Workflows Module
//!
//! High-level procedures that tie the [`engine`](crate::engine) and
//! [`core`](crate::core) layers together.
//!
//! - **Mass-Balance Closure** ([`closemb`]) - Builds boundaries, reconciles
//!   the streams crossing them, applies the corrections and reports the
//!   closures before and after.

pub mod closemb;
