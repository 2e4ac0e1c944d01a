//! Core domain types for the dagpenger application lifecycle.
//!
//! This crate holds the `Soknad` and `Innsending` state machines, the
//! `Person` aggregate that routes events to them, the activity log that
//! records every decision, and the projections used to read aggregate
//! state from the outside. It is deliberately free of HTTP and database
//! dependencies; all other crates depend on it.

pub mod aktivitetslogg;
pub mod dokumentkrav;
pub mod error;
pub mod hendelse;
pub mod innsending;
pub mod observer;
pub mod person;
pub mod projection;
pub mod soknad;
pub mod store;

pub use error::{Error, Result};
pub use person::Person;
