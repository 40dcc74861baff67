//! Core business logic for rapport.
//!
//! Services sit between the HTTP layer and the repositories. Each public
//! operation validates its input, checks ownership and policy, and then
//! issues exactly one repository write (possibly a multi-statement
//! transaction), retrying it when the store reports a lost write race.

pub mod services;

pub use services::*;
