//! Business logic and repository trait definitions for MyMind.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, plus the entitlement ledger, the presence registry, the
//! chat room broker, the side-effect worker, and the client-side expiry
//! monitor. It depends only on `mymind-types` -- never on `mymind-infra` or
//! any database/IO crate.

pub mod chat;
pub mod effects;
pub mod expiry;
pub mod ledger;
pub mod presence;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;
