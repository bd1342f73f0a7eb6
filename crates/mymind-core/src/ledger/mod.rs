//! Entitlement ledger: orders as time-bounded chat entitlements.
//!
//! The `EntitlementService` owns the cart -> paid -> refunded lifecycle and
//! answers "does this participant have chat access right now, and with whom".
//! Expiry is computed on read; there is no background sweep.

pub mod service;

pub use service::EntitlementService;
