//! Networking modules for the attendance REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` owns the gateway trait and its HTTP implementation, `error` the
//! normalized failure contract, and `types` the shared wire schema.

pub mod api;
pub mod error;
pub mod types;
