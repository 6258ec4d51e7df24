//! # attendance-client
//!
//! Session and route-access layer for the QR attendance service.
//!
//! The remote attendance API owns all data. This crate keeps the caller's
//! authentication state, decides which screens a user may open, and wraps
//! the HTTP surface in a typed gateway.
//!
//! SYSTEM CONTEXT
//! ==============
//! A navigation request enters [`router::RouteGuard`], which consults the
//! [`state::session::SessionStore`]. When a token is persisted but the store
//! is not yet authenticated, the store hydrates identity through the
//! [`net::api::AttendanceApi`] gateway before the guard applies route policy.

pub mod config;
pub mod net;
pub mod router;
pub mod state;
