//! Route table and navigation guard.
//!
//! ARCHITECTURE
//! ============
//! `policy` is the static route table with per-route access flags. `guard`
//! hydrates the session when needed and turns (flags, session) into a single
//! allow-or-redirect decision before each navigation.

pub mod guard;
pub mod policy;

pub use guard::{GuardDecision, Navigation, RouteGuard, decide, needs_hydration};
pub use policy::{ResolvedRoute, RouteDef, RouteName, RouteRequirements, resolve};
