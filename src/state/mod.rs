//! Client-side session state.
//!
//! DESIGN
//! ======
//! `session` owns authentication state, `storage` the durable token slot, and
//! `attendance` the pure filtering over cached attendance records.

pub mod attendance;
pub mod session;
pub mod storage;

#[cfg(test)]
pub mod test_helpers;
