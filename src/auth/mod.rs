//! Authentication and session lifecycle.
//!
//! This module provides:
//! - `SessionData`: the persisted token record
//! - `SessionManager`: login/logout/registration flows and the observable
//!   auth state machine
//!
//! Sessions are persisted through the local store and survive restarts.
//! Token validity is the backend's call: a 401 on a profile fetch leaves
//! the stored token in place so an explicit logout stays the only path
//! that destroys a session.

pub mod manager;
pub mod session;

pub use manager::{AuthError, AuthState, SessionManager};
pub use session::SessionData;
