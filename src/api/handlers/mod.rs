//! API handlers for the auth core.
//!
//! This module organizes the service's route handlers: the token
//! lifecycle and recovery flows under [`auth`], the authenticated
//! profile under [`me`], and the service endpoints (`/`, `/health`).

pub mod auth;
pub mod health;
pub mod me;
pub mod root;
