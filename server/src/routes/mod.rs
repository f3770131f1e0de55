//! HTTP route handlers

pub mod error;
pub mod health;
pub mod predict;
