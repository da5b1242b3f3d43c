//! HTTP surface for Transcendence tournament brackets.

pub mod api;
pub mod config;
pub mod logging;
