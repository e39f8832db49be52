//! CLI command handlers

pub mod compress;
pub mod get;
pub mod ls;
pub mod models;
pub mod query;
