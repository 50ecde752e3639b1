//! Nutrilog Tools module
//!
//! MCP tool implementations for the catalog and meal log.

pub mod foods;
pub mod import;
pub mod ingredients;
pub mod meals;
pub mod status;
