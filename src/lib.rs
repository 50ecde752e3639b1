//! Nutrilog Library
//!
//! Nutrition aggregation engine with an ingredient/food catalog and meal log,
//! served over MCP.

pub mod build_info;
pub mod config;
pub mod db;
pub mod detection;
pub mod mcp;
pub mod models;
pub mod nutrition;
pub mod tools;
