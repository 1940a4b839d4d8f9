//! MyRecipe client core: authenticated API access with single-flight token
//! refresh, credential storage, and the refrigerator inventory endpoints.

pub mod api;
pub mod commands;
pub mod config;
pub mod state;
