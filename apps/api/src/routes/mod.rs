//! Route handlers, one module per resource.

pub mod catalog;
pub mod counterparties;
pub mod health;
pub mod inventory;
pub mod invoices;

use serde::Deserialize;

fn default_limit() -> u32 {
    50
}

/// `?limit=` for plain list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// `?q=&limit=` for search endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}
