use serde::{Deserialize, Serialize};

/// One row of the portfolio catalog CSV.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "Techstack")]
    pub description: String,
    #[serde(rename = "Links")]
    pub link: String,
}

/// An indexed portfolio entry. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub id: String,
    pub description: String,
    pub link: String,
}

/// A ranked query hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioHit {
    pub id: String,
    pub link: String,
    pub score: f32,
}
