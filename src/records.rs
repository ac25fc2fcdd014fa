use serde::{Deserialize, Serialize};

/// One regular customer, built once per article URL and never mutated.
/// Serialized field names are the export contract, so every reserved
/// field stays present even though this scraper never populates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub lives_in: Option<String>,
    pub appearance_weight: Option<i64>,
    pub required_food_id: Option<String>,
    pub dishes_ordered_ids: Vec<String>,
    pub customer_description: String,
    pub requirements: Requirements,
    pub mementos: Vec<MementoRecord>,
    pub source_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    /// Reserved for a future extractor, always null here.
    pub rating: Option<i64>,
    /// Reserved, always empty.
    pub recipes: Vec<String>,
    pub facilities: Vec<String>,
    pub letters: Vec<String>,
    /// Reserved, always empty.
    pub customers: Vec<String>,
    pub flowers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MementoRecord {
    pub id: String,
    pub name: String,
    pub stars: Option<i64>,
    pub description: Option<String>,
    pub requirement: Option<String>,
    pub tags: Vec<String>,
    pub source: String,
    /// Reserved, always null here.
    pub share_reward: Option<String>,
}

/// Fixed provenance marker for mementos earned as customer gifts.
pub const MEMENTO_SOURCE: &str = "customer_gift";

impl MementoRecord {
    pub fn customer_gift(
        name: String,
        stars: Option<i64>,
        description: Option<String>,
        requirement: Option<String>,
    ) -> Self {
        MementoRecord {
            id: crate::parser::text::slugify(&name),
            name,
            stars,
            description,
            requirement,
            tags: vec![MEMENTO_SOURCE.to_string()],
            source: MEMENTO_SOURCE.to_string(),
            share_reward: None,
        }
    }
}
