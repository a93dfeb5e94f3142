//! The content library a run schedules from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One schedulable library item. `categories` covers both genres and
/// curator tags; the constraint evaluator only ever sees the union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "genres")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience_score: Option<f64>,
}

/// The channel a schedule is being assembled for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Id-keyed lookup over the request's media list.
#[derive(Debug, Clone, Default)]
pub struct ContentCatalog {
    items: HashMap<String, MediaItem>,
    order: Vec<String>,
}

impl ContentCatalog {
    /// Later duplicates win, matching last-write semantics of the source
    /// library export.
    pub fn from_items(items: Vec<MediaItem>) -> Self {
        let mut catalog = Self::default();
        for item in items {
            if !catalog.items.contains_key(&item.id) {
                catalog.order.push(item.id.clone());
            }
            catalog.items.insert(item.id.clone(), item);
        }
        catalog
    }

    pub fn get(&self, id: &str) -> Option<&MediaItem> {
        self.items.get(id)
    }

    /// Categories for a content reference; empty for unknown ids.
    pub fn categories_for(&self, id: &str) -> &[String] {
        self.items
            .get(id)
            .map(|item| item.categories.as_slice())
            .unwrap_or(&[])
    }

    /// Items in original library order.
    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, categories: &[&str]) -> MediaItem {
        MediaItem {
            id: id.into(),
            title: id.into(),
            description: None,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            duration_minutes: Some(30),
            rating: None,
            audience_score: None,
        }
    }

    #[test]
    fn lookup_and_order() {
        let catalog = ContentCatalog::from_items(vec![
            item("series:friends", &["sitcom"]),
            item("movie:alien", &["scifi", "horror"]),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.categories_for("movie:alien"), ["scifi", "horror"]);
        assert!(catalog.categories_for("movie:unknown").is_empty());
        let ids: Vec<_> = catalog.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["series:friends", "movie:alien"]);
    }

    #[test]
    fn genres_alias_accepted() {
        let raw = r#"{"id": "series:friends", "title": "Friends", "genres": ["sitcom"]}"#;
        let item: MediaItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.categories, ["sitcom"]);
    }
}
