//! In-memory content array used to answer catalog reads locally.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::seq::SliceRandom;

use crate::model::{CatalogStats, ContentItem, ContentType};

/// Queries shorter than this (after trimming) never match anything.
pub const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Default)]
pub struct Catalog {
    items: RwLock<Vec<ContentItem>>,
}

impl Catalog {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items: RwLock::new(items) }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ContentItem>> {
        self.items.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ContentItem>> {
        self.items.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ContentItem> {
        self.read().clone()
    }

    /// Upserts by title: a known title is overwritten in place, a new one is
    /// appended. Returns how many titles were new.
    pub fn merge(&self, incoming: &[ContentItem]) -> usize {
        let mut items = self.write();
        let mut added = 0;
        for item in incoming {
            match items.iter_mut().find(|existing| existing.same_title(&item.title)) {
                Some(existing) => *existing = item.clone(),
                None => {
                    items.push(item.clone());
                    added += 1;
                }
            }
        }
        added
    }

    pub fn list(&self, limit: usize, offset: usize) -> Vec<ContentItem> {
        self.read().iter().skip(offset).take(limit).cloned().collect()
    }

    /// Case-insensitive match on title, genres and description.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ContentItem> {
        let needle = query.trim().to_lowercase();
        if needle.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        self.read()
            .iter()
            .filter(|item| {
                item.title.to_lowercase().contains(&needle)
                    || item.genres.iter().any(|g| g.to_lowercase().contains(&needle))
                    || item
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn random(&self, count: usize) -> Vec<ContentItem> {
        let items = self.read();
        items
            .choose_multiple(&mut rand::thread_rng(), count)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let items = self.read();
        let movies = items.iter().filter(|i| i.content_type == ContentType::Movie).count();
        CatalogStats {
            total: items.len(),
            movies,
            series: items.len() - movies,
            with_trailers: items.iter().filter(|i| i.trailer_id.is_some()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        Catalog::new(vec![
            ContentItem::new("Dune: Part Two", ContentType::Movie, Some(2024))
                .with_trailer("Way9Dexny3w")
                .with_genres(["Sci-Fi", "Adventure"]),
            ContentItem::new("Shogun", ContentType::Series, Some(2024)).with_genres(["Drama"]),
            ContentItem::new("Oppenheimer", ContentType::Movie, Some(2023)),
        ])
    }

    #[test]
    fn short_queries_match_nothing() {
        let catalog = sample();
        assert!(catalog.search("", 10).is_empty());
        assert!(catalog.search(" d ", 10).is_empty());
        assert_eq!(catalog.search("du", 10).len(), 1);
    }

    #[test]
    fn search_looks_at_genres() {
        let catalog = sample();
        let hits = catalog.search("drama", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Shogun");
    }

    #[test]
    fn list_pages_through_items() {
        let catalog = sample();
        assert_eq!(catalog.list(2, 0).len(), 2);
        assert_eq!(catalog.list(2, 2)[0].title, "Oppenheimer");
        assert!(catalog.list(2, 5).is_empty());
    }

    #[test]
    fn merge_upserts_by_title() {
        let catalog = sample();
        let added = catalog.merge(&[
            ContentItem::new("Shogun", ContentType::Series, Some(1980)),
            ContentItem::new("Arrival", ContentType::Movie, Some(2016)),
        ]);
        assert_eq!(added, 1);
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.search("shogun", 5)[0].year, Some(1980));
    }

    #[test]
    fn stats_and_random_sample() {
        let catalog = sample();
        let stats = catalog.stats();
        assert_eq!((stats.total, stats.movies, stats.series, stats.with_trailers), (3, 2, 1, 1));
        assert_eq!(catalog.random(2).len(), 2);
        assert_eq!(catalog.random(10).len(), 3);
    }

    #[test]
    fn empty_catalog_answers_empty() {
        let catalog = Catalog::default();
        assert!(catalog.is_empty());
        assert!(catalog.random(3).is_empty());
        assert_eq!(catalog.stats(), CatalogStats::default());
    }
}
