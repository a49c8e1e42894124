//! Client-side recordings catalog

use super::schema::{RecordingId, RecordingRecord};

/// In-memory list of server-confirmed recordings, newest first
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<RecordingRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<RecordingRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RecordingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the contents with a fresh list from the service
    pub fn replace(&mut self, records: Vec<RecordingRecord>) {
        tracing::debug!("Catalog refreshed with {} recordings", records.len());
        self.records = records;
    }

    /// Insert a newly uploaded record at the front
    pub fn prepend(&mut self, record: RecordingRecord) {
        self.records.insert(0, record);
    }

    pub fn get(&self, id: &RecordingId) -> Option<&RecordingRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn remove(&mut self, id: &RecordingId) -> Option<RecordingRecord> {
        let index = self.records.iter().position(|r| &r.id == id)?;
        Some(self.records.remove(index))
    }

    /// Records matching a free-text query and a tag filter
    ///
    /// `query` is matched case-insensitively as a substring of the title or
    /// the creator. A non-empty `tags` filter keeps records sharing at least
    /// one tag with it.
    pub fn filter(&self, query: &str, tags: &[String]) -> Vec<&RecordingRecord> {
        let needle = query.to_lowercase();
        self.records
            .iter()
            .filter(|record| matches_query(record, &needle) && matches_tags(record, tags))
            .collect()
    }

    /// Distinct tags across the catalog, in first-seen order
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.records.iter().flat_map(|r| r.tags.iter()) {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }
}

fn matches_query(record: &RecordingRecord, needle: &str) -> bool {
    needle.is_empty()
        || record.title.to_lowercase().contains(needle)
        || record.creator.to_lowercase().contains(needle)
}

fn matches_tags(record: &RecordingRecord, tags: &[String]) -> bool {
    tags.is_empty() || tags.iter().any(|tag| record.has_tag(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, title: &str, creator: &str, tags: &[&str]) -> RecordingRecord {
        RecordingRecord {
            id: RecordingId::new(id),
            title: title.to_string(),
            description: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            creator: creator.to_string(),
            duration: Some("1:00".to_string()),
            file_size: Some(10),
            mime_type: Some("video/webm".to_string()),
            created_at: Utc::now(),
            media_locator: None,
        }
    }

    fn sample() -> Catalog {
        Catalog::from_records(vec![
            record("1", "API Basics", "Alice", &["api", "react"]),
            record("2", "Cooking 101", "Bob", &["food"]),
            record("3", "Hooks deep dive", "Carol", &["react"]),
        ])
    }

    #[test]
    fn test_filter_by_query_is_case_insensitive() {
        let catalog = sample();
        let titles: Vec<&str> = catalog.filter("api", &[]).iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["API Basics"]);
    }

    #[test]
    fn test_filter_matches_creator() {
        let catalog = sample();
        let found = catalog.filter("BOB", &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Cooking 101");
    }

    #[test]
    fn test_filter_by_tag() {
        let catalog = sample();
        let ids: Vec<&str> = catalog
            .filter("", &["react".to_string()])
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_filter_combines_query_and_tags() {
        let catalog = sample();
        let found = catalog.filter("hooks", &["react".to_string(), "food".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "3");
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_prepend_remove_and_tags() {
        let mut catalog = sample();
        catalog.prepend(record("4", "Newest", "Dan", &["rust", "api"]));

        assert_eq!(catalog.records()[0].id.as_str(), "4");
        assert_eq!(catalog.all_tags(), vec!["rust", "api", "react", "food"]);

        let removed = catalog.remove(&RecordingId::new("2")).unwrap();
        assert_eq!(removed.title, "Cooking 101");
        assert!(catalog.get(&RecordingId::new("2")).is_none());
        assert!(catalog.remove(&RecordingId::new("2")).is_none());
    }
}
