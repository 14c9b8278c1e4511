//! Listing and traversal options

use crate::error::Result;
use crate::id::{Id, Metadata};
use crate::limits;
use crate::relation::Direction;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Field results are ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Id,
    Name,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Ordering and paging for any listing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(default)]
    pub sort_field: SortField,

    #[serde(default)]
    pub sort_order: SortOrder,

    /// Results to skip after sorting
    #[serde(default)]
    pub offset: usize,

    /// Page size; `None` returns every remaining result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_results: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_field = field;
        self.sort_order = order;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, number_of_results: usize) -> Self {
        self.number_of_results = Some(number_of_results);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.number_of_results {
            limits::validate_page_size(size)?;
        }
        Ok(())
    }

    /// Compare two instances' metadata under these options
    ///
    /// Ties on the sort field fall back to the ID so paging is stable.
    pub fn compare(&self, a: &Metadata, b: &Metadata) -> Ordering {
        let ordering = match self.sort_field {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Name => a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)),
            SortField::UpdatedAt => a
                .updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.id.cmp(&b.id)),
        };

        match self.sort_order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }

    /// Sort `items` and cut out the requested page
    pub fn apply<T, F>(&self, mut items: Vec<T>, metadata: F) -> Vec<T>
    where
        F: Fn(&T) -> &Metadata,
    {
        items.sort_by(|a, b| self.compare(metadata(a), metadata(b)));

        let page = items.into_iter().skip(self.offset);
        match self.number_of_results {
            Some(n) => page.take(n).collect(),
            None => page.collect(),
        }
    }
}

/// Options for `list_by_type`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListByTypeOptions {
    #[serde(default)]
    pub include_subclasses: bool,

    #[serde(default)]
    pub list: ListOptions,
}

impl ListByTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subclasses(mut self) -> Self {
        self.include_subclasses = true;
        self
    }

    pub fn with_list(mut self, list: ListOptions) -> Self {
        self.list = list;
        self
    }
}

/// Options for `list_from_by_type`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFromByTypeOptions {
    #[serde(default)]
    pub include_subclasses: bool,

    /// Maximum hops; `None` uses the store's configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    #[serde(default)]
    pub direction: Direction,

    /// Relation and entity types a walk may pass through (always expanded with subclasses)
    #[serde(default)]
    pub constrain_by_type: Vec<Id>,

    #[serde(default)]
    pub list: ListOptions,
}

impl ListFromByTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subclasses(mut self) -> Self {
        self.include_subclasses = true;
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn constrained_by(mut self, type_id: impl Into<Id>) -> Self {
        self.constrain_by_type.push(type_id.into());
        self
    }

    pub fn with_list(mut self, list: ListOptions) -> Self {
        self.list = list;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn meta(id: &str, name: &str, age_secs: i64) -> Metadata {
        let mut m = Metadata::new(id, "/entity").with_name(name);
        m.updated_at = Utc::now() - Duration::seconds(age_secs);
        m
    }

    #[test]
    fn test_default_list_returns_everything_by_id() {
        let items = vec![meta("c", "", 0), meta("a", "", 0), meta("b", "", 0)];
        let page = ListOptions::default().apply(items, |m| m);

        let ids: Vec<&str> = page.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_paging_after_sort() {
        let items: Vec<Metadata> = (0..10).map(|i| meta(&format!("i{}", i), "", 0)).collect();
        let options = ListOptions::new().with_offset(8).with_limit(5);
        let page = options.apply(items, |m| m);

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id.as_str(), "i8");
    }

    #[test]
    fn test_sort_by_name_descending() {
        let items = vec![meta("1", "alpha", 0), meta("2", "gamma", 0), meta("3", "beta", 0)];
        let options = ListOptions::new().sorted_by(SortField::Name, SortOrder::Descending);
        let page = options.apply(items, |m| m);

        let names: Vec<&str> = page.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["gamma", "beta", "alpha"]);
    }

    #[test]
    fn test_sort_by_updated_at() {
        let items = vec![meta("old", "", 300), meta("new", "", 0), meta("mid", "", 60)];
        let options = ListOptions::new().sorted_by(SortField::UpdatedAt, SortOrder::Ascending);
        let page = options.apply(items, |m| m);

        assert_eq!(page[0].id.as_str(), "old");
        assert_eq!(page[2].id.as_str(), "new");
    }

    #[test]
    fn test_page_size_limit() {
        assert!(ListOptions::new().with_limit(10).validate().is_ok());
        assert!(ListOptions::new()
            .with_limit(limits::MAX_PAGE_SIZE + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_traversal_options_from_json() {
        let options: ListFromByTypeOptions = serde_json::from_str(
            r#"{"max_depth": 3, "direction": "in", "constrain_by_type": ["/relation/connects_to"]}"#,
        )
        .unwrap();

        assert_eq!(options.max_depth, Some(3));
        assert_eq!(options.direction, Direction::In);
        assert!(!options.include_subclasses);
        assert_eq!(options.list, ListOptions::default());
    }
}
