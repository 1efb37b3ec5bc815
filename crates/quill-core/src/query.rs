//! Post listing filters and pagination.
//!
//! [`PostListQuery`] carries the raw query-string values, [`PostFilter`] the
//! validated conjunction of predicates that repositories apply.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Author, Post, PostStatus};
use crate::error::DomainError;

/// Page size used when the request does not name one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Upper bound on `page_size`; larger values are clamped.
pub const MAX_PAGE_SIZE: u64 = 100;
/// Largest row offset a page may start at (PostgreSQL `OFFSET` is a signed 64-bit value).
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Raw query parameters accepted by the post listing. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostListQuery {
    pub active: Option<String>,
    pub status: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub author_name: Option<String>,
    pub published_date_start: Option<String>,
    pub published_date_end: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PostListQuery {
    /// Validate the parameters into a filter and a page request.
    pub fn parse(&self) -> Result<(PostFilter, PageRequest), DomainError> {
        // Only the literal "true" selects active posts once the key is present.
        let active = self.active.as_deref().map(|v| v == "true").unwrap_or(true);

        let status = non_empty(&self.status)
            .map(|s| s.parse::<PostStatus>().map_err(DomainError::Validation))
            .transpose()?;

        let published_from = non_empty(&self.published_date_start)
            .map(|s| parse_day("published_date_start", s))
            .transpose()?
            .map(start_of_day);

        let published_until = non_empty(&self.published_date_end)
            .map(|s| parse_day("published_date_end", s))
            .transpose()?
            .map(|day| start_of_day(day) + TimeDelta::days(1));

        let filter = PostFilter {
            active,
            status,
            title: non_empty(&self.title).map(str::to_lowercase),
            content: non_empty(&self.content).map(str::to_lowercase),
            author_name: non_empty(&self.author_name).map(str::to_lowercase),
            published_from,
            published_until,
        };

        let page = PageRequest::new(
            parse_positive("page", self.page.as_deref())?.unwrap_or(1),
            parse_positive("page_size", self.page_size.as_deref())?.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if page.checked_offset().is_none_or(|offset| offset > MAX_OFFSET) {
            return Err(DomainError::Validation("page is out of range".to_string()));
        }

        Ok((filter, page))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_day(field: &str, value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        DomainError::Validation(format!("{field} must be a date formatted as YYYY-MM-DD"))
    })
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

fn parse_positive(field: &str, value: Option<&str>) -> Result<Option<u64>, DomainError> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => match raw.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(DomainError::Validation(format!(
                "{field} must be a positive integer"
            ))),
        },
    }
}

/// Validated post listing filter. All predicates must hold.
///
/// Text needles are stored lowercased; matching is case-insensitive substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFilter {
    pub active: bool,
    pub status: Option<PostStatus>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub author_name: Option<String>,
    /// Inclusive lower bound on `published_date`.
    pub published_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `published_date`.
    pub published_until: Option<DateTime<Utc>>,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            active: true,
            status: None,
            title: None,
            content: None,
            author_name: None,
            published_from: None,
            published_until: None,
        }
    }
}

impl PostFilter {
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn title(mut self, needle: &str) -> Self {
        self.title = Some(needle.to_lowercase());
        self
    }

    pub fn content(mut self, needle: &str) -> Self {
        self.content = Some(needle.to_lowercase());
        self
    }

    pub fn author_name(mut self, needle: &str) -> Self {
        self.author_name = Some(needle.to_lowercase());
        self
    }

    /// Whether a post (with its author) passes every predicate.
    pub fn matches(&self, post: &Post, author: &Author) -> bool {
        post.active == self.active
            && self.status.is_none_or(|s| post.status == s)
            && contains_ci(&post.title, self.title.as_deref())
            && contains_ci(&post.content, self.content.as_deref())
            && contains_ci(&author.name, self.author_name.as_deref())
            && self.published_from.is_none_or(|from| post.published_date >= from)
            && self
                .published_until
                .is_none_or(|until| post.published_date < until)
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|n| haystack.to_lowercase().contains(n))
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Build a request, clamping the page size to [`MAX_PAGE_SIZE`].
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Number of items to skip, saturating at `u64::MAX`.
    pub fn offset(&self) -> u64 {
        self.checked_offset().unwrap_or(u64::MAX)
    }

    pub fn checked_offset(&self) -> Option<u64> {
        (self.page - 1).checked_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }

    pub fn next_page(&self) -> Option<u64> {
        (self.page.saturating_mul(self.page_size) < self.total).then(|| self.page + 1)
    }

    pub fn previous_page(&self) -> Option<u64> {
        (self.page > 1).then(|| self.page - 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn author(name: &str) -> Author {
        Author {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    fn post(author: &Author, title: &str, content: &str, active: bool) -> Post {
        let mut post = Post::new(author.id, title.to_string(), content.to_string());
        post.active = active;
        post
    }

    fn query() -> PostListQuery {
        PostListQuery::default()
    }

    #[test]
    fn test_defaults_to_active_posts() {
        let (filter, page) = query().parse().unwrap();

        assert!(filter.active);
        assert_eq!(filter, PostFilter::default());
        assert_eq!(page, PageRequest::new(1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_active_only_true_literal_selects_active() {
        for (raw, expected) in [("true", true), ("false", false), ("yes", false), ("", false)] {
            let q = PostListQuery {
                active: Some(raw.to_string()),
                ..query()
            };
            let (filter, _) = q.parse().unwrap();
            assert_eq!(filter.active, expected, "active={raw:?}");
        }
    }

    #[test]
    fn test_status_must_be_known() {
        let q = PostListQuery {
            status: Some("published".to_string()),
            ..query()
        };
        assert_eq!(q.parse().unwrap().0.status, Some(PostStatus::Published));

        let q = PostListQuery {
            status: Some("archived".to_string()),
            ..query()
        };
        assert!(matches!(q.parse(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_empty_text_params_are_ignored() {
        let q = PostListQuery {
            title: Some(String::new()),
            content: Some(String::new()),
            author_name: Some(String::new()),
            status: Some(String::new()),
            ..query()
        };
        assert_eq!(q.parse().unwrap().0, PostFilter::default());
    }

    #[test]
    fn test_page_size_validation() {
        let q = PostListQuery {
            page_size: Some("abc".to_string()),
            ..query()
        };
        assert!(q.parse().is_err());

        let q = PostListQuery {
            page_size: Some("0".to_string()),
            ..query()
        };
        assert!(q.parse().is_err());

        let q = PostListQuery {
            page_size: Some("5000".to_string()),
            page: Some("3".to_string()),
            ..query()
        };
        let (_, page) = q.parse().unwrap();
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 2 * MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_past_addressable_range_rejected() {
        let q = PostListQuery {
            page: Some(u64::MAX.to_string()),
            ..query()
        };
        assert!(matches!(q.parse(), Err(DomainError::Validation(_))));

        // Largest page whose offset still fits, with the default page size.
        let last = MAX_OFFSET / DEFAULT_PAGE_SIZE + 1;
        let q = PostListQuery {
            page: Some(last.to_string()),
            ..query()
        };
        let (_, page) = q.parse().unwrap();
        assert_eq!(page.offset(), (last - 1) * DEFAULT_PAGE_SIZE);

        let q = PostListQuery {
            page: Some((last + 1).to_string()),
            ..query()
        };
        assert!(q.parse().is_err());
    }

    #[test]
    fn test_page_arithmetic_saturates() {
        let request = PageRequest::new(u64::MAX, MAX_PAGE_SIZE);
        assert_eq!(request.checked_offset(), None);
        assert_eq!(request.offset(), u64::MAX);

        let page: Page<u8> = Page::new(Vec::new(), 3, request);
        assert_eq!(page.next_page(), None);
    }

    #[test]
    fn test_date_range_covers_whole_days() {
        let q = PostListQuery {
            published_date_start: Some("2024-03-01".to_string()),
            published_date_end: Some("2024-03-01".to_string()),
            ..query()
        };
        let (filter, _) = q.parse().unwrap();

        let a = author("alice");
        let mut p = post(&a, "t", "c", true);

        p.published_date = "2024-03-01T23:59:59Z".parse().unwrap();
        assert!(filter.matches(&p, &a));

        p.published_date = "2024-03-01T00:00:00Z".parse().unwrap();
        assert!(filter.matches(&p, &a));

        p.published_date = "2024-03-02T00:00:00Z".parse().unwrap();
        assert!(!filter.matches(&p, &a));

        p.published_date = "2024-02-29T23:59:59Z".parse().unwrap();
        assert!(!filter.matches(&p, &a));
    }

    #[test]
    fn test_malformed_date_rejected() {
        let q = PostListQuery {
            published_date_end: Some("03/01/2024".to_string()),
            ..query()
        };
        assert!(matches!(q.parse(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_text_filters_are_case_insensitive_substrings() {
        let a = author("Jane Doe");
        let p = post(&a, "Rust Ownership Explained", "Borrowing RULES", true);

        assert!(PostFilter::default().title("ownership").matches(&p, &a));
        assert!(PostFilter::default().content("borrowing rules").matches(&p, &a));
        assert!(PostFilter::default().author_name("DOE").matches(&p, &a));
        assert!(!PostFilter::default().title("python").matches(&p, &a));
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let a = author("jane");
        let p = post(&a, "Rust", "async", true);

        let filter = PostFilter::default().title("rust").content("sync");
        assert!(filter.matches(&p, &a));

        let filter = filter.author_name("bob");
        assert!(!filter.matches(&p, &a));

        let filter = PostFilter::default().active(false);
        assert!(!filter.matches(&p, &a));

        let filter = PostFilter::default().status(PostStatus::Published);
        assert!(!filter.matches(&p, &a));
    }

    #[test]
    fn test_page_navigation() {
        let page = Page::new(vec![1, 2], 5, PageRequest::new(2, 2));
        assert_eq!(page.next_page(), Some(3));
        assert_eq!(page.previous_page(), Some(1));

        let last = Page::new(vec![5], 5, PageRequest::new(3, 2));
        assert_eq!(last.next_page(), None);

        let first = Page::<i32>::new(vec![], 0, PageRequest::default());
        assert_eq!(first.previous_page(), None);
        assert_eq!(first.next_page(), None);
    }
}
