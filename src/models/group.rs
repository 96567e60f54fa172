use once_cell::sync::Lazy;
use regex::Regex;
use tokio_postgres::Row;

use super::{max_chars, require, FormErrors};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+\z").expect("slug pattern is valid"));

pub const TITLE_MAX_CHARS: usize = 200;
pub const SLUG_MAX_CHARS: usize = 50;

/// 投稿をまとめるコミュニティ。URL では `slug` で参照される。
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl Group {
    pub fn from_row(row: &Row) -> Self {
        Group {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
        }
    }
}

impl NewGroup {
    pub fn new(title: impl Into<String>, slug: impl Into<String>, description: impl Into<String>) -> Self {
        NewGroup {
            title: title.into().trim().to_string(),
            slug: slug.into().trim().to_string(),
            description: description.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        require(&mut errors, "title", &self.title);
        max_chars(&mut errors, "title", &self.title, TITLE_MAX_CHARS);

        require(&mut errors, "slug", &self.slug);
        max_chars(&mut errors, "slug", &self.slug, SLUG_MAX_CHARS);
        if !self.slug.is_empty() && !SLUG_RE.is_match(&self.slug) {
            errors.add(
                "slug",
                "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
            );
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_group() {
        let group = NewGroup::new("  Cats  ", "cats_and-dogs2", "All about cats");
        assert_eq!(group.title, "Cats");
        assert!(group.validate().is_ok());
    }

    #[test]
    fn test_invalid_slug() {
        let group = NewGroup::new("Cats", "cats & dogs", "");
        let errors = group.validate().unwrap_err();
        assert!(errors.has("slug"));
        assert!(!errors.has("title"));
    }

    #[test]
    fn test_missing_title_and_long_slug() {
        let group = NewGroup::new("", "a".repeat(51), "");
        let errors = group.validate().unwrap_err();
        assert!(errors.has("title"));
        assert!(errors.has("slug"));
    }
}
