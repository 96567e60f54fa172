use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_postgres::Row;

use super::{require, FormErrors};

/// 投稿へのコメント。表示用に著者のユーザー名を JOIN して保持する。
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub author_username: String,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl Comment {
    pub fn from_row(row: &Row) -> Self {
        Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author_id: row.get("author_id"),
            author_username: row.get("author_username"),
            text: row.get("text"),
            created: row.get("created"),
        }
    }
}

impl CommentForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        require(&mut errors, "text", &self.text);
        errors.into_result()
    }

    pub fn into_comment(self, post_id: i32, author_id: i32) -> NewComment {
        NewComment {
            post_id,
            author_id,
            text: self.text.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_form_validation() {
        let form = CommentForm {
            text: "коммент".to_string(),
        };
        assert!(form.validate().is_ok());

        let blank = CommentForm {
            text: " \n ".to_string(),
        };
        assert!(blank.validate().unwrap_err().has("text"));
    }

    #[test]
    fn test_into_comment_trims_text() {
        let comment = CommentForm {
            text: "  коммент  ".to_string(),
        }
        .into_comment(5, 9);
        assert_eq!(comment.post_id, 5);
        assert_eq!(comment.author_id, 9);
        assert_eq!(comment.text, "коммент");
    }

    #[test]
    fn test_comment_form_deserialization_defaults() {
        let form: CommentForm = serde_json::from_str("{}").expect("Failed to deserialize CommentForm");
        assert_eq!(form.text, "");
    }
}
