use chrono::{DateTime, Utc};
use tokio_postgres::Row;

use super::{require, FormErrors, Group};
use crate::media::validate_image;

/// Number of words shown for a post on listing pages.
pub const EXCERPT_WORDS: usize = 30;

/// posts テーブルの 1 行をそのまま表すエンティティ。
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i32,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// 一覧・詳細表示用に著者とグループの表示項目を JOIN 済みの投稿。
/// テンプレートから追加のクエリを発行しなくて済むようにしている。
#[derive(Debug, Clone, PartialEq)]
pub struct PostCard {
    pub id: i32,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub image: Option<String>,
    pub author_id: i32,
    pub author_username: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub group_id: Option<i32>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i32,
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// A file received from a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// 投稿の作成・編集フォーム。
/// `group` は `<select>` の生の値 (空文字なら未選択) をそのまま保持する。
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

impl Post {
    pub fn from_row(row: &Row) -> Self {
        Post {
            id: row.get("id"),
            text: row.get("text"),
            pub_date: row.get("pub_date"),
            author_id: row.get("author_id"),
            group_id: row.get("group_id"),
            image: row.get("image"),
        }
    }
}

impl PostCard {
    pub fn from_row(row: &Row) -> Self {
        PostCard {
            id: row.get("id"),
            text: row.get("text"),
            pub_date: row.get("pub_date"),
            image: row.get("image"),
            author_id: row.get("author_id"),
            author_username: row.get("author_username"),
            author_first_name: row.get("author_first_name"),
            author_last_name: row.get("author_last_name"),
            group_id: row.get("group_id"),
            group_title: row.get("group_title"),
            group_slug: row.get("group_slug"),
        }
    }

    pub fn author_name(&self) -> String {
        super::user::display_name(
            &self.author_username,
            &self.author_first_name,
            &self.author_last_name,
        )
    }

    /// 先頭 `EXCERPT_WORDS` 語だけを残し、省略した場合は末尾に `…` を付ける。
    pub fn excerpt(&self) -> String {
        let words: Vec<&str> = self.text.split_whitespace().collect();
        if words.len() <= EXCERPT_WORDS {
            words.join(" ")
        } else {
            format!("{} …", words[..EXCERPT_WORDS].join(" "))
        }
    }

    /// The first 15 characters, used for page titles.
    pub fn short_title(&self) -> String {
        self.text.chars().take(15).collect()
    }
}

impl PostForm {
    /// 編集画面の初期値として既存の投稿を流し込む。
    pub fn from_post(post: &PostCard) -> Self {
        PostForm {
            text: post.text.clone(),
            group: post.group_id.map(|id| id.to_string()).unwrap_or_default(),
            image: None,
            clear_image: false,
        }
    }

    /// The group id the `<select>` currently points at, if it parses.
    pub fn selected_group(&self) -> Option<i32> {
        self.group.trim().parse().ok()
    }

    /// 入力を検証し、選択されたグループ ID (未選択なら `None`) を返す。
    /// グループは存在するものだけを受け付ける。
    pub fn validate(&self, groups: &[Group]) -> Result<Option<i32>, FormErrors> {
        let mut errors = FormErrors::new();

        require(&mut errors, "text", &self.text);

        let group_raw = self.group.trim();
        let group_id = if group_raw.is_empty() {
            None
        } else {
            match group_raw.parse::<i32>() {
                Ok(id) if groups.iter().any(|group| group.id == id) => Some(id),
                _ => {
                    errors.add(
                        "group",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                    None
                }
            }
        };

        if let Some(ref image) = self.image {
            if self.clear_image {
                errors.add(
                    "image",
                    "Please either submit a file or check the clear checkbox, not both.",
                );
            } else if let Err(message) = validate_image(image) {
                errors.add("image", message);
            }
        }

        errors.into_result().map(|_| group_id)
    }

    /// Trimmed post body, matching what gets stored.
    pub fn normalized_text(&self) -> String {
        self.text.trim().to_string()
    }
}
