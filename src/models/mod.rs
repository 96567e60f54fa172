// Models module

pub mod comment;
pub mod group;
pub mod post;
pub mod user;

use std::collections::BTreeMap;

// Re-export commonly used types
pub use comment::{Comment, CommentForm, NewComment};
pub use group::{Group, NewGroup};
pub use post::{NewPost, Post, PostCard, PostForm, UploadedImage};
pub use user::{
    LoginForm, NewUser, PasswordChangeForm, PasswordResetForm, SetPasswordForm, SignupForm, User,
};

/// Key used for errors that are not tied to a single form field.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// フォーム検証エラーをフィールド名ごとにまとめたもの。
/// テンプレート側では `errors.get("text")` のようにフィールド単位で取り出して表示する。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.add(NON_FIELD_ERRORS, message);
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        self.get(NON_FIELD_ERRORS)
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Validates a required free-text field, recording an error when it is blank.
pub(crate) fn require(errors: &mut FormErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
    }
}

/// Validates the maximum character count of a field.
pub(crate) fn max_chars(errors: &mut FormErrors, field: &str, value: &str, limit: usize) {
    let count = value.chars().count();
    if count > limit {
        errors.add(
            field,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                limit, count
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_errors_collects_per_field() {
        let mut errors = FormErrors::new();
        assert!(errors.is_empty());
        assert!(errors.get("text").is_empty());

        errors.add("text", "This field is required.");
        errors.add("text", "Too short.");
        errors.add_non_field("Passwords do not match.");

        assert!(errors.has("text"));
        assert!(!errors.has("group"));
        assert_eq!(errors.get("text").len(), 2);
        assert_eq!(errors.non_field(), &["Passwords do not match.".to_string()]);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_required_and_length_helpers() {
        let mut errors = FormErrors::new();
        require(&mut errors, "text", "   ");
        max_chars(&mut errors, "title", "abcdef", 5);
        max_chars(&mut errors, "slug", "abc", 5);

        assert_eq!(errors.get("text"), &["This field is required.".to_string()]);
        assert!(errors.get("title")[0].contains("at most 5 characters (it has 6)"));
        assert!(!errors.has("slug"));
    }
}
