use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio_postgres::Row;

use super::{max_chars, require, FormErrors};
use crate::auth::password::password_problems;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+\z").expect("username pattern is valid"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+\z").expect("email pattern is valid")
});

pub const USERNAME_MAX_CHARS: usize = 150;
pub const NAME_MAX_CHARS: usize = 150;
pub const EMAIL_MAX_CHARS: usize = 254;

/// 登録済みユーザーを表すドメインモデル。
/// `password_hash` は argon2 の PHC 文字列で、平文パスワードは保持しない。
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    /// パスワード変更のたびに増える。古いセッション Cookie の失効判定に使う。
    pub session_version: i32,
    pub date_joined: DateTime<Utc>,
}

/// INSERT 用の値。ハッシュ化済みパスワードを受け取る。
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

impl User {
    pub fn from_row(row: &Row) -> Self {
        User {
            id: row.get("id"),
            username: row.get("username"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            session_version: row.get("session_version"),
            date_joined: row.get("date_joined"),
        }
    }

    /// "First Last", falling back to the username when both names are blank.
    pub fn display_name(&self) -> String {
        display_name(&self.username, &self.first_name, &self.last_name)
    }
}

pub(crate) fn display_name(username: &str, first_name: &str, last_name: &str) -> String {
    let full_name = format!("{} {}", first_name.trim(), last_name.trim());
    let full_name = full_name.trim();
    if full_name.is_empty() {
        username.to_string()
    } else {
        full_name.to_string()
    }
}

/// サインアップフォーム。
/// 未送信フィールドは空文字として扱うため `#[serde(default)]` を付けている。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        let username = self.username.trim();
        require(&mut errors, "username", username);
        max_chars(&mut errors, "username", username, USERNAME_MAX_CHARS);
        if !username.is_empty() && !USERNAME_RE.is_match(username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        max_chars(&mut errors, "first_name", &self.first_name, NAME_MAX_CHARS);
        max_chars(&mut errors, "last_name", &self.last_name, NAME_MAX_CHARS);

        let email = self.email.trim();
        max_chars(&mut errors, "email", email, EMAIL_MAX_CHARS);
        if !email.is_empty() && !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }

        require(&mut errors, "password1", &self.password1);
        require(&mut errors, "password2", &self.password2);
        if !self.password2.is_empty() && self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        } else if !self.password1.is_empty() {
            for problem in password_problems(&self.password1, username) {
                errors.add("password2", problem);
            }
        }

        errors.into_result()
    }

    /// 入力をトリムし、ハッシュ済みパスワードと組み合わせて `NewUser` に変換する。
    pub fn into_new_user(self, password_hash: String) -> NewUser {
        NewUser {
            username: self.username.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: normalize_email(&self.email),
            password_hash,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        require(&mut errors, "username", &self.username);
        require(&mut errors, "password", &self.password);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

impl PasswordChangeForm {
    /// 旧パスワードの照合は DB のハッシュが必要なのでハンドラ側で行う。
    pub fn validate(&self, username: &str) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        require(&mut errors, "old_password", &self.old_password);
        validate_new_password(&mut errors, &self.new_password1, &self.new_password2, username);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordResetForm {
    pub email: String,
}

impl PasswordResetForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        let email = self.email.trim();
        require(&mut errors, "email", email);
        if !email.is_empty() && !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }
        errors.into_result()
    }

    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetPasswordForm {
    pub new_password1: String,
    pub new_password2: String,
}

impl SetPasswordForm {
    pub fn validate(&self, username: &str) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        validate_new_password(&mut errors, &self.new_password1, &self.new_password2, username);
        errors.into_result()
    }
}

fn validate_new_password(errors: &mut FormErrors, password1: &str, password2: &str, username: &str) {
    require(errors, "new_password1", password1);
    require(errors, "new_password2", password2);
    if password1.is_empty() || password2.is_empty() {
        return;
    }

    if password1 != password2 {
        errors.add("new_password2", "The two password fields didn't match.");
        return;
    }

    for problem in password_problems(password1, username) {
        errors.add("new_password2", problem);
    }
}

/// Email validation using a deliberately loose pattern
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Lowercases the domain part only, as mailbox local parts may be case-sensitive.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignupForm {
        SignupForm {
            first_name: "Leo".to_string(),
            last_name: "Tolstoy".to_string(),
            username: "leo".to_string(),
            email: "leo@Yasnaya.RU".to_string(),
            password1: "war-and-peace-1869".to_string(),
            password2: "war-and-peace-1869".to_string(),
        }
    }

    #[test]
    fn test_valid_signup() {
        assert!(signup().validate().is_ok());
    }

    #[test]
    fn test_signup_password_mismatch() {
        let form = SignupForm {
            password2: "something-else-1".to_string(),
            ..signup()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get("password2"),
            &["The two password fields didn't match.".to_string()]
        );
    }

    #[test]
    fn test_signup_weak_password() {
        let form = SignupForm {
            password1: "12345678".to_string(),
            password2: "12345678".to_string(),
            ..signup()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("password2"));
        assert!(!errors.has("username"));
    }

    #[test]
    fn test_signup_rejects_bad_username_and_email() {
        let form = SignupForm {
            username: "leo tolstoy".to_string(),
            email: "not-an-email".to_string(),
            ..signup()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("email"));
    }

    #[test]
    fn test_signup_requires_username() {
        let form = SignupForm {
            username: "  ".to_string(),
            ..signup()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("username"), &["This field is required.".to_string()]);
    }

    #[test]
    fn test_signup_email_is_optional() {
        let form = SignupForm {
            email: String::new(),
            ..signup()
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_into_new_user_normalizes_fields() {
        let form = SignupForm {
            username: "  leo  ".to_string(),
            ..signup()
        };
        let user = form.into_new_user("hash".to_string());
        assert_eq!(user.username, "leo");
        assert_eq!(user.email, "leo@yasnaya.ru");
        assert_eq!(user.password_hash, "hash");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("leo", "Leo", "Tolstoy"), "Leo Tolstoy");
        assert_eq!(display_name("leo", "", ""), "leo");
        assert_eq!(display_name("leo", "Leo", ""), "Leo");
    }

    #[test]
    fn test_set_password_form() {
        let ok = SetPasswordForm {
            new_password1: "anna-karenina-77".to_string(),
            new_password2: "anna-karenina-77".to_string(),
        };
        assert!(ok.validate("leo").is_ok());

        let similar = SetPasswordForm {
            new_password1: "leo-tolstoy".to_string(),
            new_password2: "leo-tolstoy".to_string(),
        };
        assert!(similar.validate("leo").unwrap_err().has("new_password2"));

        let empty = SetPasswordForm::default();
        let errors = empty.validate("leo").unwrap_err();
        assert!(errors.has("new_password1"));
        assert!(errors.has("new_password2"));
    }

    #[test]
    fn test_password_change_requires_old_password() {
        let form = PasswordChangeForm {
            old_password: String::new(),
            new_password1: "resurrection-99".to_string(),
            new_password2: "resurrection-99".to_string(),
        };
        assert!(form.validate("leo").unwrap_err().has("old_password"));
    }

    #[test]
    fn test_password_reset_form() {
        let form = PasswordResetForm {
            email: " Leo@Example.COM ".to_string(),
        };
        assert!(form.validate().is_ok());
        assert_eq!(form.normalized_email(), "Leo@example.com");

        let bad = PasswordResetForm {
            email: "leo".to_string(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_login_form_deserialization() {
        let form: LoginForm = serde_json::from_str(r#"{"username":"leo","password":"pw"}"#)
            .expect("Failed to deserialize LoginForm");
        assert_eq!(form.username, "leo");
        assert_eq!(form.next, None);
        assert!(form.validate().is_ok());

        let empty: LoginForm = serde_json::from_str("{}").expect("Failed to deserialize LoginForm");
        let errors = empty.validate().unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("password"));
    }
}
