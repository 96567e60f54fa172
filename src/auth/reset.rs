use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Reset links stay valid for this many days.
pub const RESET_TOKEN_TTL_DAYS: i64 = 3;

/// パスワード再設定用のワンタイムトークン。DB に保存され、使用後は無効になる。
#[derive(Debug, Clone, PartialEq)]
pub struct ResetToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate(now: DateTime<Utc>) -> Self {
        ResetToken {
            value: Uuid::new_v4().simple().to_string(),
            expires_at: now + Duration::days(RESET_TOKEN_TTL_DAYS),
        }
    }

    /// Absolute link mailed to the user.
    pub fn link(&self, site_url: &str) -> String {
        format!("{}/auth/reset/{}/", site_url.trim_end_matches('/'), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tokens_are_unique_and_expire_in_three_days() {
        let now = Utc.with_ymd_and_hms(2022, 5, 1, 10, 0, 0).unwrap();
        let first = ResetToken::generate(now);
        let second = ResetToken::generate(now);

        assert_ne!(first.value, second.value);
        assert_eq!(first.value.len(), 32);
        assert_eq!(first.expires_at, Utc.with_ymd_and_hms(2022, 5, 4, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_link_joins_site_url() {
        let token = ResetToken {
            value: "abc".to_string(),
            expires_at: Utc::now(),
        };
        assert_eq!(token.link("http://localhost:8080/"), "http://localhost:8080/auth/reset/abc/");
        assert_eq!(token.link("https://yatube.example"), "https://yatube.example/auth/reset/abc/");
    }
}
