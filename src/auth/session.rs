use std::time::Duration;

use axum::http::Uri;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::User;

pub const SESSION_COOKIE: &str = "yatube_session";
pub const LOGIN_URL: &str = "/auth/login/";

/// Claims stored in the session cookie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: String, // User ID
    pub username: String,
    pub ver: i32, // users.session_version at issue time
    pub exp: usize,
    pub iat: usize,
}

impl SessionClaims {
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }

    /// False once the password has changed since the token was issued.
    pub fn is_current_for(&self, user: &User) -> bool {
        self.user_id() == Some(user.id) && self.ver == user.session_version
    }
}

/// セッショントークンの署名・検証に使う鍵の組。起動時に一度だけ生成して共有する。
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration, secure: bool) -> Self {
        SessionKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
            secure,
        }
    }

    /// Signs a token for `user` valid for the configured session lifetime.
    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = SessionClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            ver: user.session_version,
            iat: now,
            exp: now + self.ttl.as_secs() as usize,
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &SessionClaims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Session token signing failed: {}", e)))
    }

    /// Returns the claims of a valid, unexpired token and `None` for anything else.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        match decode::<SessionClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                None
            }
        }
    }

    /// Cookie carrying a freshly issued token.
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }

    /// Cookie used to remove the session on logout.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, "")).path("/").build()
    }
}

/// ログイン後のリダイレクト先として安全な、サイト内の相対パスだけを通す。
/// Location ヘッダにそのまま載せるため、表示可能な ASCII 以外は拒否する。
pub fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && path.chars().all(|c| c.is_ascii_graphic()) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// `/auth/login/?next=<path>` for the given request URI. `/` stays readable in the query.
pub fn login_url(uri: &Uri) -> String {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!(
        "{}?next={}",
        LOGIN_URL,
        urlencoding::encode(target).replace("%2F", "/")
    )
}
