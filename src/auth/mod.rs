// Authentication: password hashing, session cookies and request extractors

pub mod password;
pub mod reset;
pub mod session;

use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

pub use reset::ResetToken;
pub use session::{login_url, safe_next, SessionClaims, SessionKeys, LOGIN_URL, SESSION_COOKIE};

/// The logged-in user as seen by handlers and templates.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        CurrentUser {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// 匿名アクセスも許すエクストラクタ。Cookie が無い・不正な場合は `None` になる。
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

/// ログイン必須のエクストラクタ。匿名ならログイン画面へリダイレクトする。
#[derive(Debug, Clone)]
pub struct RequireUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(MaybeUser(None));
        };

        let Some(claims) = state.sessions.verify(cookie.value()) else {
            return Ok(MaybeUser(None));
        };
        let Some(user_id) = claims.user_id() else {
            return Ok(MaybeUser(None));
        };

        // The account may have been removed, or its password changed, since the cookie was issued.
        let user = state
            .db
            .find_user_by_id(user_id)
            .await?
            .filter(|account| claims.is_current_for(account));
        Ok(MaybeUser(user.as_ref().map(CurrentUser::from)))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match user {
            Some(user) => Ok(RequireUser(user)),
            None => {
                // Nested routers strip their prefix from `parts.uri`.
                let uri = parts
                    .extensions
                    .get::<OriginalUri>()
                    .map(|original| &original.0)
                    .unwrap_or(&parts.uri);
                tracing::debug!("Anonymous request to {} redirected to login", uri.path());
                Err(Redirect::to(&login_url(uri)).into_response())
            }
        }
    }
}
