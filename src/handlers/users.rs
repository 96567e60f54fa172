// User handlers
// Sign up, log in/out, password change and password reset under /auth/

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        safe_next, CurrentUser, MaybeUser, RequireUser, ResetToken,
    },
    error::{AppError, AppResult},
    models::{
        FormErrors, LoginForm, PasswordChangeForm, PasswordResetForm, SetPasswordForm, SignupForm,
    },
    state::AppState,
    templates::{
        render, LoggedOutTemplate, LoginTemplate, PasswordChangeDoneTemplate,
        PasswordChangeTemplate, PasswordResetCompleteTemplate, PasswordResetConfirmTemplate,
        PasswordResetDoneTemplate, PasswordResetTemplate, SignupTemplate,
    },
};

const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Routes mounted under `/auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup/", get(signup_form).post(signup))
        .route("/login/", get(login_form).post(login))
        .route("/logout/", get(logout).post(logout))
        .route("/password_change/", get(password_change_form).post(password_change))
        .route("/password_change/done/", get(password_change_done))
        .route("/password_reset/", get(password_reset_form).post(password_reset))
        .route("/password_reset/done/", get(password_reset_done))
        .route("/reset/done/", get(password_reset_complete))
        .route("/reset/:token/", get(password_reset_confirm_form).post(password_reset_confirm))
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// GET /auth/signup/
pub async fn signup_form(MaybeUser(user): MaybeUser) -> AppResult<Html<String>> {
    render(&SignupTemplate {
        user,
        form: SignupForm::default(),
        errors: FormErrors::new(),
    })
}

/// POST /auth/signup/
/// 登録が成功したらトップページへ。ユーザー名の重複は DB の一意制約で検出する。
pub async fn signup(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    if let Err(errors) = form.validate() {
        debug!("Rejected sign up for {}: {:?}", form.username, errors);
        return Ok(render(&SignupTemplate { user, form, errors })?.into_response());
    }

    let password_hash = hash_password(&form.password1)?;

    match state.db.create_user(form.clone().into_new_user(password_hash)).await {
        Ok(created) => {
            info!("New user signed up: {}", created.username);
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::Conflict(message)) => {
            let mut errors = FormErrors::new();
            errors.add("username", message);
            Ok(render(&SignupTemplate { user, form, errors })?.into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /auth/login/
pub async fn login_form(
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
) -> AppResult<Html<String>> {
    render(&LoginTemplate {
        user,
        username: String::new(),
        next: query.next.unwrap_or_default(),
        errors: FormErrors::new(),
    })
}

/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let errors = match form.validate() {
        Ok(()) => {
            let candidate = state.db.find_user_by_username(form.username.trim()).await?;
            match candidate {
                Some(account) if verify_password(&form.password, &account.password_hash)? => {
                    let token = state.sessions.issue(&account)?;
                    let jar = jar.add(state.sessions.cookie(token));
                    info!("User {} logged in", account.username);

                    let target = safe_next(form.next.as_deref());
                    return Ok((jar, Redirect::to(&target)).into_response());
                }
                _ => {
                    warn!("Failed login attempt for username: {}", form.username);
                    let mut errors = FormErrors::new();
                    errors.add_non_field(INVALID_LOGIN);
                    errors
                }
            }
        }
        Err(errors) => errors,
    };

    Ok(render(&LoginTemplate {
        user: None,
        username: form.username,
        next: form.next.unwrap_or_default(),
        errors,
    })?
    .into_response())
}

/// GET|POST /auth/logout/
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> AppResult<Response> {
    let jar = jar.remove(state.sessions.removal_cookie());
    let page = render(&LoggedOutTemplate { user: None })?;

    Ok((jar, page).into_response())
}

/// GET /auth/password_change/
pub async fn password_change_form(RequireUser(user): RequireUser) -> AppResult<Html<String>> {
    render(&PasswordChangeTemplate {
        user: Some(user),
        errors: FormErrors::new(),
    })
}

/// POST /auth/password_change/
/// パスワードを変えると他の端末のセッションは失効するので、この端末には Cookie を発行し直す。
pub async fn password_change(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    jar: CookieJar,
    Form(form): Form<PasswordChangeForm>,
) -> AppResult<Response> {
    let mut errors = match form.validate(&user.username) {
        Ok(()) => FormErrors::new(),
        Err(errors) => errors,
    };

    if !form.old_password.is_empty() {
        let account = state
            .db
            .find_user_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User with id {} not found", user.id)))?;

        if !verify_password(&form.old_password, &account.password_hash)? {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
    }

    if !errors.is_empty() {
        return Ok(render(&PasswordChangeTemplate {
            user: Some(user),
            errors,
        })?
        .into_response());
    }

    let password_hash = hash_password(&form.new_password1)?;
    let account = state.db.set_password(user.id, &password_hash).await?;
    let jar = jar.add(state.sessions.cookie(state.sessions.issue(&account)?));
    info!("User {} changed their password", user.username);

    Ok((jar, Redirect::to("/auth/password_change/done/")).into_response())
}

/// GET /auth/password_change/done/
pub async fn password_change_done(RequireUser(user): RequireUser) -> AppResult<Html<String>> {
    render(&PasswordChangeDoneTemplate { user: Some(user) })
}

/// GET /auth/password_reset/
pub async fn password_reset_form(MaybeUser(user): MaybeUser) -> AppResult<Html<String>> {
    render(&PasswordResetTemplate {
        user,
        email: String::new(),
        errors: FormErrors::new(),
    })
}

/// POST /auth/password_reset/
/// 該当アカウントの有無にかかわらず完了画面へリダイレクトする。
pub async fn password_reset(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<PasswordResetForm>,
) -> AppResult<Response> {
    if let Err(errors) = form.validate() {
        return Ok(render(&PasswordResetTemplate {
            user,
            email: form.email,
            errors,
        })?
        .into_response());
    }

    let accounts = state.db.find_users_by_email(&form.normalized_email()).await?;
    if accounts.is_empty() {
        debug!("Password reset requested for an unknown email");
    }

    for account in accounts {
        let token = ResetToken::generate(Utc::now());
        state
            .db
            .create_reset_token(account.id, &token.value, token.expires_at)
            .await?;

        let link = token.link(&state.config.site_url);
        if let Err(e) = state.mailer.send_password_reset(&account, &link).await {
            error!("Failed to send password reset mail to user {}: {}", account.id, e);
        }
    }

    Ok(Redirect::to("/auth/password_reset/done/").into_response())
}

/// GET /auth/password_reset/done/
pub async fn password_reset_done(MaybeUser(user): MaybeUser) -> AppResult<Html<String>> {
    render(&PasswordResetDoneTemplate { user })
}

/// GET /auth/reset/:token/
pub async fn password_reset_confirm_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(token): Path<String>,
) -> AppResult<Html<String>> {
    let valid_link = state.db.find_valid_reset_token(&token).await?.is_some();
    if !valid_link {
        debug!("Invalid or expired password reset link opened");
    }

    render(&PasswordResetConfirmTemplate {
        user,
        valid_link,
        token,
        errors: FormErrors::new(),
    })
}

/// POST /auth/reset/:token/
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(token): Path<String>,
    Form(form): Form<SetPasswordForm>,
) -> AppResult<Response> {
    let Some(account) = state.db.find_valid_reset_token(&token).await? else {
        return Ok(invalid_reset_link(user, token)?.into_response());
    };

    if let Err(errors) = form.validate(&account.username) {
        return Ok(render(&PasswordResetConfirmTemplate {
            user,
            valid_link: true,
            token,
            errors,
        })?
        .into_response());
    }

    let password_hash = hash_password(&form.new_password1)?;
    if !state.db.consume_reset_token(&token, &password_hash).await? {
        return Ok(invalid_reset_link(user, token)?.into_response());
    }

    info!("User {} reset their password", account.username);
    Ok(Redirect::to("/auth/reset/done/").into_response())
}

fn invalid_reset_link(
    user: Option<CurrentUser>,
    token: String,
) -> AppResult<Html<String>> {
    render(&PasswordResetConfirmTemplate {
        user,
        valid_link: false,
        token,
        errors: FormErrors::new(),
    })
}

/// GET /auth/reset/done/
pub async fn password_reset_complete(MaybeUser(user): MaybeUser) -> AppResult<Html<String>> {
    render(&PasswordResetCompleteTemplate { user })
}
