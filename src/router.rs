use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::{
    handlers::{health_check, not_found, posts, users},
    media::MAX_UPLOAD_BYTES,
    middleware::create_middleware_stack,
    state::AppState,
};

/// Create the Axum router with all pages, static media and middleware
pub fn create_router(state: AppState) -> Router {
    let media = ServeDir::new(state.media.root());

    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Post pages
        .route("/", get(posts::index))
        .route("/group/:slug/", get(posts::group_posts))
        .route("/profile/:username/", get(posts::profile))
        .route("/profile/:username/follow/", get(posts::profile_follow))
        .route("/profile/:username/unfollow/", get(posts::profile_unfollow))
        .route("/posts/:post_id/", get(posts::post_detail))
        .route("/posts/:post_id/edit/", get(posts::post_edit_form).post(posts::post_edit))
        .route("/posts/:post_id/comment/", post(posts::add_comment))
        .route("/create/", get(posts::post_create_form).post(posts::post_create))
        .route("/follow/", get(posts::follow_index))
        // Authentication pages
        .nest("/auth", users::router())
        // Uploaded images
        .nest_service("/media", media)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(create_middleware_stack())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    async fn send(request: Request<Body>) -> Response {
        create_router(test_state())
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_unknown_page_renders_not_found() {
        let response = send(get("/unexisting_page/")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("404"));
    }

    #[tokio::test]
    async fn test_unknown_auth_page_renders_not_found() {
        let response = send(get("/auth/nothing-here/")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_numeric_post_id_is_not_found() {
        let response = send(get("/posts/abc/")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_anonymous_create_redirects_to_login() {
        let response = send(get("/create/")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/?next=/create/");
    }

    #[tokio::test]
    async fn test_anonymous_comment_redirects_to_login() {
        let response = send(post_form("/posts/1/comment/", "text=hello")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/?next=/posts/1/comment/");
    }

    #[tokio::test]
    async fn test_anonymous_edit_and_follow_pages_redirect_to_login() {
        for uri in [
            "/posts/1/edit/",
            "/follow/",
            "/profile/leo/follow/",
            "/profile/leo/unfollow/",
        ] {
            let response = send(get(uri)).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
            assert_eq!(location(&response), format!("/auth/login/?next={}", uri));
        }
    }

    #[tokio::test]
    async fn test_nested_login_redirect_keeps_full_path() {
        let response = send(get("/auth/password_change/")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/?next=/auth/password_change/");
    }

    #[tokio::test]
    async fn test_public_auth_pages_render() {
        for uri in [
            "/auth/signup/",
            "/auth/login/",
            "/auth/password_reset/",
            "/auth/password_reset/done/",
            "/auth/reset/done/",
        ] {
            let response = send(get(uri)).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_signup_with_mismatched_passwords_rerenders_form() {
        let response = send(post_form(
            "/auth/signup/",
            "username=leo&email=leo%40example.com&password1=war-and-peace-1869&password2=anna-karenina-1877",
        ))
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("password fields didn"));
        assert!(body.contains("value=\"leo\""));
    }

    #[tokio::test]
    async fn test_login_with_empty_fields_rerenders_form() {
        let response = send(post_form("/auth/login/", "username=&password=")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("This field is required."));
    }

    #[tokio::test]
    async fn test_logout_clears_session_cookie() {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/logout/")
            .header(header::COOKIE, "yatube_session=stale")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(cookie.starts_with("yatube_session="));
        assert!(body_text(response).await.contains("logged out"));
    }

    #[tokio::test]
    async fn test_tampered_session_cookie_is_treated_as_anonymous() {
        let request = Request::builder()
            .uri("/create/")
            .header(header::COOKIE, "yatube_session=not-a-token")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/?next=/create/");
    }

    #[tokio::test]
    async fn test_health_reports_unavailable_database() {
        let response = send(get("/health")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    mod with_database {
        use super::*;
        use crate::auth::SESSION_COOKIE;
        use crate::db::test_database;
        use crate::models::{NewPost, NewUser, Post, User};
        use crate::state::{test_config, test_state_with, AppState};
        use chrono::Utc;
        use uuid::Uuid;

        const BOUNDARY: &str = "yatube-boundary";

        async fn database_state() -> Option<AppState> {
            let db = test_database().await?;
            Some(test_state_with(db, test_config()))
        }

        async fn create_user(state: &AppState, prefix: &str) -> User {
            let username = format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12]);
            state
                .db
                .create_user(NewUser {
                    email: format!("{}@example.com", username),
                    username,
                    first_name: String::new(),
                    last_name: String::new(),
                    password_hash: "not-a-real-hash".to_string(),
                })
                .await
                .unwrap()
        }

        async fn create_post(state: &AppState, author: &User, text: &str) -> Post {
            state
                .db
                .create_post(NewPost {
                    author_id: author.id,
                    text: text.to_string(),
                    group_id: None,
                    image: None,
                })
                .await
                .unwrap()
        }

        fn session_cookie(state: &AppState, user: &User) -> String {
            format!("{}={}", SESSION_COOKIE, state.sessions.issue(user).unwrap())
        }

        async fn send_to(state: &AppState, request: Request<Body>) -> Response {
            create_router(state.clone())
                .oneshot(request)
                .await
                .expect("router is infallible")
        }

        fn get_as(uri: &str, cookie: &str) -> Request<Body> {
            Request::builder()
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap()
        }

        fn multipart_as(uri: &str, cookie: &str, text: &str) -> Request<Body> {
            let body = format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n{text}\r\n--{b}--\r\n",
                b = BOUNDARY,
                text = text
            );
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::COOKIE, cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap()
        }

        #[tokio::test]
        async fn test_non_author_is_redirected_from_edit_page() {
            let Some(state) = database_state().await else { return };
            let author = create_user(&state, "author").await;
            let intruder = create_user(&state, "intruder").await;
            let post = create_post(&state, &author, "Пост").await;
            let cookie = session_cookie(&state, &intruder);
            let edit_uri = format!("/posts/{}/edit/", post.id);
            let detail_uri = format!("/posts/{}/", post.id);

            let response = send_to(&state, get_as(&edit_uri, &cookie)).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), detail_uri);

            let response = send_to(&state, multipart_as(&edit_uri, &cookie, "Взлом")).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), detail_uri);

            let unchanged = state.db.get_post(post.id).await.unwrap();
            assert_eq!(unchanged.text, "Пост");
        }

        #[tokio::test]
        async fn test_author_can_edit_post() {
            let Some(state) = database_state().await else { return };
            let author = create_user(&state, "author").await;
            let post = create_post(&state, &author, "Пост").await;
            let cookie = session_cookie(&state, &author);
            let edit_uri = format!("/posts/{}/edit/", post.id);

            let response = send_to(&state, get_as(&edit_uri, &cookie)).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_text(response).await.contains("Edit post"));

            let response = send_to(&state, multipart_as(&edit_uri, &cookie, "Изм.пост")).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), format!("/posts/{}/", post.id));

            let edited = state.db.get_post(post.id).await.unwrap();
            assert_eq!(edited.text, "Изм.пост");
        }

        #[tokio::test]
        async fn test_follow_page_lists_followed_authors_only() {
            let Some(state) = database_state().await else { return };
            let author = create_user(&state, "author").await;
            let follower = create_user(&state, "follower").await;
            let stranger = create_user(&state, "stranger").await;
            let text = format!("Пост для ленты {}", Uuid::new_v4().simple());
            create_post(&state, &author, &text).await;

            let follow_uri = format!("/profile/{}/follow/", author.username);
            let response = send_to(&state, get_as(&follow_uri, &session_cookie(&state, &follower))).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert!(state.db.is_following(follower.id, author.id).await.unwrap());

            let response = send_to(&state, get_as("/follow/", &session_cookie(&state, &follower))).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_text(response).await.contains(&text));

            let response = send_to(&state, get_as("/follow/", &session_cookie(&state, &stranger))).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(!body_text(response).await.contains(&text));
        }

        #[tokio::test]
        async fn test_session_issued_before_password_reset_is_rejected() {
            let Some(state) = database_state().await else { return };
            let account = create_user(&state, "victim").await;
            let stale_cookie = session_cookie(&state, &account);

            let response = send_to(&state, get_as("/follow/", &stale_cookie)).await;
            assert_eq!(response.status(), StatusCode::OK);

            let token = Uuid::new_v4().simple().to_string();
            state
                .db
                .create_reset_token(account.id, &token, Utc::now() + chrono::Duration::days(3))
                .await
                .unwrap();
            assert!(state.db.consume_reset_token(&token, "reset-hash").await.unwrap());

            let response = send_to(&state, get_as("/follow/", &stale_cookie)).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), "/auth/login/?next=/follow/");
        }
    }
}
