// Post handlers
// Listing pages, post detail, create/edit forms, comments and follows

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use tracing::{debug, info};

use crate::{
    auth::{CurrentUser, MaybeUser, RequireUser},
    error::{AppError, AppResult},
    media::MediaStore,
    models::{CommentForm, FormErrors, Group, NewPost, PostForm, UploadedImage},
    pagination::PageQuery,
    state::AppState,
    templates::{
        render, FollowTemplate, GroupOption, GroupTemplate, IndexTemplate, PostDetailTemplate,
        PostFormTemplate, ProfileTemplate,
    },
};

pub(crate) fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

pub(crate) fn post_url(post_id: i32) -> String {
    format!("/posts/{}/", post_id)
}

/// URL の `:post_id` を数値に変換する。数値でなければ存在しない投稿として 404 を返す。
fn parse_post_id(raw: &str) -> AppResult<i32> {
    raw.parse::<i32>()
        .map_err(|_| AppError::not_found(format!("Post with id {} not found", raw)))
}

/// Main page: every post, newest first
/// GET /
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let page = state.db.list_posts(query.request(state.per_page())).await?;
    debug!("Index page {} of {}", page.number, page.num_pages);

    render(&IndexTemplate { user, page })
}

/// Posts of one group
/// GET /group/:slug/
pub async fn group_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let group = state.db.get_group_by_slug(&slug).await?;
    let page = state
        .db
        .list_group_posts(group.id, query.request(state.per_page()))
        .await?;

    render(&GroupTemplate { user, group, page })
}

/// Author profile with their posts and the follow button
/// GET /profile/:username/
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let author = state.db.get_user_by_username(&username).await?;
    let page = state
        .db
        .list_author_posts(author.id, query.request(state.per_page()))
        .await?;

    let (following, can_follow) = match user {
        Some(ref viewer) if viewer.id != author.id => {
            (state.db.is_following(viewer.id, author.id).await?, true)
        }
        _ => (false, false),
    };

    render(&ProfileTemplate {
        user,
        posts_count: page.total,
        author,
        page,
        following,
        can_follow,
    })
}

/// GET /posts/:post_id/
pub async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(post_id): Path<String>,
) -> AppResult<Html<String>> {
    let post_id = parse_post_id(&post_id)?;
    let post = state.db.get_post(post_id).await?;
    let posts_count = state.db.count_posts_by_author(post.author_id).await?;
    let comments = state.db.list_comments(post.id).await?;
    let is_author = user.as_ref().is_some_and(|viewer| viewer.id == post.author_id);

    render(&PostDetailTemplate {
        user,
        post,
        posts_count,
        comments,
        is_author,
    })
}

/// GET /create/
pub async fn post_create_form(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> AppResult<Html<String>> {
    let groups = state.db.list_groups().await?;

    render_post_form(user, &groups, None, &PostForm::default(), None, FormErrors::new())
}

/// POST /create/
pub async fn post_create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = read_post_form(multipart).await?;
    let groups = state.db.list_groups().await?;

    let group_id = match form.validate(&groups) {
        Ok(group_id) => group_id,
        Err(errors) => {
            debug!("Rejected new post from {}: {:?}", user.username, errors);
            let page = render_post_form(user, &groups, None, &form, None, errors)?;
            return Ok(page.into_response());
        }
    };

    let image = match form.image {
        Some(ref upload) => Some(state.media.save_post_image(upload).await?),
        None => None,
    };

    let created = state
        .db
        .create_post(NewPost {
            author_id: user.id,
            text: form.normalized_text(),
            group_id,
            image: image.clone(),
        })
        .await;
    let post = discard_on_error(&state.media, image.as_deref(), created).await?;

    info!("User {} published post {}", user.username, post.id);
    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

/// GET /posts/:post_id/edit/
pub async fn post_edit_form(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let post_id = parse_post_id(&post_id)?;
    let post = state.db.get_post(post_id).await?;

    if post.author_id != user.id {
        debug!("User {} may not edit post {}", user.username, post.id);
        return Ok(Redirect::to(&post_url(post.id)).into_response());
    }

    let groups = state.db.list_groups().await?;
    let form = PostForm::from_post(&post);
    let page = render_post_form(
        user,
        &groups,
        Some(post.id),
        &form,
        post.image,
        FormErrors::new(),
    )?;
    Ok(page.into_response())
}

/// POST /posts/:post_id/edit/
/// 著者以外は投稿詳細へ戻す。画像は新規アップロード、クリア、現状維持のいずれか。
pub async fn post_edit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let post_id = parse_post_id(&post_id)?;
    let post = state.db.get_post(post_id).await?;

    if post.author_id != user.id {
        debug!("User {} may not edit post {}", user.username, post.id);
        return Ok(Redirect::to(&post_url(post.id)).into_response());
    }

    let form = read_post_form(multipart).await?;
    let groups = state.db.list_groups().await?;

    let group_id = match form.validate(&groups) {
        Ok(group_id) => group_id,
        Err(errors) => {
            let page = render_post_form(
                user,
                &groups,
                Some(post.id),
                &form,
                post.image,
                errors,
            )?;
            return Ok(page.into_response());
        }
    };

    let uploaded = match form.image {
        Some(ref upload) => Some(state.media.save_post_image(upload).await?),
        None => None,
    };
    let image = match uploaded {
        Some(ref stored) => Some(stored.clone()),
        None if form.clear_image => None,
        None => post.image,
    };

    let updated = state
        .db
        .update_post(post.id, &form.normalized_text(), group_id, image.as_deref())
        .await;
    discard_on_error(&state.media, uploaded.as_deref(), updated).await?;

    info!("User {} edited post {}", user.username, post.id);
    Ok(Redirect::to(&post_url(post.id)).into_response())
}

/// Removes the image stored for this request when the post could not be saved.
async fn discard_on_error<T>(
    media: &MediaStore,
    stored: Option<&str>,
    result: AppResult<T>,
) -> AppResult<T> {
    if result.is_err() {
        if let Some(stored) = stored {
            media.remove(stored).await;
        }
    }
    result
}

/// `editing` が `Some(id)` なら編集画面、`None` なら新規作成画面。
fn render_post_form(
    user: CurrentUser,
    groups: &[Group],
    editing: Option<i32>,
    form: &PostForm,
    current_image: Option<String>,
    errors: FormErrors,
) -> AppResult<Html<String>> {
    let options = GroupOption::list(groups, form.selected_group());
    let no_group_selected = !options.iter().any(|option| option.selected);
    let action = match editing {
        Some(post_id) => format!("/posts/{}/edit/", post_id),
        None => "/create/".to_string(),
    };

    render(&PostFormTemplate {
        user: Some(user),
        is_edit: editing.is_some(),
        action,
        text: form.text.clone(),
        groups: options,
        no_group_selected,
        current_image,
        errors,
    })
}

/// multipart/form-data の本文を `PostForm` に読み込む。
/// ファイル未選択のブラウザは空のファイルパートを送ってくるので、それは無視する。
async fn read_post_form(mut multipart: Multipart) -> AppResult<PostForm> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid form submission: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "text" => {
                form.text = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("Invalid text field: {}", e)))?;
            }
            "group" => {
                form.group = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("Invalid group field: {}", e)))?;
            }
            "image-clear" => {
                form.clear_image = true;
            }
            "image" => {
                let file_name = field.file_name().map(str::to_string).unwrap_or_default();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Invalid image upload: {}", e)))?;

                if !file_name.is_empty() || !bytes.is_empty() {
                    form.image = Some(UploadedImage {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            other => {
                debug!("Ignoring unexpected form field {}", other);
            }
        }
    }

    Ok(form)
}

/// POST /posts/:post_id/comment/
/// 成否にかかわらず投稿詳細へリダイレクトする。
pub async fn add_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Redirect> {
    let post_id = parse_post_id(&post_id)?;
    let post = state.db.get_post(post_id).await?;

    match form.validate() {
        Ok(()) => {
            let comment = state.db.create_comment(form.into_comment(post.id, user.id)).await?;
            info!("User {} commented on post {} (comment {})", user.username, post.id, comment.id);
        }
        Err(errors) => {
            debug!("Rejected empty comment on post {}: {:?}", post.id, errors);
        }
    }

    Ok(Redirect::to(&post_url(post.id)))
}

/// Feed of followed authors
/// GET /follow/
pub async fn follow_index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let page = state
        .db
        .list_feed_posts(user.id, query.request(state.per_page()))
        .await?;

    render(&FollowTemplate {
        user: Some(user),
        page,
    })
}

/// GET /profile/:username/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let author = state.db.get_user_by_username(&username).await?;

    if !state.db.follow(user.id, author.id).await? {
        debug!("User {} already follows {} or is the author", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)))
}

/// GET /profile/:username/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let author = state.db.get_user_by_username(&username).await?;
    state.db.unfollow(user.id, author.id).await?;

    Ok(Redirect::to(&profile_url(&author.username)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_id() {
        assert_eq!(parse_post_id("42").unwrap(), 42);
        assert!(matches!(parse_post_id("abc"), Err(AppError::NotFound(_))));
        assert!(matches!(parse_post_id("99999999999"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_urls() {
        assert_eq!(post_url(7), "/posts/7/");
        assert_eq!(profile_url("Random_user"), "/profile/Random_user/");
        assert_eq!(profile_url("leo@home"), "/profile/leo%40home/");
        assert_eq!(profile_url("Лев"), "/profile/%D0%9B%D0%B5%D0%B2/");
    }

    async fn stored_image(media: &MediaStore) -> String {
        let upload = UploadedImage {
            file_name: "image.gif".to_string(),
            content_type: Some("image/gif".to_string()),
            bytes: b"GIF89a".to_vec(),
        };
        media.save_post_image(&upload).await.unwrap()
    }

    #[tokio::test]
    async fn test_failed_save_removes_uploaded_image() {
        let dir = tempfile::tempdir().expect("temp dir");
        let media = MediaStore::new(dir.path());
        let stored = stored_image(&media).await;

        let failed: AppResult<()> = Err(AppError::Database("insert failed".to_string()));
        let result = discard_on_error(&media, Some(&stored), failed).await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(!dir.path().join(&stored).exists());
    }

    #[tokio::test]
    async fn test_successful_save_keeps_uploaded_image() {
        let dir = tempfile::tempdir().expect("temp dir");
        let media = MediaStore::new(dir.path());
        let stored = stored_image(&media).await;

        let result = discard_on_error(&media, Some(&stored), Ok(5)).await;

        assert_eq!(result.unwrap(), 5);
        assert!(dir.path().join(&stored).exists());
    }
}
