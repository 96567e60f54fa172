// Server-rendered pages
//
// Every page struct carries `user` so the shared layout can show the right navigation.

use askama::Template;
use axum::response::Html;

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::models::{Comment, FormErrors, Group, PostCard, SignupForm, User};
use crate::pagination::Page;

/// Renders a template into an HTML response body.
pub fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    Ok(Html(template.render()?))
}

/// `<option>` of the group select on the post form.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupOption {
    pub id: i32,
    pub title: String,
    pub selected: bool,
}

impl GroupOption {
    pub fn list(groups: &[Group], selected: Option<i32>) -> Vec<GroupOption> {
        groups
            .iter()
            .map(|group| GroupOption {
                id: group.id,
                title: group.title.clone(),
                selected: Some(group.id) == selected,
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub user: Option<CurrentUser>,
    pub message: String,
}

#[derive(Template)]
#[template(path = "core/error.html")]
pub struct ErrorTemplate {
    pub user: Option<CurrentUser>,
    pub status: u16,
    pub message: String,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub user: Option<CurrentUser>,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub user: Option<CurrentUser>,
    pub group: Group,
    pub page: Page<PostCard>,
}

/// プロフィールページ。`can_follow` は閲覧者がログイン済みで、かつ本人以外のときだけ true。
#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub user: Option<CurrentUser>,
    pub author: User,
    pub page: Page<PostCard>,
    pub posts_count: i64,
    pub following: bool,
    pub can_follow: bool,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub user: Option<CurrentUser>,
    pub post: PostCard,
    pub posts_count: i64,
    pub comments: Vec<Comment>,
    pub is_author: bool,
}

/// 投稿の作成・編集で共用するフォーム画面。
#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub user: Option<CurrentUser>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub no_group_selected: bool,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub user: Option<CurrentUser>,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub user: Option<CurrentUser>,
    pub form: SignupForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub user: Option<CurrentUser>,
    pub username: String,
    pub next: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub user: Option<CurrentUser>,
}

#[derive(Template)]
#[template(path = "users/password_change_form.html")]
pub struct PasswordChangeTemplate {
    pub user: Option<CurrentUser>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_change_done.html")]
pub struct PasswordChangeDoneTemplate {
    pub user: Option<CurrentUser>,
}

#[derive(Template)]
#[template(path = "users/password_reset_form.html")]
pub struct PasswordResetTemplate {
    pub user: Option<CurrentUser>,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_reset_done.html")]
pub struct PasswordResetDoneTemplate {
    pub user: Option<CurrentUser>,
}

/// `valid_link` が false の場合は「リンクが無効」の案内だけを表示する。
#[derive(Template)]
#[template(path = "users/password_reset_confirm.html")]
pub struct PasswordResetConfirmTemplate {
    pub user: Option<CurrentUser>,
    pub valid_link: bool,
    pub token: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_reset_complete.html")]
pub struct PasswordResetCompleteTemplate {
    pub user: Option<CurrentUser>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::PageRequest;
    use chrono::{TimeZone, Utc};

    fn card(id: i32, text: &str) -> PostCard {
        PostCard {
            id,
            text: text.to_string(),
            pub_date: Utc.with_ymd_and_hms(2022, 3, 14, 9, 0, 0).unwrap(),
            image: Some("posts/image.gif".to_string()),
            author_id: 3,
            author_username: "Random_user".to_string(),
            author_first_name: String::new(),
            author_last_name: String::new(),
            group_id: Some(7),
            group_title: Some("Test_group".to_string()),
            group_slug: Some("test-group".to_string()),
        }
    }

    fn page(items: Vec<PostCard>, total: i64) -> Page<PostCard> {
        let window = PageRequest::first(10).window(total);
        Page::new(items, window, total)
    }

    #[test]
    fn test_index_lists_cards_and_paginator() {
        let html = IndexTemplate {
            user: None,
            page: page(vec![card(1, "<b>Пост</b>")], 13),
        }
        .render()
        .unwrap();

        assert!(html.contains("/posts/1/"));
        assert!(html.contains("/group/test-group/"));
        assert!(html.contains("image.gif"));
        assert!(html.contains("&lt;b&gt;Пост"));
        assert!(!html.contains("<b>Пост"));
        assert!(html.contains("?page=2"));
        assert!(html.contains("/auth/login/"));
    }

    #[test]
    fn test_navigation_for_authenticated_user() {
        let html = FollowTemplate {
            user: Some(CurrentUser {
                id: 3,
                username: "Random_user".to_string(),
            }),
            page: page(Vec::new(), 0),
        }
        .render()
        .unwrap();

        assert!(html.contains("/create/"));
        assert!(html.contains("/auth/logout/"));
        assert!(!html.contains("?page=2"));
    }

    #[test]
    fn test_post_form_marks_selected_group() {
        let groups = vec![
            Group {
                id: 7,
                title: "Test_group".to_string(),
                slug: "test-group".to_string(),
                description: String::new(),
            },
            Group {
                id: 8,
                title: "Other".to_string(),
                slug: "other".to_string(),
                description: String::new(),
            },
        ];
        let options = GroupOption::list(&groups, Some(8));
        assert!(!options[0].selected);
        assert!(options[1].selected);

        let html = PostFormTemplate {
            user: None,
            is_edit: true,
            action: "/posts/1/edit/".to_string(),
            text: "Пост".to_string(),
            groups: options,
            no_group_selected: false,
            current_image: None,
            errors: FormErrors::new(),
        }
        .render()
        .unwrap();

        assert!(html.contains(r#"<option value="8" selected>"#));
        assert!(html.contains(r#"<option value="7">"#));
        assert!(html.contains("Edit post"));
    }

    #[test]
    fn test_not_found_page() {
        let html = NotFoundTemplate {
            user: None,
            message: "/missing/".to_string(),
        }
        .render()
        .unwrap();
        assert!(html.contains("404"));
    }
}
