use crate::error::AppError;
use crate::config::DatabaseConfig;
use crate::models::{
    Comment, Group, NewComment, NewGroup, NewPost, NewUser, Post, PostCard, User,
};
use crate::pagination::{Page, PageRequest};
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Pool, Runtime, Object};
use postgres_native_tls::MakeTlsConnector;
use native_tls::TlsConnector;
use tokio_postgres::types::ToSql;
use tracing::{error, info, warn};

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, email, password_hash, session_version, date_joined";

const GROUP_COLUMNS: &str = "id, title, slug, description";

/// 一覧表示用の SELECT 句。著者とグループを JOIN して `PostCard` を組み立てる。
const POST_CARD_SELECT: &str = r#"
    SELECT p.id, p.text, p.pub_date, p.image, p.author_id,
           u.username AS author_username,
           u.first_name AS author_first_name,
           u.last_name AS author_last_name,
           p.group_id, g.title AS group_title, g.slug AS group_slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

const POST_ORDER: &str = "ORDER BY p.pub_date DESC, p.id DESC";

/// PostgreSQL への接続プールを握るリポジトリ層。
/// Deadpool の `Pool` を内部に保持し、各画面が必要とするクエリをメソッドとして提供する。
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// 接続プールを構築し、起動時に疎通確認まで実施する。
    pub async fn new(config: DatabaseConfig) -> Result<Self, AppError> {
        info!("Creating PostgreSQL connection pool for host: {}:{}", config.host, config.port);

        let db = Self::connect_lazy(config)?;
        db.test_connection().await?;

        Ok(db)
    }

    /// プールだけを作り、実際の接続は最初の `get` まで遅延させる。
    pub fn connect_lazy(config: DatabaseConfig) -> Result<Self, AppError> {
        let pool = Self::create_pool(config)?;
        Ok(Database { pool })
    }

    /// Deadpool 用の `Config` を組み立ててプールを生成する内部関数。
    fn create_pool(config: DatabaseConfig) -> Result<Pool, AppError> {
        let mut pg_config = Config::new();

        pg_config.host = Some(config.host);
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database);
        pg_config.user = Some(config.username);
        pg_config.password = Some(config.password);
        pg_config.connect_timeout = Some(config.connection_timeout);

        match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode = Some(deadpool_postgres::SslMode::Disable);
            }
            "prefer" => {
                pg_config.ssl_mode = Some(deadpool_postgres::SslMode::Prefer);
            }
            "require" => {
                pg_config.ssl_mode = Some(deadpool_postgres::SslMode::Require);
            }
            _ => {
                warn!("Unknown SSL mode '{}', defaulting to 'require'", config.ssl_mode);
                pg_config.ssl_mode = Some(deadpool_postgres::SslMode::Require);
            }
        }

        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        let mut pool_config = deadpool_postgres::PoolConfig::new(config.max_connections as usize);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pg_config.pool = Some(pool_config);

        let tls_connector = TlsConnector::builder()
            .build()
            .map_err(|e| {
                error!("Failed to create TLS connector: {}", e);
                AppError::Database(format!("TLS connector creation failed: {}", e))
            })?;
        let tls = MakeTlsConnector::new(tls_connector);

        pg_config.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| {
                error!("Failed to create connection pool: {}", e);
                AppError::Database(format!("Connection pool creation failed: {}", e))
            })
    }

    async fn get_connection(&self) -> Result<Object, AppError> {
        self.pool.get().await.map_err(AppError::from)
    }

    /// `SELECT 1` を投げて DB が生きているか確認する。
    pub async fn health_check(&self) -> Result<(), AppError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[])
            .await
            .map_err(|e| {
                error!("Database health check failed: {}", e);
                AppError::Database(format!("Health check failed: {}", e))
            })?;

        Ok(())
    }

    /// `Database::new` 直後にプール全体が機能するかの確認に使う。
    pub async fn test_connection(&self) -> Result<(), AppError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[])
            .await
            .map_err(|e| {
                error!("Database connection test failed: {}", e);
                AppError::Database(format!("Connection test failed: {}", e))
            })?;

        info!("Database connection test successful");
        Ok(())
    }

    /// アプリ起動時にテーブル群を CREATE する簡易マイグレーター。
    /// すべて `IF NOT EXISTS` なので何度実行しても安全。
    pub async fn migrate(&self) -> Result<(), AppError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        let statements: [(&str, &str); 12] = [
            ("users table", r#"
                CREATE TABLE IF NOT EXISTS users (
                    id SERIAL PRIMARY KEY,
                    username VARCHAR(150) NOT NULL,
                    first_name VARCHAR(150) NOT NULL DEFAULT '',
                    last_name VARCHAR(150) NOT NULL DEFAULT '',
                    email VARCHAR(254) NOT NULL DEFAULT '',
                    password_hash TEXT NOT NULL,
                    session_version INTEGER NOT NULL DEFAULT 0,
                    date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    CONSTRAINT users_username_key UNIQUE (username)
                )
            "#),
            ("users session_version column",
                "ALTER TABLE users ADD COLUMN IF NOT EXISTS session_version INTEGER NOT NULL DEFAULT 0"),
            ("users email index",
                "CREATE INDEX IF NOT EXISTS idx_users_email ON users (LOWER(email))"),
            ("post_groups table", r#"
                CREATE TABLE IF NOT EXISTS post_groups (
                    id SERIAL PRIMARY KEY,
                    title VARCHAR(200) NOT NULL,
                    slug VARCHAR(50) NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    CONSTRAINT post_groups_slug_key UNIQUE (slug)
                )
            "#),
            ("posts table", r#"
                CREATE TABLE IF NOT EXISTS posts (
                    id SERIAL PRIMARY KEY,
                    text TEXT NOT NULL,
                    pub_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    group_id INTEGER REFERENCES post_groups(id) ON DELETE SET NULL,
                    image VARCHAR(255)
                )
            "#),
            ("posts pub_date index",
                "CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts (pub_date DESC, id DESC)"),
            ("posts author index",
                "CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts (author_id)"),
            ("posts group index",
                "CREATE INDEX IF NOT EXISTS idx_posts_group_id ON posts (group_id)"),
            ("comments table", r#"
                CREATE TABLE IF NOT EXISTS comments (
                    id SERIAL PRIMARY KEY,
                    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    text TEXT NOT NULL,
                    created TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
            "#),
            ("comments post index",
                "CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments (post_id, created)"),
            ("follows table", r#"
                CREATE TABLE IF NOT EXISTS follows (
                    id SERIAL PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    CONSTRAINT follows_user_author_key UNIQUE (user_id, author_id),
                    CONSTRAINT follows_not_self CHECK (user_id <> author_id)
                )
            "#),
            ("password_reset_tokens table", r#"
                CREATE TABLE IF NOT EXISTS password_reset_tokens (
                    token VARCHAR(64) PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    expires_at TIMESTAMPTZ NOT NULL,
                    used BOOLEAN NOT NULL DEFAULT FALSE
                )
            "#),
        ];

        for (name, sql) in statements {
            client.execute(sql, &[])
                .await
                .map_err(|e| {
                    error!("Failed to create {}: {}", name, e);
                    AppError::Database(format!("Migration of {} failed: {}", name, e))
                })?;
        }

        info!("Database migrations completed successfully");
        Ok(())
    }

    // User repository operations

    pub async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let client = self.get_connection().await?;

        let query = format!(
            "INSERT INTO users (username, first_name, last_name, email, password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );

        let row = client.query_one(
            &query,
            &[&user.username, &user.first_name, &user.last_name, &user.email, &user.password_hash]
        )
        .await
        .map_err(AppError::from)?;

        let created_user = User::from_row(&row);
        info!("Created user {} with id: {}", created_user.username, created_user.id);
        Ok(created_user)
    }

    pub async fn find_user_by_id(&self, user_id: i32) -> Result<Option<User>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = client.query_opt(&query, &[&user_id])
            .await
            .map_err(AppError::from)?;

        Ok(row.as_ref().map(User::from_row))
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);

        let row = client.query_opt(&query, &[&username])
            .await
            .map_err(AppError::from)?;

        Ok(row.as_ref().map(User::from_row))
    }

    /// ユーザー名で検索し、見つからなければ `NotFound` を返す。プロフィール系の画面用。
    pub async fn get_user_by_username(&self, username: &str) -> Result<User, AppError> {
        self.find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))
    }

    /// メールアドレスは大文字小文字を区別せずに照合する。同じアドレスのユーザーが複数いることもある。
    pub async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, AppError> {
        let client = self.get_connection().await?;
        let query = format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1) AND email <> '' ORDER BY id",
            USER_COLUMNS
        );

        let rows = client.query(&query, &[&email])
            .await
            .map_err(AppError::from)?;

        Ok(rows.iter().map(User::from_row).collect())
    }

    /// パスワードを更新し、未使用の再設定トークンもまとめて無効化する。
    /// `session_version` も進めるので、それまでに発行したセッションはすべて無効になる。
    pub async fn set_password(&self, user_id: i32, password_hash: &str) -> Result<User, AppError> {
        let mut client = self.get_connection().await?;
        let tx = client.transaction().await.map_err(AppError::from)?;

        let query = format!(
            "UPDATE users SET password_hash = $1, session_version = session_version + 1 \
             WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        );
        let row = tx.query_opt(&query, &[&password_hash, &user_id])
            .await
            .map_err(AppError::from)?;

        let Some(row) = row else {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        };
        let updated = User::from_row(&row);

        tx.execute(
            "UPDATE password_reset_tokens SET used = TRUE WHERE user_id = $1 AND used = FALSE",
            &[&user_id],
        )
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;

        info!("Updated password for user id: {}", user_id);
        Ok(updated)
    }

    // Group repository operations

    pub async fn create_group(&self, group: NewGroup) -> Result<Group, AppError> {
        group.validate().map_err(|errors| {
            let messages: Vec<String> = ["title", "slug"]
                .iter()
                .flat_map(|field| errors.get(field).iter().map(move |m| format!("{}: {}", field, m)))
                .collect();
            AppError::Validation(messages.join("; "))
        })?;

        let client = self.get_connection().await?;
        let query = format!(
            "INSERT INTO post_groups (title, slug, description) VALUES ($1, $2, $3) RETURNING {}",
            GROUP_COLUMNS
        );

        let row = client.query_one(&query, &[&group.title, &group.slug, &group.description])
            .await
            .map_err(AppError::from)?;

        let created = Group::from_row(&row);
        info!("Created group {} with id: {}", created.slug, created.id);
        Ok(created)
    }

    /// 投稿フォームの `<select>` に並べるためのグループ一覧。
    pub async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM post_groups ORDER BY title, id", GROUP_COLUMNS);

        let rows = client.query(&query, &[])
            .await
            .map_err(AppError::from)?;

        Ok(rows.iter().map(Group::from_row).collect())
    }

    pub async fn get_group_by_slug(&self, slug: &str) -> Result<Group, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM post_groups WHERE slug = $1", GROUP_COLUMNS);

        let row = client.query_opt(&query, &[&slug])
            .await
            .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(Group::from_row(&row)),
            None => Err(AppError::NotFound(format!("Group {} not found", slug))),
        }
    }

    // Post repository operations

    pub async fn create_post(&self, post: NewPost) -> Result<Post, AppError> {
        let client = self.get_connection().await?;

        let query = r#"
            INSERT INTO posts (text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, text, pub_date, author_id, group_id, image
        "#;

        let row = client.query_one(
            query,
            &[&post.text, &post.author_id, &post.group_id, &post.image]
        )
        .await
        .map_err(AppError::from)?;

        let created_post = Post::from_row(&row);
        info!("Created post with id: {} by author id: {}", created_post.id, created_post.author_id);
        Ok(created_post)
    }

    /// 単一の投稿を表示用の形で取得する。存在しなければ `NotFound`。
    pub async fn get_post(&self, post_id: i32) -> Result<PostCard, AppError> {
        let client = self.get_connection().await?;
        let query = format!("{} WHERE p.id = $1", POST_CARD_SELECT);

        let row = client.query_opt(&query, &[&post_id])
            .await
            .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(PostCard::from_row(&row)),
            None => Err(AppError::NotFound(format!("Post with id {} not found", post_id))),
        }
    }

    /// 本文・グループ・画像を書き換える。著者と投稿日時は変更しない。
    pub async fn update_post(
        &self,
        post_id: i32,
        text: &str,
        group_id: Option<i32>,
        image: Option<&str>,
    ) -> Result<Post, AppError> {
        let client = self.get_connection().await?;

        let query = r#"
            UPDATE posts SET text = $1, group_id = $2, image = $3
            WHERE id = $4
            RETURNING id, text, pub_date, author_id, group_id, image
        "#;

        let row = client.query_opt(query, &[&text, &group_id, &image, &post_id])
            .await
            .map_err(AppError::from)?;

        match row {
            Some(row) => {
                info!("Updated post with id: {}", post_id);
                Ok(Post::from_row(&row))
            }
            None => Err(AppError::NotFound(format!("Post with id {} not found", post_id))),
        }
    }

    pub async fn count_posts_by_author(&self, author_id: i32) -> Result<i64, AppError> {
        let client = self.get_connection().await?;

        let row = client.query_one("SELECT COUNT(*) FROM posts WHERE author_id = $1", &[&author_id])
            .await
            .map_err(AppError::from)?;

        Ok(row.get(0))
    }

    /// トップページ: すべての投稿を新しい順に。
    pub async fn list_posts(&self, page: PageRequest) -> Result<Page<PostCard>, AppError> {
        self.list_post_cards("TRUE", &[], page).await
    }

    /// グループページ: そのグループに属する投稿。
    pub async fn list_group_posts(&self, group_id: i32, page: PageRequest) -> Result<Page<PostCard>, AppError> {
        self.list_post_cards("p.group_id = $1", &[&group_id], page).await
    }

    /// プロフィールページ: その著者の投稿。
    pub async fn list_author_posts(&self, author_id: i32, page: PageRequest) -> Result<Page<PostCard>, AppError> {
        self.list_post_cards("p.author_id = $1", &[&author_id], page).await
    }

    /// フィード: `user_id` がフォローしている著者の投稿。
    pub async fn list_feed_posts(&self, user_id: i32, page: PageRequest) -> Result<Page<PostCard>, AppError> {
        self.list_post_cards(
            "p.author_id IN (SELECT author_id FROM follows WHERE user_id = $1)",
            &[&user_id],
            page,
        )
        .await
    }

    /// 件数を数えてからページ位置を確定し、`LIMIT/OFFSET` で該当ページだけを取得する。
    /// `filter` は WHERE 句の中身で、プレースホルダは `$1` から始まる前提。
    async fn list_post_cards(
        &self,
        filter: &str,
        params: &[&(dyn ToSql + Sync)],
        page: PageRequest,
    ) -> Result<Page<PostCard>, AppError> {
        let client = self.get_connection().await?;

        let count_query = format!("SELECT COUNT(*) FROM posts p WHERE {}", filter);
        let total: i64 = client.query_one(&count_query, params)
            .await
            .map_err(AppError::from)?
            .get(0);

        let window = page.window(total);

        let query = format!(
            "{} WHERE {} {} LIMIT ${} OFFSET ${}",
            POST_CARD_SELECT,
            filter,
            POST_ORDER,
            params.len() + 1,
            params.len() + 2
        );

        let mut all_params: Vec<&(dyn ToSql + Sync)> = params.to_vec();
        all_params.push(&window.limit);
        all_params.push(&window.offset);

        let rows = client.query(&query, &all_params)
            .await
            .map_err(AppError::from)?;

        let posts: Vec<PostCard> = rows.iter().map(PostCard::from_row).collect();
        Ok(Page::new(posts, window, total))
    }

    // Comment repository operations

    pub async fn create_comment(&self, comment: NewComment) -> Result<Comment, AppError> {
        let client = self.get_connection().await?;

        let query = r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, post_id, author_id, text, created
            )
            SELECT i.id, i.post_id, i.author_id, i.text, i.created, u.username AS author_username
            FROM inserted i
            JOIN users u ON u.id = i.author_id
        "#;

        let row = client.query_one(query, &[&comment.post_id, &comment.author_id, &comment.text])
            .await
            .map_err(AppError::from)?;

        let created = Comment::from_row(&row);
        info!("Created comment with id: {} on post id: {}", created.id, created.post_id);
        Ok(created)
    }

    /// 投稿のコメントを古い順に並べる。
    pub async fn list_comments(&self, post_id: i32) -> Result<Vec<Comment>, AppError> {
        let client = self.get_connection().await?;

        let query = r#"
            SELECT c.id, c.post_id, c.author_id, c.text, c.created, u.username AS author_username
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created, c.id
        "#;

        let rows = client.query(query, &[&post_id])
            .await
            .map_err(AppError::from)?;

        Ok(rows.iter().map(Comment::from_row).collect())
    }

    // Follow repository operations

    /// フォロー関係を作る。既にフォロー済み、または自分自身の場合は何もしない。
    /// 新しく作成した場合だけ `true` を返す。
    pub async fn follow(&self, user_id: i32, author_id: i32) -> Result<bool, AppError> {
        if user_id == author_id {
            return Ok(false);
        }

        let client = self.get_connection().await?;

        let inserted = client.execute(
            "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT follows_user_author_key DO NOTHING",
            &[&user_id, &author_id],
        )
        .await
        .map_err(AppError::from)?;

        if inserted > 0 {
            info!("User id: {} now follows author id: {}", user_id, author_id);
        }
        Ok(inserted > 0)
    }

    /// フォロー関係を削除する。削除した行があれば `true`。
    pub async fn unfollow(&self, user_id: i32, author_id: i32) -> Result<bool, AppError> {
        let client = self.get_connection().await?;

        let deleted = client.execute(
            "DELETE FROM follows WHERE user_id = $1 AND author_id = $2",
            &[&user_id, &author_id],
        )
        .await
        .map_err(AppError::from)?;

        if deleted > 0 {
            info!("User id: {} unfollowed author id: {}", user_id, author_id);
        }
        Ok(deleted > 0)
    }

    pub async fn is_following(&self, user_id: i32, author_id: i32) -> Result<bool, AppError> {
        let client = self.get_connection().await?;

        let row = client.query_one(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
            &[&user_id, &author_id],
        )
        .await
        .map_err(AppError::from)?;

        Ok(row.get(0))
    }

    // Password reset repository operations

    pub async fn create_reset_token(
        &self,
        user_id: i32,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let client = self.get_connection().await?;

        client.execute(
            "INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
            &[&token, &user_id, &expires_at],
        )
        .await
        .map_err(AppError::from)?;

        info!("Issued password reset token for user id: {}", user_id);
        Ok(())
    }

    /// 未使用かつ期限内のトークンなら、その持ち主のユーザーを返す。
    pub async fn find_valid_reset_token(&self, token: &str) -> Result<Option<User>, AppError> {
        let client = self.get_connection().await?;

        let query = format!(
            "SELECT {} FROM users WHERE id = (\
                SELECT user_id FROM password_reset_tokens \
                WHERE token = $1 AND used = FALSE AND expires_at > NOW())",
            USER_COLUMNS
        );

        let row = client.query_opt(&query, &[&token])
            .await
            .map_err(AppError::from)?;

        Ok(row.as_ref().map(User::from_row))
    }

    /// トークンを使用済みにしつつパスワードを差し替える。
    /// 同じトランザクションの中でトークンを確認するため、二重使用は `false` になる。
    pub async fn consume_reset_token(&self, token: &str, password_hash: &str) -> Result<bool, AppError> {
        let mut client = self.get_connection().await?;
        let tx = client.transaction().await.map_err(AppError::from)?;

        let row = tx.query_opt(
            "UPDATE password_reset_tokens SET used = TRUE \
             WHERE token = $1 AND used = FALSE AND expires_at > NOW() \
             RETURNING user_id",
            &[&token],
        )
        .await
        .map_err(AppError::from)?;

        let Some(row) = row else {
            return Ok(false);
        };
        let user_id: i32 = row.get(0);

        tx.execute(
            "UPDATE users SET password_hash = $1, session_version = session_version + 1 \
             WHERE id = $2",
            &[&password_hash, &user_id],
        )
        .await
        .map_err(AppError::from)?;

        tx.execute(
            "UPDATE password_reset_tokens SET used = TRUE WHERE user_id = $1 AND used = FALSE",
            &[&user_id],
        )
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;

        info!("Password reset completed for user id: {}", user_id);
        Ok(true)
    }
}

/// `TEST_DATABASE_URL` があればそこへ接続し、マイグレーション済みの `Database` を返す。
/// 未設定なら `None` で、DB を使うテストはスキップされる。
#[cfg(test)]
pub(crate) async fn test_database() -> Option<Database> {
    static MIGRATED: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL is not set, skipping database test");
        return None;
    };

    let config = DatabaseConfig::from_connection_string(&url, |_: &str| None::<String>)
        .expect("TEST_DATABASE_URL should be a postgres URL");
    let db = Database::new(config).await.expect("test database should be reachable");
    MIGRATED
        .get_or_init(|| async { db.migrate().await.expect("migrations should run") })
        .await;

    Some(db)
}
