// Uploaded media: validation and storage below MEDIA_ROOT

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::UploadedImage;

/// Sub-directory of the media root that holds post images.
pub const POST_IMAGE_DIR: &str = "posts";

/// Upper bound for a single multipart request, images included.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["gif", "png", "jpg", "jpeg", "webp", "bmp"];

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// アップロードされたファイルが画像かどうかを確認する。
/// 拡張子の許可リストに加え、`image` クレートで実際にデコードできるかまで見る。
pub fn validate_image(upload: &UploadedImage) -> Result<(), String> {
    let extension = Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(format!(
            "File extension \u{201c}{}\u{201d} is not allowed. Allowed extensions are: {}.",
            extension,
            ALLOWED_EXTENSIONS.join(", ")
        ));
    }

    if upload.bytes.is_empty() {
        return Err("The submitted file is empty.".to_string());
    }

    let format = image::guess_format(&upload.bytes).map_err(|e| {
        debug!("Upload {} has no recognisable image header: {}", upload.file_name, e);
        INVALID_IMAGE.to_string()
    })?;

    image::load_from_memory_with_format(&upload.bytes, format).map_err(|e| {
        debug!("Upload {} failed to decode as {:?}: {}", upload.file_name, format, e);
        INVALID_IMAGE.to_string()
    })?;

    Ok(())
}

/// Keeps `[A-Za-z0-9._-]`, replaces everything else with `_`, and drops any directory part.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// MEDIA_ROOT 配下へのファイル保存を担当する。DB には相対パスだけを保存する。
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MediaStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 画像を `posts/<name>` として保存し、その相対パスを返す。
    /// 同名ファイルがある場合は拡張子の前にランダムな接尾辞を付ける。
    pub async fn save_post_image(&self, upload: &UploadedImage) -> AppResult<String> {
        let dir = self.root.join(POST_IMAGE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media directory {}", dir.display()))?;

        let file_name = sanitize_file_name(&upload.file_name);
        let mut candidate = file_name.clone();
        let (path, mut file) = loop {
            let path = dir.join(&candidate);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_suffix(&file_name);
                }
                Err(e) => {
                    let e = anyhow::Error::new(e)
                        .context(format!("Failed to create image {}", path.display()));
                    return Err(e.into());
                }
            }
        };

        let written = async {
            file.write_all(&upload.bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove partial image {}: {}", path.display(), cleanup);
            }
            let e = anyhow::Error::new(e).context(format!("Failed to write image {}", path.display()));
            return Err(e.into());
        }

        info!("Stored post image {} ({} bytes)", candidate, upload.bytes.len());
        Ok(format!("{}/{}", POST_IMAGE_DIR, candidate))
    }

    /// 保存済みの画像を削除する。投稿の保存に失敗したときの後始末用で、失敗はログだけ残す。
    pub async fn remove(&self, stored: &str) {
        let path = self.root.join(stored);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!("Removed orphaned image {}", stored),
            Err(e) => warn!("Failed to remove image {}: {}", path.display(), e),
        }
    }
}

fn with_suffix(file_name: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", file_name, suffix),
    }
}
