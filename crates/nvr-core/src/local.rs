//! A directory on disk served the way Home Assistant serves `/media`.
//!
//! Content ids look like `media-source://media_source/local/camera/20240101`,
//! so the same card configuration works against either source.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use nvr_proto::protocol::{BrowseMedia, MediaClass, ResolvedMedia};
use tokio::fs;
use tracing::debug;

use crate::source::{MediaSource, SourceError};

pub const LOCAL_PREFIX: &str = "media-source://media_source/local/";

pub struct LocalMediaSource {
    root: PathBuf,
}

impl LocalMediaSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a content id onto a path under `root`, refusing anything that climbs out.
    fn path_for(&self, content_id: &str) -> Result<(String, PathBuf), SourceError> {
        let relative = content_id
            .strip_prefix(LOCAL_PREFIX)
            .or_else(|| content_id.strip_prefix(LOCAL_PREFIX.trim_end_matches('/')))
            .ok_or_else(|| SourceError::transport(content_id, "not a local media id"))?
            .trim_matches('/');

        let relative_path = Path::new(relative);
        if relative_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(SourceError::transport(content_id, "invalid path"));
        }

        Ok((relative.to_string(), self.root.join(relative_path)))
    }
}

fn content_id_for(relative: &str) -> String {
    format!("{}{}", LOCAL_PREFIX, relative)
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn io_error(content_id: &str, e: std::io::Error) -> SourceError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SourceError::not_found(content_id)
    } else {
        SourceError::transport(content_id, e)
    }
}

fn title_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Mime type by file extension; `None` for files the media browser does not show.
pub fn guess_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "ts" => "video/mp2t",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        _ => return None,
    };
    Some(mime)
}

fn class_for_mime(mime: &str) -> MediaClass {
    match mime.split('/').next() {
        Some("video") => MediaClass::Video,
        Some("image") => MediaClass::Image,
        Some("audio") => MediaClass::Music,
        _ => MediaClass::Unknown,
    }
}

impl MediaSource for LocalMediaSource {
    async fn browse(&self, content_id: &str) -> Result<BrowseMedia, SourceError> {
        let (relative, path) = self.path_for(content_id)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| io_error(content_id, e))?;

        if !metadata.is_dir() {
            let mime = guess_mime_type(&path)
                .ok_or_else(|| SourceError::transport(content_id, "unknown media type"))?;
            return Ok(BrowseMedia::leaf(
                class_for_mime(mime),
                content_id_for(&relative),
                title_of(&path),
            ));
        }

        let mut entries = fs::read_dir(&path)
            .await
            .map_err(|e| io_error(content_id, e))?;
        let mut children = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::transport(content_id, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SourceError::transport(content_id, e))?;
            let child_id = content_id_for(&join_relative(&relative, &name));

            if file_type.is_dir() {
                children.push(BrowseMedia::directory(child_id, name));
            } else if let Some(mime) = guess_mime_type(&entry.path()) {
                let mut leaf = BrowseMedia::leaf(class_for_mime(mime), child_id, name);
                leaf.media_content_type = mime.to_string();
                children.push(leaf);
            }
        }

        children.sort_by(|a, b| a.title.cmp(&b.title));
        debug!("local: {} has {} entries", path.display(), children.len());

        let title = if relative.is_empty() {
            "media".to_string()
        } else {
            title_of(&path)
        };
        Ok(BrowseMedia::directory(content_id_for(&relative), title).with_children(children))
    }

    async fn resolve(
        &self,
        content_id: &str,
        _expires: Duration,
    ) -> Result<ResolvedMedia, SourceError> {
        let (_, path) = self.path_for(content_id)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| io_error(content_id, e))?;
        if !metadata.is_file() {
            return Err(SourceError::transport(content_id, "not a file"));
        }

        let mime_type = guess_mime_type(&path)
            .ok_or_else(|| SourceError::transport(content_id, "unknown media type"))?;
        let absolute = fs::canonicalize(&path)
            .await
            .map_err(|e| io_error(content_id, e))?;

        Ok(ResolvedMedia {
            url: format!("file://{}", absolute.display()),
            mime_type: mime_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let day = dir.path().join("camera").join("20240101");
        std::fs::create_dir_all(day.join("cam1")).unwrap();
        std::fs::write(day.join("cam1").join("20240101_120000.mp4"), b"x").unwrap();
        std::fs::write(day.join("snapshot.jpg"), b"x").unwrap();
        std::fs::write(day.join("notes.txt"), b"x").unwrap();
        std::fs::write(day.join(".hidden.mp4"), b"x").unwrap();
        dir
    }

    #[tokio::test]
    async fn browse_lists_classified_children() {
        let dir = fixture();
        let source = LocalMediaSource::new(dir.path());

        let node = source
            .browse("media-source://media_source/local/camera/20240101")
            .await
            .unwrap();

        assert_eq!(node.media_class, MediaClass::Directory);
        assert_eq!(node.title, "20240101");
        let titles: Vec<_> = node.children.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["cam1", "snapshot.jpg"]);
        assert_eq!(node.children[0].media_class, MediaClass::Directory);
        assert_eq!(
            node.children[0].media_content_id,
            "media-source://media_source/local/camera/20240101/cam1"
        );
        assert_eq!(node.children[1].media_class, MediaClass::Image);
    }

    #[tokio::test]
    async fn missing_folder_is_not_found() {
        let dir = fixture();
        let source = LocalMediaSource::new(dir.path());

        let err = source
            .browse("media-source://media_source/local/camera/20231231")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn foreign_and_escaping_ids_are_rejected() {
        let dir = fixture();
        let source = LocalMediaSource::new(dir.path());

        let err = source.browse("media-source://frigate/clips").await.unwrap_err();
        assert!(!err.is_not_found());

        let err = source
            .browse("media-source://media_source/local/../etc")
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn resolve_gives_file_url_and_mime() {
        let dir = fixture();
        let source = LocalMediaSource::new(dir.path());

        let resolved = source
            .resolve(
                "media-source://media_source/local/camera/20240101/cam1/20240101_120000.mp4",
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        assert_eq!(resolved.mime_type, "video/mp4");
        assert!(resolved.url.starts_with("file://"));
        assert!(resolved.url.ends_with("cam1/20240101_120000.mp4"));
    }

    #[tokio::test]
    async fn resolve_rejects_directories() {
        let dir = fixture();
        let source = LocalMediaSource::new(dir.path());

        let err = source
            .resolve(
                "media-source://media_source/local/camera/20240101",
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn mime_guess_is_case_insensitive() {
        assert_eq!(guess_mime_type(Path::new("A.MP4")), Some("video/mp4"));
        assert_eq!(guess_mime_type(Path::new("clip.mkv")), Some("video/x-matroska"));
        assert_eq!(guess_mime_type(Path::new("readme")), None);
        assert_eq!(guess_mime_type(Path::new("notes.txt")), None);
    }
}
