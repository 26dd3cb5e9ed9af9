use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use potion::HtmlError;

use crate::{constants::IMAGE_EXTENSIONS, error::TypeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Decodes an embedded image of the form `data:image/<type>;base64,<payload>`.
pub fn decode_image(data: &str) -> Result<DecodedImage, TypeError> {
    let data = data
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| TypeError::new("Expected a data URL"))?;
    let (mime, payload) = data
        .split_once(";base64,")
        .ok_or_else(|| TypeError::new("Expected base64 encoded data"))?;
    let subtype = mime
        .strip_prefix("image/")
        .ok_or_else(|| TypeError::new("Upload a valid image"))?;

    let extension = IMAGE_EXTENSIONS
        .iter()
        .find_map(|(name, extension)| (subtype.eq_ignore_ascii_case(name)).then_some(*extension))
        .ok_or_else(|| TypeError::new("Unsupported image type"))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| TypeError::new("Invalid base64 data"))?;
    if bytes.is_empty() {
        return Err(TypeError::new("The submitted file is empty"));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Media storage root on disk and the public URL prefix it is served under.
#[derive(Debug, Clone)]
pub struct Media {
    root: PathBuf,
    url: String,
}

impl Media {
    pub fn new(root: PathBuf, url: &str) -> Self {
        let url = if url.ends_with('/') {
            url.to_owned()
        } else {
            format!("{url}/")
        };

        Self { root, url }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL of a file stored under `relative`.
    pub fn url_for(&self, relative: &str) -> String {
        format!("{}{relative}", self.url)
    }

    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(&self.url)?;
        if relative.split('/').any(|segment| segment == ".." || segment.is_empty()) {
            return None;
        }

        Some(self.root.join(relative))
    }

    /// Writes the image under `dir` and returns its public URL.
    pub async fn store(&self, dir: &str, image: &DecodedImage) -> Result<String, potion::Error> {
        let relative = format!("{dir}/{}.{}", uuid::Uuid::new_v4(), image.extension);
        let path = self.root.join(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                log::error!("> Failed to create media directory {parent:?}: {e}");
                HtmlError::InternalServerError.new("Failed to store image")
            })?;
        }
        tokio::fs::write(&path, &image.bytes).await.map_err(|e| {
            log::error!("> Failed to write {path:?}: {e}");
            HtmlError::InternalServerError.new("Failed to store image")
        })?;

        Ok(self.url_for(&relative))
    }

    /// Best effort; a missing file is not an error.
    pub async fn remove(&self, url: &str) {
        let Some(path) = self.path_for(url) else {
            log::trace!("> Not a stored media file: {url}");
            return;
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::error!("> Failed to remove {path:?}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_url() {
        let image = decode_image("data:image/png;base64,aGVsbG8=").unwrap();

        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn jpeg_is_stored_as_jpg() {
        let image = decode_image("data:image/jpeg;base64,aGVsbG8=").unwrap();

        assert_eq!(image.extension, "jpg");
    }

    #[test]
    fn rejects_malformed_images() {
        assert!(decode_image("aGVsbG8=").is_err());
        assert!(decode_image("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(decode_image("data:image/png;base64,***").is_err());
        assert!(decode_image("data:image/tiff;base64,aGVsbG8=").is_err());
        assert!(decode_image("data:image/png;base64,").is_err());
    }

    #[test]
    fn only_files_under_the_media_url_are_resolved() {
        let media = Media::new(PathBuf::from("/srv/media"), "/media");

        assert_eq!(
            media.path_for("/media/users/a.png"),
            Some(PathBuf::from("/srv/media/users/a.png"))
        );
        assert_eq!(media.path_for("/media/../etc/passwd"), None);
        assert_eq!(media.path_for("/static/a.png"), None);
    }

    #[tokio::test]
    async fn stored_image_lands_under_the_root() {
        let root = std::env::temp_dir().join(format!("cookbook-media-{}", uuid::Uuid::new_v4()));
        let media = Media::new(root.clone(), "/media/");
        let image = decode_image("data:image/png;base64,aGVsbG8=").unwrap();

        let url = media.store("recipes/images", &image).await.ok().expect("image should be stored");
        let path = media.path_for(&url).expect("stored url resolves");

        assert!(url.starts_with("/media/recipes/images/"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");

        media.remove(&url).await;
        assert!(!path.exists());

        let _ = tokio::fs::remove_dir_all(root).await;
    }
}
