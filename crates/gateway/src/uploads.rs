use axum::body::Bytes;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use image::RgbImage;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Public route the upload directory is served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Multipart field carrying the image in both the API and the web form.
pub const IMAGE_FIELD: &str = "image";

/// A saved upload: where it is on disk and where the browser can fetch it.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub url: String,
}

/// Flat directory of uploaded images, one uniquely named PNG per upload.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_png(&self, image: &RgbImage) -> Result<StoredUpload, image::ImageError> {
        let name = format!("{}.png", Uuid::new_v4());
        let path = self.dir.join(&name);
        image.save_with_format(&path, image::ImageFormat::Png)?;

        tracing::debug!(path = %path.display(), "Upload stored");
        Ok(StoredUpload {
            path,
            url: format!("{UPLOADS_ROUTE}/{name}"),
        })
    }

    /// Map a reference handed back by a client (`/uploads/<name>` or a bare
    /// file name) to an existing file in this store.
    ///
    /// Anything that would leave the directory resolves to `None`.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = reference
            .strip_prefix(UPLOADS_ROUTE)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(reference);

        let mut components = Path::new(relative).components();
        let name = match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => name,
            _ => return None,
        };

        let candidate = self.dir.join(name);
        let root = self.dir.canonicalize().ok()?;
        let resolved = candidate.canonicalize().ok()?;
        (resolved.starts_with(&root) && resolved.is_file()).then_some(resolved)
    }
}

/// What a multipart body carried under [`IMAGE_FIELD`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImageField {
    /// No part with that name.
    Missing,
    /// The part was sent without bytes; browsers do this when the file
    /// input is left empty.
    Empty,
    Present(Bytes),
}

/// Pull the image part out of a multipart body.
pub async fn read_image_field(multipart: &mut Multipart) -> Result<ImageField, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field.bytes().await?;
            return Ok(if bytes.is_empty() {
                ImageField::Empty
            } else {
                ImageField::Present(bytes)
            });
        }
    }
    Ok(ImageField::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn store() -> (tempfile::TempDir, UploadStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path().join("uploads")).unwrap();
        (dir, store)
    }

    #[test]
    fn saved_upload_resolves_by_url_and_name() {
        let (_dir, store) = store();
        let saved = store
            .save_png(&RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])))
            .unwrap();

        assert!(saved.url.starts_with("/uploads/"));
        assert!(saved.url.ends_with(".png"));
        let name = saved.path.file_name().unwrap().to_str().unwrap();

        let by_url = store.resolve(&saved.url).unwrap();
        let by_name = store.resolve(name).unwrap();
        assert_eq!(by_url, by_name);
        assert_eq!(by_url, saved.path.canonicalize().unwrap());
    }

    #[test]
    fn uploads_get_distinct_names() {
        let (_dir, store) = store();
        let img = RgbImage::new(2, 2);
        let a = store.save_png(&img).unwrap();
        let b = store.save_png(&img).unwrap();
        assert_ne!(a.path, b.path);
    }

    #[test]
    fn references_outside_the_store_are_rejected() {
        let (dir, store) = store();
        let outside = dir.path().join("secret.png");
        std::fs::write(&outside, b"x").unwrap();

        assert!(store.resolve(outside.to_str().unwrap()).is_none());
        assert!(store.resolve("../secret.png").is_none());
        assert!(store.resolve("/uploads/../secret.png").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert!(store.resolve("").is_none());
    }

    #[test]
    fn missing_files_do_not_resolve() {
        let (_dir, store) = store();
        assert!(store.resolve("/uploads/nothing-here.png").is_none());
    }
}
