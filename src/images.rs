use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::{collections::HashMap, io::ErrorKind, path::PathBuf};

use crate::error::Result;
use crate::image_gen::{GeneratedImage, SVG_CONTENT_TYPE};

const DEFAULT_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub bytes: Bytes,
    pub content_type: String,
}

impl From<GeneratedImage> for StoredImage {
    fn from(img: GeneratedImage) -> Self {
        Self { bytes: Bytes::from(img.bytes), content_type: img.content_type.to_string() }
    }
}

/// Blob store keyed by product id. `put` always overwrites.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<StoredImage>>;
    async fn put(&self, id: i64, image: StoredImage) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryImageStore {
    images: RwLock<HashMap<i64, StoredImage>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn get(&self, id: i64) -> Result<Option<StoredImage>> {
        Ok(self.images.read().get(&id).cloned())
    }

    async fn put(&self, id: i64, image: StoredImage) -> Result<()> {
        self.images.write().insert(id, image);
        Ok(())
    }
}

/// Directory-backed store: `<root>/<id>/product` holds the bytes and
/// `<root>/<id>/content-type` the MIME type.
pub struct DirImageStore {
    root: PathBuf,
}

impl DirImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, id: i64) -> PathBuf {
        self.root.join(id.to_string())
    }
}

#[async_trait]
impl ImageStore for DirImageStore {
    async fn get(&self, id: i64) -> Result<Option<StoredImage>> {
        let dir = self.dir(id);
        let bytes = match tokio::fs::read(dir.join("product")).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match tokio::fs::read_to_string(dir.join("content-type")).await {
            Ok(ct) => ct.trim().to_string(),
            Err(e) if e.kind() == ErrorKind::NotFound => sniff_content_type(&bytes).to_string(),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredImage { bytes: Bytes::from(bytes), content_type }))
    }

    async fn put(&self, id: i64, image: StoredImage) -> Result<()> {
        let dir = self.dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join("product"), &image.bytes).await?;
        tokio::fs::write(dir.join("content-type"), image.content_type.as_bytes()).await?;
        Ok(())
    }
}

/// Best guess at the MIME type of an upload that arrived without one.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let head = head.trim_start();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return SVG_CONTENT_TYPE;
    }
    DEFAULT_CONTENT_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_gen;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_content_type(PNG_MAGIC), "image/png");
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), "image/jpeg");
        assert_eq!(sniff_content_type(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_content_type(&image_gen::generate(3, None).bytes), "image/svg+xml");
        assert_eq!(sniff_content_type(b"plain text"), "image/png");
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryImageStore::new();
        assert!(store.get(1).await.unwrap().is_none());
        store.put(1, StoredImage { bytes: Bytes::from_static(b"a"), content_type: "image/png".into() }).await.unwrap();
        store.put(1, StoredImage { bytes: Bytes::from_static(b"b"), content_type: "image/gif".into() }).await.unwrap();
        let got = store.get(1).await.unwrap().unwrap();
        assert_eq!(got.bytes, Bytes::from_static(b"b"));
        assert_eq!(got.content_type, "image/gif");
    }

    #[tokio::test]
    async fn dir_store_round_trips_content_type() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirImageStore::new(tmp.path());
        assert!(store.get(7).await.unwrap().is_none());

        let generated: StoredImage = image_gen::generate(7, Some("Zephyr Dream Enhancer")).into();
        store.put(7, generated.clone()).await.unwrap();
        assert_eq!(store.get(7).await.unwrap(), Some(generated));
        assert!(tmp.path().join("7").join("product").exists());
    }

    #[tokio::test]
    async fn dir_store_sniffs_when_type_file_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("4")).unwrap();
        std::fs::write(tmp.path().join("4").join("product"), PNG_MAGIC).unwrap();
        let got = DirImageStore::new(tmp.path()).get(4).await.unwrap().unwrap();
        assert_eq!(got.content_type, "image/png");
    }
}
