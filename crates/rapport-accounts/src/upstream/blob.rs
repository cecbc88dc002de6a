//! A [`BlobStore`] keeping objects as files under a root directory.

use std::{
  io,
  path::{Component, Path, PathBuf},
};

use bytes::Bytes;
use rapport_core::collab::BlobStore;

#[derive(Debug, Clone)]
pub struct DirBlobStore {
  root: PathBuf,
}

impl DirBlobStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  /// Map a key to a path inside the root. Keys are relative, `/`-separated
  /// and may not climb out of the root.
  fn path_for(&self, key: &str) -> rapport_core::Result<PathBuf> {
    let relative = Path::new(key);
    let plain = !key.is_empty()
      && relative.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain {
      return Err(rapport_core::Error::Invalid(format!("bad blob key: {key:?}")));
    }
    Ok(self.root.join(relative))
  }
}

impl BlobStore for DirBlobStore {
  async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> rapport_core::Result<()> {
    let path = self.path_for(key)?;
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(rapport_core::Error::upstream)?;
    }
    tokio::fs::write(&path, &data).await.map_err(rapport_core::Error::upstream)?;
    tracing::debug!(%key, bytes = data.len(), "stored blob");
    Ok(())
  }

  async fn delete(&self, key: &str) -> rapport_core::Result<()> {
    let path = self.path_for(key)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(rapport_core::Error::upstream(e)),
    }
  }
}
