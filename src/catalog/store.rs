use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, ImageFormat, ImageReader};

use super::key::ContentKey;
use crate::error::ForgeError;

/// Content-addressed directory of finished assets.
///
/// The file itself is the completion marker; there is no manifest.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &ContentKey) -> PathBuf {
        self.dir.join(format!("{key}.png"))
    }

    /// An asset counts only if it exists, is non-empty and decodes.
    pub fn is_complete(&self, key: &ContentKey) -> bool {
        let path = self.path_for(key);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            _ => return false,
        }
        match ImageReader::open(&path).and_then(|r| r.with_guessed_format()) {
            Ok(reader) => match reader.decode() {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Asset does not decode, will re-render");
                    false
                }
            },
            Err(_) => false,
        }
    }

    /// Encode as PNG and move into place atomically.
    ///
    /// Overwrites whatever is at the final path, which is how corrupt leftovers
    /// from an interrupted run get replaced.
    pub fn persist(&self, key: &ContentKey, image: &DynamicImage) -> Result<PathBuf, ForgeError> {
        let path = self.path_for(key);
        let persist_err = |source: std::io::Error| ForgeError::Persist {
            path: path.clone(),
            source,
        };

        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| persist_err(std::io::Error::other(e)))?;

        std::fs::create_dir_all(&self.dir).map_err(persist_err)?;
        let tmp = self.dir.join(format!("{key}.png.tmp"));
        std::fs::write(&tmp, &buf).map_err(persist_err)?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            persist_err(e)
        })?;
        Ok(path)
    }
}
