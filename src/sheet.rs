//! Sprite sheet packing for the finished assets.
//!
//! Rebuilt from scratch on every call, so running it twice over the same
//! output directory yields the same sheet and manifest.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::ForgeError;

pub const SHEET_FILE: &str = "sheet.png";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Placement of one asset inside the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEntry {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetManifest {
    pub tile_count: usize,
    pub columns: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub sheet: String,
    pub tiles: Vec<TileEntry>,
}

pub struct SheetBuilder {
    source_dir: PathBuf,
    sheet_dir: PathBuf,
}

impl SheetBuilder {
    pub fn new(source_dir: impl Into<PathBuf>, sheet_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            sheet_dir: sheet_dir.into(),
        }
    }

    pub fn sheet_path(&self) -> PathBuf {
        self.sheet_dir.join(SHEET_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.sheet_dir.join(MANIFEST_FILE)
    }

    /// Pack every `*.png` of the source directory into one sheet.
    ///
    /// Returns `Ok(None)` without writing anything when there are no tiles.
    /// Files that fail to decode are left out with a warning.
    pub fn build(&self) -> Result<Option<SheetManifest>, ForgeError> {
        let tiles = self.load_tiles()?;
        if tiles.is_empty() {
            tracing::info!(dir = %self.source_dir.display(), "No assets to pack");
            return Ok(None);
        }

        let columns = grid_columns(tiles.len());
        let rows = (tiles.len() as u32).div_ceil(columns);
        let cell_width = tiles.iter().map(|(_, img)| img.width()).max().unwrap_or(0);
        let cell_height = tiles.iter().map(|(_, img)| img.height()).max().unwrap_or(0);

        let mut sheet = RgbaImage::new(cell_width * columns, cell_height * rows);
        let mut entries = Vec::with_capacity(tiles.len());
        for (index, (name, img)) in tiles.iter().enumerate() {
            let index = index as u32;
            let x = (index % columns) * cell_width;
            let y = (index / columns) * cell_height;
            image::imageops::replace(&mut sheet, &img.to_rgba8(), i64::from(x), i64::from(y));
            entries.push(TileEntry {
                name: name.clone(),
                x,
                y,
                width: img.width(),
                height: img.height(),
            });
        }

        let manifest = SheetManifest {
            tile_count: entries.len(),
            columns,
            cell_width,
            cell_height,
            sheet: SHEET_FILE.to_string(),
            tiles: entries,
        };
        self.write(&DynamicImage::ImageRgba8(sheet), &manifest)?;
        tracing::info!(
            tiles = manifest.tile_count,
            columns,
            path = %self.sheet_path().display(),
            "Sprite sheet written"
        );
        Ok(Some(manifest))
    }

    fn load_tiles(&self) -> Result<Vec<(String, DynamicImage)>, ForgeError> {
        let entries = match std::fs::read_dir(&self.source_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let sheet_path = self.sheet_path();
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_png = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            // A sheet written into the source directory is not a tile.
            if is_png && path.is_file() && path != sheet_path {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tiles = Vec::with_capacity(paths.len());
        for path in paths {
            match image::open(&path) {
                Ok(img) => tiles.push((file_name(&path), img)),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping undecodable asset"),
            }
        }
        Ok(tiles)
    }

    fn write(&self, sheet: &DynamicImage, manifest: &SheetManifest) -> Result<(), ForgeError> {
        let sheet_path = self.sheet_path();
        let mut buf = Vec::new();
        sheet
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| ForgeError::Persist {
                path: sheet_path.clone(),
                source: std::io::Error::other(e),
            })?;

        std::fs::create_dir_all(&self.sheet_dir).map_err(|source| ForgeError::Persist {
            path: self.sheet_dir.clone(),
            source,
        })?;
        std::fs::write(&sheet_path, &buf).map_err(|source| ForgeError::Persist {
            path: sheet_path.clone(),
            source,
        })?;

        let manifest_path = self.manifest_path();
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&manifest_path, json).map_err(|source| ForgeError::Persist {
            path: manifest_path,
            source,
        })?;
        Ok(())
    }
}

/// Columns of the smallest near-square grid holding `count` tiles.
fn grid_columns(count: usize) -> u32 {
    let mut columns = (count as f64).sqrt().ceil() as u32;
    // Guard against float rounding on perfect squares.
    while columns > 1 && ((columns - 1) as usize).pow(2) >= count {
        columns -= 1;
    }
    columns.max(1)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn write_tile(dir: &Path, name: &str, w: u32, h: u32, color: [u8; 4]) {
        RgbaImage::from_pixel(w, h, Rgba(color))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn grid_is_near_square() {
        assert_eq!(grid_columns(1), 1);
        assert_eq!(grid_columns(2), 2);
        assert_eq!(grid_columns(4), 2);
        assert_eq!(grid_columns(5), 3);
        assert_eq!(grid_columns(9), 3);
        assert_eq!(grid_columns(10), 4);
    }

    #[test]
    fn empty_directory_writes_nothing() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let builder = SheetBuilder::new(src.path(), out.path());
        assert_eq!(builder.build().unwrap(), None);
        assert!(!builder.sheet_path().exists());
        assert!(!builder.manifest_path().exists());
    }

    #[test]
    fn missing_directory_is_empty() {
        let out = TempDir::new().unwrap();
        let builder = SheetBuilder::new(out.path().join("nope"), out.path());
        assert_eq!(builder.build().unwrap(), None);
    }

    #[test]
    fn packs_tiles_sorted_by_name() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_tile(src.path(), "c.png", 16, 16, [0, 0, 255, 255]);
        write_tile(src.path(), "a.png", 32, 32, [255, 0, 0, 255]);
        write_tile(src.path(), "b.png", 16, 8, [0, 255, 0, 255]);
        std::fs::write(src.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(src.path().join("broken.png"), b"").unwrap();

        let builder = SheetBuilder::new(src.path(), out.path().join("sheet"));
        let manifest = builder.build().unwrap().unwrap();

        assert_eq!(manifest.tile_count, 3);
        assert_eq!(manifest.columns, 2);
        assert_eq!((manifest.cell_width, manifest.cell_height), (32, 32));
        let names: Vec<_> = manifest.tiles.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
        assert_eq!((manifest.tiles[1].x, manifest.tiles[1].y), (32, 0));
        assert_eq!((manifest.tiles[2].x, manifest.tiles[2].y), (0, 32));
        assert_eq!((manifest.tiles[1].width, manifest.tiles[1].height), (16, 8));

        let sheet = image::open(builder.sheet_path()).unwrap().to_rgba8();
        assert_eq!(sheet.dimensions(), (64, 64));
        assert_eq!(sheet.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(sheet.get_pixel(32, 0), &Rgba([0, 255, 0, 255]));
        assert_eq!(sheet.get_pixel(0, 32), &Rgba([0, 0, 255, 255]));
        // Unused cell space stays transparent.
        assert_eq!(sheet.get_pixel(63, 63)[3], 0);

        let on_disk: SheetManifest =
            serde_json::from_str(&std::fs::read_to_string(builder.manifest_path()).unwrap()).unwrap();
        assert_eq!(on_disk, manifest);
    }

    #[test]
    fn rebuilding_is_idempotent_even_in_place() {
        let dir = TempDir::new().unwrap();
        write_tile(dir.path(), "a.png", 8, 8, [1, 2, 3, 255]);
        write_tile(dir.path(), "b.png", 8, 8, [4, 5, 6, 255]);

        let builder = SheetBuilder::new(dir.path(), dir.path());
        let first = builder.build().unwrap().unwrap();
        let first_bytes = std::fs::read(builder.sheet_path()).unwrap();
        let second = builder.build().unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.tile_count, 2);
        assert_eq!(std::fs::read(builder.sheet_path()).unwrap(), first_bytes);
    }
}
