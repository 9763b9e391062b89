//! On-disk frame store.
//!
//! Each run writes into `{root}/{camera}_{timestamp}/` and names frames
//! `{camera}_{n}.jpg`. Numbering continues after the highest index already
//! present, so re-running into the same directory never overwrites.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, RgbImage};

use crate::selection::Centroid;

/// Extension used for saved frames.
pub const IMAGE_EXTENSION: &str = "jpg";

/// JPEG quality of saved frames. Corner refinement runs on these files.
pub const JPEG_QUALITY: u8 = 95;

/// `strftime` layout of the session directory suffix.
pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Errors from the frame store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to create save directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to scan '{}' for existing captures: {source}", path.display())]
    Scan { path: PathBuf, source: io::Error },
    #[error("Failed to write image '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: ImageError,
    },
    #[error("No frame index left in '{}' after {index}", dir.display())]
    IndexExhausted { dir: PathBuf, index: u32 },
}

/// One persisted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    pub index: u32,
    pub path: PathBuf,
    pub centroid: Centroid,
}

/// Directory name for a capture session started at `now`.
pub fn session_dir_name<Tz>(camera_name: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}", camera_name, now.format(SESSION_TIMESTAMP_FORMAT))
}

/// Last run of ASCII digits in `name`, if any.
fn trailing_number(name: &str) -> Option<u32> {
    let bytes = name.as_bytes();
    let end = bytes.iter().rposition(u8::is_ascii_digit)? + 1;
    let start = bytes[..end]
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map_or(0, |p| p + 1);
    name[start..end].parse().ok()
}

/// Next free index for files named `{prefix}...` in `dir`.
///
/// Returns one past the largest numeric token found among matching names,
/// or 1 when there are none. Matching names without digits are skipped.
pub fn resolve_next_index(dir: &Path, prefix: &str) -> io::Result<u32> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(e),
    };

    let mut max_index = 0u32;
    for entry in entries {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !name.starts_with(prefix) {
            continue;
        }
        match trailing_number(&name) {
            Some(index) => max_index = max_index.max(index),
            None => log::debug!("Ignoring '{}': no numeric index", name),
        }
    }

    Ok(max_index.saturating_add(1))
}

/// Filesystem sink for selected frames.
#[derive(Debug)]
pub struct FrameStore {
    dir: PathBuf,
    prefix: String,
    next_index: u32,
}

impl FrameStore {
    /// Open a store in an existing or new directory, continuing its numbering.
    pub fn open(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self, StorageError> {
        let dir = dir.into();
        let prefix = prefix.into();

        std::fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let next_index =
            resolve_next_index(&dir, &prefix).map_err(|source| StorageError::Scan {
                path: dir.clone(),
                source,
            })?;

        Ok(Self {
            dir,
            prefix,
            next_index,
        })
    }

    /// Create `{root}/{camera_name}_{timestamp}` and open a store in it.
    pub fn create_session<Tz>(
        root: &Path,
        camera_name: &str,
        now: &DateTime<Tz>,
    ) -> Result<Self, StorageError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self::open(root.join(session_dir_name(camera_name, now)), camera_name)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Path the next saved frame will be written to.
    pub fn next_path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.{}",
            self.prefix, self.next_index, IMAGE_EXTENSION
        ))
    }

    /// Write `image` under the next index. The index only advances on success.
    pub fn save(&mut self, image: &RgbImage, centroid: Centroid) -> Result<SavedImage, StorageError> {
        let following = self
            .next_index
            .checked_add(1)
            .ok_or_else(|| StorageError::IndexExhausted {
                dir: self.dir.clone(),
                index: self.next_index,
            })?;

        let path = self.next_path();
        if let Err(source) = write_jpeg(&path, image) {
            // a failed encode may leave a truncated file behind
            if path.is_file() {
                let _ = std::fs::remove_file(&path);
            }
            return Err(StorageError::Write { path, source });
        }

        let saved = SavedImage {
            index: self.next_index,
            path,
            centroid,
        };
        self.next_index = following;
        Ok(saved)
    }
}

fn write_jpeg(path: &Path, image: &RgbImage) -> Result<(), ImageError> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(image)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("Elp_3.jpg"), Some(3));
        assert_eq!(trailing_number("Elp_12"), Some(12));
        assert_eq!(trailing_number("cam2_007.jpg"), Some(7));
        assert_eq!(trailing_number("Elp_notes.txt"), None);
    }

    #[test]
    fn test_empty_dir_starts_at_one() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(resolve_next_index(tmp.path(), "Elp").unwrap(), 1);
    }

    #[test]
    fn test_missing_dir_starts_at_one() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert_eq!(resolve_next_index(&missing, "Elp").unwrap(), 1);
    }

    #[test]
    fn test_continues_after_highest_index() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Elp_3.jpg");
        touch(tmp.path(), "Elp_7.jpg");
        assert_eq!(resolve_next_index(tmp.path(), "Elp").unwrap(), 8);
    }

    #[test]
    fn test_ignores_other_prefixes_and_malformed_names() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Elp_2.jpg");
        touch(tmp.path(), "Other_99.jpg");
        touch(tmp.path(), "Elp_readme.txt");
        assert_eq!(resolve_next_index(tmp.path(), "Elp").unwrap(), 3);
    }

    #[test]
    fn test_first_save_is_index_one() {
        let tmp = TempDir::new().unwrap();
        let mut store = FrameStore::open(tmp.path(), "Elp").unwrap();
        let image = RgbImage::new(16, 16);

        let saved = store.save(&image, Centroid::new(8.0, 8.0)).unwrap();
        assert_eq!(saved.index, 1);
        assert_eq!(saved.path, tmp.path().join("Elp_1.jpg"));
        assert!(saved.path.exists());
        assert_eq!(store.next_index(), 2);
    }

    #[test]
    fn test_reopened_store_appends() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Elp_3.jpg");
        touch(tmp.path(), "Elp_7.jpg");

        let mut store = FrameStore::open(tmp.path(), "Elp").unwrap();
        let saved = store.save(&RgbImage::new(8, 8), Centroid::new(0.0, 0.0)).unwrap();
        assert_eq!(saved.path, tmp.path().join("Elp_8.jpg"));
    }

    #[test]
    fn test_failed_write_keeps_index() {
        let tmp = TempDir::new().unwrap();
        let mut store = FrameStore::open(tmp.path(), "Elp").unwrap();
        // occupy the target path with a directory so the write fails
        std::fs::create_dir(store.next_path()).unwrap();

        let result = store.save(&RgbImage::new(8, 8), Centroid::new(0.0, 0.0));
        assert!(matches!(result, Err(StorageError::Write { .. })));
        assert_eq!(store.next_index(), 1);
    }

    #[test]
    fn test_saved_frame_reads_back_close_to_original() {
        let tmp = TempDir::new().unwrap();
        let mut store = FrameStore::open(tmp.path(), "Elp").unwrap();

        // 21px cells so edges fall inside 8x8 JPEG blocks
        let image = RgbImage::from_fn(160, 120, |x, y| {
            if (x / 21 + y / 21) % 2 == 0 {
                image::Rgb([235, 235, 235])
            } else {
                image::Rgb([20, 20, 20])
            }
        });
        let saved = store.save(&image, Centroid::new(80.0, 60.0)).unwrap();

        let decoded = image::open(&saved.path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), image.dimensions());
        let (sum_sq, n) = image
            .as_raw()
            .iter()
            .zip(decoded.as_raw())
            .fold((0.0f64, 0usize), |(acc, n), (&a, &b)| {
                let d = f64::from(a) - f64::from(b);
                (acc + d * d, n + 1)
            });
        let rms = (sum_sq / n as f64).sqrt();
        assert!(rms < 6.0, "JPEG round trip too lossy: rms {:.2}", rms);
    }

    #[test]
    fn test_exhausted_index_is_an_error() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), &format!("Elp_{}.jpg", u32::MAX - 1));
        let mut store = FrameStore::open(tmp.path(), "Elp").unwrap();
        assert_eq!(store.next_index(), u32::MAX);

        let result = store.save(&RgbImage::new(8, 8), Centroid::new(0.0, 0.0));
        assert!(matches!(result, Err(StorageError::IndexExhausted { index, .. }) if index == u32::MAX));
        assert_eq!(store.next_index(), u32::MAX);
        assert!(!store.next_path().exists());
    }

    #[test]
    fn test_session_dir_name_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(session_dir_name("Elp", &now), "Elp_2024-03-09_07-05-01");
    }

    #[test]
    fn test_create_session_makes_directory() {
        let tmp = TempDir::new().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let store = FrameStore::create_session(&tmp.path().join("root"), "Elp", &now).unwrap();
        assert!(store.dir().is_dir());
        assert!(store.dir().ends_with("Elp_2024-03-09_07-05-01"));
        assert_eq!(store.next_index(), 1);
    }
}
