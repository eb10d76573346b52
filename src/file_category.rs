//! File classification for choosing a destination subfolder.
//!
//! A [`Classifier`] turns a [`FileRecord`] into a category label according to the
//! configured [`OrganizationMode`]. Classification never fails: a file that
//! cannot be inspected gets the [`UNCLASSIFIED`] label.
//!
//! # Examples
//!
//! ```
//! use dirsort::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.extension_to_category("png"), Some(Category::Images));
//! assert_eq!(mapper.mime_to_category("audio/mpeg"), Some(Category::Audio));
//! assert_eq!(mapper.extension_to_category("xyz"), None);
//! ```

use crate::config::OrganizationMode;
use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Label used when a file cannot be inspected.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Label used under [`OrganizationMode::ByExtension`] for files without an extension.
pub const NO_EXTENSION: &str = "NoExtension";

const MIB: u64 = 1024 * 1024;

/// Upper edges (inclusive) of the size buckets.
pub const SMALL_MAX: u64 = MIB;
pub const MEDIUM_MAX: u64 = 10 * MIB;
pub const LARGE_MAX: u64 = 100 * MIB;

/// Broad file type used by [`OrganizationMode::ByType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Documents,
    Images,
    Videos,
    Audio,
    Archives,
    /// Executables, installers, and scripts.
    Programs,
    /// Recognised by neither extension nor content.
    Other,
    /// At or below the junk threshold.
    Junk,
}

impl Category {
    /// Returns the folder name for this category.
    ///
    /// ```
    /// use dirsort::file_category::Category;
    ///
    /// assert_eq!(Category::Images.dir_name(), "Images");
    /// assert_eq!(Category::Junk.dir_name(), "Junk");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Documents => "Documents",
            Category::Images => "Images",
            Category::Videos => "Videos",
            Category::Audio => "Audio",
            Category::Archives => "Archives",
            Category::Programs => "Programs",
            Category::Other => "Other",
            Category::Junk => "Junk",
        }
    }
}

/// Size bucket used by [`OrganizationMode::BySize`].
///
/// Each bucket includes its upper edge, so a file of exactly 1 MiB is Small.
pub fn size_bucket(size: u64) -> &'static str {
    if size <= SMALL_MAX {
        "Small"
    } else if size <= MEDIUM_MAX {
        "Medium"
    } else if size <= LARGE_MAX {
        "Large"
    } else {
        "VeryLarge"
    }
}

/// Maps file extensions and MIME types to categories.
#[derive(Debug, Clone)]
pub struct FileMapper {
    mime_map: HashMap<String, Category>,
    extension_map: HashMap<String, Category>,
}

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "dot", "dotx", "docm", "ppt", "pptx", "pps", "ppsx", "odp", "potx",
    "xls", "xlsx", "xlsm", "xlsb", "csv", "ods", "txt", "rtf", "md", "tex", "log", "rst", "epub",
    "mobi", "azw3", "djvu", "fb2", "xps", "oxps", "odt", "pages", "wpd", "wps",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jfif", "png", "gif", "webp", "bmp", "dib", "tif", "tiff", "heic",
    "heif", "raw", "cr2", "nef", "arw", "orf", "sr2", "dng", "rw2", "svg", "svgz", "ico", "icns",
    "psd", "xcf", "ai",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mkv", "avi", "mov", "qt", "wmv", "asf", "flv", "f4v", "webm", "mts", "m2ts",
    "3gp", "3g2", "vob", "mpg", "mpeg", "ogv", "rmvb", "divx",
];

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "m4a", "ogg", "oga", "wma", "mid", "midi", "opus", "amr", "aiff",
    "au", "ac3",
];

const ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "zipx", "rar", "7z", "tar", "tgz", "gz", "bz2", "xz", "lz", "lzma", "zst", "iso",
    "img", "cab", "dmg",
];

const PROGRAM_EXTENSIONS: &[&str] = &[
    "exe", "msi", "scr", "com", "bat", "cmd", "ps1", "vbs", "deb", "rpm", "run", "sh",
    "appimage", "snap", "pkg", "app", "apk", "xapk", "aab", "ipa", "jar", "dll", "so",
];

const MIME_TYPES: &[(&str, Category)] = &[
    ("application/pdf", Category::Documents),
    ("application/rtf", Category::Documents),
    ("application/msword", Category::Documents),
    ("application/epub+zip", Category::Documents),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Category::Documents,
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Category::Documents,
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Category::Documents,
    ),
    ("application/vnd.ms-excel", Category::Documents),
    ("application/vnd.ms-powerpoint", Category::Documents),
    ("application/vnd.oasis.opendocument.text", Category::Documents),
    ("application/zip", Category::Archives),
    ("application/x-tar", Category::Archives),
    ("application/gzip", Category::Archives),
    ("application/x-bzip2", Category::Archives),
    ("application/x-xz", Category::Archives),
    ("application/zstd", Category::Archives),
    ("application/x-7z-compressed", Category::Archives),
    ("application/vnd.rar", Category::Archives),
    ("application/x-rar-compressed", Category::Archives),
    ("application/x-iso9660-image", Category::Archives),
    ("application/x-executable", Category::Programs),
    ("application/x-msdownload", Category::Programs),
    ("application/vnd.microsoft.portable-executable", Category::Programs),
    ("application/x-mach-binary", Category::Programs),
    ("application/vnd.debian.binary-package", Category::Programs),
    ("application/x-rpm", Category::Programs),
    ("application/x-sharedlib", Category::Programs),
    ("application/java-archive", Category::Programs),
    ("application/vnd.android.package-archive", Category::Programs),
];

impl FileMapper {
    /// Creates a new `FileMapper` with all standard mappings.
    pub fn new() -> Self {
        let mut mapper = Self {
            mime_map: HashMap::new(),
            extension_map: HashMap::new(),
        };

        let tables = [
            (DOCUMENT_EXTENSIONS, Category::Documents),
            (IMAGE_EXTENSIONS, Category::Images),
            (VIDEO_EXTENSIONS, Category::Videos),
            (AUDIO_EXTENSIONS, Category::Audio),
            (ARCHIVE_EXTENSIONS, Category::Archives),
            (PROGRAM_EXTENSIONS, Category::Programs),
        ];
        for (extensions, category) in tables {
            for ext in extensions {
                mapper.add_extension_mapping(ext, category);
            }
        }
        for (mime, category) in MIME_TYPES {
            mapper.add_mime_mapping(mime, *category);
        }

        mapper
    }

    /// Adds a MIME type to category mapping.
    pub fn add_mime_mapping(&mut self, mime: &str, category: Category) {
        self.mime_map.insert(mime.to_lowercase(), category);
    }

    /// Adds a file extension to category mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map
            .insert(ext.trim_start_matches('.').to_lowercase(), category);
    }

    /// Maps a file extension to a category. Case-insensitive.
    ///
    /// ```
    /// use dirsort::file_category::{Category, FileMapper};
    ///
    /// let mapper = FileMapper::default();
    /// assert_eq!(mapper.extension_to_category("PDF"), Some(Category::Documents));
    /// ```
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map.get(&ext.to_lowercase()).copied()
    }

    /// Maps a MIME type to a category.
    ///
    /// Exact table entries win, then the top-level type decides.
    pub fn mime_to_category(&self, mime_type: &str) -> Option<Category> {
        let mime = mime_type.to_lowercase();
        if let Some(category) = self.mime_map.get(&mime) {
            return Some(*category);
        }

        match mime.split_once('/').map(|(top, _)| top) {
            Some("image") => Some(Category::Images),
            Some("video") => Some(Category::Videos),
            Some("audio") => Some(Category::Audio),
            Some("text") => Some(Category::Documents),
            _ => None,
        }
    }

    /// The known extensions of each category, sorted, keyed by folder name.
    ///
    /// ```
    /// use dirsort::file_category::FileMapper;
    ///
    /// let types = FileMapper::default().extensions_by_category();
    /// assert!(types["Images"].contains(&"png".to_string()));
    /// ```
    pub fn extensions_by_category(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut listing: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for (ext, category) in &self.extension_map {
            listing
                .entry(category.dir_name())
                .or_default()
                .push(ext.clone());
        }
        for extensions in listing.values_mut() {
            extensions.sort();
        }
        listing
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// What is known about one scanned file.
///
/// Created once during scanning and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Absolute path of the file in its source folder.
    pub path: PathBuf,
    /// Size in bytes, `None` when the file could not be inspected.
    pub size: Option<u64>,
    pub modified: Option<DateTime<Local>>,
    /// Lowercase extension without the leading dot.
    pub extension: Option<String>,
    /// The label assigned by the classifier.
    pub category: String,
}

impl FileRecord {
    /// Builds a record from explicit metadata, leaving the category empty.
    pub fn new(
        path: impl Into<PathBuf>,
        size: Option<u64>,
        modified: Option<DateTime<Local>>,
    ) -> Self {
        let path = path.into();
        let extension = extension_of(&path);
        Self {
            path,
            size,
            modified,
            extension,
            category: String::new(),
        }
    }

    /// The file name component, lossily converted.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Assigns category labels under one organization mode.
#[derive(Debug, Clone)]
pub struct Classifier {
    mode: OrganizationMode,
    junk_threshold: u64,
    mapper: FileMapper,
}

impl Classifier {
    pub fn new(mode: OrganizationMode, junk_threshold: u64) -> Self {
        Self {
            mode,
            junk_threshold,
            mapper: FileMapper::default(),
        }
    }

    /// Replaces the extension and MIME tables.
    pub fn with_mapper(mut self, mapper: FileMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn mode(&self) -> OrganizationMode {
        self.mode
    }

    /// Reads the metadata of `path` and returns a classified record.
    pub fn inspect(&self, path: &Path) -> FileRecord {
        let record = match fs::metadata(path) {
            Ok(metadata) => FileRecord::new(
                path,
                Some(metadata.len()),
                metadata.modified().ok().map(DateTime::<Local>::from),
            ),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Could not stat file");
                FileRecord::new(path, None, None)
            }
        };
        self.classified(record)
    }

    /// Returns `record` with its category filled in.
    pub fn classified(&self, mut record: FileRecord) -> FileRecord {
        record.category = self.classify(&record);
        record
    }

    /// Computes the category label of a record.
    pub fn classify(&self, record: &FileRecord) -> String {
        let Some(size) = record.size else {
            return UNCLASSIFIED.to_string();
        };

        match self.mode {
            OrganizationMode::ByType => self.classify_by_type(record, size).dir_name().to_string(),
            OrganizationMode::ByDate => match record.modified {
                Some(modified) => modified.format("%Y/%m-%B").to_string(),
                None => UNCLASSIFIED.to_string(),
            },
            OrganizationMode::BySize => size_bucket(size).to_string(),
            OrganizationMode::ByExtension => record
                .extension
                .clone()
                .unwrap_or_else(|| NO_EXTENSION.to_string()),
        }
    }

    fn classify_by_type(&self, record: &FileRecord, size: u64) -> Category {
        if size <= self.junk_threshold {
            return Category::Junk;
        }

        if let Some(ext) = record.extension.as_deref()
            && let Some(category) = self.mapper.extension_to_category(ext)
        {
            return category;
        }

        // Content sniffing for unknown or missing extensions
        match infer::get_from_path(&record.path) {
            Ok(Some(kind)) => self
                .mapper
                .mime_to_category(kind.mime_type())
                .unwrap_or(Category::Other),
            _ => Category::Other,
        }
    }
}

/// Joins a category label onto `base`, treating `/` as a folder separator.
pub fn category_dir(base: &Path, category: &str) -> PathBuf {
    let mut dir = base.to_path_buf();
    for part in category.split('/').filter(|part| !part.is_empty()) {
        dir.push(part);
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    fn record(name: &str, size: u64) -> FileRecord {
        FileRecord::new(PathBuf::from("/nonexistent").join(name), Some(size), None)
    }

    #[test]
    fn test_table_extensions_map_to_categories() {
        let classifier = Classifier::new(OrganizationMode::ByType, 0);
        let cases = [
            ("report.pdf", "Documents"),
            ("photo.JPG", "Images"),
            ("clip.mkv", "Videos"),
            ("song.flac", "Audio"),
            ("backup.7z", "Archives"),
            ("setup.exe", "Programs"),
        ];
        for (name, expected) in cases {
            assert_eq!(classifier.classify(&record(name, 100)), expected, "{name}");
        }
    }

    #[test]
    fn test_files_at_or_below_threshold_are_junk() {
        let classifier = Classifier::new(OrganizationMode::ByType, 1024);
        assert_eq!(classifier.classify(&record("photo.png", 0)), "Junk");
        assert_eq!(classifier.classify(&record("photo.png", 1024)), "Junk");
        assert_eq!(classifier.classify(&record("archive.zip", 10)), "Junk");
        assert_eq!(classifier.classify(&record("photo.png", 1025)), "Images");
    }

    #[test]
    fn test_junk_only_applies_to_by_type() {
        let classifier = Classifier::new(OrganizationMode::ByExtension, 1024);
        assert_eq!(classifier.classify(&record("photo.png", 1)), "png");
    }

    #[test]
    fn test_unknown_extension_falls_back_to_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("picture.xyz");
        fs::write(&path, PNG_HEADER).unwrap();

        let classifier = Classifier::new(OrganizationMode::ByType, 0);
        assert_eq!(classifier.inspect(&path).category, "Images");
    }

    #[test]
    fn test_unknown_extension_and_content_is_other() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.xyz");
        fs::write(&path, "plain words with no signature").unwrap();

        let classifier = Classifier::new(OrganizationMode::ByType, 0);
        assert_eq!(classifier.inspect(&path).category, "Other");
    }

    #[test]
    fn test_missing_file_is_unclassified() {
        let classifier = Classifier::new(OrganizationMode::BySize, 0);
        let record = classifier.inspect(Path::new("/definitely/not/here.txt"));
        assert_eq!(record.size, None);
        assert_eq!(record.category, UNCLASSIFIED);
    }

    #[test]
    fn test_size_bucket_boundaries() {
        assert_eq!(size_bucket(0), "Small");
        assert_eq!(size_bucket(1_048_576), "Small");
        assert_eq!(size_bucket(1_048_577), "Medium");
        assert_eq!(size_bucket(10 * MIB), "Medium");
        assert_eq!(size_bucket(10 * MIB + 1), "Large");
        assert_eq!(size_bucket(100 * MIB), "Large");
        assert_eq!(size_bucket(100 * MIB + 1), "VeryLarge");
    }

    #[test]
    fn test_by_date_uses_year_and_month_name() {
        let classifier = Classifier::new(OrganizationMode::ByDate, 0);
        let modified = Local.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let record = FileRecord::new("/src/a.txt", Some(5), Some(modified));
        assert_eq!(classifier.classify(&record), "2024/03-March");

        let undated = FileRecord::new("/src/b.txt", Some(5), None);
        assert_eq!(classifier.classify(&undated), UNCLASSIFIED);
    }

    #[test]
    fn test_by_extension() {
        let classifier = Classifier::new(OrganizationMode::ByExtension, 0);
        assert_eq!(classifier.classify(&record("Photo.JPEG", 1)), "jpeg");
        assert_eq!(classifier.classify(&record("data.tar.gz", 1)), "gz");
        assert_eq!(classifier.classify(&record("Makefile", 1)), NO_EXTENSION);
        assert_eq!(classifier.classify(&record(".bashrc", 1)), NO_EXTENSION);
    }

    #[test]
    fn test_mime_to_category() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.mime_to_category("IMAGE/PNG"), Some(Category::Images));
        assert_eq!(
            mapper.mime_to_category("application/zip"),
            Some(Category::Archives)
        );
        assert_eq!(
            mapper.mime_to_category("application/x-executable"),
            Some(Category::Programs)
        );
        assert_eq!(
            mapper.mime_to_category("text/html"),
            Some(Category::Documents)
        );
        assert_eq!(mapper.mime_to_category("font/ttf"), None);
    }

    #[test]
    fn test_custom_mapping() {
        let mut mapper = FileMapper::default();
        mapper.add_extension_mapping(".rs", Category::Programs);
        let classifier = Classifier::new(OrganizationMode::ByType, 0).with_mapper(mapper);
        assert_eq!(classifier.classify(&record("main.rs", 10)), "Programs");
    }

    #[test]
    fn test_extensions_by_category_lists_every_table() {
        let listing = FileMapper::default().extensions_by_category();
        assert_eq!(
            listing.keys().copied().collect::<Vec<_>>(),
            vec!["Archives", "Audio", "Documents", "Images", "Programs", "Videos"]
        );
        let documents = &listing["Documents"];
        assert!(documents.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(documents.contains(&"pdf".to_string()));
    }

    #[test]
    fn test_category_dir_splits_nested_labels() {
        let dir = category_dir(Path::new("/out"), "2024/03-March");
        assert_eq!(dir, Path::new("/out").join("2024").join("03-March"));
    }
}
