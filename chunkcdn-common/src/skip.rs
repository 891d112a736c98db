use std::path::Path;

/// File suffixes whose content is normally already compressed. Chunks of
/// these files are stored raw without a compression attempt.
const PRECOMPRESSED_SUFFIXES: &[&str] = &[
    // Archive formats
    "zip", "gz", "bz2", "xz", "7z", "rar", "lz", "lz4", "lzma", "zst", "tgz", "tbz", "txz",
    // Java / Android
    "jar", "war", "ear", "apk",
    // Disk images and packages
    "dmg", "deb", "rpm",
    // Audio formats
    "mp3", "aac", "ogg", "flac", "m4a", "wma", "opus",
    // Video formats
    "mp4", "m4v", "mkv", "avi", "mov", "webm", "flv", "wmv", "mpg", "mpeg",
    // Image formats
    "jpg", "jpeg", "png", "gif", "webp", "heic", "avif",
    // Office + PDF (already zipped)
    "docx", "xlsx", "pptx", "pdf",
    // Fonts
    "woff", "woff2",
    // Data formats
    "npz", "parquet", "orc", "arrow",
];

/// Returns `true` if the file suffix says the content is probably compressed.
pub fn is_probably_compressed(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            PRECOMPRESSED_SUFFIXES.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn should_skip_compression(path: &Path, skip_precompressed: bool) -> bool {
    skip_precompressed && is_probably_compressed(path)
}
