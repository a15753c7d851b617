use anyhow::{Result, Context};
use std::cmp::Ordering;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::Local;
use walkdir::WalkDir;

use crate::errors::SubtitleError;

// @module: File and directory utilities

/// Extensions recognized as subtitle inputs
const SUBTITLE_EXTENSIONS: [&str; 3] = ["ass", "ssa", "srt"];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Find subtitle files directly inside a directory, in natural episode order.
    ///
    /// Non-recursive on purpose: one season's episode files sit next to each
    /// other, and recursing would pull in specials from sibling folders.
    pub fn find_subtitle_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort_by(|a, b| natural_path_cmp(a, b));
        Ok(result)
    }

    /// Read a subtitle file tolerating the encodings fansub files ship with:
    /// UTF-8 (with or without BOM) and BOM-marked UTF-16 LE/BE.
    pub fn read_text_lossy<P: AsRef<Path>>(path: P) -> Result<String, SubtitleError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;

        if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            return String::from_utf8(bytes[3..].to_vec())
                .map_err(|_| SubtitleError::BadEncoding(path.to_path_buf()));
        }
        if bytes.starts_with(&[0xFF, 0xFE]) {
            return decode_utf16(&bytes[2..], u16::from_le_bytes)
                .ok_or_else(|| SubtitleError::BadEncoding(path.to_path_buf()));
        }
        if bytes.starts_with(&[0xFE, 0xFF]) {
            return decode_utf16(&bytes[2..], u16::from_be_bytes)
                .ok_or_else(|| SubtitleError::BadEncoding(path.to_path_buf()));
        }

        String::from_utf8(bytes).map_err(|_| SubtitleError::BadEncoding(path.to_path_buf()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    // @generates: Output path for the merged subtitle
    // @params: disc_root, output_dir, extension
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        disc_root: P1,
        output_dir: P2,
        extension: &str,
    ) -> PathBuf {
        let disc_root = disc_root.as_ref();
        let output_dir = output_dir.as_ref();

        // The disc folder name doubles as the output file stem
        let stem = disc_root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("merged"));

        output_dir.join(format!("{}.{}", stem, extension))
    }

    /// Append content to a report file with timestamp
    pub fn append_to_report<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Get current timestamp
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        // Open file in append mode, create if it doesn't exist
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open report file: {:?}", path.as_ref()))?;

        // Write content with timestamp
        writeln!(file, "[{}] {}", timestamp, content)
            .with_context(|| format!("Failed to write to report file: {:?}", path.as_ref()))?;

        Ok(())
    }
}

fn decode_utf16(bytes: &[u8], combine: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| combine([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

/// Compare two paths by file name, treating digit runs as numbers so that
/// "episode 2" sorts before "episode 10".
pub fn natural_path_cmp(a: &Path, b: &Path) -> Ordering {
    let a_name = a.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
    let b_name = b.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
    natural_str_cmp(&a_name, &b_name)
}

/// Natural-order comparison on strings, digit runs compared numerically
pub fn natural_str_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ac), Some(bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    let a_num = take_number(&mut a_chars);
                    let b_num = take_number(&mut b_chars);
                    match a_num.cmp(&b_num) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    match ac.cmp(&bc) {
                        Ordering::Equal => {
                            a_chars.next();
                            b_chars.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars>) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = chars.peek() {
        if let Some(digit) = c.to_digit(10) {
            value = value.saturating_mul(10).saturating_add(u64::from(digit));
            chars.next();
        } else {
            break;
        }
    }
    value
}
