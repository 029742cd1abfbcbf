//! Script scanner for collecting analysis scripts into one blob.
//!
//! Files in the input directory whose relative path matches the configured
//! glob are read in lexicographic order and wrapped in start/end markers
//! naming the source file, so the model can tell the scripts apart.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Separator placed between wrapped file segments.
const SEGMENT_SEPARATOR: &str = "\n\n";

/// Combined script content, immutable once built.
#[derive(Debug, Clone)]
pub struct AggregatedScripts {
    /// File names in the order they appear in `content`.
    pub files: Vec<String>,
    /// Marker-delimited concatenation of every readable file.
    pub content: String,
}

impl AggregatedScripts {
    /// Rough token estimate of the combined content.
    pub fn estimated_tokens(&self) -> u64 {
        estimate_tokens(&self.content)
    }
}

/// Scanner over one directory and one glob pattern.
pub struct ScriptScanner {
    directory: PathBuf,
    pattern: String,
    matcher: GlobMatcher,
}

impl ScriptScanner {
    /// Create a new scanner. Fails if the glob pattern is invalid.
    pub fn new(directory: &Path, pattern: &str) -> Result<Self> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid file pattern '{}'", pattern))?
            .compile_matcher();

        let directory = std::path::absolute(directory).unwrap_or_else(|_| directory.to_path_buf());

        Ok(Self {
            directory,
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// Absolute directory being scanned.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Find matching files, sorted lexicographically by relative path.
    ///
    /// Hidden files and directories are skipped. A pattern without a path
    /// separator only looks at the top level of the directory.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut walker = WalkDir::new(&self.directory).min_depth(1).follow_links(true);
        if !self.pattern.contains('/') {
            walker = walker.max_depth(1);
        }

        let mut matches: Vec<PathBuf> = walker
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.strip_prefix(&self.directory)
                    .map(|rel| self.matcher.is_match(rel))
                    .unwrap_or(false)
            })
            .collect();

        matches.sort();
        matches
    }

    /// Read every matching file and join them into one marker-delimited blob.
    ///
    /// Returns `Ok(None)` when nothing matched or no file could be read.
    pub fn aggregate(&self) -> Result<Option<AggregatedScripts>> {
        let search_path = self.directory.join(&self.pattern);
        println!("\n🔍 Searching for scripts in: {}", search_path.display());

        let paths = self.scan();
        if paths.is_empty() {
            warn!(
                "No files found matching pattern '{}' in directory '{}'",
                self.pattern,
                self.directory.display()
            );
            return Ok(None);
        }

        println!("   Found {} script files to process:", paths.len());

        let mut files = Vec::with_capacity(paths.len());
        let mut segments = Vec::with_capacity(paths.len());

        for path in &paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            println!("     📄 Reading: {}", name);

            match fs::read(path) {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    segments.push(wrap_segment(&name, &text));
                    files.push(name);
                }
                Err(e) => {
                    warn!("Error reading file {}: {}, skipping", path.display(), e);
                }
            }
        }

        if segments.is_empty() {
            warn!("No script content could be loaded successfully");
            return Ok(None);
        }

        Ok(Some(AggregatedScripts {
            files,
            content: segments.join(SEGMENT_SEPARATOR),
        }))
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Wrap one file's content between its start and end markers.
pub fn wrap_segment(name: &str, content: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        start_marker(name),
        content,
        end_marker(name)
    )
}

pub fn start_marker(name: &str) -> String {
    format!("--- Start of Content from {} ---", name)
}

pub fn end_marker(name: &str) -> String {
    format!("--- End of Content from {} ---", name)
}

/// Rough token estimate: four characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}
