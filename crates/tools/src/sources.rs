//! Resolution of `-f` arguments into concrete manifest sources.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use {tracing::debug, url::Url, walkdir::WalkDir};

use crate::error::SourceError;

/// File extensions picked up when walking a directory.
pub const MANIFEST_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// One logical input unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    File(PathBuf),
    Url(Url),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stdin => f.write_str("-"),
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Url(url) => write!(f, "{url}"),
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn is_glob(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Expand every input into sources, in input order. Stdin, when requested,
/// always comes first.
///
/// - `-` is stdin, at most once.
/// - `http://` and `https://` inputs are fetched later as URLs.
/// - Glob patterns must match at least one path.
/// - Directories yield their `.json`/`.yaml`/`.yml` files, descending into
///   subdirectories only when `recursive` is set.
/// - A file named explicitly is kept whatever its extension.
pub fn resolve_sources(inputs: &[String], recursive: bool) -> Result<Vec<Source>, SourceError> {
    let mut has_stdin = false;
    let mut resolved = Vec::new();

    for input in inputs {
        if input.is_empty() {
            return Err(SourceError::EmptyFilename);
        }
        if input == "-" {
            if has_stdin {
                return Err(SourceError::DuplicateStdin);
            }
            has_stdin = true;
            continue;
        }
        if is_url(input) {
            let url = Url::parse(input).map_err(|source| SourceError::BadUrl {
                url: input.clone(),
                source,
            })?;
            resolved.push(Source::Url(url));
            continue;
        }

        let paths = if is_glob(input) && !Path::new(input).exists() {
            expand_glob(input)?
        } else {
            vec![PathBuf::from(input)]
        };

        let mut files = Vec::new();
        for path in &paths {
            files.extend(expand_path(path, recursive)?);
        }
        files.sort();
        files.dedup();
        debug!(input = %input, count = files.len(), "resolved input");
        resolved.extend(files.into_iter().map(Source::File));
    }

    if has_stdin {
        resolved.insert(0, Source::Stdin);
    }
    Ok(resolved)
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    let entries = glob::glob(pattern).map_err(|source| SourceError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => matches.push(path),
            Err(e) => {
                let path = e.path().to_path_buf();
                return Err(SourceError::Io {
                    path,
                    source: e.into(),
                });
            },
        }
    }
    if matches.is_empty() {
        return Err(SourceError::NoMatch(pattern.to_string()));
    }
    Ok(matches)
}

fn expand_path(path: &Path, recursive: bool) -> Result<Vec<PathBuf>, SourceError> {
    let meta = std::fs::metadata(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut walker = WalkDir::new(path).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: path.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && has_manifest_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn has_manifest_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}
