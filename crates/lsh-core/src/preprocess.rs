//! `@include` expansion for script files.
//!
//! Runs on raw text before lexing. An `@include "path"` line is replaced by
//! the (recursively expanded) contents of `path`, resolved relative to the
//! file that contains the directive. Lines whose first non-blank character
//! is `#` are blanked so line numbers inside one file stay put.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::fs::FileSystem;

const DIRECTIVE: &str = "@include";

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("included file not found: {} (line {line})", .path.display())]
    MissingInclude { path: PathBuf, line: usize },

    #[error("circular include of {}", .0.display())]
    CircularInclude(PathBuf),

    #[error("malformed @include directive on line {0}")]
    MalformedDirective(usize),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads `path` and expands its includes.
pub fn expand_file(fs: &dyn FileSystem, path: &Path) -> Result<String, PreprocessError> {
    let source = fs.read_to_string(path).map_err(|source| PreprocessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    expand_loaded(fs, path, &source)
}

/// Expands includes in `source`, already read from `path`.
pub fn expand_loaded(
    fs: &dyn FileSystem,
    path: &Path,
    source: &str,
) -> Result<String, PreprocessError> {
    let path = normalize(path);
    let mut stack = vec![path.clone()];
    let lines = expand(fs, source, parent_dir(&path), &mut stack)?;
    Ok(lines.join("\n"))
}

/// Expands includes in `source`, resolving them against `base_dir`.
pub fn expand_source(
    fs: &dyn FileSystem,
    source: &str,
    base_dir: &Path,
) -> Result<String, PreprocessError> {
    let mut stack = Vec::new();
    let lines = expand(fs, source, base_dir, &mut stack)?;
    Ok(lines.join("\n"))
}

fn expand(
    fs: &dyn FileSystem,
    source: &str,
    base_dir: &Path,
    stack: &mut Vec<PathBuf>,
) -> Result<Vec<String>, PreprocessError> {
    let mut out = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim_start();

        if trimmed.starts_with('#') {
            out.push(String::new());
            continue;
        }

        let Some(target) = include_target(trimmed, line_number)? else {
            out.push(line.to_string());
            continue;
        };

        let path = normalize(&base_dir.join(target));
        if stack.contains(&path) {
            return Err(PreprocessError::CircularInclude(path));
        }
        if !fs.file_exists(&path) {
            return Err(PreprocessError::MissingInclude {
                path,
                line: line_number,
            });
        }

        info!(path = %path.display(), line = line_number, "expanding include");
        let included = fs.read_to_string(&path).map_err(|source| PreprocessError::Io {
            path: path.clone(),
            source,
        })?;
        stack.push(path.clone());
        let lines = expand(fs, &included, parent_dir(&path), stack)?;
        stack.pop();
        out.extend(lines);
    }

    Ok(out)
}

/// The path named by an `@include` line, or `None` for ordinary lines.
fn include_target(trimmed: &str, line: usize) -> Result<Option<&str>, PreprocessError> {
    let Some(rest) = trimmed.strip_prefix(DIRECTIVE) else {
        return Ok(None);
    };
    if !rest.is_empty() && !rest.starts_with([' ', '\t', '"', '\'']) {
        return Ok(None);
    }

    let rest = rest.trim();
    let target = match rest.chars().next() {
        Some(quote @ ('"' | '\'')) => rest[1..]
            .strip_suffix(quote)
            .ok_or(PreprocessError::MalformedDirective(line))?,
        Some(_) if !rest.contains(char::is_whitespace) => rest,
        _ => return Err(PreprocessError::MalformedDirective(line)),
    };
    if target.is_empty() {
        return Err(PreprocessError::MalformedDirective(line));
    }
    Ok(Some(target))
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

/// Lexically removes `.` and `..` so cycles are detected without touching
/// the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    #[test]
    fn test_include_is_inlined() {
        let fs = MemoryFileSystem::new()
            .with_file("scripts/main.lsf", "echo a\n@include \"lib/util.lsf\"\necho c")
            .with_file("scripts/lib/util.lsf", "echo b");
        let text = expand_file(&fs, Path::new("scripts/main.lsf")).unwrap();
        assert_eq!(text, "echo a\necho b\necho c");
    }

    #[test]
    fn test_nested_includes_resolve_relative_to_includer() {
        let fs = MemoryFileSystem::new()
            .with_file("main.lsf", "@include 'a/one.lsf'")
            .with_file("a/one.lsf", "@include \"../two.lsf\"")
            .with_file("two.lsf", "echo two");
        assert_eq!(expand_file(&fs, Path::new("main.lsf")).unwrap(), "echo two");
    }

    #[test]
    fn test_missing_include() {
        let fs = MemoryFileSystem::new().with_file("main.lsf", "echo a\n@include \"missing.lsf\"");
        match expand_file(&fs, Path::new("main.lsf")) {
            Err(PreprocessError::MissingInclude { path, line }) => {
                assert_eq!(path, PathBuf::from("missing.lsf"));
                assert_eq!(line, 2);
            }
            other => panic!("Expected MissingInclude, got {:?}", other),
        }
    }

    #[test]
    fn test_circular_include() {
        let fs = MemoryFileSystem::new()
            .with_file("a.lsf", "@include \"b.lsf\"")
            .with_file("b.lsf", "@include \"./a.lsf\"");
        match expand_file(&fs, Path::new("a.lsf")) {
            Err(PreprocessError::CircularInclude(path)) => assert_eq!(path, PathBuf::from("a.lsf")),
            other => panic!("Expected CircularInclude, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_lines_are_blanked() {
        let fs = MemoryFileSystem::new();
        let text = expand_source(&fs, "  # note 'unbalanced\necho x", Path::new("")).unwrap();
        assert_eq!(text, "\necho x");
    }

    #[test]
    fn test_malformed_directive() {
        let fs = MemoryFileSystem::new();
        assert!(matches!(
            expand_source(&fs, "@include \"oops", Path::new("")),
            Err(PreprocessError::MalformedDirective(1))
        ));
        assert!(matches!(
            expand_source(&fs, "@include", Path::new("")),
            Err(PreprocessError::MalformedDirective(1))
        ));
    }

    #[test]
    fn test_lookalike_lines_are_left_alone() {
        let fs = MemoryFileSystem::new();
        let text = expand_source(&fs, "@includes x", Path::new("")).unwrap();
        assert_eq!(text, "@includes x");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("a/./b/../c.lsf")), PathBuf::from("a/c.lsf"));
        assert_eq!(normalize(Path::new("../x.lsf")), PathBuf::from("../x.lsf"));
        assert_eq!(normalize(Path::new("../../x.lsf")), PathBuf::from("../../x.lsf"));
    }
}
