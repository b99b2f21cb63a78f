//! Output file naming.
//!
//! Results are written as `<base>.<ext>`. An existing file is never
//! overwritten; the first free name in the sequence is used instead:
//!
//! ```text
//! avatar_1.png → avatar_1_1.png → avatar_1_2.png → ...
//! ```
//!
//! Base names come from the user (`--name`) or from the position of the URL in
//! its batch (`avatar_<n>`). User-supplied names are reduced to a single safe
//! path component first, so a name can't escape the output directory.

use std::path::{Path, PathBuf};

/// Prefix for names derived from a URL's position.
pub const DEFAULT_PREFIX: &str = "avatar";

/// `avatar_<n>` for the n-th (1-based) URL of a run.
pub fn default_name(index: usize) -> String {
    format!("{DEFAULT_PREFIX}_{index}")
}

/// Reduce a user-supplied name to a usable file stem.
///
/// - Surrounding whitespace is trimmed.
/// - A trailing `.png` is dropped (the extension is added later).
/// - Path separators and characters Windows refuses become `_`.
/// - Leading dots are removed so the result is never hidden or `..`.
///
/// Returns `None` when nothing usable is left.
///
/// - `"  Profile Pic "` → `Some("Profile Pic")`
/// - `"me.png"` → `Some("me")`
/// - `"../../etc/passwd"` → `Some("_.._etc_passwd")`
/// - `"..."` → `None`
pub fn sanitize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    let stem = trimmed
        .strip_suffix(".png")
        .or_else(|| trimmed.strip_suffix(".PNG"))
        .unwrap_or(trimmed);

    let cleaned: String = stem
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// First path in `dir` for `base` + `extension` that does not exist yet.
pub fn unique_output_path(dir: &Path, base: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{base}.{extension}"));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{base}_{n}.{extension}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
