//! Archive entry naming

use std::collections::HashSet;

/// Longest sanitized name, in characters, before the extension
pub const MAX_NAME_CHARS: usize = 80;

/// Name used when nothing printable is left
const FALLBACK_NAME: &str = "track";

fn is_edge_junk(c: char) -> bool {
    matches!(c, '_' | '.' | ' ')
}

/// Make a display title safe to use as a file name on any platform
///
/// Reserved characters and control characters become `_`, runs of
/// whitespace and underscores collapse to a single `_`, and leading or
/// trailing `_`, `.` and spaces are removed. The result is at most
/// [`MAX_NAME_CHARS`] characters and never empty.
pub fn sanitize_filename(name: &str) -> String {
    let mut collapsed = String::with_capacity(name.len());
    let mut in_run = false;

    for c in name.chars() {
        let c = match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if c == '_' || c.is_whitespace() {
            if !in_run {
                collapsed.push('_');
            }
            in_run = true;
        } else {
            collapsed.push(c);
            in_run = false;
        }
    }

    let trimmed = collapsed.trim_matches(is_edge_junk);
    let truncated: String = trimmed.chars().take(MAX_NAME_CHARS).collect();
    let result = truncated.trim_end_matches(is_edge_junk);

    if result.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        result.to_string()
    }
}

/// Hands out entry names that are unique within one archive
///
/// "Song.wav" -> "Song_1.wav" -> "Song_2.wav" etc.
#[derive(Debug, Default)]
pub struct UniqueNames {
    used: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `<base>.<extension>`, adding a counter if it is taken
    pub fn claim(&mut self, base: &str, extension: &str) -> String {
        let mut candidate = format!("{}.{}", base, extension);
        let mut counter = 1;
        while self.used.contains(&candidate) {
            candidate = format!("{}_{}.{}", base, counter, extension);
            counter += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
