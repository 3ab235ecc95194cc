//! Filename state codec.
//!
//! Legacy galleries store photos as `<creationEpochMs>-<hash>[-<flags>].<ext>`
//! where `flags` is a token of flag characters. The identifier shown to
//! clients is the same name with the flag segment removed. Flag operations
//! never touch the `<ms>-<hash>` part, and setting or clearing a flag twice
//! is a no-op.

use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flag {
    Starred,
}

impl Flag {
    pub fn token(self) -> char {
        match self {
            Flag::Starred => 's',
        }
    }

    pub fn from_token(token: char) -> Option<Self> {
        match token {
            's' => Some(Flag::Starred),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub created_ms: i64,
    pub hash: String,
    pub flags: BTreeSet<Flag>,
    pub ext: String,
}

impl ParsedName {
    pub fn stem(&self) -> String {
        format!("{}-{}", self.created_ms, self.hash)
    }

    pub fn identifier(&self) -> String {
        join_ext(&self.stem(), &self.ext)
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Split a (possibly path-qualified) filename into its dash-separated stem
/// parts and its extension.
fn split_name(filename: &str) -> (Vec<&str>, &str) {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], &base[idx + 1..]),
        _ => (base, ""),
    };
    (stem.split('-').collect(), ext)
}

fn join_ext(stem: &str, ext: &str) -> String {
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    }
}

/// The flag token of a filename, or "" when it has none.
pub fn flags(filename: &str) -> String {
    let (parts, _) = split_name(filename);
    parts.get(2).map(|token| token.to_string()).unwrap_or_default()
}

/// Returns `(<ms>-<hash>, ext)` whether or not flags are present.
pub fn strip_flags(filename: &str) -> (String, String) {
    let (parts, ext) = split_name(filename);
    let stem = parts.iter().take(2).copied().collect::<Vec<_>>().join("-");
    (stem, ext.to_string())
}

/// The client-visible identifier: `<ms>-<hash>.<ext>`.
pub fn identifier(filename: &str) -> String {
    let (stem, ext) = strip_flags(filename);
    join_ext(&stem, &ext)
}

pub fn has_flag(filename: &str, flag: Flag) -> bool {
    flags(filename).contains(flag.token())
}

pub fn set_flag(filename: &str, flag: Flag) -> String {
    let mut token = flags(filename);
    if !token.contains(flag.token()) {
        token.push(flag.token());
    }
    rebuild(filename, &token)
}

pub fn clear_flag(filename: &str, flag: Flag) -> String {
    let token = flags(filename).replace(flag.token(), "");
    rebuild(filename, &token)
}

fn rebuild(filename: &str, token: &str) -> String {
    let (stem, ext) = strip_flags(filename);
    if token.is_empty() {
        join_ext(&stem, &ext)
    } else {
        join_ext(&format!("{}-{}", stem, token), &ext)
    }
}

/// Parse a name following the grammar. Unknown flag characters are ignored.
pub fn parse(filename: &str) -> Option<ParsedName> {
    let (parts, ext) = split_name(filename);
    if !(2..=3).contains(&parts.len()) || ext.is_empty() {
        return None;
    }

    let created_ms = parts[0].parse::<i64>().ok()?;
    let hash = parts[1];
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let flags: BTreeSet<Flag> = parts
        .get(2)
        .map(|token| token.chars().filter_map(Flag::from_token).collect())
        .unwrap_or_default();

    Some(ParsedName {
        created_ms,
        hash: hash.to_string(),
        flags,
        ext: ext.to_string(),
    })
}

/// Find the physical filename in `dir` whose identifier matches
/// `identifier` (case-insensitive). Costs one directory scan.
pub async fn resolve_in_directory(
    dir: &Path,
    identifier_name: &str,
) -> std::io::Result<Option<String>> {
    let wanted = identifier(identifier_name).to_lowercase();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().to_string();
        if identifier(&file_name).to_lowercase() == wanted {
            return Ok(Some(file_name));
        }
    }

    Ok(None)
}
