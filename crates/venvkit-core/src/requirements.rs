//! Requirements file model.
//!
//! One entry per logical line, in file order. The installer receives the file
//! itself (`-r <file>`); this parse is only used for logging, the empty-file
//! check, the completion fingerprint and post-install verification.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequirementsError {
    #[error("Cannot read requirements file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a requirements line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// `name[extras] <constraint> ; <marker>` or `name @ <url>`
    Package {
        name: String,
        /// Everything after the name, verbatim (may be empty).
        spec: String,
    },
    /// Installer option line (`-r other.txt`, `--index-url ...`, `-e .`).
    Option,
    /// Bare path or URL without a project name.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementEntry {
    /// 1-based line number of the first physical line.
    pub line: usize,
    pub raw: String,
    pub kind: EntryKind,
}

impl RequirementEntry {
    pub fn package_name(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Package { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Version required by a single exact `==` pin, if that is the whole constraint.
    pub fn exact_pin(&self) -> Option<&str> {
        let EntryKind::Package { spec, .. } = &self.kind else {
            return None;
        };
        let mut rest = spec.trim_start();
        if rest.starts_with('[') {
            rest = &rest[rest.find(']')? + 1..];
        }
        let rest = rest.split(';').next().unwrap_or("").trim();
        let version = rest.strip_prefix("==")?;
        if version.starts_with('=') || version.contains(',') {
            return None;
        }
        let version = version.trim();
        if version.is_empty() || version.ends_with(".*") {
            None
        } else {
            Some(version)
        }
    }
}

impl fmt::Display for RequirementEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parsed requirements file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub entries: Vec<RequirementEntry>,
    /// SHA-256 of the raw file contents, hex encoded.
    pub fingerprint: String,
}

impl Requirements {
    pub fn read(path: &Path) -> Result<Self, RequirementsError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| RequirementsError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut entries = Vec::new();
        let mut pending = String::new();
        let mut start_line = 0;

        for (idx, physical) in content.lines().enumerate() {
            if pending.is_empty() {
                start_line = idx + 1;
            }
            if let Some(cont) = physical.strip_suffix('\\') {
                pending.push_str(cont);
                continue;
            }
            pending.push_str(physical);
            if let Some(entry) = parse_line(start_line, &pending) {
                entries.push(entry);
            }
            pending.clear();
        }
        if !pending.is_empty() {
            if let Some(entry) = parse_line(start_line, &pending) {
                entries.push(entry);
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self {
            entries,
            fingerprint: hex::encode(hasher.finalize()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn packages(&self) -> impl Iterator<Item = &RequirementEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Package { .. }))
    }
}

fn parse_line(line: usize, text: &str) -> Option<RequirementEntry> {
    let raw = strip_comment(text).trim();
    if raw.is_empty() {
        return None;
    }
    let kind = if raw.starts_with('-') {
        EntryKind::Option
    } else if let Some(m) = name_regex().find(raw) {
        let rest = &raw[m.end()..];
        // `./pkg`, `pkg.tar.gz`, `https://...` look like names up to the first
        // separator; a real name is followed by nothing, extras, an operator,
        // a marker or `@`.
        if rest.is_empty() || rest.starts_with(|c: char| "[<>=!~;@ \t(".contains(c)) {
            EntryKind::Package {
                name: m.as_str().to_string(),
                spec: rest.trim().to_string(),
            }
        } else {
            EntryKind::Direct
        }
    } else {
        EntryKind::Direct
    };
    Some(RequirementEntry {
        line,
        raw: raw.to_string(),
        kind,
    })
}

/// A `#` at line start or after whitespace starts a comment.
fn strip_comment(text: &str) -> &str {
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &text[..i];
        }
    }
    text
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?").expect("valid name regex")
    })
}

/// Normalised project name: lowercase, runs of `-`, `_`, `.` become one `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_sep {
                out.push('-');
            }
            in_sep = true;
        } else {
            out.extend(c.to_lowercase());
            in_sep = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classifies_lines() {
        let reqs = Requirements::parse(
            "# tooling\n\
             pkg-a==1.0\n\
             pkg-b\n\
             \n\
             requests[socks]>=2.31 ; python_version >= \"3.8\"  # http\n\
             -r extra.txt\n\
             --index-url https://pypi.example/simple\n\
             ./vendor/localpkg\n\
             mypkg @ https://example.com/mypkg-1.0.tar.gz\n",
        );
        let kinds: Vec<_> = reqs.entries.iter().map(|e| (e.line, e.kind.clone())).collect();
        assert_eq!(kinds.len(), 7);
        assert_eq!(
            kinds[0],
            (2, EntryKind::Package { name: "pkg-a".into(), spec: "==1.0".into() })
        );
        assert_eq!(kinds[1], (3, EntryKind::Package { name: "pkg-b".into(), spec: String::new() }));
        assert_eq!(reqs.entries[2].package_name(), Some("requests"));
        assert_eq!(reqs.entries[2].raw, "requests[socks]>=2.31 ; python_version >= \"3.8\"");
        assert_eq!(kinds[3].1, EntryKind::Option);
        assert_eq!(kinds[4].1, EntryKind::Option);
        assert_eq!(kinds[5].1, EntryKind::Direct);
        assert_eq!(reqs.entries[6].package_name(), Some("mypkg"));
        assert_eq!(reqs.packages().count(), 4);
    }

    #[test]
    fn test_line_continuation_joins() {
        let reqs = Requirements::parse("numpy\\\n>=1.26\nscipy\n");
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs.entries[0].raw, "numpy>=1.26");
        assert_eq!(reqs.entries[0].line, 1);
        assert_eq!(reqs.entries[1].line, 3);
    }

    #[test]
    fn test_hash_inside_url_is_not_comment() {
        let reqs = Requirements::parse("pkg @ https://h/p.whl#sha256=abc\n");
        assert_eq!(reqs.entries[0].raw, "pkg @ https://h/p.whl#sha256=abc");
    }

    #[test]
    fn test_exact_pin() {
        let reqs = Requirements::parse(
            "a==1.0\nb>=2\nc==1.*\nd===3\ne[x]== 2.1 ; sys_platform == 'linux'\nf==1.0,!=1.0.1\n",
        );
        let pins: Vec<_> = reqs.entries.iter().map(|e| e.exact_pin()).collect();
        assert_eq!(pins, vec![Some("1.0"), None, None, None, Some("2.1"), None]);
    }

    #[test]
    fn test_empty_and_comment_only() {
        assert!(Requirements::parse("").is_empty());
        assert!(Requirements::parse("# nothing\n   \n").is_empty());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Requirements::parse("pkg-a\n");
        let b = Requirements::parse("pkg-a\n");
        let c = Requirements::parse("pkg-b\n");
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Requirements::read(&dir.path().join("nope.txt")).unwrap_err();
        assert!(err.to_string().contains("nope.txt"));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Django_REST.framework"), "django-rest-framework");
        assert_eq!(normalize_name("zope..interface"), "zope-interface");
        assert_eq!(normalize_name("pkg-a"), "pkg-a");
    }
}
