use crate::{FileDiff, HunkHeader};

/// Parse raw `git diff` output into per-file hunk headers.
///
/// Only the `@@` headers are kept; hunk bodies are skipped. Binary files are
/// dropped. For added or deleted files the real path fills both sides, so
/// `/dev/null` never appears as a path. Pure renames carry no hunks but are
/// still reported so callers can see the old and new names.
pub fn parse_diff(input: &str) -> Vec<FileDiff> {
    let mut files = Vec::new();
    let lines: Vec<&str> = input.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let Some(header) = lines[i].strip_prefix("diff --git ") else {
            i += 1;
            continue;
        };

        let (mut old_path, mut new_path) = split_git_header(header);
        let mut hunks = Vec::new();
        let mut is_binary = false;
        let mut renamed = false;
        i += 1;

        // Extended header lines up to the first hunk or the next file.
        while i < lines.len() {
            let current = lines[i];
            if current.starts_with("diff --git ") || current.starts_with("@@") {
                break;
            }

            if current.starts_with("Binary files ") || current.starts_with("GIT binary patch") {
                is_binary = true;
            } else if let Some(p) = current.strip_prefix("rename from ") {
                old_path = Some(unquote(p));
                renamed = true;
            } else if let Some(p) = current.strip_prefix("rename to ") {
                new_path = Some(unquote(p));
                renamed = true;
            } else if let Some(p) = current.strip_prefix("--- ") {
                if let Some(p) = clean_path(p, "a/") {
                    old_path = Some(p);
                }
            } else if let Some(p) = current.strip_prefix("+++ ")
                && let Some(p) = clean_path(p, "b/")
            {
                new_path = Some(p);
            }
            i += 1;
        }

        // Hunk headers, skipping their bodies.
        while i < lines.len() {
            let current = lines[i];
            if current.starts_with("diff --git ") {
                break;
            }
            if current.starts_with("@@")
                && let Some(hunk) = parse_hunk_header(current)
            {
                hunks.push(hunk);
            }
            i += 1;
        }

        if is_binary || (hunks.is_empty() && !renamed) {
            continue;
        }

        // An added file has no old side, a deleted one no new side.
        let (old_path, new_path) = match (old_path, new_path) {
            (Some(old), Some(new)) => (old, new),
            (Some(old), None) => (old.clone(), old),
            (None, Some(new)) => (new.clone(), new),
            (None, None) => continue,
        };

        files.push(FileDiff {
            old_path,
            new_path,
            hunks,
        });
    }

    files
}

/// Parse a single hunk header: `@@ -old_start[,old_span] +new_start[,new_span] @@ [context]`.
///
/// An omitted span defaults to 1. Returns `None` for a malformed header.
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let header = line.strip_prefix("@@ ")?;
    // Everything after the closing @@ is optional function context
    let header = &header[..header.find(" @@")?];
    let mut parts = header.split(' ');

    let (old_start, old_span) = parse_range(parts.next()?.strip_prefix('-')?)?;
    let (new_start, new_span) = parse_range(parts.next()?.strip_prefix('+')?)?;

    Some(HunkHeader {
        old_start,
        old_span,
        new_start,
        new_span,
    })
}

/// Parse a range like "start,count" or "start" (count defaults to 1).
fn parse_range(s: &str) -> Option<(i64, i64)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

/// Strip the `a/` or `b/` prefix, mapping `/dev/null` to `None`.
fn clean_path(path: &str, prefix: &str) -> Option<String> {
    // git appends a tab when the path contains spaces
    let path = path.trim_end_matches('\t');
    if path == "/dev/null" {
        return None;
    }
    let path = unquote(path);
    Some(path.strip_prefix(prefix).unwrap_or(&path).to_string())
}

/// Undo git's C-style path quoting: `"a/tab\there"` becomes `a/tab<TAB>here`.
///
/// Octal escapes are raw bytes, so multi-byte UTF-8 names come back intact.
/// Input without surrounding quotes is returned as is.
pub fn unquote(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };

    let mut out = Vec::with_capacity(inner.len());
    let mut bytes = inner.bytes().peekable();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'a') => out.push(0x07),
            Some(b'b') => out.push(0x08),
            Some(b't') => out.push(b'\t'),
            Some(b'n') => out.push(b'\n'),
            Some(b'v') => out.push(0x0b),
            Some(b'f') => out.push(0x0c),
            Some(b'r') => out.push(b'\r'),
            Some(d @ b'0'..=b'7') => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match bytes.peek() {
                        Some(&o @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(o - b'0');
                            bytes.next();
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            Some(other) => out.push(other),
            None => out.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Best-effort split of `a/<old> b/<new>` from a `diff --git` line.
///
/// Used for sections without `---`/`+++` lines, such as pure renames or mode
/// changes. Quoted names split cleanly; unquoted ones only when both paths
/// are the same length.
fn split_git_header(header: &str) -> (Option<String>, Option<String>) {
    if let Some((old, new)) = split_quoted_header(header) {
        return (
            old.strip_prefix("a/").map(str::to_string),
            new.strip_prefix("b/").map(str::to_string),
        );
    }

    let Some(rest) = header.strip_prefix("a/") else {
        return (None, None);
    };
    let bytes = rest.len();
    // "<old> b/<new>" with old == new has length 2n + 3
    if bytes >= 3 && (bytes - 3) % 2 == 0 {
        let n = (bytes - 3) / 2;
        if rest.is_char_boundary(n)
            && rest[n..].starts_with(" b/")
            && rest[..n] == rest[n + 3..]
        {
            let p = rest[..n].to_string();
            return (Some(p.clone()), Some(p));
        }
    }
    (None, None)
}

/// Split a header where at least one side is quoted, unquoting both.
fn split_quoted_header(header: &str) -> Option<(String, String)> {
    if header.starts_with('"') {
        let end = closing_quote(header)?;
        let new = header[end + 1..].strip_prefix(' ')?;
        return Some((unquote(&header[..=end]), unquote(new)));
    }
    // An unquoted name never contains a quote, so the last ` "` starts the new side.
    if header.ends_with('"') {
        let split = header.rfind(" \"")?;
        return Some((header[..split].to_string(), unquote(&header[split + 1..])));
    }
    None
}

/// Byte index of the quote closing the string opened at index 0.
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, b) in s.bytes().enumerate().skip(1) {
        match b {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => return Some(i),
            _ => {}
        }
    }
    None
}
