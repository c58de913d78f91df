pub(crate) fn basename(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn join_remote(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if base.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

/// NLST replies differ between servers: some echo the queried directory as a
/// prefix, some return bare names. Entries are always handed out as full paths.
pub(crate) fn normalize_entry(dir: &str, entry: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let entry = entry.trim_end_matches('/');
    if dir.is_empty() || entry == dir || entry.starts_with(&format!("{}/", dir)) {
        return entry.to_string();
    }
    if entry.contains('/') {
        // Absolute or otherwise qualified reply; trust it.
        return entry.trim_start_matches("./").to_string();
    }
    join_remote(dir, entry)
}

/// Splits a slash-separated path into its non-empty segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

pub(crate) fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
