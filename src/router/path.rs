use percent_encoding::percent_decode_str;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must start with '/'")]
    NotAbsolute,
    #[error("path is not valid UTF-8 once decoded")]
    InvalidEncoding,
    #[error("path contains a forbidden character")]
    ForbiddenCharacter,
    #[error("path escapes the root")]
    Traversal,
}

/// Normalizes a raw request path for routing and file lookup.
///
/// The path is percent-decoded, empty and `.` segments are dropped and `..`
/// pops the previous segment. A `..` with nothing left to pop would climb
/// above the root and is rejected. A trailing slash is kept.
///
/// ```
/// # use lantern::router::normalize_path;
/// assert_eq!(normalize_path("/a//b/./c/../d").unwrap(), "/a/b/d");
/// assert!(normalize_path("/a/../../etc/passwd").is_err());
/// ```
pub fn normalize_path(raw: &str) -> Result<String, PathError> {
    if raw == "*" {
        return Ok(raw.to_string());
    }
    if !raw.starts_with('/') {
        return Err(PathError::NotAbsolute);
    }
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| PathError::InvalidEncoding)?;
    if decoded.contains(|c: char| c == '\0' || c == '\\') {
        return Err(PathError::ForbiddenCharacter);
    }

    let mut stack: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop().ok_or(PathError::Traversal)?;
            }
            other => stack.push(other),
        }
    }

    let mut normalized = String::with_capacity(decoded.len());
    for segment in &stack {
        normalized.push('/');
        normalized.push_str(segment);
    }
    let trailing = decoded.ends_with('/') || decoded.ends_with("/.") || decoded.ends_with("/..");
    if normalized.is_empty() || trailing {
        normalized.push('/');
    }
    Ok(normalized)
}
