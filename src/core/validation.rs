//! Virtual path normalization
//!
//! Payload paths are relative to the payload root and use `/` as separator.
//! Link targets stored in the payload are either absolute (rooted at the
//! payload root) or relative to the directory holding the link. This module
//! turns them into the canonical form the catalog lookup expects.

/// Directory part of a virtual path (empty for top-level entries)
///
/// # Examples
///
/// ```
/// use appimage::core::validation::parent_of;
///
/// assert_eq!(parent_of("usr/bin/app"), "usr/bin");
/// assert_eq!(parent_of("AppRun"), "");
/// assert_eq!(parent_of("usr/share/"), "usr");
/// ```
pub fn parent_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Resolve `target` (the link target of the entry at `link_path`)
///
/// - absolute targets are taken from the payload root
/// - relative targets are taken from the link's own directory
/// - `.` components are dropped, `..` pops a component but never climbs
///   above the payload root
///
/// # Examples
///
/// ```
/// use appimage::core::validation::resolve_link_target;
///
/// assert_eq!(resolve_link_target("AppRun", "usr/bin/app"), "usr/bin/app");
/// assert_eq!(resolve_link_target("usr/bin/app", "../lib/app"), "usr/lib/app");
/// assert_eq!(resolve_link_target("usr/bin/app", "/opt/app"), "opt/app");
/// assert_eq!(resolve_link_target("a/b", "../../../../c"), "c");
/// ```
pub fn resolve_link_target(link_path: &str, target: &str) -> String {
    let base = if target.starts_with('/') {
        ""
    } else {
        parent_of(link_path)
    };

    let mut components: Vec<&str> = Vec::new();
    for component in base.split('/').chain(target.split('/')) {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }

    components.join("/")
}

/// Whether `path` names an entry at the top level of the payload
pub fn is_top_level(path: &str) -> bool {
    !path.contains('/')
}

/// Make `input` safe to embed in a file name
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`; the result is never
/// empty, `.` or `..`.
///
/// # Examples
///
/// ```
/// use appimage::core::validation::sanitize_for_path;
///
/// assert_eq!(sanitize_for_path("usr/share/icons/demo.png"), "usr_share_icons_demo.png");
/// assert_eq!(sanitize_for_path(".."), "__");
/// ```
pub fn sanitize_for_path(input: &str) -> String {
    let sanitized: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match sanitized.as_str() {
        "" => "_".to_string(),
        "." | ".." => "_".repeat(sanitized.len()),
        _ => sanitized,
    }
}
