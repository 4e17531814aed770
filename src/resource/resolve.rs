use super::ResourceFamily;
use std::path::{Component, Path, PathBuf};

/// Outcome of resolving a logical path to a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    File(PathBuf),
    /// A directory without the family's index file
    Forbidden,
    NotFound,
}

impl Resolution {
    /// Status code for the unresolved outcomes.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Resolution::File(_) => None,
            Resolution::Forbidden => Some(403),
            Resolution::NotFound => Some(404),
        }
    }
}

/// Join a `/`-separated logical path onto `root`, refusing anything that
/// would climb out of it.
#[must_use]
pub fn map_path(root: &Path, logical: &str) -> Option<PathBuf> {
    let mut pb = root.to_path_buf();
    for comp in Path::new(logical.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(s) => pb.push(s),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(pb)
}

/// Resolve `path` to a concrete file of `family`.
///
/// - a directory resolves to its index file, or [`Resolution::Forbidden`]
///   when there is none
/// - a missing path is retried with the family extension appended
/// - anything else is [`Resolution::NotFound`]
#[must_use]
pub fn resolve(path: &Path, family: &ResourceFamily) -> Resolution {
    if path.is_dir() {
        let index = path.join(family.index_file());
        return if index.is_file() {
            Resolution::File(index)
        } else {
            Resolution::Forbidden
        };
    }
    if path.is_file() {
        return Resolution::File(path.to_path_buf());
    }
    let mut with_ext = path.as_os_str().to_owned();
    with_ext.push(".");
    with_ext.push(family.extension);
    let with_ext = PathBuf::from(with_ext);
    if with_ext.is_file() {
        Resolution::File(with_ext)
    } else {
        Resolution::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FAMILY: ResourceFamily = ResourceFamily {
        name: "template",
        extension: "jst",
        index: "index",
        mime: "text/html",
    };

    #[test]
    fn test_map_path_prevents_traversal() {
        let root = Path::new("/srv/views");
        assert!(map_path(root, "../etc/passwd").is_none());
        assert!(map_path(root, "a/../../b").is_none());
        assert_eq!(
            map_path(root, "/blog/./post"),
            Some(PathBuf::from("/srv/views/blog/post"))
        );
        assert_eq!(map_path(root, ""), Some(PathBuf::from("/srv/views")));
    }

    #[test]
    fn test_resolve_cases() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("with_index")).unwrap();
        fs::write(root.join("with_index/index.jst"), "x").unwrap();
        fs::create_dir(root.join("bare")).unwrap();
        fs::write(root.join("page.jst"), "x").unwrap();
        fs::write(root.join("plain.txt"), "x").unwrap();

        assert_eq!(
            resolve(&root.join("with_index"), &FAMILY),
            Resolution::File(root.join("with_index/index.jst"))
        );
        assert_eq!(resolve(&root.join("bare"), &FAMILY), Resolution::Forbidden);
        assert_eq!(
            resolve(&root.join("page"), &FAMILY),
            Resolution::File(root.join("page.jst"))
        );
        assert_eq!(
            resolve(&root.join("plain.txt"), &FAMILY),
            Resolution::File(root.join("plain.txt"))
        );
        assert_eq!(resolve(&root.join("missing"), &FAMILY), Resolution::NotFound);
        assert_eq!(Resolution::NotFound.status(), Some(404));
        assert_eq!(Resolution::Forbidden.status(), Some(403));
    }
}
