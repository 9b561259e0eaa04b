//! Path helpers for staging arbitrary image files.

use std::path::{Component, Path, PathBuf};

/// Directory shared by a set of files, plus each file relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonParent {
    pub parent: PathBuf,
    /// Relative paths in input order, `/`-separated.
    pub relative_paths: Vec<String>,
}

/// Finds the deepest directory containing every path.
///
/// Relative inputs are resolved against the current directory. When the
/// files share nothing, the file system root is returned.
pub fn find_common_parent_path(paths: &[PathBuf]) -> std::io::Result<CommonParent> {
    let cwd = std::env::current_dir()?;
    let root = root_of(&cwd);
    if paths.is_empty() {
        return Ok(CommonParent {
            parent: root,
            relative_paths: Vec::new(),
        });
    }

    let absolute: Vec<PathBuf> = paths.iter().map(|p| normalize(&cwd.join(p))).collect();
    let dirs: Vec<Vec<Component<'_>>> = absolute
        .iter()
        .map(|p| p.parent().map(|d| d.components().collect()).unwrap_or_default())
        .collect();

    let mut shared = 0;
    if let Some(first) = dirs.first() {
        'outer: for (i, component) in first.iter().enumerate() {
            for other in &dirs[1..] {
                if other.get(i) != Some(component) {
                    break 'outer;
                }
            }
            shared = i + 1;
        }
    }

    let parent: PathBuf = match dirs.first() {
        Some(first) if shared > 0 => first[..shared].iter().collect(),
        _ => root,
    };

    let relative_paths = absolute
        .iter()
        .map(|p| {
            let relative = p.strip_prefix(&parent).unwrap_or(p);
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();

    Ok(CommonParent {
        parent,
        relative_paths,
    })
}

fn root_of(path: &Path) -> PathBuf {
    path.components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect()
}

/// Removes `.` and resolves `..` lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn empty_input_yields_root() {
        let result = find_common_parent_path(&[]).unwrap();
        assert_eq!(result.parent, PathBuf::from("/"));
        assert!(result.relative_paths.is_empty());
    }

    #[test]
    fn files_in_one_directory() {
        let result =
            find_common_parent_path(&paths(&["/data/frames/a.jpg", "/data/frames/b.jpg"])).unwrap();
        assert_eq!(result.parent, PathBuf::from("/data/frames"));
        assert_eq!(result.relative_paths, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn nested_directories_keep_input_order() {
        let result = find_common_parent_path(&paths(&[
            "/data/x/2.png",
            "/data/y/z/1.png",
            "/data/0.png",
        ]))
        .unwrap();
        assert_eq!(result.parent, PathBuf::from("/data"));
        assert_eq!(result.relative_paths, vec!["x/2.png", "y/z/1.png", "0.png"]);
    }

    #[test]
    fn nothing_shared_falls_back_to_root() {
        let result = find_common_parent_path(&paths(&["/a/1.jpg", "/b/2.jpg"])).unwrap();
        assert_eq!(result.parent, PathBuf::from("/"));
        assert_eq!(result.relative_paths, vec!["a/1.jpg", "b/2.jpg"]);
    }

    #[test]
    fn relative_inputs_resolve_against_current_dir() {
        let cwd = std::env::current_dir().unwrap();
        let result = find_common_parent_path(&paths(&["imgs/a.jpg", "./imgs/b.jpg"])).unwrap();
        assert_eq!(result.parent, cwd.join("imgs"));
        assert_eq!(result.relative_paths, vec!["a.jpg", "b.jpg"]);
    }
}
