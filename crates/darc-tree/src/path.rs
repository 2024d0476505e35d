use crate::error::{TreeError, TreeResult};
use crate::record::modified_utf8_len;

/// Split a `/`-delimited path into segments.
///
/// Leading, trailing and repeated slashes are ignored, so `""` and `"/"`
/// both name the root. `.` and `..` are rejected: entries are addressed by
/// exact name only.
pub fn split_path(path: &str) -> TreeResult<Vec<&str>> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let reason = match segment {
                "." | ".." => Some("relative segments are not supported"),
                _ if modified_utf8_len(segment) > u16::MAX as usize => Some("segment too long"),
                _ => None,
            };
            match reason {
                Some(reason) => Err(TreeError::InvalidPath {
                    path: path.to_string(),
                    reason: reason.into(),
                }),
                None => Ok(segment),
            }
        })
        .collect()
}

/// Render segments as an absolute path.
pub fn join_path(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_forms() {
        assert!(split_path("").unwrap().is_empty());
        assert!(split_path("/").unwrap().is_empty());
        assert!(split_path("//").unwrap().is_empty());
    }

    #[test]
    fn ignores_redundant_slashes() {
        assert_eq!(split_path("/a//b/c/").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(split_path("a/b").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn rejects_relative_segments() {
        assert!(matches!(
            split_path("/a/../b"),
            Err(TreeError::InvalidPath { .. })
        ));
        assert!(split_path("./a").is_err());
    }

    #[test]
    fn dots_inside_names_are_fine() {
        assert_eq!(split_path("/.hidden/a..b").unwrap(), vec![".hidden", "a..b"]);
    }

    #[test]
    fn join() {
        assert_eq!(join_path(&[]), "/");
        assert_eq!(join_path(&["a", "b"]), "/a/b");
    }
}
