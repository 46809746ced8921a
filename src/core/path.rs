//! 相对路径 - 源目录与副本目录之间的连接键

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// 相对于树根的路径，内部统一使用 `/` 作为分隔符
///
/// 规范形式：不以 `/` 开头或结尾，不含空段和 `.` 段。
/// 相等和排序都按各段原始字节（`/` 连接）逐字节比较，祖先路径是后代路径的严格前缀，
/// 因此升序遍历时祖先总在后代之前。文件名不是合法 UTF-8 时原始字节保留在
/// `native` 中，IO 始终通过它进行。
#[derive(Debug, Clone)]
pub struct RelativePath {
    key: Vec<u8>,
    /// 可读形式，非 UTF-8 字节替换为 U+FFFD，用于日志和忽略规则
    display: String,
    native: PathBuf,
}

impl RelativePath {
    fn from_segments<'a>(segments: impl IntoIterator<Item = &'a OsStr>) -> Self {
        let mut key = Vec::new();
        let mut display = String::new();
        let mut native = PathBuf::new();

        for segment in segments {
            if !key.is_empty() {
                key.push(b'/');
                display.push('/');
            }
            key.extend_from_slice(segment.as_encoded_bytes());
            display.push_str(&segment.to_string_lossy());
            native.push(segment);
        }

        Self {
            key,
            display,
            native,
        }
    }

    /// 从任意分隔符风格的字符串创建
    pub fn new(path: impl AsRef<str>) -> Self {
        Self::from_segments(
            path.as_ref()
                .split(['/', '\\'])
                .filter(|segment| !segment.is_empty() && *segment != ".")
                .map(OsStr::new),
        )
    }

    /// 从 `strip_prefix` 得到的平台路径创建，文件名原样保留
    pub fn from_relative(path: &Path) -> Self {
        Self::from_segments(path.components().filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// 文件名是否全部为合法 UTF-8
    pub fn is_utf8(&self) -> bool {
        self.display.as_bytes() == self.key.as_slice()
    }

    /// 空路径表示树根本身
    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }

    /// 转换为平台路径（仅在 IO 边界使用）
    pub fn to_native(&self) -> PathBuf {
        self.native.clone()
    }

    /// 拼接到指定根目录下
    pub fn join_to(&self, root: &Path) -> PathBuf {
        if self.is_root() {
            root.to_path_buf()
        } else {
            root.join(&self.native)
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let parent = self.native.parent().unwrap_or_else(|| Path::new(""));
        Some(Self::from_relative(parent))
    }

    /// 是否等于 `ancestor` 或位于其子树中
    pub fn is_within(&self, ancestor: &RelativePath) -> bool {
        if ancestor.is_root() {
            return true;
        }
        self.key == ancestor.key
            || (self.key.starts_with(&ancestor.key)
                && self.key.get(ancestor.key.len()) == Some(&b'/'))
    }
}

impl PartialEq for RelativePath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RelativePath {}

impl PartialOrd for RelativePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelativePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for RelativePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl From<&str> for RelativePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators() {
        assert_eq!(RelativePath::new("a\\b\\c.txt").as_str(), "a/b/c.txt");
        assert_eq!(RelativePath::new("/a//b/./c/").as_str(), "a/b/c");
        assert_eq!(RelativePath::new("a\\b"), RelativePath::new("a/b"));
    }

    #[test]
    fn from_platform_path() {
        let p = Path::new("sub").join("deep").join("file.txt");
        assert_eq!(RelativePath::from_relative(&p).as_str(), "sub/deep/file.txt");
    }

    #[test]
    fn ancestors_sort_before_descendants() {
        let mut paths = vec![
            RelativePath::new("a/x"),
            RelativePath::new("a-b"),
            RelativePath::new("a"),
            RelativePath::new("a/x/y"),
        ];
        paths.sort();
        let pos = |s: &str| paths.iter().position(|p| p.as_str() == s).unwrap();
        assert!(pos("a") < pos("a/x"));
        assert!(pos("a/x") < pos("a/x/y"));
    }

    #[test]
    fn parent_and_within() {
        let p = RelativePath::new("a/b/c");
        assert_eq!(p.parent(), Some(RelativePath::new("a/b")));
        assert_eq!(RelativePath::new("a").parent(), Some(RelativePath::new("")));
        assert!(p.is_within(&RelativePath::new("a")));
        assert!(p.is_within(&RelativePath::new("a/b/c")));
        assert!(!RelativePath::new("ab/c").is_within(&RelativePath::new("a")));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_keep_their_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let a = Path::new("dir").join(OsStr::from_bytes(b"bad\xff.txt"));
        let b = Path::new("dir").join(OsStr::from_bytes(b"bad\xfe.txt"));
        let ra = RelativePath::from_relative(&a);
        let rb = RelativePath::from_relative(&b);

        // 可读形式相同，但仍是两个不同的路径
        assert_eq!(ra.as_str(), rb.as_str());
        assert_ne!(ra, rb);
        assert!(!ra.is_utf8());
        assert_eq!(ra.join_to(Path::new("/root")), Path::new("/root").join(&a));
        assert_eq!(ra.parent(), Some(RelativePath::new("dir")));
        assert!(ra.is_within(&RelativePath::new("dir")));
    }

    #[test]
    fn join_to_root() {
        let root = Path::new("/tmp/replica");
        assert_eq!(
            RelativePath::new("sub/c.txt").join_to(root),
            root.join("sub").join("c.txt")
        );
        assert_eq!(RelativePath::new("").join_to(root), root.to_path_buf());
    }
}
