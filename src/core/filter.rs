//! 忽略规则 - 判断相对路径是否被排除

/// 单条忽略规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreRule {
    /// 完全相等，如 `notes/todo.txt`
    Exact(String),
    /// 后缀匹配，如 `*.tmp`（只支持开头一个 `*`）
    Suffix(String),
    /// 目录及其整个子树，如 `cache/`
    Subtree(String),
}

impl IgnoreRule {
    /// 解析一行规则文本，空行返回 None
    ///
    /// 结尾 `/` 表示子树，开头 `*` 表示后缀，其余按完全匹配处理。
    /// 其他位置的 `*` 当作普通字符。
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim().replace('\\', "/");
        if pattern.is_empty() {
            return None;
        }

        if let Some(dir) = pattern.strip_suffix('/') {
            let dir = dir.trim_matches('/');
            if dir.is_empty() {
                return None;
            }
            return Some(IgnoreRule::Subtree(dir.to_string()));
        }

        if let Some(suffix) = pattern.strip_prefix('*') {
            return Some(IgnoreRule::Suffix(suffix.to_string()));
        }

        Some(IgnoreRule::Exact(pattern))
    }

    /// 路径需已规范化为 `/` 分隔
    pub fn matches(&self, path: &str) -> bool {
        match self {
            IgnoreRule::Exact(exact) => path == exact,
            IgnoreRule::Suffix(suffix) => path.ends_with(suffix.as_str()),
            IgnoreRule::Subtree(dir) => {
                path == dir
                    || (path.starts_with(dir.as_str())
                        && path.as_bytes().get(dir.len()) == Some(&b'/'))
            }
        }
    }
}

/// 有序的规则列表，任意一条命中即忽略
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn new(rules: Vec<IgnoreRule>) -> Self {
        Self { rules }
    }

    /// 从规则文本解析，跳过空行
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = patterns
            .into_iter()
            .filter_map(|p| IgnoreRule::parse(p.as_ref()))
            .collect();
        Self { rules }
    }

    pub fn should_ignore(&self, path: &str) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        let normalized = path.replace('\\', "/");
        self.rules.iter().any(|rule| rule.matches(&normalized))
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rule_kinds() {
        assert_eq!(
            IgnoreRule::parse("*.tmp"),
            Some(IgnoreRule::Suffix(".tmp".into()))
        );
        assert_eq!(
            IgnoreRule::parse("cache/"),
            Some(IgnoreRule::Subtree("cache".into()))
        );
        assert_eq!(
            IgnoreRule::parse("build\\out\\"),
            Some(IgnoreRule::Subtree("build/out".into()))
        );
        assert_eq!(
            IgnoreRule::parse("a/b.txt"),
            Some(IgnoreRule::Exact("a/b.txt".into()))
        );
        assert_eq!(IgnoreRule::parse("   "), None);
        assert_eq!(IgnoreRule::parse("/"), None);
    }

    #[test]
    fn suffix_rule() {
        let rules = IgnoreRules::from_patterns(["*.tmp"]);
        assert!(rules.should_ignore("x.tmp"));
        assert!(rules.should_ignore("deep/dir/x.tmp"));
        assert!(!rules.should_ignore("x.tmpl"));
    }

    #[test]
    fn subtree_rule() {
        let rules = IgnoreRules::from_patterns(["cache/"]);
        assert!(rules.should_ignore("cache"));
        assert!(rules.should_ignore("cache/a.bin"));
        assert!(rules.should_ignore("cache\\nested\\b.bin"));
        assert!(!rules.should_ignore("cachefile"));
        assert!(!rules.should_ignore("other/cache"));
    }

    #[test]
    fn exact_rule_is_case_sensitive() {
        let rules = IgnoreRules::from_patterns(["Thumbs.db"]);
        assert!(rules.should_ignore("Thumbs.db"));
        assert!(!rules.should_ignore("thumbs.db"));
        assert!(!rules.should_ignore("sub/Thumbs.db"));
    }

    #[test]
    fn inner_star_is_literal() {
        let rules = IgnoreRules::from_patterns(["data*.csv"]);
        assert!(!rules.should_ignore("data1.csv"));
        assert!(rules.should_ignore("data*.csv"));
    }

    #[test]
    fn any_rule_matches() {
        let rules = IgnoreRules::from_patterns(["", "*.log", "tmp/", "keep.txt"]);
        assert_eq!(rules.len(), 3);
        assert!(rules.should_ignore("app.log"));
        assert!(rules.should_ignore("tmp/x"));
        assert!(rules.should_ignore("keep.txt"));
        assert!(!rules.should_ignore("main.rs"));
    }
}
