use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single suffix rewrite, e.g. `.md` -> `.th.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRule {
    pub from: String,
    pub to: String,
}

/// Ordered rename-rule table.
///
/// The first rule whose suffix matches wins, so the table keeps the order in
/// which the rules were written in the configuration file. Mapping operates
/// on root-relative paths using `/` as separator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameRules(Vec<RenameRule>);

impl RenameRules {
    pub fn new(rules: Vec<RenameRule>) -> Self {
        Self(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenameRule> {
        self.0.iter()
    }

    /// Map a source-relative path to its target-relative counterpart.
    pub fn apply(&self, rel: &str) -> String {
        for rule in &self.0 {
            if let Some(stem) = rel.strip_suffix(rule.from.as_str()) {
                return format!("{stem}{}", rule.to);
            }
        }
        rel.to_string()
    }

    /// Map a target-relative path back to the source-relative path it came from.
    pub fn reverse(&self, rel: &str) -> String {
        for rule in &self.0 {
            if let Some(stem) = rel.strip_suffix(rule.to.as_str()) {
                return format!("{stem}{}", rule.from);
            }
        }
        rel.to_string()
    }

    /// Pairs of rules whose source suffixes overlap (one is a suffix of the
    /// other). With overlapping rules the result depends on table order.
    pub fn overlapping(&self) -> Vec<(&RenameRule, &RenameRule)> {
        let mut pairs = Vec::new();
        for (i, a) in self.0.iter().enumerate() {
            for b in self.0.iter().skip(i + 1) {
                if a.from.ends_with(b.from.as_str()) || b.from.ends_with(a.from.as_str()) {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }
}

impl Serialize for RenameRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for rule in &self.0 {
            map.serialize_entry(&rule.from, &rule.to)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RenameRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = RenameRules;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of source suffix to target suffix")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut rules = Vec::new();
                while let Some((from, to)) = access.next_entry::<String, String>()? {
                    rules.push(RenameRule { from, to });
                }
                Ok(RenameRules(rules))
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}

/// Express `path` relative to `root` with `/` separators.
pub fn relative_string(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Join a `/`-separated relative path onto `root`.
pub fn join_relative(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

/// Resolve a relative path taken from an editable document, ensuring it
/// stays under `root`. Absolute paths and `..` components are rejected.
pub fn confine(root: &Path, rel: &str) -> Result<PathBuf, String> {
    let candidate = Path::new(rel);
    if rel.trim().is_empty() {
        return Err("empty path".to_string());
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(format!("path escapes root: {rel}")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("path must be relative to the root: {rel}"));
            }
        }
    }
    Ok(join_relative(root, rel))
}
