//! Minimal `.properties` reading and in-place rewriting.
//!
//! Only single-line `key=value` / `key: value` entries are understood;
//! comments, blank lines and formatting are preserved on rewrite.

use std::collections::{BTreeMap, BTreeSet};

/// Byte offsets of an entry: key end, value start.
fn split_entry(line: &str) -> Option<(usize, usize)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
        return None;
    }
    let sep = line.find(['=', ':'])?;
    let after = &line[sep + 1..];
    let value_start = sep + 1 + (after.len() - after.trim_start().len());
    Some((sep, value_start))
}

/// Every entry as `(key, value)`, in file order.
pub fn parse(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let (sep, value_start) = split_entry(line)?;
            Some((
                line[..sep].trim().to_string(),
                line[value_start..].trim_end().to_string(),
            ))
        })
        .collect()
}

pub fn get(content: &str, key: &str) -> Option<String> {
    parse(content)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

/// Replace the values of `updates` keys, returning the new content and the
/// keys that were found.
pub fn rewrite(content: &str, updates: &BTreeMap<String, String>) -> (String, BTreeSet<String>) {
    let mut found = BTreeSet::new();
    let mut lines = Vec::new();
    for line in content.lines() {
        let replaced = split_entry(line).and_then(|(sep, value_start)| {
            let key = line[..sep].trim();
            let value = updates.get(key)?;
            found.insert(key.to_string());
            Some(format!("{}{value}", &line[..value_start]))
        });
        lines.push(replaced.unwrap_or_else(|| line.to_string()));
    }

    let mut out = lines.join("\n");
    if content.ends_with('\n') {
        out.push('\n');
    }
    (out, found)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRADLE: &str = "# project\nname=spring-cloud-contract\nversion = 3.1.0-SNAPSHOT\n\n\
                          verifierVersion: 3.1.0-SNAPSHOT\n";

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let entries = parse(GRADLE);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], ("version".to_string(), "3.1.0-SNAPSHOT".to_string()));
        assert_eq!(get(GRADLE, "verifierVersion").as_deref(), Some("3.1.0-SNAPSHOT"));
        assert!(get(GRADLE, "project").is_none());
    }

    #[test]
    fn test_rewrite_preserves_layout() {
        let mut updates = BTreeMap::new();
        updates.insert("version".to_string(), "3.1.0".to_string());
        updates.insert("absent".to_string(), "x".to_string());

        let (out, found) = rewrite(GRADLE, &updates);

        assert_eq!(
            out,
            "# project\nname=spring-cloud-contract\nversion = 3.1.0\n\n\
             verifierVersion: 3.1.0-SNAPSHOT\n"
        );
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["version"]);
    }
}
