//! Tag sets and label matching.

use std::collections::BTreeMap;

/// Key/value labels attached to a disk. Keys are unique.
pub type TagSet = BTreeMap<String, String>;

/// Build a tag set from string pairs.
pub fn tag_set<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> TagSet
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Whether `tags` carries every entry of `filter`, compared exactly.
///
/// An empty filter matches everything.
pub fn matches_all(tags: &TagSet, filter: &TagSet) -> bool {
    filter
        .iter()
        .all(|(key, value)| tags.get(key).is_some_and(|v| v == value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_all_requires_every_filter_entry() {
        let tags = tag_set([("source", "openstorage-test"), ("foo", "bar")]);

        assert!(matches_all(&tags, &tag_set([("foo", "bar")])));
        assert!(matches_all(&tags, &TagSet::new()));
        assert!(!matches_all(&tags, &tag_set([("foo", "bar"), ("missing", "x")])));
        assert!(!matches_all(&tags, &tag_set([("foo", "BAR")])));
    }

    #[test]
    fn matching_is_case_sensitive_on_keys() {
        let tags = tag_set([("Test", "UPPER_CASE")]);
        assert!(!matches_all(&tags, &tag_set([("test", "UPPER_CASE")])));
    }
}
