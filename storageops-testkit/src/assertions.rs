//! Assertions applied to operation results.
//!
//! Each check is a named predicate that knows nothing about the driver it is
//! applied to. The runner attaches stage and operation context on failure.

use storageops_core::TagSet;
use thiserror::Error;

/// A failed check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{check}: {message}")]
pub struct AssertionFailure {
    /// Name of the predicate that failed.
    pub check: &'static str,
    /// What was expected and what was observed.
    pub message: String,
}

impl AssertionFailure {
    fn new(check: &'static str, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

pub type AssertResult = Result<(), AssertionFailure>;

/// A string result must not be empty.
pub fn not_empty(what: &str, value: &str) -> AssertResult {
    if value.is_empty() {
        return Err(AssertionFailure::new("not_empty", format!("got empty {}", what)));
    }
    Ok(())
}

/// A collection result must have at least one element.
pub fn collection_not_empty(what: &str, len: usize) -> AssertResult {
    if len == 0 {
        return Err(AssertionFailure::new(
            "collection_not_empty",
            format!("received empty {}", what),
        ));
    }
    Ok(())
}

/// A collection result must have exactly `expected` elements.
pub fn exact_len(what: &str, expected: usize, actual: usize) -> AssertResult {
    if expected != actual {
        return Err(AssertionFailure::new(
            "exact_len",
            format!("{}: expected {} entries, found {}", what, expected, actual),
        ));
    }
    Ok(())
}

/// A query with a filter that matches nothing must come back empty.
pub fn no_matches(what: &str, count: usize) -> AssertResult {
    if count != 0 {
        return Err(AssertionFailure::new(
            "no_matches",
            format!("{}: expected no results, found {}", what, count),
        ));
    }
    Ok(())
}

/// Tags read back must equal the tags applied, key for key.
pub fn tags_equal(expected: &TagSet, actual: &TagSet) -> AssertResult {
    let mut problems = Vec::new();

    for (key, value) in expected {
        match actual.get(key) {
            None => problems.push(format!("missing {:?}", key)),
            Some(v) if v != value => {
                problems.push(format!("{:?}: expected {:?}, found {:?}", key, value, v))
            }
            Some(_) => {}
        }
    }
    for key in actual.keys().filter(|k| !expected.contains_key(*k)) {
        problems.push(format!("unexpected {:?}", key));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AssertionFailure::new("tags_equal", problems.join(", ")))
    }
}

/// A device path reported later must match the one reported by attach.
pub fn same_path(what: &str, expected: &str, actual: &str) -> AssertResult {
    if expected != actual {
        return Err(AssertionFailure::new(
            "same_path",
            format!("{}: expected {}, found {}", what, expected, actual),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storageops_core::tag_set;

    #[test]
    fn presence_checks() {
        assert!(not_empty("disk ID", "vol-1").is_ok());
        let err = not_empty("disk ID", "").unwrap_err();
        assert_eq!(err.check, "not_empty");
        assert_eq!(err.to_string(), "not_empty: got empty disk ID");

        assert!(collection_not_empty("device mappings", 1).is_ok());
        assert!(collection_not_empty("device mappings", 0).is_err());
    }

    #[test]
    fn cardinality_checks() {
        assert!(exact_len("tags", 3, 3).is_ok());
        let err = exact_len("tags", 3, 2).unwrap_err();
        assert!(err.message.contains("expected 3 entries, found 2"));

        assert!(no_matches("enumerate", 0).is_ok());
        assert!(no_matches("enumerate", 1).is_err());
    }

    #[test]
    fn tags_equal_reports_each_difference() {
        let expected = tag_set([("Test", "UPPER_CASE"), ("foo", "bar")]);
        assert!(tags_equal(&expected, &expected.clone()).is_ok());

        let normalized = tag_set([("test", "upper_case"), ("foo", "baz")]);
        let err = tags_equal(&expected, &normalized).unwrap_err();
        assert!(err.message.contains("missing \"Test\""));
        assert!(err.message.contains("\"foo\": expected \"bar\", found \"baz\""));
        assert!(err.message.contains("unexpected \"test\""));
    }

    #[test]
    fn same_path_check() {
        assert!(same_path("device path", "/dev/xvdb", "/dev/xvdb").is_ok());
        assert!(same_path("device path", "/dev/xvdb", "/dev/xvdc").is_err());
    }
}
