//! Substring rewriting: the replacement primitive and the rewrite plan.
//!
//! The plan carries the search/replace pair as one value so a traversal can
//! never apply half of it. The stock pair retires the old home-directory
//! location; embedders construct their own pair through [`RewritePlan::new`].

use thiserror::Error;

/// Path fragment the stock plan searches for.
pub const DEFAULT_TARGET: &str = "Users\\from";

/// Path fragment the stock plan writes in its place.
pub const DEFAULT_REPLACEMENT: &str = "Users\\to";

/// Error from [`RewritePlan::new`] when the target is empty.
///
/// An empty target would match at every position of every value, so it is
/// rejected at construction rather than detected mid-walk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rewrite target must not be empty")]
pub struct EmptyTarget;

/// The search/replace pair threaded through a traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    target: String,
    replacement: String,
}

impl RewritePlan {
    /// Create a plan. The target must be non-empty; the replacement may be
    /// empty, which deletes the fragment.
    pub fn new(
        target: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<Self, EmptyTarget> {
        let target = target.into();
        if target.is_empty() {
            return Err(EmptyTarget);
        }
        Ok(Self {
            target,
            replacement: replacement.into(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Whether `text` contains the target at least once.
    pub fn applies_to(&self, text: &str) -> bool {
        text.contains(&self.target)
    }

    /// Replace every occurrence of the target in `text`.
    pub fn rewrite(&self, text: &str) -> String {
        replace_all(text, &self.target, &self.replacement)
    }
}

impl Default for RewritePlan {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            replacement: DEFAULT_REPLACEMENT.to_string(),
        }
    }
}

/// Replace every non-overlapping occurrence of `from` in `text` with `to`.
///
/// Scans left to right and resumes after each replacement, so occurrences
/// introduced by the replacement text itself are never re-matched. `from`
/// must be non-empty.
pub fn replace_all(text: &str, from: &str, to: &str) -> String {
    assert!(!from.is_empty(), "replacement target must not be empty");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find(from) {
        out.push_str(&rest[..at]);
        out.push_str(to);
        rest = &rest[at + from.len()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn replaces_single_occurrence() {
        assert_eq!(
            replace_all("C:\\Users\\from\\Desktop", "Users\\from", "Users\\to"),
            "C:\\Users\\to\\Desktop"
        );
    }

    #[test]
    fn replaces_every_occurrence() {
        assert_eq!(
            replace_all(
                "C:\\Users\\from\\a;D:\\Users\\from\\b",
                "Users\\from",
                "Users\\to"
            ),
            "C:\\Users\\to\\a;D:\\Users\\to\\b"
        );
    }

    #[test]
    fn leaves_text_without_target_untouched() {
        let text = "C:\\ProgramData\\vendor\\cache";
        assert_eq!(replace_all(text, "Users\\from", "Users\\to"), text);
    }

    #[test]
    fn empty_text_stays_empty() {
        assert_eq!(replace_all("", "Users\\from", "Users\\to"), "");
    }

    #[test]
    fn does_not_rematch_replacement_output() {
        // "aa" -> "a" on "aaaa" must halve, not collapse to a single "a".
        assert_eq!(replace_all("aaaa", "aa", "a"), "aa");
        // The scan resumes after the replacement, so the trailing "a" of
        // "aaa" cannot pair with it to form a second match.
        assert_eq!(replace_all("aaa", "aa", "b"), "ba");
        // Replacement containing the target is emitted once, untouched.
        assert_eq!(replace_all("x", "x", "xx"), "xx");
    }

    #[test]
    fn adjacent_occurrences_all_replaced() {
        assert_eq!(replace_all("ababab", "ab", "c"), "ccc");
    }

    #[test]
    fn empty_replacement_deletes_target() {
        assert_eq!(replace_all("a-b-c", "-", ""), "abc");
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn empty_target_panics() {
        replace_all("anything", "", "x");
    }

    #[test]
    fn plan_rejects_empty_target() {
        assert_eq!(RewritePlan::new("", "x"), Err(EmptyTarget));
    }

    #[test]
    fn plan_accepts_empty_replacement() {
        let plan = RewritePlan::new("Users\\from", "").unwrap();
        assert_eq!(plan.rewrite("C:\\Users\\from\\x"), "C:\\\\x");
    }

    #[test]
    fn default_plan_uses_stock_pair() {
        let plan = RewritePlan::default();
        assert_eq!(plan.target(), "Users\\from");
        assert_eq!(plan.replacement(), "Users\\to");
        assert!(plan.applies_to("C:\\Users\\from\\Documents"));
        assert!(!plan.applies_to("C:\\Users\\other\\Documents"));
    }

    proptest! {
        #[test]
        fn output_never_contains_target_when_replacement_is_free_of_it(
            text in "[a-c\\\\]{0,64}"
        ) {
            let replaced = replace_all(&text, "ab", "zz");
            prop_assert!(!replaced.contains("ab"));
        }

        #[test]
        fn identity_when_target_absent(text in "[d-z]{0,64}") {
            prop_assert_eq!(replace_all(&text, "ab", "zz"), text.clone());
        }

        #[test]
        fn occurrence_count_matches_length_delta(n in 0usize..8, pad in "[x-z]{0,8}") {
            let mut text = String::new();
            for _ in 0..n {
                text.push_str(&pad);
                text.push_str("ab");
            }
            text.push_str(&pad);
            let replaced = replace_all(&text, "ab", "longer");
            prop_assert_eq!(replaced.len(), text.len() + n * ("longer".len() - "ab".len()));
        }
    }
}
