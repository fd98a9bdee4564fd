//! Wildcard pattern matching against the term dictionary.

use regex::Regex;

use crate::error::{QuarryError, Result};
use crate::index::store::FieldIndex;

/// A compiled wildcard pattern.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
/// - `\*` and `\?` match a literal `*` and `?`
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    pattern: String,
    /// Literal text before the first wildcard, used to narrow the term scan.
    prefix: String,
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut regex_pattern = String::with_capacity(pattern.len() + 8);
        regex_pattern.push('^');

        let mut prefix = String::new();
        let mut in_prefix = true;
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    in_prefix = false;
                    regex_pattern.push_str(".*");
                }
                '?' => {
                    in_prefix = false;
                    regex_pattern.push('.');
                }
                '\\' => {
                    let literal = chars.next().unwrap_or('\\');
                    if in_prefix {
                        prefix.push(literal);
                    }
                    regex_pattern.push_str(&regex::escape(literal.encode_utf8(&mut [0; 4])));
                }
                c => {
                    if in_prefix {
                        prefix.push(c);
                    }
                    regex_pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                }
            }
        }
        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|e| {
            QuarryError::invalid_query(format!("invalid wildcard pattern '{pattern}': {e}"))
        })?;

        Ok(WildcardPattern {
            pattern: pattern.to_string(),
            prefix,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Literal prefix; empty when the pattern starts with a wildcard.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, term: &str) -> bool {
        self.regex.is_match(term)
    }

    /// Dictionary ordinals of the terms in `field` matching this pattern, in
    /// term order, capped at `max_expansions`.
    pub fn expand(&self, field: &FieldIndex, max_expansions: usize) -> Vec<usize> {
        let mut ordinals = Vec::new();
        let mut truncated = false;
        field.dictionary().scan_prefix(&self.prefix, |term, ordinal| {
            if self.matches(term) {
                if ordinals.len() == max_expansions {
                    truncated = true;
                    return false;
                }
                ordinals.push(ordinal);
            }
            true
        });
        if truncated {
            log::warn!(
                "Wildcard '{}' matches more than {max_expansions} terms; extra terms ignored",
                self.pattern
            );
        }
        ordinals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::{Document, IndexBuilder};

    #[test]
    fn test_trailing_wildcard() {
        let pattern = WildcardPattern::new("hello*").unwrap();
        assert_eq!(pattern.prefix(), "hello");
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("helloworld"));
        assert!(!pattern.matches("hell"));
    }

    #[test]
    fn test_leading_wildcard_has_no_prefix() {
        let pattern = WildcardPattern::new("*oo").unwrap();
        assert_eq!(pattern.prefix(), "");
        assert!(pattern.matches("foo"));
        assert!(pattern.matches("oo"));
        assert!(!pattern.matches("foot"));
    }

    #[test]
    fn test_question_mark() {
        let pattern = WildcardPattern::new("h?llo").unwrap();
        assert_eq!(pattern.prefix(), "h");
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("hallo"));
        assert!(!pattern.matches("heello"));
    }

    #[test]
    fn test_escaped_and_regex_characters() {
        let pattern = WildcardPattern::new("a\\*b").unwrap();
        assert!(pattern.matches("a*b"));
        assert!(!pattern.matches("axb"));

        let pattern = WildcardPattern::new("c++*").unwrap();
        assert_eq!(pattern.prefix(), "c++");
        assert!(pattern.matches("c++17"));
        assert!(!pattern.matches("cc"));
    }

    #[test]
    fn test_expand_against_dictionary() {
        let mut builder = IndexBuilder::new();
        builder
            .add_document(Document::new().add_tokens("body", ["fox", "foo", "boo", "food"]))
            .unwrap();
        let store = builder.build().unwrap();
        let field = store.field("body").unwrap();

        let terms = |pattern: &str, max: usize| -> Vec<String> {
            let dict_terms = field.dictionary().terms();
            WildcardPattern::new(pattern)
                .unwrap()
                .expand(field, max)
                .into_iter()
                .map(|ordinal| dict_terms[ordinal].clone())
                .collect()
        };

        assert_eq!(terms("fo*", 10), vec!["foo", "food", "fox"]);
        assert_eq!(terms("*oo", 10), vec!["boo", "foo"]);
        assert_eq!(terms("fo*", 2), vec!["foo", "food"]);
        assert!(terms("z*", 10).is_empty());
    }
}
