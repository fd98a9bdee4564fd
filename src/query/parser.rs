//! Query string parser.
//!
//! Turns a query string into a [`QueryNode`] tree. The grammar lives in
//! `query.pest`; this module adds the checks pest cannot express well
//! (quote balance with a useful offset, NOT placement, empty phrases).

use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::{QuarryError, Result};
use crate::query::node::QueryNode;

/// Deepest parenthesis nesting accepted in a query string.
pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Parser)]
#[grammar = "query/query.pest"]
struct QueryStringParser;

/// Parser for the query string syntax.
///
/// # Supported Syntax
///
/// - `red fox`: implicit AND
/// - `red AND fox`, `red OR fox`, `red NOT dog`
/// - `(red OR blue) fox`: grouping
/// - `"red fox"`: phrase
/// - `fo*`, `*ox`, `f?x`: wildcards
///
/// # Example
///
/// ```
/// use quarry::query::{QueryNode, QueryParser};
///
/// let parser = QueryParser::new();
/// let query = parser.parse("body", "red AND fox").unwrap();
/// assert_eq!(query, QueryNode::and(vec![QueryNode::term("red"), QueryNode::term("fox")]));
/// ```
#[derive(Debug, Clone)]
pub struct QueryParser {
    allow_leading_wildcard: bool,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParser {
    pub fn new() -> Self {
        QueryParser {
            allow_leading_wildcard: true,
        }
    }

    /// Whether patterns like `*ox` are accepted. They force a full scan of the
    /// field's term dictionary.
    pub fn with_allow_leading_wildcard(mut self, allow: bool) -> Self {
        self.allow_leading_wildcard = allow;
        self
    }

    /// Parse `query` for `field`.
    pub fn parse(&self, field: &str, query: &str) -> Result<QueryNode> {
        if query.trim().is_empty() {
            return Err(QuarryError::syntax("empty query", query, 0));
        }
        check_balance(query)?;

        let mut pairs = QueryStringParser::parse(Rule::query, query)
            .map_err(|e| pest_error(query, &e))?;
        let or_expr = pairs
            .next()
            .and_then(|q| q.into_inner().find(|p| p.as_rule() == Rule::or_expr))
            .ok_or_else(|| QuarryError::syntax("empty query", query, 0))?;

        let node = self.build_or(query, or_expr)?;
        if node.is_not() {
            let offset = query.len() - query.trim_start().len();
            return Err(QuarryError::syntax(
                "NOT must be combined with a positive clause",
                query,
                offset,
            ));
        }

        log::debug!("Parsed query for field '{field}': {node}");
        Ok(node)
    }

    fn build_or(&self, query: &str, pair: Pair<'_, Rule>) -> Result<QueryNode> {
        let start = pair.as_span().start();
        let children = pair
            .into_inner()
            .filter(|p| p.as_rule() == Rule::and_expr)
            .map(|p| self.build_and(query, p))
            .collect::<Result<Vec<_>>>()?;
        group(query, start, children, QueryNode::or)
    }

    fn build_and(&self, query: &str, pair: Pair<'_, Rule>) -> Result<QueryNode> {
        let start = pair.as_span().start();
        let children = pair
            .into_inner()
            .filter(|p| p.as_rule() == Rule::clause)
            .map(|p| self.build_clause(query, p))
            .collect::<Result<Vec<_>>>()?;
        group(query, start, children, QueryNode::and)
    }

    fn build_clause(&self, query: &str, pair: Pair<'_, Rule>) -> Result<QueryNode> {
        let mut negated = false;
        let mut node = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::not_op => negated = true,
                Rule::group => {
                    let or_expr = inner
                        .into_inner()
                        .next()
                        .ok_or_else(|| QuarryError::syntax("empty group", query, 0))?;
                    node = Some(self.build_or(query, or_expr)?);
                }
                Rule::phrase => node = Some(build_phrase(query, inner)?),
                Rule::word => node = Some(self.build_word(query, inner)?),
                _ => {}
            }
        }
        let node = node.ok_or_else(|| QuarryError::syntax("missing clause", query, 0))?;
        Ok(if negated { QueryNode::not(node) } else { node })
    }

    fn build_word(&self, query: &str, pair: Pair<'_, Rule>) -> Result<QueryNode> {
        let text = pair.as_str();
        if !text.contains(['*', '?']) {
            return Ok(QueryNode::term(text));
        }
        if !self.allow_leading_wildcard && text.starts_with(['*', '?']) {
            return Err(QuarryError::syntax(
                "leading wildcard is not allowed",
                query,
                pair.as_span().start(),
            ));
        }
        Ok(QueryNode::wildcard(text))
    }
}

/// Parse `query` with the default parser settings.
pub fn parse(field: &str, query: &str) -> Result<QueryNode> {
    QueryParser::new().parse(field, query)
}

fn build_phrase(query: &str, pair: Pair<'_, Rule>) -> Result<QueryNode> {
    let start = pair.as_span().start();
    let terms: Vec<&str> = pair
        .into_inner()
        .next()
        .map(|inner| inner.as_str().split_whitespace().collect())
        .unwrap_or_default();
    if terms.is_empty() {
        return Err(QuarryError::syntax("empty phrase", query, start));
    }
    Ok(QueryNode::phrase(terms))
}

/// Collapse single-child groups and reject groups made only of NOT clauses.
fn group(
    query: &str,
    start: usize,
    mut children: Vec<QueryNode>,
    make: fn(Vec<QueryNode>) -> QueryNode,
) -> Result<QueryNode> {
    if children.len() > 1 && children.iter().all(QueryNode::is_not) {
        return Err(QuarryError::syntax(
            "NOT must be combined with a positive clause",
            query,
            start,
        ));
    }
    match children.len() {
        0 => Err(QuarryError::syntax("missing clause", query, start)),
        1 => Ok(children.remove(0)),
        _ => Ok(make(children)),
    }
}

/// Report unbalanced quotes and parentheses at the offending character, and
/// nesting beyond `MAX_NESTING_DEPTH` at the outermost open parenthesis.
fn check_balance(query: &str) -> Result<()> {
    let mut open_quote = None;
    let mut open_parens = Vec::new();

    for (offset, c) in query.char_indices() {
        match c {
            '"' => {
                open_quote = match open_quote {
                    Some(_) => None,
                    None => Some(offset),
                }
            }
            '(' if open_quote.is_none() => {
                open_parens.push(offset);
                if open_parens.len() > MAX_NESTING_DEPTH {
                    return Err(QuarryError::syntax(
                        format!("query nests too deeply (limit {MAX_NESTING_DEPTH})"),
                        query,
                        open_parens[0],
                    ));
                }
            }
            ')' if open_quote.is_none() => {
                if open_parens.pop().is_none() {
                    return Err(QuarryError::syntax("unmatched ')'", query, offset));
                }
            }
            _ => {}
        }
    }

    if let Some(offset) = open_quote {
        return Err(QuarryError::syntax("unterminated quote", query, offset));
    }
    if let Some(&offset) = open_parens.last() {
        return Err(QuarryError::syntax("unclosed '('", query, offset));
    }
    Ok(())
}

fn pest_error(query: &str, err: &pest::error::Error<Rule>) -> QuarryError {
    let offset = match err.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    let message = if offset >= query.trim_end().len() {
        "unexpected end of query"
    } else {
        "unexpected input"
    };
    QuarryError::syntax(message, query, offset)
}
