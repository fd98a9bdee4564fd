//! Query tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};

/// Boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanOperator {
    /// Every child must match.
    And,
    /// At least one child must match.
    Or,
    /// Excludes its single child's matches from the enclosing group.
    Not,
}

impl BooleanOperator {
    fn keyword(self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
            BooleanOperator::Not => "NOT",
        }
    }
}

/// A parsed query. Nodes carry no field; the executor binds one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    Term(String),
    /// Terms that must appear at consecutive positions.
    Phrase(Vec<String>),
    /// `*` matches any run of characters, `?` exactly one.
    Wildcard(String),
    Boolean {
        op: BooleanOperator,
        children: Vec<QueryNode>,
    },
}

impl QueryNode {
    pub fn term(term: impl Into<String>) -> Self {
        QueryNode::Term(term.into())
    }

    pub fn phrase<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        QueryNode::Phrase(terms.into_iter().map(Into::into).collect())
    }

    pub fn wildcard(pattern: impl Into<String>) -> Self {
        QueryNode::Wildcard(pattern.into())
    }

    pub fn and(children: Vec<QueryNode>) -> Self {
        QueryNode::Boolean {
            op: BooleanOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<QueryNode>) -> Self {
        QueryNode::Boolean {
            op: BooleanOperator::Or,
            children,
        }
    }

    pub fn not(child: QueryNode) -> Self {
        QueryNode::Boolean {
            op: BooleanOperator::Not,
            children: vec![child],
        }
    }

    pub fn is_not(&self) -> bool {
        matches!(
            self,
            QueryNode::Boolean {
                op: BooleanOperator::Not,
                ..
            }
        )
    }

    /// Check the structural invariants of the tree.
    ///
    /// Boolean nodes need at least one child, NOT exactly one, phrases at
    /// least one term, and a NOT must sit inside an AND/OR group that also has
    /// a positive clause.
    pub fn validate(&self) -> Result<()> {
        if self.is_not() {
            return Err(self.structure_error("NOT must be combined with a positive clause"));
        }
        self.validate_inner()
    }

    fn validate_inner(&self) -> Result<()> {
        match self {
            QueryNode::Term(term) if term.is_empty() => Err(self.structure_error("empty term")),
            QueryNode::Wildcard(pattern) if pattern.is_empty() => {
                Err(self.structure_error("empty wildcard pattern"))
            }
            QueryNode::Phrase(terms) if terms.is_empty() => {
                Err(self.structure_error("phrase must contain at least one term"))
            }
            QueryNode::Term(_) | QueryNode::Wildcard(_) | QueryNode::Phrase(_) => Ok(()),
            QueryNode::Boolean { op, children } => {
                if children.is_empty() {
                    return Err(self.structure_error("boolean query without clauses"));
                }
                match op {
                    BooleanOperator::Not => {
                        if children.len() != 1 {
                            return Err(self.structure_error("NOT takes exactly one clause"));
                        }
                        if children[0].is_not() {
                            return Err(self.structure_error("NOT cannot be nested directly"));
                        }
                    }
                    BooleanOperator::And | BooleanOperator::Or => {
                        if children.iter().all(QueryNode::is_not) {
                            return Err(self
                                .structure_error("NOT must be combined with a positive clause"));
                        }
                    }
                }
                children.iter().try_for_each(QueryNode::validate_inner)
            }
        }
    }

    fn structure_error(&self, message: &str) -> QuarryError {
        QuarryError::syntax(message, &self.to_string(), 0)
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Boolean {
                op: BooleanOperator::And | BooleanOperator::Or,
                ..
            } => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

/// Renders query syntax that parses back into an equal tree.
impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term(term) => f.write_str(term),
            QueryNode::Wildcard(pattern) => f.write_str(pattern),
            QueryNode::Phrase(terms) => write!(f, "\"{}\"", terms.join(" ")),
            QueryNode::Boolean {
                op: BooleanOperator::Not,
                children,
            } => {
                f.write_str("NOT")?;
                for child in children {
                    f.write_str(" ")?;
                    child.fmt_operand(f)?;
                }
                Ok(())
            }
            QueryNode::Boolean { op, children } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.keyword())?;
                    }
                    child.fmt_operand(f)?;
                }
                Ok(())
            }
        }
    }
}
