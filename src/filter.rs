//! # Filter Expression Trees
//!
//! Recursive filter structure rewritten non-destructively by the tenant and
//! soft-delete behaviors. A node is either a leaf predicate
//! (field / operator / value) or a logic group (And/Or) over child filters,
//! never both.
//!
//! Rewriting combines a new predicate with the caller-supplied filter under
//! `And`, and never duplicates a predicate for a field the tree already
//! constrains. Containment checks walk the tree with an explicit worklist
//! (a stack) rather than recursion, so stack depth stays bounded no matter
//! how deep a caller-supplied tree is.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

/// Logical combinator of a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
}

/// One node of a filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    Predicate {
        field: String,
        op: CompareOp,
        value: Value,
    },
    Group {
        logic: LogicOp,
        filters: Vec<FilterNode>,
    },
}

impl FilterNode {
    /// Leaf equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(field, CompareOp::Eq, value)
    }

    pub fn predicate(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Predicate {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn and(filters: Vec<FilterNode>) -> Self {
        Self::Group {
            logic: LogicOp::And,
            filters,
        }
    }

    pub fn or(filters: Vec<FilterNode>) -> Self {
        Self::Group {
            logic: LogicOp::Or,
            filters,
        }
    }

    /// Whether any predicate anywhere in the tree constrains `field`.
    ///
    /// Explicit stack-based traversal; every node is visited exactly once and
    /// visit order is irrelevant to the result.
    pub fn contains_field(&self, field: &str) -> bool {
        let mut worklist = vec![self];

        while let Some(node) = worklist.pop() {
            match node {
                Self::Predicate { field: name, .. } => {
                    if name == field {
                        return true;
                    }
                }
                Self::Group { filters, .. } => {
                    worklist.extend(filters.iter());
                }
            }
        }

        false
    }

    /// Number of predicates in the tree constraining `field`.
    pub fn count_field(&self, field: &str) -> usize {
        let mut worklist = vec![self];
        let mut count = 0;

        while let Some(node) = worklist.pop() {
            match node {
                Self::Predicate { field: name, .. } => {
                    if name == field {
                        count += 1;
                    }
                }
                Self::Group { filters, .. } => {
                    worklist.extend(filters.iter());
                }
            }
        }

        count
    }

    /// AND-combine `predicate` with an optional existing filter.
    ///
    /// With no existing filter the predicate *is* the filter; otherwise the
    /// result is `And[predicate, existing]`. The existing tree is moved, not
    /// mutated in place.
    pub fn and_with(existing: Option<FilterNode>, predicate: FilterNode) -> FilterNode {
        match existing {
            None => predicate,
            Some(original) => Self::and(vec![predicate, original]),
        }
    }
}

/// Derived drop glue would recurse once per nesting level and overflow the
/// stack on a deep caller-supplied tree. Drain children into a worklist
/// instead, so every node is dropped with an empty child list.
impl Drop for FilterNode {
    fn drop(&mut self) {
        if let Self::Group { filters, .. } = self {
            let mut worklist = std::mem::take(filters);
            while let Some(mut node) = worklist.pop() {
                if let Self::Group { filters, .. } = &mut node {
                    worklist.append(filters);
                }
            }
        }
    }
}

/// Rewrite the filter slot of a query in place, adding `predicate` under
/// `And` unless the tree already constrains the predicate's field.
///
/// Returns `true` when the predicate was added. Idempotent: applying the
/// same rewrite twice leaves the tree with exactly one predicate for the
/// field.
pub fn add_predicate_if_absent(slot: &mut Option<FilterNode>, predicate: FilterNode) -> bool {
    let FilterNode::Predicate { ref field, .. } = predicate else {
        return false;
    };

    if slot
        .as_ref()
        .is_some_and(|existing| existing.contains_field(field))
    {
        return false;
    }

    let existing = slot.take();
    *slot = Some(FilterNode::and_with(existing, predicate));
    true
}
