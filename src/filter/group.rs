use std::fmt;

use serde::{Deserialize, Serialize};

use super::criterion::Criterion;

/// How a group combines its children's selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connective {
    #[default]
    And,
    Or,
}

impl Connective {
    pub fn as_str(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }

    /// Case-insensitive `AND` / `OR`.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Connective::And),
            "OR" => Some(Connective::Or),
            _ => None,
        }
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child of a group: a single rule or a nested group.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Criterion(Criterion),
    Group(FilterGroup),
}

impl From<Criterion> for FilterNode {
    fn from(criterion: Criterion) -> Self {
        FilterNode::Criterion(criterion)
    }
}

impl From<FilterGroup> for FilterNode {
    fn from(group: FilterGroup) -> Self {
        FilterNode::Group(group)
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Criterion(c) => write!(f, "{c}"),
            FilterNode::Group(g) => write!(f, "({g})"),
        }
    }
}

/// Boolean combination of criteria and nested groups.
///
/// Children own their subtrees, so a tree is always finite and acyclic.
/// An empty group places no constraint and selects every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGroup {
    pub connective: Connective,
    pub children: Vec<FilterNode>,
}

impl FilterGroup {
    pub fn new(connective: Connective) -> Self {
        Self {
            connective,
            children: Vec::new(),
        }
    }

    pub fn and(children: impl IntoIterator<Item = FilterNode>) -> Self {
        Self {
            connective: Connective::And,
            children: children.into_iter().collect(),
        }
    }

    pub fn or(children: impl IntoIterator<Item = FilterNode>) -> Self {
        Self {
            connective: Connective::Or,
            children: children.into_iter().collect(),
        }
    }

    pub fn push(&mut self, child: impl Into<FilterNode>) {
        self.children.push(child.into());
    }

    /// Copy of this group with `child` appended.
    pub fn with_child(&self, child: impl Into<FilterNode>) -> Self {
        let mut next = self.clone();
        next.push(child);
        next
    }

    /// Copy of this group without the child at `index`; unchanged if out of range.
    pub fn without_child(&self, index: usize) -> Self {
        let mut next = self.clone();
        if index < next.children.len() {
            next.children.remove(index);
        }
        next
    }

    pub fn with_connective(&self, connective: Connective) -> Self {
        Self {
            connective,
            children: self.children.clone(),
        }
    }

    /// No criteria anywhere in the tree; such a group selects every row.
    pub fn is_empty(&self) -> bool {
        self.criterion_count() == 0
    }

    /// All criteria in the tree, depth-first in child order.
    pub fn criteria(&self) -> Vec<&Criterion> {
        let mut out = Vec::new();
        self.collect_criteria(&mut out);
        out
    }

    fn collect_criteria<'a>(&'a self, out: &mut Vec<&'a Criterion>) {
        for child in &self.children {
            match child {
                FilterNode::Criterion(c) => out.push(c),
                FilterNode::Group(g) => g.collect_criteria(out),
            }
        }
    }

    pub fn criterion_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                FilterNode::Criterion(_) => 1,
                FilterNode::Group(g) => g.criterion_count(),
            })
            .sum()
    }

    /// Nesting depth; a flat group is depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| match child {
                FilterNode::Criterion(_) => 0,
                FilterNode::Group(g) => g.depth(),
            })
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for FilterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.children.is_empty() {
            return f.write_str("<all rows>");
        }
        let separator = format!(" {} ", self.connective);
        let parts: Vec<String> = self.children.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(&separator))
    }
}
