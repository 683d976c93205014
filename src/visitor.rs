//! # Depth-first traversal of syntax trees
//!
//! [`Iter`] walks a tree of [`Syntax`] nodes in pre-order using an explicit stack,
//! so deep expression trees do not grow the call stack.
//! Traversal can be scoped: with `not_child_of = Some(kind)` the children of any
//! node of that kind (other than the root) are not explored, e.g. to find the
//! aggregates of a query without looking into its nested relations.
//!

use std::iter;

use crate::ast::{Kind, Syntax};

/// A pre-order depth-first iterator over the nodes of a tree, root included
pub struct Iter<'a> {
    stack: Vec<(&'a dyn Syntax, bool)>,
    not_child_of: Option<Kind>,
}

impl<'a> Iter<'a> {
    pub fn new(root: &'a dyn Syntax, not_child_of: Option<Kind>) -> Iter<'a> {
        Iter {
            stack: vec![(root, true)],
            not_child_of,
        }
    }

    fn explores(&self, node: &dyn Syntax, is_root: bool) -> bool {
        is_root || Some(node.kind()) != self.not_child_of
    }
}

impl<'a> iter::Iterator for Iter<'a> {
    type Item = &'a dyn Syntax;

    fn next(&mut self) -> Option<Self::Item> {
        let (node, is_root) = self.stack.pop()?;
        if self.explores(node, is_root) {
            // Push in reverse so that the first child is visited first
            for child in node.children().into_iter().rev() {
                self.stack.push((child, false));
            }
        }
        Some(node)
    }
}

/// A visitor folding a tree bottom-up: each node is visited with the outputs of its children
pub trait Visitor<'a, O> {
    fn visit(&self, node: &'a dyn Syntax, children: Vec<O>) -> O;
}

/// Post-order fold of `root` with `visitor`, also driven by an explicit stack
pub fn accept<'a, O, V: Visitor<'a, O>>(root: &'a dyn Syntax, visitor: &V) -> O {
    // (node, children already pushed)
    let mut stack: Vec<(&'a dyn Syntax, bool)> = vec![(root, false)];
    let mut outputs: Vec<O> = vec![];
    let mut arities: Vec<usize> = vec![];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            let arity = arities.pop().unwrap_or(0);
            let children = outputs.split_off(outputs.len() - arity);
            outputs.push(visitor.visit(node, children));
        } else {
            let children = node.children();
            arities.push(children.len());
            stack.push((node, true));
            for child in children.into_iter().rev() {
                stack.push((child, false));
            }
        }
    }
    // The root output is the only one left
    outputs
        .pop()
        .unwrap_or_else(|| visitor.visit(root, vec![]))
}
