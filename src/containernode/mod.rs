//! Container tree
//!
//! Containers, subjects and setup hooks live in an arena indexed by plain
//! `usize` ids; every container records its parent. Declaration builds the
//! arena depth-first, in declaration order, before anything runs. A run
//! then takes a snapshot of the arena, optionally shuffles the top level,
//! back-propagates programmatic focus and collates it into
//! (ancestor chain, subject) pairs.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::leafnodes::LeafNode;
use crate::models::{CodeLocation, FlagType, NodeType};

/// Id of the synthetic root container
pub const ROOT: usize = 0;

/// Text of the synthetic root container
pub const TOP_LEVEL_TEXT: &str = "[Top Level]";

/// Position in a container's ordered child list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    Container(usize),
    Subject(usize),
}

/// A Describe/Context grouping
#[derive(Clone, Debug)]
pub struct ContainerNode {
    pub text: String,
    pub flag: FlagType,
    pub location: CodeLocation,
    pub parent: Option<usize>,
    children: Vec<Child>,
    before_each: Vec<LeafNode>,
    just_before_each: Vec<LeafNode>,
    just_after_each: Vec<LeafNode>,
    after_each: Vec<LeafNode>,
}

impl ContainerNode {
    fn new(
        text: impl Into<String>,
        flag: FlagType,
        location: CodeLocation,
        parent: Option<usize>,
    ) -> Self {
        Self {
            text: text.into(),
            flag,
            location,
            parent,
            children: Vec::new(),
            before_each: Vec::new(),
            just_before_each: Vec::new(),
            just_after_each: Vec::new(),
            after_each: Vec::new(),
        }
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Setup hooks of one kind, in declaration order
    pub fn setup_nodes(&self, node_type: NodeType) -> &[LeafNode] {
        match node_type {
            NodeType::BeforeEach => &self.before_each,
            NodeType::JustBeforeEach => &self.just_before_each,
            NodeType::JustAfterEach => &self.just_after_each,
            NodeType::AfterEach => &self.after_each,
            _ => &[],
        }
    }
}

/// One runnable path: ancestor containers (outer to inner) and a subject
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollatedNodes {
    pub containers: Vec<usize>,
    pub subject: usize,
}

/// Arena holding the whole declared tree
#[derive(Clone, Debug)]
pub struct ContainerTree {
    containers: Vec<ContainerNode>,
    subjects: Vec<LeafNode>,
}

impl Default for ContainerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerTree {
    pub fn new() -> Self {
        let root = ContainerNode::new(TOP_LEVEL_TEXT, FlagType::None, CodeLocation::default(), None);
        Self {
            containers: vec![root],
            subjects: Vec::new(),
        }
    }

    pub fn container(&self, id: usize) -> &ContainerNode {
        &self.containers[id]
    }

    pub fn subject(&self, id: usize) -> &LeafNode {
        &self.subjects[id]
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    pub fn push_container(
        &mut self,
        parent: usize,
        text: impl Into<String>,
        flag: FlagType,
        location: CodeLocation,
    ) -> usize {
        let id = self.containers.len();
        self.containers
            .push(ContainerNode::new(text, flag, location, Some(parent)));
        self.containers[parent].children.push(Child::Container(id));
        id
    }

    pub fn push_subject(&mut self, parent: usize, subject: LeafNode) -> usize {
        let id = self.subjects.len();
        self.subjects.push(subject);
        self.containers[parent].children.push(Child::Subject(id));
        id
    }

    /// Append a setup hook; non-setup node types are ignored
    pub fn push_setup(&mut self, parent: usize, node: LeafNode) {
        let container = &mut self.containers[parent];
        match node.node_type {
            NodeType::BeforeEach => container.before_each.push(node),
            NodeType::JustBeforeEach => container.just_before_each.push(node),
            NodeType::JustAfterEach => container.just_after_each.push(node),
            NodeType::AfterEach => container.after_each.push(node),
            _ => {}
        }
    }

    fn child_text(&self, child: Child) -> &str {
        match child {
            Child::Container(id) => &self.containers[id].text,
            Child::Subject(id) => &self.subjects[id].text,
        }
    }

    /// Sort the root's children by text, then permute them with `rng`.
    ///
    /// Only the top level moves; nested order and setup hooks are untouched.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut children = std::mem::take(&mut self.containers[ROOT].children);
        children.sort_by(|a, b| self.child_text(*a).cmp(self.child_text(*b)));
        children.shuffle(rng);
        self.containers[ROOT].children = children;
    }

    /// Unfocus any focused container that holds a focused descendant, so
    /// only the innermost focus selects specs. Returns true if the tree
    /// contains programmatic focus.
    pub fn back_propagate_programmatic_focus(&mut self) -> bool {
        self.back_propagate(ROOT)
    }

    fn back_propagate(&mut self, id: usize) -> bool {
        if self.containers[id].flag == FlagType::Pending {
            return false;
        }

        let mut should_unfocus = false;
        let children = self.containers[id].children.clone();
        for child in children {
            let focused = match child {
                Child::Container(child_id) => self.back_propagate(child_id),
                Child::Subject(subject_id) => self.subjects[subject_id].flag == FlagType::Focused,
            };
            should_unfocus = focused || should_unfocus;
        }

        let container = &mut self.containers[id];
        if should_unfocus {
            if container.flag == FlagType::Focused {
                container.flag = FlagType::None;
            }
            return true;
        }
        container.flag == FlagType::Focused
    }

    /// Every reachable subject with its ancestor chain, depth-first
    pub fn collate(&self) -> Vec<CollatedNodes> {
        let mut collated = Vec::with_capacity(self.subjects.len());
        self.collate_into(ROOT, &mut Vec::new(), &mut collated);
        collated
    }

    fn collate_into(&self, id: usize, chain: &mut Vec<usize>, out: &mut Vec<CollatedNodes>) {
        chain.push(id);
        for child in &self.containers[id].children {
            match *child {
                Child::Container(child_id) => self.collate_into(child_id, chain, out),
                Child::Subject(subject_id) => out.push(CollatedNodes {
                    containers: chain.clone(),
                    subject: subject_id,
                }),
            }
        }
        chain.pop();
    }
}
