// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The defragmenter's in-memory directory mirror (spec.md §3.5, §4.3.1).
//!
//! Design Notes §9 "Cyclic ownership": the source builds this with
//! reference-counted parent/child pointers, which creates cycles. Here it
//! is an arena of [`Node`]s addressed by index: `parent` and `children`
//! are [`NodeIx`] values into the same `Vec`, so the whole tree's lifetime
//! collapses to the arena's and there is nothing to leak.

use crate::dirent::DirectoryEntry;

pub type NodeIx = usize;

pub struct Node {
    pub entry: DirectoryEntry,
    pub parent: Option<NodeIx>,
    pub children: Vec<NodeIx>,
}

/// An arena of directory-tree nodes rooted at index 0 (the synthetic `/`).
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn with_root(root_entry: DirectoryEntry) -> Self {
        Self {
            nodes: vec![Node {
                entry: root_entry,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub const ROOT: NodeIx = 0;

    pub fn node(&self, ix: NodeIx) -> &Node {
        &self.nodes[ix]
    }

    pub fn node_mut(&mut self, ix: NodeIx) -> &mut Node {
        &mut self.nodes[ix]
    }

    /// Appends a new child of `parent` and returns its index.
    pub fn push_child(&mut self, parent: NodeIx, entry: DirectoryEntry) -> NodeIx {
        let ix = self.nodes.len();
        self.nodes.push(Node {
            entry,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(ix);
        ix
    }

    pub fn children(&self, ix: NodeIx) -> &[NodeIx] {
        &self.nodes[ix].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds the node whose entry's `first_cluster` equals `first_cluster`
    /// (the defragmenter's directory-head swap lookup, spec.md §4.3.4 Case
    /// B). Linear scan: the tree is rebuilt fresh on every
    /// `runDefragmentation` call, so there is nothing to index ahead of
    /// time.
    pub fn find_by_first_cluster(&self, first_cluster: u32) -> Option<NodeIx> {
        self.nodes
            .iter()
            .position(|node| node.entry.first_cluster() == first_cluster)
    }

    /// The `depth` spaces this node sits at for tree printing (§6.3):
    /// `4 × (distance to root)`.
    pub fn depth(&self, ix: NodeIx) -> usize {
        let mut depth = 0;
        let mut current = ix;
        while let Some(parent) = self.nodes[current].parent {
            depth += 4;
            current = parent;
        }
        depth
    }
}
