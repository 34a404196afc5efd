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

//! The defragmenter (spec.md §4.3): builds an in-memory tree mirror of
//! every directory, then repeatedly compacts each file's cluster chain
//! into a contiguous run, rewiring the FAT and any directory entry that
//! pointed at a relocated cluster.

use std::{collections::VecDeque, sync::Arc};

use fatimg_err::{Error, FsError, Result};
use fatimg_io::ImageStorage;
use fatimg_workerpool::TaskPool;
use log::warn;

use crate::{
    dirent::DirectoryEntry,
    fat,
    tree::{NodeIx, Tree},
    volume::{ParentOf, Volume},
};

#[derive(Clone)]
struct PendingChild {
    entry: DirectoryEntry,
    children: Vec<PendingChild>,
}

/// Owns a full in-memory mirror of the volume's directory tree and drives
/// `runDefragmentation` against it (spec.md §4.3.1–§4.3.4).
pub struct Defragmenter<S: ImageStorage, P: TaskPool> {
    volume: Arc<Volume<S>>,
    pool: Arc<P>,
    tree: Tree,
}

impl<S, P> Defragmenter<S, P>
where
    S: ImageStorage + Send + 'static,
    P: TaskPool + Send + Sync + 'static,
{
    /// `loadFullTree` (spec.md §4.3.1): directories are traversed
    /// recursively, sorted siblings-first, fanning each directory's
    /// subtree out onto `pool` when an idle slot is available and
    /// recursing inline otherwise.
    pub fn build(volume: Arc<Volume<S>>, pool: Arc<P>) -> Result<Self> {
        let root_entries = volume.root_entries();
        let children = Self::build_children(&volume, &pool, root_entries)?;

        let mut tree = Tree::with_root(Volume::<S>::synthetic_root());
        Self::attach(&mut tree, Tree::ROOT, children);
        Ok(Self { volume, pool, tree })
    }

    fn attach(tree: &mut Tree, parent: NodeIx, children: Vec<PendingChild>) {
        for child in children {
            let ix = tree.push_child(parent, child.entry);
            Self::attach(tree, ix, child.children);
        }
    }

    fn build_children(
        volume: &Arc<Volume<S>>,
        pool: &Arc<P>,
        mut entries: Vec<DirectoryEntry>,
    ) -> Result<Vec<PendingChild>> {
        entries.sort_by(sibling_order);

        let mut forked = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.is_directory() && pool.try_acquire() {
                let volume = volume.clone();
                let pool = pool.clone();
                let first_cluster = entry.first_cluster();
                forked.push(Some(pool.submit(move || -> Result<Vec<PendingChild>> {
                    let sub_entries = volume.load_directory(first_cluster)?;
                    Self::build_children(&volume, &pool, sub_entries)
                })));
            } else {
                forked.push(None);
            }
        }

        let mut results = Vec::with_capacity(entries.len());
        for (entry, handle) in entries.into_iter().zip(forked) {
            let children = if entry.is_directory() {
                match handle {
                    Some(h) => h.join()?,
                    None => {
                        let sub_entries = volume.load_directory(entry.first_cluster())?;
                        Self::build_children(volume, pool, sub_entries)?
                    }
                }
            } else {
                Vec::new()
            };
            results.push(PendingChild { entry, children });
        }
        Ok(results)
    }

    /// `runDefragmentation` (spec.md §4.3.2): re-enters `analyze` until a
    /// full pass makes no change, then saves the volume.
    pub fn run_defragmentation(&mut self) -> Result<()> {
        loop {
            if self.analyze()? {
                break;
            }
        }
        self.volume.save()
    }

    /// One analysis pass (spec.md §4.3.3): breadth-first with `rbegin→rend`
    /// child insertion, exactly as the original queues them. Returns
    /// `true` when the whole tree was scanned with no file needing a
    /// transfer.
    fn analyze(&mut self) -> Result<bool> {
        let mut changed = false;
        let mut queue: VecDeque<NodeIx> = VecDeque::new();
        for &child in self.tree.children(Tree::ROOT).iter().rev() {
            queue.push_back(child);
        }

        while let Some(ix) = queue.pop_front() {
            let entry = self.tree.node(ix).entry;
            if entry.is_directory() {
                for &child in self.tree.children(ix).iter().rev() {
                    queue.push_back(child);
                }
                continue;
            }

            let clusters = self.volume.clusters_of(&entry)?;
            let bad = need_replace(&clusters, &self.volume);
            if bad == 0 {
                continue;
            }
            changed = true;

            let mut good = clusters[bad - 1];
            for &cluster_to_replace in &clusters[bad..] {
                let mut target = good + 1;
                while self.volume.fat_slot(target) == fat::DIRECTORY_CONTENT
                    || self.volume.fat_slot(target) == fat::BAD
                {
                    good += 1;
                    target = good + 1;
                }
                self.swap_fat_registry(cluster_to_replace, target)?;
                good = target;
            }

            return Ok(false);
        }

        Ok(!changed)
    }

    /// `swapFatRegistry(lhs, rhs)` (spec.md §4.3.4).
    fn swap_fat_registry(&mut self, lhs: u32, rhs: u32) -> Result<()> {
        let lhs_v = self.volume.fat_slot(lhs);
        let rhs_v = self.volume.fat_slot(rhs);
        let rhs_parent = self.volume.parent_of(rhs);
        let lhs_parent_slot = match self.volume.parent_of(lhs) {
            ParentOf::Slot(p) => p,
            other => {
                warn!("cluster {lhs} has no FAT parent ({other:?}); analysis invariant violated");
                return Err(Error::Fs(FsError::InconsistentFat));
            }
        };

        if rhs_parent == ParentOf::DirectoryContent {
            if self.try_directory_head_swap(lhs, rhs, lhs_v, rhs_v, lhs_parent_slot)? {
                return Ok(());
            }
            warn!("directory head at cluster {rhs} has no matching tree node; falling back to a plain FAT swap");
        }

        self.volume.swap_clusters(lhs, rhs)?;
        if rhs_v != fat::UNUSED {
            if let ParentOf::Slot(rp) = rhs_parent {
                self.volume.set_fat_slot(rp, lhs);
            }
        }
        self.volume.set_fat_slot(lhs, rhs_v);
        self.volume.set_fat_slot(lhs_parent_slot, rhs);
        self.volume.set_fat_slot(rhs, lhs_v);
        Ok(())
    }

    /// Case B of `swapFatRegistry`: `rhs` is a directory's own cluster, so
    /// rather than swap the raw payload, the containing directory's entry
    /// is rewritten to point at `lhs` instead (spec.md §4.3.4 Case B).
    fn try_directory_head_swap(
        &mut self,
        lhs: u32,
        rhs: u32,
        lhs_v: u32,
        rhs_v: u32,
        lhs_parent_slot: u32,
    ) -> Result<bool> {
        let Some(node_ix) = self.tree.find_by_first_cluster(rhs) else {
            return Ok(false);
        };
        let Some(parent_ix) = self.tree.node(node_ix).parent else {
            return Ok(false);
        };
        let dir_cluster = self.tree.node(parent_ix).entry.first_cluster();

        self.volume.repoint_directory_entry(dir_cluster, rhs, lhs)?;
        self.volume.set_fat_slot(lhs, rhs_v);
        self.volume.set_fat_slot(lhs_parent_slot, rhs);
        self.volume.set_fat_slot(rhs, lhs_v);
        self.tree.node_mut(node_ix).entry.set_first_cluster(lhs);
        Ok(true)
    }

    /// `printTree` (spec.md §6.3).
    pub fn print_tree(&self) -> String {
        let mut out = format!("+{}\n", self.tree.node(Tree::ROOT).entry.name());
        for &child in self.tree.children(Tree::ROOT) {
            self.print_subtree(child, 4, &mut out);
        }
        out
    }

    fn print_subtree(&self, ix: NodeIx, depth: usize, out: &mut String) {
        let entry = self.tree.node(ix).entry;
        let sigil = if entry.is_directory() { '+' } else { '-' };
        let chain = self.chain_for_print(&entry);
        let csv = chain
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "{:width$}{sigil}{} {csv} ({})\n",
            "",
            entry.name(),
            chain.len(),
            width = depth
        ));
        for &child in self.tree.children(ix) {
            self.print_subtree(child, depth + 4, out);
        }
    }

    /// The cluster list a tree-print line shows: a file's full chain, or a
    /// directory's own single cluster (spec.md §8 scenario 3: `+sub 1
    /// (1)`).
    fn chain_for_print(&self, entry: &DirectoryEntry) -> Vec<u32> {
        if entry.is_directory() {
            vec![entry.first_cluster()]
        } else {
            self.volume.clusters_of(entry).unwrap_or_default()
        }
    }
}

/// Sorts directories before files, then by name ascending (spec.md §3.5,
/// Design Notes §9 "Open questions": the source's comparator has a
/// discarded `strcmp` call in one branch; this is the intended ordering).
fn sibling_order(lhs: &DirectoryEntry, rhs: &DirectoryEntry) -> std::cmp::Ordering {
    match (lhs.is_directory(), rhs.is_directory()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => lhs.name().cmp(&rhs.name()),
    }
}

/// `needReplace` (spec.md §4.3.3): 0 means the file is already
/// contiguous (or empty); otherwise the first index in `clusters` that
/// needs to move.
fn need_replace<S: ImageStorage>(clusters: &[u32], volume: &Volume<S>) -> usize {
    if clusters.is_empty() {
        return 0;
    }
    let cluster_count = volume.cluster_count();
    let mut expected = clusters[0];

    for (i, &cluster) in clusters.iter().enumerate() {
        if expected != cluster {
            if volume.fat_slot(expected) == fat::DIRECTORY_CONTENT {
                while volume.fat_slot(expected) == fat::DIRECTORY_CONTENT {
                    expected += 1;
                    if expected >= cluster_count {
                        warn!("needReplace gave up on a file: a directory cluster run reaches the end of the volume");
                        return 0;
                    }
                }
                if expected == cluster {
                    expected += 1;
                    continue;
                }
            }
            return i;
        }
        expected += 1;
    }
    0
}
