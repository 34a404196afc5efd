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

//! The Volume aggregate (spec.md §3.4, §4.2): superblock, canonical FAT,
//! root directory list, and the directory protocol (path resolution,
//! create/delete, file import) built directly on top of them.
//!
//! Design Notes §9 "Mirrored in-memory FATs": unlike the original `Fat`
//! class, which keeps one array per mirror and writes every mutation to
//! all of them, this keeps a single canonical FAT resident and only
//! expands it into `fat_copies` identical byte blobs on [`Volume::save`].

use std::{cell::RefCell, mem::size_of};

use fatimg_err::{Error, FsError, Result};
use fatimg_io::ImageStorage;
use log::warn;
use parking_lot::ReentrantMutex;
use zerocopy::{FromBytes, IntoBytes};

use crate::{
    dirent::{self, DirectoryEntry, FILE_TYPE_DIRECTORY, FILE_TYPE_FILE},
    fat,
    superblock::Superblock,
};

struct State<S: ImageStorage> {
    storage: S,
    superblock: Superblock,
    /// Canonical in-memory FAT; persisted into `fat_copies` identical
    /// mirrors only on `save`.
    fat: Vec<u32>,
    root: Vec<DirectoryEntry>,
}

/// Owns the image handle, the superblock, the canonical FAT, and the root
/// directory list, all behind a re-entrant lock (spec.md §5): the
/// defragmenter reacquires it from within its own call stack when it
/// rewrites a directory cluster mid-swap.
pub struct Volume<S: ImageStorage> {
    state: ReentrantMutex<RefCell<State<S>>>,
}

impl<S: ImageStorage> Volume<S> {
    /// Wraps an already-open image handle. Mirrors the original's `Fat`
    /// constructor: opening never reads anything by itself. Callers then
    /// call either [`Volume::load`] (existing image) or
    /// [`Volume::create_empty_fat`] (fresh image, `-n`), matching
    /// `main.cpp`'s per-action dispatch.
    pub fn open(storage: S) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(State {
                storage,
                superblock: Superblock::fresh(),
                fat: Vec::new(),
                root: Vec::new(),
            })),
        }
    }

    fn fat_start(_sb: &Superblock) -> u64 {
        size_of::<Superblock>() as u64
    }

    fn clusters_start(sb: &Superblock) -> u64 {
        Self::fat_start(sb) + sb.cluster_count() as u64 * fat::SLOT_WIDTH as u64 * sb.fat_copies() as u64
    }

    fn cluster_offset(sb: &Superblock, n: u32) -> u64 {
        Self::clusters_start(sb) + n as u64 * sb.cluster_size() as u64
    }

    /// Decodes the superblock, all FAT copies (keeping only copy 0
    /// resident as canonical), and cluster 0 into the root directory list
    /// (spec.md §4.2.1 `load`).
    pub fn load(&self) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let mut sb_bytes = vec![0u8; size_of::<Superblock>()];
        state.storage.read(0, &mut sb_bytes)?;
        let sb = Superblock::read_from_bytes(&sb_bytes)
            .map_err(|_| Error::Fs(FsError::Damaged))?;
        if sb.is_damaged() {
            return Err(Error::Fs(FsError::Damaged));
        }

        let cluster_count = sb.cluster_count();
        let mut copy_bytes = vec![0u8; cluster_count as usize * fat::SLOT_WIDTH];
        state
            .storage
            .read(Self::fat_start(&sb), &mut copy_bytes)?;
        let working = fat::decode(&copy_bytes, cluster_count);

        let mut root_bytes = vec![0u8; sb.cluster_size() as usize];
        state
            .storage
            .read(Self::cluster_offset(&sb, 0), &mut root_bytes)?;
        let root = dirent::decode_entries(&root_bytes, sb.root_directory_max_entries_count());

        state.superblock = sb;
        state.fat = working;
        state.root = root;
        Ok(())
    }

    /// Formats a fresh image in place (spec.md §4.2.1 `createEmptyFat`):
    /// truncates the backing storage, writes a default superblock, an
    /// all-`UNUSED` FAT with slot 0 pinned to `FILE_END` (the root
    /// directory's own cluster), and zero-fills the whole cluster region.
    pub fn create_empty_fat(&self) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let sb = Superblock::fresh();
        let entry_width = dirent::ENTRY_WIDTH as u64;
        if sb.root_directory_max_entries_count() * entry_width > sb.cluster_size() as u64 {
            warn!(
                "root_directory_max_entries_count ({}) × entry width ({entry_width}) exceeds cluster_size ({}); directories will overflow their cluster",
                sb.root_directory_max_entries_count(),
                sb.cluster_size()
            );
        }

        let cluster_count = sb.cluster_count();
        let mut fat = vec![fat::UNUSED; cluster_count as usize];
        fat[0] = fat::FILE_END;

        let total_len = Self::clusters_start(&sb) + cluster_count as u64 * sb.cluster_size() as u64;
        state.storage.set_len(0)?;
        state.storage.set_len(total_len)?;

        state.storage.write(0, sb.as_bytes())?;
        let copies = fat::encode_copies(&fat, sb.fat_copies());
        state.storage.write(Self::fat_start(&sb), &copies)?;

        let zero_cluster = vec![0u8; sb.cluster_size() as usize];
        for n in 0..cluster_count {
            state
                .storage
                .write(Self::cluster_offset(&sb, n), &zero_cluster)?;
        }

        state.superblock = sb;
        state.fat = fat;
        state.root = Vec::new();
        Ok(())
    }

    /// Persists the superblock, every FAT mirror, and cluster 0 from the
    /// in-memory root directory list (spec.md §4.2.1 `save`).
    pub fn save(&self) -> Result<()> {
        let guard = self.state.lock();
        let state = guard.borrow();

        state.storage.write(0, state.superblock.as_bytes())?;
        let copies = fat::encode_copies(&state.fat, state.superblock.fat_copies());
        state
            .storage
            .write(Self::fat_start(&state.superblock), &copies)?;

        let root_bytes =
            dirent::encode_entries(&state.root, state.superblock.cluster_size() as usize);
        state
            .storage
            .write(Self::cluster_offset(&state.superblock, 0), &root_bytes)?;
        Ok(())
    }

    pub fn superblock_snapshot(&self) -> Superblock {
        *self.state.lock().borrow().superblock
    }

    pub fn fat_snapshot(&self) -> Vec<u32> {
        self.state.lock().borrow().fat.clone()
    }

    pub fn fat_copies_snapshot(&self) -> Vec<Vec<u32>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        (0..state.superblock.fat_copies())
            .map(|_| state.fat.clone())
            .collect()
    }

    pub fn root_entries(&self) -> Vec<DirectoryEntry> {
        self.state.lock().borrow().root.clone()
    }

    pub fn synthetic_root() -> DirectoryEntry {
        DirectoryEntry::synthetic_root()
    }

    fn read_cluster_locked(state: &State<S>, n: u32) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; state.superblock.cluster_size() as usize];
        state
            .storage
            .read(Self::cluster_offset(&state.superblock, n), &mut buf)?;
        Ok(buf)
    }

    fn write_cluster_locked(state: &State<S>, n: u32, bytes: &[u8]) -> Result<()> {
        state
            .storage
            .write(Self::cluster_offset(&state.superblock, n), bytes)
    }

    pub fn read_cluster(&self, n: u32) -> Result<Vec<u8>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        Self::read_cluster_locked(&state, n)
    }

    /// Loads present entries out of `n`'s cluster payload (`loadDirectory`,
    /// spec.md §4.2.3). Callers are responsible for only doing this for
    /// clusters whose FAT slot is `DIRECTORY_CONTENT`.
    pub fn load_directory(&self, n: u32) -> Result<Vec<DirectoryEntry>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        let bytes = Self::read_cluster_locked(&state, n)?;
        Ok(dirent::decode_entries(
            &bytes,
            state.superblock.root_directory_max_entries_count(),
        ))
    }

    fn save_directory_locked(state: &State<S>, n: u32, entries: &[DirectoryEntry]) -> Result<()> {
        let bytes = dirent::encode_entries(entries, state.superblock.cluster_size() as usize);
        Self::write_cluster_locked(state, n, &bytes)
    }

    /// `getClusters` (spec.md §4.2.2): directories have no chain; files
    /// walk the FAT from `first_cluster` to `FILE_END`, bounded by
    /// `ceil(file_size / cluster_size)` steps.
    pub fn clusters_of(&self, entry: &DirectoryEntry) -> Result<Vec<u32>> {
        if entry.is_directory() {
            return Ok(Vec::new());
        }
        let guard = self.state.lock();
        let state = guard.borrow();
        let bound = div_ceil_u64(entry.file_size().max(0) as u64, state.superblock.cluster_size() as u64).max(1);

        let mut clusters = Vec::new();
        let mut current = entry.first_cluster();
        for _ in 0..bound {
            clusters.push(current);
            let next = state.fat[current as usize];
            if next == fat::FILE_END {
                return Ok(clusters);
            }
            current = next;
        }
        Err(Error::Fs(FsError::InconsistentFat))
    }

    /// `findFileDescriptor` (spec.md §4.2.4).
    pub fn find_file_descriptor(&self, path: &str) -> Result<DirectoryEntry> {
        let root = Self::synthetic_root();
        self.resolve_from(root, path)
    }

    fn resolve_from(&self, current: DirectoryEntry, path: &str) -> Result<DirectoryEntry> {
        let rest = match path.find('/') {
            Some(idx) => &path[idx + 1..],
            None => path,
        };
        let had_slash = path.contains('/');
        let name = match rest.find('/') {
            Some(idx) => &rest[..idx],
            None => rest,
        };

        let entries = if current.first_cluster() == 0 && current.is_directory() {
            self.root_entries()
        } else {
            self.load_directory(current.first_cluster())?
        };

        for entry in entries {
            if entry.name() == name {
                if entry.is_file() {
                    return Ok(entry);
                }
                return self.resolve_from(entry, rest);
            }
        }

        if had_slash && !rest.is_empty() {
            Err(Error::Fs(FsError::NotFound))
        } else {
            Ok(current)
        }
    }

    /// Splits an image path into its parent directory path and leaf name,
    /// as the mutating operations need both.
    fn split_parent_leaf(path: &str) -> (&str, &str) {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => {
                let parent = &trimmed[..idx];
                (if parent.is_empty() { "/" } else { parent }, &trimmed[idx + 1..])
            }
            None => ("/", trimmed),
        }
    }

    /// `allocateFreeCluster(start)` (spec.md §4.2.6).
    fn allocate_free_cluster_locked(state: &mut State<S>, start: u32) -> Result<u32> {
        let cluster_count = state.superblock.cluster_count();
        for idx in start..cluster_count {
            if state.fat[idx as usize] == fat::UNUSED {
                return Ok(idx);
            }
        }
        Err(Error::Fs(FsError::NoSpace))
    }

    /// `clearChain(head)` (spec.md §4.2.6): frees every slot in the chain,
    /// terminating on `FILE_END`, `BAD`, or `DIRECTORY_CONTENT`.
    fn clear_chain_locked(state: &mut State<S>, head: u32) -> Result<()> {
        let cluster_count = state.superblock.cluster_count();
        let mut current = head;
        for _ in 0..cluster_count {
            let next = state.fat[current as usize];
            state.fat[current as usize] = fat::UNUSED;
            if matches!(next, fat::FILE_END | fat::BAD | fat::DIRECTORY_CONTENT) {
                return Ok(());
            }
            current = next;
        }
        Err(Error::Fs(FsError::InconsistentFat))
    }

    /// Resolves a mutating operation's parent path to the cluster holding
    /// its entry list, or `None` for the root (whose entries live in
    /// `state.root`, not a loadable cluster). Always taken *before*
    /// acquiring the lock for the mutation itself, since it re-enters
    /// [`Volume::find_file_descriptor`]/[`Volume::load_directory`], which
    /// each take the lock on their own.
    fn resolve_parent_cluster(&self, parent_path: &str) -> Result<Option<u32>> {
        if parent_path == "/" {
            return Ok(None);
        }
        let parent = self.find_file_descriptor(parent_path)?;
        if !parent.is_directory() {
            return Err(Error::Fs(FsError::NotFound));
        }
        Ok(Some(parent.first_cluster()))
    }

    fn entries_for(&self, parent_cluster: Option<u32>) -> Result<Vec<DirectoryEntry>> {
        match parent_cluster {
            None => Ok(self.root_entries()),
            Some(c) => self.load_directory(c),
        }
    }

    /// `createDirectory(parent_path, name)` (spec.md §4.2.5). Only mutates
    /// in-memory state; a root-level parent's new entry and the allocated
    /// cluster's FAT slot reach disk only once the caller calls [`Volume::save`].
    pub fn create_directory(&self, parent_path: &str, name: &str) -> Result<()> {
        let parent_cluster = self.resolve_parent_cluster(parent_path)?;
        let mut entries = self.entries_for(parent_cluster)?;

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let max_entries = state.superblock.root_directory_max_entries_count() as usize;
        if entries.len() >= max_entries {
            return Err(Error::Fs(FsError::Full));
        }
        if entries.iter().any(|e| e.name() == name) {
            return Err(Error::Fs(FsError::Exists));
        }

        let cluster_size = state.superblock.cluster_size();
        let first_cluster = Self::allocate_free_cluster_locked(&mut state, fat::FIRST_CONTENT_INDEX)?;
        state.fat[first_cluster as usize] = fat::DIRECTORY_CONTENT;

        let entry = DirectoryEntry::new(name, "", FILE_TYPE_DIRECTORY, cluster_size as i64, first_cluster);
        entries.push(entry);

        match parent_cluster {
            None => state.root = entries,
            Some(pc) => Self::save_directory_locked(&state, pc, &entries)?,
        }
        Ok(())
    }

    /// `deleteDirectory(path)` (spec.md §4.2.5). Same persistence contract
    /// as [`Volume::create_directory`]: call [`Volume::save`] afterward to
    /// flush a root-level parent and the cleared FAT chain to disk.
    pub fn delete_directory(&self, path: &str) -> Result<()> {
        let (parent_path, leaf) = Self::split_parent_leaf(path);
        let target = self.find_file_descriptor(path)?;
        if !target.is_directory() {
            return Err(Error::Fs(FsError::NotFound));
        }

        let target_entries = self.load_directory(target.first_cluster())?;
        if target_entries.iter().any(|e| e.is_present()) {
            return Err(Error::Fs(FsError::NotEmpty));
        }

        let parent_cluster = self.resolve_parent_cluster(parent_path)?;
        let mut parent_entries = self.entries_for(parent_cluster)?;
        parent_entries.retain(|e| e.name() != leaf);

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        match parent_cluster {
            None => state.root = parent_entries,
            Some(pc) => Self::save_directory_locked(&state, pc, &parent_entries)?,
        }

        Self::clear_chain_locked(&mut state, target.first_cluster())
    }

    /// `insertFile(host_path, image_path)` (spec.md §4.2.5): streams
    /// `host_bytes` into a freshly allocated chain and links it into the
    /// parent directory. Same persistence contract as
    /// [`Volume::create_directory`]: the allocated chain's FAT slots and,
    /// for a root-level parent, the new entry only reach disk once the
    /// caller calls [`Volume::save`].
    pub fn insert_file(&self, image_path: &str, host_bytes: &[u8]) -> Result<()> {
        let (parent_path, leaf) = Self::split_parent_leaf(image_path);
        let parent_cluster = self.resolve_parent_cluster(parent_path)?;
        let mut entries = self.entries_for(parent_cluster)?;

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let max_entries = state.superblock.root_directory_max_entries_count() as usize;
        if entries.len() >= max_entries {
            return Err(Error::Fs(FsError::Full));
        }
        if entries.iter().any(|e| e.name() == leaf) {
            return Err(Error::Fs(FsError::Exists));
        }

        let first_cluster = Self::allocate_free_cluster_locked(&mut state, fat::FIRST_CONTENT_INDEX)?;
        let mut entry = DirectoryEntry::new(
            leaf,
            "rwxrwxrwx",
            FILE_TYPE_FILE,
            host_bytes.len() as i64,
            first_cluster,
        );

        Self::write_file_locked(&mut state, host_bytes, &mut entry)?;
        entries.push(entry);

        match parent_cluster {
            None => state.root = entries,
            Some(pc) => Self::save_directory_locked(&state, pc, &entries)?,
        }
        Ok(())
    }

    /// `writeFile` (spec.md §4.2.5, corrected per Design Notes §9: the
    /// pre-allocated pool is exactly `need` indices — the first is
    /// `entry.first_cluster`, already reserved by the caller — so every
    /// allocated cluster receives real file data and only the last slot's
    /// *value* is `FILE_END`; no trailing empty cluster is allocated).
    fn write_file_locked(state: &mut State<S>, host_bytes: &[u8], entry: &mut DirectoryEntry) -> Result<()> {
        let cluster_size = state.superblock.cluster_size() as usize;
        let need = if host_bytes.is_empty() {
            1
        } else {
            div_ceil_usize(host_bytes.len(), cluster_size)
        };

        let mut indices = Vec::with_capacity(need);
        indices.push(entry.first_cluster());
        for _ in 1..need {
            let start = indices.last().copied().unwrap() + 1;
            indices.push(Self::allocate_free_cluster_locked(state, start)?);
        }

        let mut remaining = host_bytes.len();
        for (i, &idx) in indices.iter().enumerate() {
            let take = remaining.min(cluster_size);
            let offset = i * cluster_size;
            let mut buf = vec![0u8; cluster_size];
            buf[..take].copy_from_slice(&host_bytes[offset..offset + take]);
            Self::write_cluster_locked(state, idx, &buf)?;
            remaining -= take;

            state.fat[idx as usize] = if i + 1 < indices.len() {
                indices[i + 1]
            } else {
                fat::FILE_END
            };
        }
        Ok(())
    }

    /// `deleteFile(path)` (spec.md §4.2.5): symmetric to
    /// [`Volume::delete_directory`] without the empty check, and with the
    /// same persistence contract — call [`Volume::save`] afterward.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        let (parent_path, leaf) = Self::split_parent_leaf(path);
        let target = self.find_file_descriptor(path)?;
        if !target.is_file() {
            return Err(Error::Fs(FsError::NotFound));
        }

        let parent_cluster = self.resolve_parent_cluster(parent_path)?;
        let mut parent_entries = self.entries_for(parent_cluster)?;
        parent_entries.retain(|e| e.name() != leaf);

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        match parent_cluster {
            None => state.root = parent_entries,
            Some(pc) => Self::save_directory_locked(&state, pc, &parent_entries)?,
        }

        Self::clear_chain_locked(&mut state, target.first_cluster())
    }

    /// Reads a file's full byte content back, cluster by cluster, for the
    /// `-l` dump action and the read-file round-trip tests.
    pub fn read_file(&self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        let clusters = self.clusters_of(entry)?;
        let mut out = Vec::with_capacity(entry.file_size().max(0) as usize);
        for n in clusters {
            out.extend(self.read_cluster(n)?);
        }
        out.truncate(entry.file_size().max(0) as usize);
        Ok(out)
    }

    /// The FAT slot that points at `n`, if any is currently in use; used
    /// by the defragmenter's `parentOf` (spec.md §4.3.4).
    pub fn parent_of(&self, n: u32) -> ParentOf {
        let guard = self.state.lock();
        let state = guard.borrow();
        if state.fat[n as usize] == fat::UNUSED {
            return ParentOf::Unused;
        }
        for (slot, &value) in state.fat.iter().enumerate() {
            if value == n {
                return ParentOf::Slot(slot as u32);
            }
        }
        ParentOf::DirectoryContent
    }

    pub fn fat_slot(&self, n: u32) -> u32 {
        self.state.lock().borrow().fat[n as usize]
    }

    pub fn set_fat_slot(&self, n: u32, value: u32) {
        self.state.lock().borrow_mut().fat[n as usize] = value;
    }

    pub fn swap_clusters(&self, lhs: u32, rhs: u32) -> Result<()> {
        let guard = self.state.lock();
        let state = guard.borrow();
        let a = Self::read_cluster_locked(&state, lhs)?;
        let b = Self::read_cluster_locked(&state, rhs)?;
        Self::write_cluster_locked(&state, lhs, &b)?;
        Self::write_cluster_locked(&state, rhs, &a)?;
        Ok(())
    }

    /// Rewrites `cluster` within the directory at `dir_cluster`, replacing
    /// its `first_cluster` field. Used by the directory-head swap case
    /// (spec.md §4.3.4 Case B).
    pub fn repoint_directory_entry(&self, dir_cluster: u32, old_first: u32, new_first: u32) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let is_root = dir_cluster == 0;
        let mut entries = if is_root {
            state.root.clone()
        } else {
            Self::read_cluster_locked(&state, dir_cluster).and_then(|bytes| {
                Ok(dirent::decode_entries(
                    &bytes,
                    state.superblock.root_directory_max_entries_count(),
                ))
            })?
        };
        for entry in entries.iter_mut() {
            if entry.first_cluster() == old_first {
                entry.set_first_cluster(new_first);
            }
        }
        if is_root {
            state.root = entries;
        } else {
            Self::save_directory_locked(&state, dir_cluster, &entries)?;
        }
        Ok(())
    }

    pub fn cluster_size(&self) -> u32 {
        self.state.lock().borrow().superblock.cluster_size()
    }

    pub fn cluster_count(&self) -> u32 {
        self.state.lock().borrow().superblock.cluster_count()
    }
}

/// The result of the defragmenter's `parentOf` lookup (spec.md §4.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentOf {
    Slot(u32),
    DirectoryContent,
    Unused,
}

fn div_ceil_u64(a: u64, b: u64) -> u64 {
    if b == 0 {
        0
    } else {
        (a + b - 1) / b
    }
}

fn div_ceil_usize(a: usize, b: usize) -> usize {
    if b == 0 {
        0
    } else {
        (a + b - 1) / b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatimg_io_std::FileImageStorage;

    fn fresh_volume() -> (Volume<FileImageStorage>, tempfile::TempPath) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.into_temp_path();
        let storage = FileImageStorage::open(&path).unwrap();
        let volume = Volume::open(storage);
        volume.create_empty_fat().unwrap();
        volume.save().unwrap();
        (volume, path)
    }

    #[test]
    fn fresh_image_has_file_end_at_slot_zero() {
        let (volume, _path) = fresh_volume();
        let fat = volume.fat_snapshot();
        assert_eq!(fat[0], fat::FILE_END);
        assert!(fat[1..].iter().all(|&slot| slot == fat::UNUSED));
    }

    #[test]
    fn import_builds_the_expected_chain() {
        let (volume, _path) = fresh_volume();
        let host = vec![b'x'; 400];
        volume.insert_file("/a.txt", &host).unwrap();

        let entry = volume.find_file_descriptor("/a.txt").unwrap();
        let clusters = volume.clusters_of(&entry).unwrap();
        assert_eq!(clusters, vec![1, 2, 3]);
        assert_eq!(volume.fat_slot(1), 2);
        assert_eq!(volume.fat_slot(2), 3);
        assert_eq!(volume.fat_slot(3), fat::FILE_END);
    }

    #[test]
    fn read_file_round_trips_host_bytes() {
        let (volume, _path) = fresh_volume();
        let host: Vec<u8> = (0..400u32).map(|i| (i % 256) as u8).collect();
        volume.insert_file("/a.txt", &host).unwrap();
        let entry = volume.find_file_descriptor("/a.txt").unwrap();
        let read_back = volume.read_file(&entry).unwrap();
        assert_eq!(read_back, host);
    }

    #[test]
    fn create_directory_marks_directory_content() {
        let (volume, _path) = fresh_volume();
        volume.create_directory("/", "sub").unwrap();
        let entry = volume.find_file_descriptor("/sub").unwrap();
        assert!(entry.is_directory());
        assert_eq!(volume.fat_slot(entry.first_cluster()), fat::DIRECTORY_CONTENT);
    }

    #[test]
    fn delete_file_frees_its_chain() {
        let (volume, _path) = fresh_volume();
        volume.insert_file("/a.txt", &vec![1u8; 400]).unwrap();
        volume.delete_file("/a.txt").unwrap();
        let fat = volume.fat_snapshot();
        assert!(fat[1..=3].iter().all(|&slot| slot == fat::UNUSED));
        assert!(volume.find_file_descriptor("/a.txt").is_err() || {
            let e = volume.find_file_descriptor("/a.txt").unwrap();
            e.name() != "a.txt"
        });
    }

    #[test]
    fn duplicate_name_fails_exists() {
        let (volume, _path) = fresh_volume();
        volume.insert_file("/a.txt", b"one").unwrap();
        let err = volume.insert_file("/a.txt", b"two").unwrap_err();
        assert!(matches!(err, Error::Fs(FsError::Exists)));
    }

    #[test]
    fn full_directory_rejects_another_entry() {
        let (volume, _path) = fresh_volume();
        volume.insert_file("/a.txt", b"a").unwrap();
        volume.insert_file("/b.txt", b"b").unwrap();
        volume.insert_file("/c.txt", b"c").unwrap();
        let err = volume.insert_file("/d.txt", b"d").unwrap_err();
        assert!(matches!(err, Error::Fs(FsError::Full)));
    }

    #[test]
    fn delete_non_empty_directory_fails() {
        let (volume, _path) = fresh_volume();
        volume.create_directory("/", "sub").unwrap();
        volume.insert_file("/sub/a.txt", b"x").unwrap();
        let err = volume.delete_directory("/sub").unwrap_err();
        assert!(matches!(err, Error::Fs(FsError::NotEmpty)));
    }
}
