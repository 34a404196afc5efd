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

use zerocopy::{
    little_endian::{I16, I64, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

use crate::util::{cstr_to_string, write_cstr};

pub const FILE_TYPE_FILE: i16 = 1;
pub const FILE_TYPE_DIRECTORY: i16 = 2;

pub const NAME_WIDTH: usize = 13;
pub const MODE_WIDTH: usize = 10;

/// One packed directory entry (spec.md §3.3). 13 + 10 + 2 + 8 + 4 = 37
/// bytes, no padding: every multi-byte field is one of zerocopy's
/// little-endian wrappers, which are `align(1)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct DirectoryEntry {
    pub file_name: [u8; NAME_WIDTH],
    pub file_mode: [u8; MODE_WIDTH],
    pub file_type: I16,
    pub file_size: I64,
    pub first_cluster: U32,
}

pub const ENTRY_WIDTH: usize = size_of_entry();

const fn size_of_entry() -> usize {
    NAME_WIDTH + MODE_WIDTH + 2 + 8 + 4
}

impl DirectoryEntry {
    pub fn new(name: &str, mode: &str, file_type: i16, file_size: i64, first_cluster: u32) -> Self {
        let mut file_name = [0u8; NAME_WIDTH];
        write_cstr(&mut file_name, name);
        let mut file_mode = [0u8; MODE_WIDTH];
        write_cstr(&mut file_mode, mode);

        Self {
            file_name,
            file_mode,
            file_type: I16::new(file_type),
            file_size: I64::new(file_size),
            first_cluster: U32::new(first_cluster),
        }
    }

    /// The synthetic root pseudo-entry: name `"/"`, `first_cluster = 0`
    /// (spec.md §3.4).
    pub fn synthetic_root() -> Self {
        Self::new("/", "", FILE_TYPE_DIRECTORY, 0, 0)
    }

    /// An entry is present iff its leading name byte is non-zero
    /// (spec.md §3.3).
    pub fn is_present(&self) -> bool {
        self.file_name[0] != 0
    }

    pub fn is_directory(&self) -> bool {
        self.file_type.get() == FILE_TYPE_DIRECTORY
    }

    pub fn is_file(&self) -> bool {
        self.file_type.get() == FILE_TYPE_FILE
    }

    pub fn name(&self) -> String {
        cstr_to_string(&self.file_name)
    }

    pub fn mode(&self) -> String {
        cstr_to_string(&self.file_mode)
    }

    pub fn file_size(&self) -> i64 {
        self.file_size.get()
    }

    pub fn first_cluster(&self) -> u32 {
        self.first_cluster.get()
    }

    pub fn set_first_cluster(&mut self, cluster: u32) {
        self.first_cluster = U32::new(cluster);
    }
}

/// Decodes the present entries packed into one cluster's payload
/// (`loadDirectory`, spec.md §4.2.3).
pub fn decode_entries(cluster: &[u8], max_entries: u64) -> Vec<DirectoryEntry> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    for _ in 0..max_entries {
        if offset + ENTRY_WIDTH > cluster.len() {
            break;
        }
        let record = &cluster[offset..offset + ENTRY_WIDTH];
        let entry = DirectoryEntry::read_from_bytes(record).expect("fixed-width entry slice");
        if entry.is_present() {
            entries.push(entry);
        }
        offset += ENTRY_WIDTH;
    }
    entries
}

/// Encodes a directory's present entries back-to-back into a zeroed
/// cluster-sized buffer (`saveClusterWithFiles`, spec.md §4.2.3): entries
/// beyond `entries.len()` are implicitly absent because the cluster was
/// zeroed first.
pub fn encode_entries(entries: &[DirectoryEntry], cluster_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; cluster_size];
    let mut offset = 0usize;
    for entry in entries {
        let bytes = entry.as_bytes();
        buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        offset += ENTRY_WIDTH;
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_width_is_37_bytes() {
        assert_eq!(ENTRY_WIDTH, 37);
        assert_eq!(std::mem::size_of::<DirectoryEntry>(), 37);
    }

    #[test]
    fn round_trips_through_a_cluster() {
        let entries = vec![
            DirectoryEntry::new("a.txt", "rwxrwxrwx", FILE_TYPE_FILE, 400, 1),
            DirectoryEntry::new("sub", "rwxrwxrwx", FILE_TYPE_DIRECTORY, 150, 4),
        ];
        let bytes = encode_entries(&entries, 150);
        let decoded = decode_entries(&bytes, 3);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].name(), "a.txt");
        assert_eq!(decoded[0].first_cluster(), 1);
        assert_eq!(decoded[1].name(), "sub");
        assert!(decoded[1].is_directory());
    }

    #[test]
    fn empty_slots_are_not_present() {
        let entries = vec![DirectoryEntry::new("a.txt", "", FILE_TYPE_FILE, 1, 1)];
        let bytes = encode_entries(&entries, 150);
        let decoded = decode_entries(&bytes, 3);
        assert_eq!(decoded.len(), 1);
    }
}
