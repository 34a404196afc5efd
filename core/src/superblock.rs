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
    little_endian::{I32, U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

use crate::util::{cstr_to_string, write_cstr};

/// Fixed record at offset 0 of the image (spec.md §3.1).
///
/// Expressed with `zerocopy`'s little-endian scalar wrappers rather than
/// `repr(packed)`: those wrappers are byte arrays underneath (`align(1)`),
/// so the struct has no inter-field padding without any unaligned-reference
/// hazard, the same technique `hyrax_fs_fat`'s `BootSector` uses for its BPB.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Superblock {
    pub volume_descriptor: [u8; 251],
    pub fat_type: I32,
    pub fat_copies: I32,
    pub cluster_size: U32,
    pub root_directory_max_entries_count: U64,
    pub cluster_count: U32,
    pub reserved_cluster_count: U32,
    pub signature: [u8; 4],
}

pub const SIGNATURE_OK: &[u8; 4] = b"OK\0\0";
pub const SIGNATURE_NOK: &[u8; 4] = b"NOK\0";
pub const SIGNATURE_FAI: &[u8; 4] = b"FAI\0";

/// Defaults mirroring the original `Fat` class constants: FAT12, two
/// mirrored copies, 150-byte clusters, 10 reserved clusters, three entries
/// per directory.
pub const DEFAULT_FAT_TYPE: i32 = 12;
pub const DEFAULT_FAT_COPIES: i32 = 2;
pub const DEFAULT_CLUSTER_SIZE: u32 = 150;
pub const DEFAULT_RESERVED_CLUSTER_COUNT: u32 = 10;
pub const DEFAULT_ROOT_DIRECTORY_MAX_ENTRIES_COUNT: u64 = 3;

impl Superblock {
    /// Builds the default superblock `createEmptyFat` writes for a fresh
    /// image (spec.md §3.1 "Default construction values").
    pub fn fresh() -> Self {
        let cluster_count = (1u32 << DEFAULT_FAT_TYPE) - DEFAULT_RESERVED_CLUSTER_COUNT;

        let mut volume_descriptor = [0u8; 251];
        write_cstr(&mut volume_descriptor, "Empty volume");

        Self {
            volume_descriptor,
            fat_type: I32::new(DEFAULT_FAT_TYPE),
            fat_copies: I32::new(DEFAULT_FAT_COPIES),
            cluster_size: U32::new(DEFAULT_CLUSTER_SIZE),
            root_directory_max_entries_count: U64::new(
                DEFAULT_ROOT_DIRECTORY_MAX_ENTRIES_COUNT,
            ),
            cluster_count: U32::new(cluster_count),
            reserved_cluster_count: U32::new(DEFAULT_RESERVED_CLUSTER_COUNT),
            signature: *SIGNATURE_OK,
        }
    }

    /// `read_superblock` fails with `Damaged` when the very first byte of
    /// the record (the volume descriptor's leading byte) is zero
    /// (spec.md §4.1).
    pub fn is_damaged(&self) -> bool {
        self.volume_descriptor[0] == 0
    }

    pub fn fat_copies(&self) -> u32 {
        self.fat_copies.get().max(0) as u32
    }

    pub fn cluster_size(&self) -> u32 {
        self.cluster_size.get()
    }

    pub fn cluster_count(&self) -> u32 {
        self.cluster_count.get()
    }

    pub fn root_directory_max_entries_count(&self) -> u64 {
        self.root_directory_max_entries_count.get()
    }

    pub fn signature_str(&self) -> String {
        cstr_to_string(&self.signature)
    }

    pub fn volume_descriptor_str(&self) -> String {
        cstr_to_string(&self.volume_descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_superblock_matches_original_fat12_defaults() {
        let sb = Superblock::fresh();
        assert_eq!(sb.cluster_count(), 4086);
        assert_eq!(sb.cluster_size(), 150);
        assert_eq!(sb.fat_copies(), 2);
        assert_eq!(sb.root_directory_max_entries_count(), 3);
        assert_eq!(sb.signature_str(), "OK");
        assert!(!sb.is_damaged());
    }

    #[test]
    fn damaged_when_first_bytes_are_zero() {
        let mut sb = Superblock::fresh();
        sb.volume_descriptor[0] = 0;
        sb.signature = [0; 4];
        assert!(sb.is_damaged());
    }
}
