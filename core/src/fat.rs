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

/// Cluster allocation table sentinels (spec.md §3.2).
pub const UNUSED: u32 = 65535;
pub const FILE_END: u32 = 65534;
pub const BAD: u32 = 65533;
pub const DIRECTORY_CONTENT: u32 = 65532;

/// First cluster index usable for file data; cluster 0 is the root directory.
pub const FIRST_CONTENT_INDEX: u32 = 1;

pub const SLOT_WIDTH: usize = 4;

pub fn is_sentinel(value: u32) -> bool {
    matches!(value, UNUSED | FILE_END | BAD | DIRECTORY_CONTENT)
}

/// Decodes one FAT copy's raw little-endian bytes into the canonical
/// in-memory representation.
///
/// Design Notes §9: the source keeps one array per mirror and writes to
/// every one of them on each mutation; here only the primary copy is kept
/// resident, and mirrors are generated from it on `save` (see
/// [`encode_copies`]).
pub fn decode(bytes: &[u8], cluster_count: u32) -> Vec<u32> {
    assert!(bytes.len() >= cluster_count as usize * SLOT_WIDTH);
    bytes
        .chunks_exact(SLOT_WIDTH)
        .take(cluster_count as usize)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

pub fn encode(fat: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(fat.len() * SLOT_WIDTH);
    for &slot in fat {
        out.extend_from_slice(&slot.to_le_bytes());
    }
    out
}

/// Produces `fat_copies` identical byte-encodings of the canonical FAT, for
/// `write_fat_all`/`save`.
pub fn encode_copies(fat: &[u32], fat_copies: u32) -> Vec<u8> {
    let one = encode(fat);
    let mut out = Vec::with_capacity(one.len() * fat_copies as usize);
    for _ in 0..fat_copies {
        out.extend_from_slice(&one);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let fat = vec![FILE_END, 2, 3, UNUSED, DIRECTORY_CONTENT];
        let bytes = encode(&fat);
        assert_eq!(decode(&bytes, fat.len() as u32), fat);
    }

    #[test]
    fn copies_are_identical() {
        let fat = vec![FILE_END, UNUSED];
        let copies = encode_copies(&fat, 3);
        let one_len = encode(&fat).len();
        assert_eq!(copies.len(), one_len * 3);
        for chunk in copies.chunks(one_len) {
            assert_eq!(decode(chunk, fat.len() as u32), fat);
        }
    }
}
