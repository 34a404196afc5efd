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

//! `fatimg_core`: the on-disk layout, the directory protocol built on top
//! of it, and the defragmenter (spec.md §3-§4).

pub mod defrag;
pub mod dirent;
pub mod fat;
pub mod superblock;
pub mod tree;
pub mod util;
pub mod volume;

pub use defrag::Defragmenter;
pub use dirent::DirectoryEntry;
pub use superblock::Superblock;
pub use volume::Volume;
