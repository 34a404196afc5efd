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

//! Byte-range storage primitive the core builds the image layout on top of.
//!
//! Mirrors `hyrax_ds::DataStorage`'s `read`/`write` shape, widened with
//! `len`/`set_len` so `Volume::create_empty_fat` can truncate and re-grow
//! the backing file without reaching past this trait.

use fatimg_err::Result;

pub trait ImageStorage {
    /// Read exactly `buffer.len()` bytes starting at `offset`.
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;

    /// Write exactly `buffer.len()` bytes starting at `offset`.
    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()>;

    /// Current length of the backing storage, in bytes.
    fn len(&self) -> Result<u64>;

    /// Truncate or grow the backing storage to exactly `len` bytes.
    fn set_len(&self, len: u64) -> Result<()>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
