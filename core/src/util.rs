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

//! Small helpers for the fixed-width, NUL-terminated C-strings the on-disk
//! records use (`volume_descriptor`, `signature`, `file_name`, `file_mode`).

pub fn cstr_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Writes `src` into `dst`, NUL-terminating and zero-padding the rest.
/// Truncates `src` to `dst.len() - 1` bytes if it doesn't fit.
pub fn write_cstr(dst: &mut [u8], src: &str) {
    dst.fill(0);
    let max = dst.len().saturating_sub(1);
    let n = src.len().min(max);
    dst[..n].copy_from_slice(&src.as_bytes()[..n]);
}
