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

use std::{
    fs::{File, OpenOptions},
    os::unix::fs::FileExt,
    path::Path,
};

use fatimg_err::{IoError, Result};
use fatimg_io::ImageStorage;
use log::debug;

/// `ImageStorage` backed by a single host file, opened read-write.
///
/// If the path does not exist yet it is created, matching `Volume::open`'s
/// "if open returns no file, create one" lifecycle (spec.md §4.2.1).
pub struct FileImageStorage {
    file: File,
}

impl FileImageStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(_) => {
                debug!("image {path:?} does not exist yet, creating it");
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(path)
                    .map_err(IoError::Host)?
            }
        };
        Ok(Self { file })
    }
}

impl ImageStorage for FileImageStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        self.file
            .read_exact_at(buffer, offset)
            .map_err(IoError::Host)?;
        Ok(())
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        self.file
            .write_all_at(buffer, offset)
            .map_err(IoError::Host)?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        let meta = self.file.metadata().map_err(IoError::Host)?;
        Ok(meta.len())
    }

    fn set_len(&self, len: u64) -> Result<()> {
        self.file.set_len(len).map_err(IoError::Host)?;
        Ok(())
    }
}
