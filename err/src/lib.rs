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

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] IoError),
    #[error("FS: {0}")]
    Fs(#[from] FsError),
}

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("host file error: {0}")]
    Host(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("superblock is damaged")]
    Damaged,
    #[error("FAT chain is inconsistent")]
    InconsistentFat,
    #[error("path not found")]
    NotFound,
    #[error("name already exists")]
    Exists,
    #[error("directory is full")]
    Full,
    #[error("no free cluster available")]
    NoSpace,
    #[error("directory is not empty")]
    NotEmpty,
}

pub type Result<T> = core::result::Result<T, Error>;
