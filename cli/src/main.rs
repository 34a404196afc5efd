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

//! `<program> <image_path> <action> [args…]` (spec.md §6.2).
//!
//! No argument-parsing crate: the action set is nine fixed single-letter
//! flags, matched directly against `std::env::args()` the way
//! `original_source/src/main.cpp` does.

use std::sync::Arc;

use fatimg_core::{fat, util::cstr_to_string, Defragmenter, Volume};
use fatimg_err::{IoError, Result};
use fatimg_io_std::FileImageStorage;
use fatimg_workerpool::{SyncPool, ThreadPool};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} <image_path> <action> [args...]", args.first().map(String::as_str).unwrap_or("fatimg"));
        std::process::exit(1);
    }

    let image_path = &args[1];
    let action = args[2].as_str();
    let rest = &args[3..];

    if let Err(err) = dispatch(image_path, action, rest) {
        println!("{err}");
    }
}

fn dispatch(image_path: &str, action: &str, rest: &[String]) -> Result<()> {
    match action {
        "-n" => {
            let volume = Volume::open(FileImageStorage::open(image_path)?);
            volume.create_empty_fat()?;
            volume.save()
        }
        "-a" => {
            let (host_path, dest) = two_args(rest);
            let volume = open_and_load(image_path)?;
            let host_bytes = std::fs::read(host_path).map_err(IoError::Host)?;
            volume.insert_file(dest, &host_bytes)?;
            volume.save()
        }
        "-f" => {
            let path = one_arg(rest);
            let volume = open_and_load(image_path)?;
            volume.delete_file(path)?;
            volume.save()
        }
        "-c" => {
            let path = one_arg(rest);
            let volume = open_and_load(image_path)?;
            let entry = volume.find_file_descriptor(path)?;
            let clusters = volume.clusters_of(&entry)?;
            print!("{path}: ");
            for cluster in clusters {
                print!("{cluster}, ");
            }
            println!();
            Ok(())
        }
        "-m" => {
            let (parent, name) = two_args(rest);
            let volume = open_and_load(image_path)?;
            volume.create_directory(parent, name)?;
            volume.save()
        }
        "-r" => {
            let path = one_arg(rest);
            let volume = open_and_load(image_path)?;
            volume.delete_directory(path)?;
            volume.save()
        }
        "-l" => {
            let path = one_arg(rest);
            let volume = open_and_load(image_path)?;
            let entry = volume.find_file_descriptor(path)?;
            for cluster in volume.clusters_of(&entry)? {
                println!("{}", cstr_to_string(&volume.read_cluster(cluster)?));
            }
            Ok(())
        }
        "-p" => {
            let volume = Arc::new(open_and_load(image_path)?);
            let defrag = Defragmenter::build(volume, Arc::new(SyncPool))?;
            print!("{}", defrag.print_tree());
            Ok(())
        }
        "-b" => {
            let volume = Arc::new(open_and_load(image_path)?);
            let pool = Arc::new(ThreadPool::with_default_size());
            let mut defrag = Defragmenter::build(volume, pool)?;
            defrag.run_defragmentation()
        }
        "-d" => dump(&open_and_load(image_path)?),
        _ => {
            println!("done");
            Ok(())
        }
    }
}

fn open_and_load(image_path: &str) -> Result<Volume<FileImageStorage>> {
    let volume = Volume::open(FileImageStorage::open(image_path)?);
    volume.load()?;
    Ok(volume)
}

fn one_arg(rest: &[String]) -> &str {
    match rest.first() {
        Some(v) => v,
        None => {
            eprintln!("not enough arguments for this action");
            std::process::exit(1);
        }
    }
}

fn two_args(rest: &[String]) -> (&str, &str) {
    match (rest.first(), rest.get(1)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            eprintln!("not enough arguments for this action");
            std::process::exit(1);
        }
    }
}

/// `-d`: superblock, root directory, then every in-use cluster whose
/// payload isn't empty (`printBootRecord`/`printRootDirectories`/
/// `printClustersContent`).
fn dump(volume: &Volume<FileImageStorage>) -> Result<()> {
    let sb = volume.superblock_snapshot();
    println!("--------------------------------------------------------");
    println!("BOOT RECORD");
    println!("--------------------------------------------------------");
    println!("volume_descriptor: {}", sb.volume_descriptor_str());
    println!("fat_type: {}", sb.fat_type.get());
    println!("fat_copies: {}", sb.fat_copies());
    println!("cluster_size: {}", sb.cluster_size());
    println!(
        "root_directory_max_entries_count: {}",
        sb.root_directory_max_entries_count()
    );
    println!("cluster_count: {}", sb.cluster_count());
    println!("reserved_cluster_count: {}", sb.reserved_cluster_count.get());
    println!("signature: {}", sb.signature_str());

    println!("--------------------------------------------------------");
    println!("ROOT DIRECTORY");
    println!("--------------------------------------------------------");
    for entry in volume.root_entries() {
        println!("file_name: {}", entry.name());
        println!("file_mode: {}", entry.mode());
        println!("file_type: {}", if entry.is_directory() { 2 } else { 1 });
        println!("file_size: {}", entry.file_size());
        println!("first_cluster: {}", entry.first_cluster());
    }

    println!("--------------------------------------------------------");
    println!("CLUSTERS CONTENT");
    println!("--------------------------------------------------------");
    let fat_table = volume.fat_snapshot();
    for n in fat::FIRST_CONTENT_INDEX..sb.cluster_count() {
        let slot = fat_table[n as usize];
        if matches!(slot, fat::BAD | fat::UNUSED | fat::DIRECTORY_CONTENT) {
            continue;
        }
        let bytes = volume.read_cluster(n)?;
        if bytes.first() == Some(&0) {
            continue;
        }
        println!("Cluster {n}: {}", cstr_to_string(&bytes));
    }
    Ok(())
}
