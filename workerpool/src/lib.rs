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

//! A small bounded fork-join thread pool.
//!
//! Ported from the original `ThreadPool`/`ThreadSafeQueue` pair: a
//! condvar-guarded job queue feeding a fixed set of worker threads, plus a
//! `TaskFuture`-style handle that blocks on drop if nobody joined it.
//! The addition over the original is `try_acquire`, which the defragmenter's
//! tree loader probes before deciding whether to fork a directory subtree
//! onto the pool or recurse inline in the caller's thread (spec.md §4.3.1,
//! §5).

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc, Arc, Condvar, Mutex,
    },
    thread::JoinHandle as StdJoinHandle,
};

use log::trace;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// The narrow interface the core consumes: submit a job, or probe whether a
/// slot is free before forking one at all.
pub trait TaskPool {
    /// Reserve one slot of the pool's capacity. Returns `false` when the
    /// pool is saturated, in which case the caller should run the work
    /// inline instead of submitting it.
    fn try_acquire(&self) -> bool;

    /// Run `job` on the pool, consuming a slot reserved by `try_acquire`.
    /// The slot is released once `job` returns.
    fn submit<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static;
}

/// Blocks on drop if the result was never collected with [`TaskHandle::join`],
/// matching the original `TaskFuture`'s "wait for execution to finish before
/// going out of scope" behavior.
pub struct TaskHandle<T> {
    receiver: Option<mpsc::Receiver<T>>,
}

impl<T> TaskHandle<T> {
    pub fn join(mut self) -> T {
        self.receiver
            .take()
            .expect("join called twice")
            .recv()
            .expect("worker dropped without sending a result")
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            let _ = receiver.recv();
        }
    }
}

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    condvar: Condvar,
    done: AtomicBool,
    free_slots: AtomicUsize,
}

/// A fixed-size pool of worker threads draining a shared job queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<StdJoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            done: AtomicBool::new(false),
            free_slots: AtomicUsize::new(num_threads),
        });

        trace!("starting thread pool with {num_threads} workers");
        let workers = (0..num_threads)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || worker_loop(shared))
            })
            .collect();

        Self { shared, workers }
    }

    /// Sizes the pool to the host's available parallelism, like the
    /// original's default constructor (`hardware_concurrency() - 1`).
    pub fn with_default_size() -> Self {
        let n = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .saturating_sub(1)
            .max(1);
        Self::new(n)
    }
}

impl TaskPool for ThreadPool {
    fn try_acquire(&self) -> bool {
        self.shared
            .free_slots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |slots| {
                slots.checked_sub(1)
            })
            .is_ok()
    }

    fn submit<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let shared = self.shared.clone();
        let wrapped: Job = Box::new(move || {
            let result = job();
            let _ = tx.send(result);
            shared.free_slots.fetch_add(1, Ordering::SeqCst);
        });

        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(wrapped);
        self.shared.condvar.notify_one();
        drop(queue);

        TaskHandle {
            receiver: Some(rx),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.done.store(true, Ordering::SeqCst);
        self.shared.condvar.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let mut queue = shared.queue.lock().unwrap();
        loop {
            if let Some(job) = queue.pop_front() {
                drop(queue);
                job();
                break;
            }
            if shared.done.load(Ordering::SeqCst) {
                return;
            }
            queue = shared.condvar.wait(queue).unwrap();
        }
    }
}

/// A `TaskPool` that never has a free slot, so every caller falls back to
/// synchronous recursion. Useful for tests and single-threaded callers that
/// still want to share the defragmenter's loader code path.
pub struct SyncPool;

impl TaskPool for SyncPool {
    fn try_acquire(&self) -> bool {
        false
    }

    fn submit<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(job());
        TaskHandle {
            receiver: Some(rx),
        }
    }
}
