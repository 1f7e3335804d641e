//! In-process runtime: evaluates declared task graphs on a rayon pool.

use super::{ChunkStore, Handle, Input, Operation, TaskContext, TaskId};
use crate::chunk::{Chunk, ChunkId, Lifetime};
use crate::config::RuntimeConfig;
use crate::error::{ChunkError, Result};
use crate::kernels::LeafKernel;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, info, trace};

/// Nested resolution can steal deep chains of tasks onto one stack.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug)]
struct TaskEntry {
    op: Operation,
    inputs: Vec<Handle>,
    lifetime: Lifetime,
    result: Option<ChunkId>,
}

#[derive(Debug, Default)]
struct Memo {
    results: HashMap<(Operation, Vec<ChunkId>), ChunkId>,
    bytes: usize,
}

#[derive(Debug, Default)]
struct Stats {
    tasks_declared: AtomicUsize,
    tasks_executed: AtomicUsize,
    leaf_multiplies: AtomicUsize,
    memo_hits: AtomicUsize,
    chunks_registered: AtomicUsize,
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub tasks_declared: usize,
    pub tasks_executed: usize,
    pub leaf_multiplies: usize,
    pub memo_hits: usize,
    pub chunks_registered: usize,
}

/// Chunk store, task table and worker pool in one process.
///
/// Evaluation resolves a task's inputs in parallel, so the eight
/// sub-multiplies of one recursive step run concurrently while each add
/// waits for exactly its two partial products.
pub struct LocalRuntime {
    config: RuntimeConfig,
    store: ChunkStore,
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
    next_task: AtomicU64,
    memo: Mutex<Memo>,
    stats: Stats,
    pool: rayon::ThreadPool,
}

impl LocalRuntime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("chunk-worker-{}", i))
            .stack_size(WORKER_STACK_SIZE)
            .build()?;
        debug!(
            block_size = config.block_size,
            threads = config.threads,
            kernel = config.kernel.description(),
            cache = config.cache.enabled,
            "runtime started"
        );
        Ok(Self {
            config,
            store: ChunkStore::new(),
            tasks: Mutex::new(HashMap::new()),
            next_task: AtomicU64::new(0),
            memo: Mutex::new(Memo::default()),
            stats: Stats::default(),
            pool,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Store an immutable value and return its id.
    pub fn register_chunk(&self, chunk: Chunk, lifetime: Lifetime) -> Result<ChunkId> {
        let id = self.store.insert(chunk, lifetime);
        self.stats.chunks_registered.fetch_add(1, Ordering::Relaxed);
        trace!(chunk = %id.short(), ?lifetime, "registered chunk");
        Ok(id)
    }

    /// Declare a task. Nothing runs until the handle is evaluated.
    pub fn register_task(
        &self,
        op: Operation,
        inputs: &[Handle],
        lifetime: Lifetime,
    ) -> Result<Handle> {
        op.check_arity(inputs.len())?;
        let task = TaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
        self.tasks.lock().insert(
            task,
            TaskEntry {
                op,
                inputs: inputs.to_vec(),
                lifetime,
                result: None,
            },
        );
        self.stats.tasks_declared.fetch_add(1, Ordering::Relaxed);
        Ok(Handle::Task(task))
    }

    /// Resolve a handle on the worker pool, blocking until done.
    ///
    /// Evaluation consumes the handle: the task and every task it depends
    /// on leave the task table once it returns, whether or not it succeeded.
    pub fn evaluate(&self, handle: Handle) -> Result<ChunkId> {
        let result = self.pool.install(|| self.resolve(handle));
        self.forget([handle]);
        result
    }

    /// Declare `op` over `inputs` as a persistent task and evaluate it.
    pub fn execute_synchronously(&self, op: Operation, inputs: &[ChunkId]) -> Result<ChunkId> {
        let handles: Vec<Handle> = inputs.iter().copied().map(Handle::from).collect();
        let handle = self.register_task(op, &handles, Lifetime::Persistent)?;
        self.evaluate(handle)
    }

    pub fn fetch(&self, id: &ChunkId) -> Result<Arc<Chunk>> {
        self.store.get(id)
    }

    /// Release one persistent reference (or a transient chunk).
    pub fn delete(&self, id: &ChunkId) -> Result<()> {
        if self.store.remove(id)? {
            trace!(chunk = %id.short(), "deleted chunk");
        }
        Ok(())
    }

    /// Declared tasks not yet consumed by an evaluation.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Bytes of results currently held by the memo, each counted as its whole tree.
    pub fn memo_bytes(&self) -> usize {
        self.memo.lock().bytes
    }

    pub fn statistics(&self) -> StatsSnapshot {
        StatsSnapshot {
            tasks_declared: self.stats.tasks_declared.load(Ordering::Relaxed),
            tasks_executed: self.stats.tasks_executed.load(Ordering::Relaxed),
            leaf_multiplies: self.stats.leaf_multiplies.load(Ordering::Relaxed),
            memo_hits: self.stats.memo_hits.load(Ordering::Relaxed),
            chunks_registered: self.stats.chunks_registered.load(Ordering::Relaxed),
        }
    }

    pub fn reset_statistics(&self) {
        self.stats.tasks_declared.store(0, Ordering::Relaxed);
        self.stats.tasks_executed.store(0, Ordering::Relaxed);
        self.stats.leaf_multiplies.store(0, Ordering::Relaxed);
        self.stats.memo_hits.store(0, Ordering::Relaxed);
        self.stats.chunks_registered.store(0, Ordering::Relaxed);
    }

    pub fn report_statistics(&self) {
        let s = self.statistics();
        info!(
            tasks_declared = s.tasks_declared,
            tasks_executed = s.tasks_executed,
            leaf_multiplies = s.leaf_multiplies,
            memo_hits = s.memo_hits,
            chunks_registered = s.chunks_registered,
            stored_chunks = self.store.len(),
            stored_bytes = self.store.size_in_bytes(),
            "runtime statistics"
        );
    }

    fn resolve(&self, handle: Handle) -> Result<ChunkId> {
        match handle {
            Handle::Chunk(id) if self.store.contains(&id) => Ok(id),
            Handle::Chunk(id) => Err(ChunkError::UnknownChunk(id)),
            Handle::Task(task) => self.resolve_task(task),
        }
    }

    fn resolve_task(&self, task: TaskId) -> Result<ChunkId> {
        let (op, inputs, lifetime) = {
            let tasks = self.tasks.lock();
            let entry = tasks.get(&task).ok_or(ChunkError::UnknownTask(task))?;
            if let Some(id) = entry.result {
                return Ok(id);
            }
            (entry.op, entry.inputs.clone(), entry.lifetime)
        };

        let input_ids = inputs
            .par_iter()
            .map(|&h| self.resolve(h))
            .collect::<Result<Vec<_>>>()?;

        let id = match self.memo_lookup(op, &input_ids) {
            Some(id) => id,
            None => {
                let id = self.run(op, &input_ids)?;
                self.memo_store(op, input_ids, id);
                id
            }
        };

        if lifetime == Lifetime::Persistent {
            self.store.persist(&id)?;
        }
        if let Some(entry) = self.tasks.lock().get_mut(&task) {
            entry.result = Some(id);
        }
        Ok(id)
    }

    fn run(&self, op: Operation, input_ids: &[ChunkId]) -> Result<ChunkId> {
        let inputs = input_ids
            .iter()
            .map(|id| {
                Ok(Input {
                    id: *id,
                    chunk: self.store.get(id)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(op = op.name(), inputs = inputs.len(), "executing task");
        self.stats.tasks_executed.fetch_add(1, Ordering::Relaxed);

        let mut ctx = LocalContext {
            runtime: self,
            declared: Vec::new(),
        };
        let executed = op.execute(&mut ctx, &inputs);

        if executed.is_ok()
            && op == Operation::MatrixMultiply
            && inputs[0].chunk.as_matrix().is_ok_and(|m| m.is_leaf())
        {
            self.stats.leaf_multiplies.fetch_add(1, Ordering::Relaxed);
        }

        // Handles declared by a body never escape it
        let result = executed.and_then(|handle| self.resolve(handle));
        self.forget(ctx.declared);
        result
    }

    /// Drop tasks and everything they depend on from the task table.
    fn forget(&self, handles: impl IntoIterator<Item = Handle>) {
        let mut tasks = self.tasks.lock();
        let mut pending: Vec<Handle> = handles.into_iter().collect();
        while let Some(handle) = pending.pop() {
            if let Handle::Task(task) = handle {
                if let Some(entry) = tasks.remove(&task) {
                    pending.extend(entry.inputs);
                }
            }
        }
    }

    fn memo_lookup(&self, op: Operation, input_ids: &[ChunkId]) -> Option<ChunkId> {
        if !self.config.cache.enabled {
            return None;
        }
        let key = (op, input_ids.to_vec());
        let hit = self.memo.lock().results.get(&key).copied()?;
        // Deleted since it was memoized
        if !self.store.contains(&hit) {
            return None;
        }
        self.stats.memo_hits.fetch_add(1, Ordering::Relaxed);
        debug!(op = op.name(), result = %hit.short(), "memo hit");
        Some(hit)
    }

    fn memo_store(&self, op: Operation, input_ids: Vec<ChunkId>, result: ChunkId) {
        if !self.config.cache.enabled {
            return;
        }
        let size = self.store.tree_size_in_bytes(&result).unwrap_or(0);
        let mut memo = self.memo.lock();
        if let Some(limit) = self.config.cache.limit_bytes {
            if memo.bytes + size > limit {
                trace!(op = op.name(), size, limit, "memo full, not caching");
                return;
            }
        }
        if memo.results.insert((op, input_ids), result).is_none() {
            memo.bytes += size;
        }
    }
}

/// [`TaskContext`] handed to task bodies run by a [`LocalRuntime`].
struct LocalContext<'a> {
    runtime: &'a LocalRuntime,
    declared: Vec<Handle>,
}

impl TaskContext for LocalContext<'_> {
    fn block_size(&self) -> usize {
        self.runtime.config.block_size
    }

    fn kernel(&self) -> LeafKernel {
        self.runtime.config.kernel
    }

    fn contains_chunk(&self, id: &ChunkId) -> bool {
        self.runtime.store.contains(id)
    }

    fn register_chunk(&mut self, chunk: Chunk, lifetime: Lifetime) -> Result<ChunkId> {
        self.runtime.register_chunk(chunk, lifetime)
    }

    fn register_task(
        &mut self,
        op: Operation,
        inputs: &[Handle],
        lifetime: Lifetime,
    ) -> Result<Handle> {
        let handle = self.runtime.register_task(op, inputs, lifetime)?;
        self.declared.push(handle);
        Ok(handle)
    }
}
