/// TaskScheduler - runs a TaskGraph on a fixed rayon worker pool
///
/// Nodes whose predecessors all returned are spawned onto the pool. Every
/// node owns a done signal: a crossbeam sender dropped when the node
/// finishes, so `GraphRun::join` is a blocking `recv` that returns on
/// disconnect.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use rayon::{Scope, ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};
use crate::task::{Task, TaskGraph, TaskHandle};

struct NodeRun<'a> {
    name: String,
    task: Box<dyn Task + 'a>,
    successors: Vec<usize>,
    pending: AtomicUsize,
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

/// A graph being executed; handed to the wait closure of `TaskScheduler::run`
pub struct GraphRun<'a> {
    graph_id: u64,
    nodes: Vec<NodeRun<'a>>,
}

impl<'a> GraphRun<'a> {
    fn node(&self, handle: TaskHandle) -> Result<&NodeRun<'a>> {
        self.nodes
            .get(handle.index())
            .filter(|_| handle.graph_id() == self.graph_id)
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "task handle {} does not belong to graph {}",
                    handle.index(),
                    self.graph_id
                ))
            })
    }

    /// Block until the node behind `handle` returned
    pub fn join(&self, handle: TaskHandle) -> Result<()> {
        let node = self.node(handle)?;
        // Nothing is ever sent; recv returns once the sender is dropped.
        let _ = node.done_rx.recv();
        Ok(())
    }

    /// Block until every node returned
    pub fn join_all(&self) {
        for node in &self.nodes {
            let _ = node.done_rx.recv();
        }
    }

    /// Non-blocking completion check
    pub fn is_done(&self, handle: TaskHandle) -> Result<bool> {
        let node = self.node(handle)?;
        Ok(matches!(node.done_rx.try_recv(), Err(TryRecvError::Disconnected)))
    }

    fn finish(&self, index: usize) {
        if let Ok(mut tx) = self.nodes[index].done_tx.lock() {
            tx.take();
        }
    }

    fn release_all(&self) {
        for index in 0..self.nodes.len() {
            self.finish(index);
        }
    }
}

/// Unblocks every joiner when a task body panics
struct ReleaseOnPanic<'r, 'a> {
    run: &'r GraphRun<'a>,
}

impl Drop for ReleaseOnPanic<'_, '_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            crate::engine_error!(
                "mirinae::TaskScheduler",
                "Task panicked, releasing every pending join"
            );
            self.run.release_all();
        }
    }
}

fn spawn_node<'s, 'a: 's>(scope: &Scope<'s>, run: &'s GraphRun<'a>, index: usize) {
    scope.spawn(move |scope| {
        let _guard = ReleaseOnPanic { run };
        let node = &run.nodes[index];
        crate::engine_trace!("mirinae::TaskScheduler", "Running task '{}'", node.name);
        node.task.execute();
        run.finish(index);

        for &succ in &node.successors {
            if run.nodes[succ].pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                spawn_node(scope, run, succ);
            }
        }
    });
}

/// Fixed-size worker pool executing task graphs
pub struct TaskScheduler {
    pool: ThreadPool,
}

impl TaskScheduler {
    /// `worker_threads == 0` lets rayon pick one thread per core
    pub fn new(worker_threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|i| format!("mirinae-worker-{}", i))
            .build()
            .map_err(|e| crate::engine_err!("mirinae::TaskScheduler", "Failed to build worker pool: {}", e))?;

        crate::engine_debug!(
            "mirinae::TaskScheduler",
            "Worker pool ready with {} threads",
            pool.current_num_threads()
        );
        Ok(Self { pool })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Execute `graph`
    ///
    /// Calls `prepare` on every node serially (in dependency order), then
    /// schedules the bodies and runs `wait` on the calling thread. Returns
    /// once `wait` returned and every node finished. Must not be called from
    /// a worker of this pool.
    pub fn run<'a, R>(
        &self,
        mut graph: TaskGraph<'a>,
        wait: impl FnOnce(&GraphRun<'a>) -> R,
    ) -> Result<R> {
        let order = graph.topological_order()?;
        for &index in &order {
            graph.nodes[index].task.prepare();
        }

        let successors = graph.successors();
        let graph_id = graph.id();
        let nodes: Vec<NodeRun<'a>> = graph
            .nodes
            .into_iter()
            .zip(successors)
            .map(|(node, successors)| {
                let (tx, rx) = crossbeam_channel::bounded(1);
                NodeRun {
                    name: node.name,
                    task: node.task,
                    pending: AtomicUsize::new(node.predecessors.len()),
                    successors,
                    done_tx: Mutex::new(Some(tx)),
                    done_rx: rx,
                }
            })
            .collect();
        let run = GraphRun { graph_id, nodes };

        let roots: Vec<usize> = run
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.pending.load(Ordering::Relaxed) == 0)
            .map(|(i, _)| i)
            .collect();

        let result = self.pool.in_place_scope(|scope| {
            for &root in &roots {
                spawn_node(scope, &run, root);
            }
            wait(&run)
        });
        Ok(result)
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
