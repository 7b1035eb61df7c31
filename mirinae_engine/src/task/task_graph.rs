/// TaskGraph - a DAG of frame work units
///
/// Nodes are added with `add_task` / `add_fn` / `add_fence` and wired with
/// `succeed(task, predecessor)`. A handle only works with the graph that
/// created it. Cycles are reported by `topological_order`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::error::{Error, Result};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// A unit of frame work
///
/// `prepare` runs serially on the submitting thread before any node of the
/// graph is scheduled (snapshot registry state there). `execute` runs on a
/// worker once every predecessor returned.
pub trait Task: Send + Sync {
    fn prepare(&mut self) {}

    fn execute(&self);
}

struct FnTask<F>(F);

impl<F: Fn() + Send + Sync> Task for FnTask<F> {
    fn execute(&self) {
        (self.0)()
    }
}

/// Marker node that does no work; joined on to wait for its predecessors
struct FenceTask;

impl Task for FenceTask {
    fn execute(&self) {}
}

/// Handle to a node of one specific graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    graph_id: u64,
    index: usize,
}

impl TaskHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn graph_id(&self) -> u64 {
        self.graph_id
    }
}

pub(crate) struct TaskNode<'a> {
    pub(crate) name: String,
    pub(crate) task: Box<dyn Task + 'a>,
    pub(crate) predecessors: Vec<usize>,
}

/// Dependency graph of tasks borrowing data for `'a`
pub struct TaskGraph<'a> {
    id: u64,
    pub(crate) nodes: Vec<TaskNode<'a>>,
}

impl<'a> TaskGraph<'a> {
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn add_task(&mut self, name: impl Into<String>, task: Box<dyn Task + 'a>) -> TaskHandle {
        self.nodes.push(TaskNode {
            name: name.into(),
            task,
            predecessors: Vec::new(),
        });
        TaskHandle { graph_id: self.id, index: self.nodes.len() - 1 }
    }

    /// Add a closure as a task with an empty `prepare`
    pub fn add_fn<F>(&mut self, name: impl Into<String>, body: F) -> TaskHandle
    where
        F: Fn() + Send + Sync + 'a,
    {
        self.add_task(name, Box::new(FnTask(body)))
    }

    /// Add a node that does no work
    pub fn add_fence(&mut self, name: impl Into<String>) -> TaskHandle {
        self.add_task(name, Box::new(FenceTask))
    }

    /// Make `task` run only after `predecessor` returned
    pub fn succeed(&mut self, task: TaskHandle, predecessor: TaskHandle) -> Result<()> {
        let task = self.check(task)?;
        let predecessor = self.check(predecessor)?;
        if task == predecessor {
            return Err(Error::GraphCycle(format!("'{}' depends on itself", self.nodes[task].name)));
        }
        let preds = &mut self.nodes[task].predecessors;
        if !preds.contains(&predecessor) {
            preds.push(predecessor);
        }
        Ok(())
    }

    /// `task` succeeds every handle in `predecessors`
    pub fn succeed_all(&mut self, task: TaskHandle, predecessors: &[TaskHandle]) -> Result<()> {
        for &predecessor in predecessors {
            self.succeed(task, predecessor)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn name(&self, handle: TaskHandle) -> Option<&str> {
        self.check(handle).ok().map(|i| self.nodes[i].name.as_str())
    }

    pub(crate) fn check(&self, handle: TaskHandle) -> Result<usize> {
        if handle.graph_id != self.id || handle.index >= self.nodes.len() {
            return Err(Error::InvalidResource(format!(
                "task handle {} does not belong to graph {}",
                handle.index, self.id
            )));
        }
        Ok(handle.index)
    }

    /// Successor lists derived from the predecessor edges
    pub(crate) fn successors(&self) -> Vec<Vec<usize>> {
        let mut successors = vec![Vec::new(); self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            for &pred in &node.predecessors {
                successors[pred].push(index);
            }
        }
        successors
    }

    /// Kahn's algorithm; fails with `Error::GraphCycle` naming the nodes left over
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let successors = self.successors();
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(index) = queue.pop_front() {
            order.push(index);
            for &succ in &successors[index] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    queue.push_back(succ);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, &d)| d > 0)
                .map(|(i, _)| self.nodes[i].name.as_str())
                .collect();
            return Err(Error::GraphCycle(stuck.join(", ")));
        }
        Ok(order)
    }
}

impl Default for TaskGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "task_graph_tests.rs"]
mod tests;
