//! Graph executor
//!
//! Walks a frozen selection of the action graph in dependency order,
//! dispatching node execution to registered handlers with bounded
//! concurrency. A node runs only once all of its direct dependencies reached
//! a terminal state; failures propagate forward as skips while unrelated
//! branches continue. Before invoking a handler the executor consults the
//! result cache for the node's current version. A handler panic is caught
//! and recorded as that node's failure, so the run always drains to a
//! complete report.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use crate::action::{
    ActionConfig, ActionHandler, ActionKind, ActionOutputs, ActionRef, HandlerRegistry,
};
use crate::engine::cache::ResultCache;
use crate::engine::graph::{Graph, NodeId};
use crate::engine::result::{ExecutionResult, NodeState, Report, SkipReason};
use crate::engine::select::SelectionSet;
use crate::engine::version::Version;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("No handler registered for '{0}' actions")]
    MissingHandler(ActionKind),
}

/// Execution tuning knobs
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Upper bound on concurrently running handlers
    pub max_concurrent: usize,

    /// Bypass the result cache and re-run every node
    pub force: bool,

    /// Stop dispatching new nodes after the first failure
    pub fail_fast: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            force: false,
            fail_fast: false,
        }
    }
}

/// Executes a selection against the graph via registered handlers
pub struct Executor {
    options: ExecutorOptions,
    handlers: HandlerRegistry,
    cache: Option<Arc<dyn ResultCache>>,
}

/// Everything a spawned node task needs, detached from the graph borrow
struct NodeTask {
    id: NodeId,
    key: ActionRef,
    config: Arc<ActionConfig>,
    version: Version,
    dependency_refs: Vec<ActionRef>,
    deps_in_selection: Vec<NodeId>,
    handler: Arc<dyn ActionHandler>,
}

impl Executor {
    pub fn new(handlers: HandlerRegistry) -> Self {
        Self {
            options: ExecutorOptions::default(),
            handlers,
            cache: None,
        }
    }

    pub fn options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Execute `selection` to completion
    pub async fn execute(
        &self,
        graph: &Graph,
        selection: &SelectionSet,
    ) -> Result<Report, ExecutorError> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.execute_cancellable(graph, selection, cancel_rx).await
    }

    /// Execute `selection`, stopping early when `cancel` flips to true
    ///
    /// In-flight handlers are raced against the signal; nodes that have not
    /// started are marked skipped, and nodes already ready keep their
    /// results.
    #[instrument(skip_all, fields(selected = selection.len()))]
    pub async fn execute_cancellable(
        &self,
        graph: &Graph,
        selection: &SelectionSet,
        cancel: watch::Receiver<bool>,
    ) -> Result<Report, ExecutorError> {
        let total = selection.len();
        info!("Executing {} of {} actions", total, graph.len());

        let selected: HashSet<NodeId> = selection.ids().collect();
        let mut tasks: HashMap<NodeId, NodeTask> = HashMap::with_capacity(total);
        let mut remaining: HashMap<NodeId, usize> = HashMap::with_capacity(total);
        let mut dependents_in_selection: HashMap<NodeId, Vec<NodeId>> =
            HashMap::with_capacity(total);

        for id in selection.ids() {
            let node = graph.node(id);
            let kind = node.config().kind;
            let handler = self
                .handlers
                .get(kind)
                .ok_or(ExecutorError::MissingHandler(kind))?;

            // Dependencies outside the selection are treated as already
            // satisfied (skip-dependencies mode asserts results exist)
            let deps_in_selection: Vec<NodeId> = node
                .dependencies()
                .iter()
                .copied()
                .filter(|dep| selected.contains(dep))
                .collect();
            remaining.insert(id, deps_in_selection.len());
            for &dep in &deps_in_selection {
                dependents_in_selection.entry(dep).or_default().push(id);
            }

            tasks.insert(
                id,
                NodeTask {
                    id,
                    key: node.reference(),
                    config: Arc::new(node.config().clone()),
                    version: graph.resolve_version_by_id(id),
                    dependency_refs: node
                        .dependencies()
                        .iter()
                        .map(|&dep| graph.node(dep).reference())
                        .collect(),
                    deps_in_selection,
                    handler,
                },
            );
        }

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent.max(1)));
        let (complete_tx, mut complete_rx) =
            mpsc::channel::<(NodeId, ExecutionResult)>(total.max(1));

        let mut results: HashMap<NodeId, ExecutionResult> = HashMap::with_capacity(total);
        let mut frontier: Vec<NodeId> = selection
            .ids()
            .filter(|id| remaining[id] == 0)
            .collect();
        let mut any_failed = false;

        while results.len() < total {
            while let Some(id) = frontier.pop() {
                let task = tasks.remove(&id).expect("node dispatched twice");

                if *cancel.borrow() {
                    warn!(action = %task.key, "Skipping action: run cancelled");
                    let result = skipped(&task, SkipReason::Cancelled);
                    complete(
                        result,
                        &dependents_in_selection,
                        &mut remaining,
                        &mut frontier,
                        &mut results,
                        id,
                    );
                    continue;
                }

                if self.options.fail_fast && any_failed {
                    warn!(action = %task.key, "Skipping action: fail-fast after earlier failure");
                    let result = skipped(&task, SkipReason::Aborted);
                    complete(
                        result,
                        &dependents_in_selection,
                        &mut remaining,
                        &mut frontier,
                        &mut results,
                        id,
                    );
                    continue;
                }

                if let Some(reason) = skip_cause(&task, &results) {
                    warn!(action = %task.key, ?reason, "Skipping action: dependency failed");
                    let result = skipped(&task, reason);
                    complete(
                        result,
                        &dependents_in_selection,
                        &mut remaining,
                        &mut frontier,
                        &mut results,
                        id,
                    );
                    continue;
                }

                self.spawn_node(
                    task,
                    &results,
                    semaphore.clone(),
                    complete_tx.clone(),
                    cancel.clone(),
                );
            }

            if results.len() == total {
                break;
            }

            match complete_rx.recv().await {
                Some((id, result)) => {
                    if result.state == NodeState::Failed {
                        any_failed = true;
                    }
                    complete(
                        result,
                        &dependents_in_selection,
                        &mut remaining,
                        &mut frontier,
                        &mut results,
                        id,
                    );
                }
                None => break,
            }
        }

        let report = Report::aggregate(results.into_values());
        info!(
            success = report.success,
            ready = report.ready_keys().len(),
            failed = report.failed_keys().len(),
            skipped = report.skipped_keys().len(),
            "Execution finished"
        );
        Ok(report)
    }

    fn spawn_node(
        &self,
        task: NodeTask,
        results: &HashMap<NodeId, ExecutionResult>,
        semaphore: Arc<Semaphore>,
        complete_tx: mpsc::Sender<(NodeId, ExecutionResult)>,
        cancel: watch::Receiver<bool>,
    ) {
        // Snapshot ready dependency outputs before moving into the task
        let dependency_outputs: HashMap<String, ActionOutputs> = task
            .deps_in_selection
            .iter()
            .filter_map(|dep| results.get(dep))
            .filter(|result| result.is_ready())
            .map(|result| (result.key.key(), result.outputs.clone()))
            .collect();

        let cache = self.cache.clone();
        let force = self.options.force;

        tokio::spawn(async move {
            let _permit = semaphore.acquire().await.unwrap();

            if !force {
                if let Some(cache) = &cache {
                    if let Some(outputs) = cache.lookup(&task.key, &task.version).await {
                        debug!(action = %task.key, version = %task.version, "Restored from cache");
                        let result = terminal(&task, NodeState::Ready, outputs, None, None, true);
                        let _ = complete_tx.send((task.id, result)).await;
                        return;
                    }
                }
            }

            info!(action = %task.key, version = %task.version, "Running action");
            // catch_unwind guarantees the completion send below happens even
            // when the handler panics; a lost completion would stall the
            // dispatch loop
            let run = std::panic::AssertUnwindSafe(task.handler.execute(
                &task.config,
                task.version.as_str(),
                &dependency_outputs,
            ))
            .catch_unwind();
            let outcome = tokio::select! {
                _ = wait_cancelled(cancel) => None,
                outcome = run => Some(outcome),
            };

            let result = match outcome {
                None => {
                    warn!(action = %task.key, "Action cancelled mid-flight");
                    skipped(&task, SkipReason::Cancelled)
                }
                Some(Ok(Ok(outputs))) => {
                    if let Some(cache) = &cache {
                        cache.store(&task.key, &task.version, &outputs).await;
                    }
                    terminal(&task, NodeState::Ready, outputs, None, None, false)
                }
                Some(Ok(Err(e))) => {
                    error!(action = %task.key, "Action failed: {:#}", e);
                    terminal(
                        &task,
                        NodeState::Failed,
                        ActionOutputs::new(),
                        Some(format!("{:#}", e)),
                        None,
                        false,
                    )
                }
                Some(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    error!(action = %task.key, "Action failed: {}", message);
                    terminal(
                        &task,
                        NodeState::Failed,
                        ActionOutputs::new(),
                        Some(message),
                        None,
                        false,
                    )
                }
            };

            let _ = complete_tx.send((task.id, result)).await;
        });
    }
}

/// Record a terminal result and release any dependents whose last unfinished
/// dependency this was
fn complete(
    result: ExecutionResult,
    dependents_in_selection: &HashMap<NodeId, Vec<NodeId>>,
    remaining: &mut HashMap<NodeId, usize>,
    frontier: &mut Vec<NodeId>,
    results: &mut HashMap<NodeId, ExecutionResult>,
    id: NodeId,
) {
    results.insert(id, result);
    if let Some(dependents) = dependents_in_selection.get(&id) {
        for &dependent in dependents {
            let count = remaining.get_mut(&dependent).expect("unknown dependent");
            *count -= 1;
            if *count == 0 {
                frontier.push(dependent);
            }
        }
    }
}

/// Why `task` must be skipped, given its dependencies' terminal states
///
/// A failed dependency names itself as the cause; a skipped dependency
/// forwards the original failing ancestor so the report shows a coherent
/// failure chain.
fn skip_cause(task: &NodeTask, results: &HashMap<NodeId, ExecutionResult>) -> Option<SkipReason> {
    let mut cause = None;
    for dep in &task.deps_in_selection {
        let result = results.get(dep).expect("dependency not terminal");
        match result.state {
            NodeState::Failed => {
                return Some(SkipReason::DependencyFailed(result.key.clone()));
            }
            NodeState::Skipped if cause.is_none() => {
                cause = Some(match &result.skip_reason {
                    Some(SkipReason::DependencyFailed(root)) => {
                        SkipReason::DependencyFailed(root.clone())
                    }
                    Some(other) => other.clone(),
                    None => SkipReason::DependencyFailed(result.key.clone()),
                });
            }
            _ => {}
        }
    }
    cause
}

fn terminal(
    task: &NodeTask,
    state: NodeState,
    outputs: ActionOutputs,
    error: Option<String>,
    skip_reason: Option<SkipReason>,
    cached: bool,
) -> ExecutionResult {
    ExecutionResult {
        key: task.key.clone(),
        state,
        version: task.version.clone(),
        outputs,
        error,
        skip_reason,
        dependencies: task.dependency_refs.clone(),
        cached,
        completed_at: Utc::now(),
    }
}

/// Render a caught panic payload into the node's recorded failure message
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

fn skipped(task: &NodeTask, reason: SkipReason) -> ExecutionResult {
    terminal(
        task,
        NodeState::Skipped,
        ActionOutputs::new(),
        None,
        Some(reason),
        false,
    )
}

/// Resolves when the cancel signal flips to true; never resolves if the
/// sender is dropped without cancelling
async fn wait_cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}
