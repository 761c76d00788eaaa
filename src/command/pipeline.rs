//! Command sequencing.
//!
//! A [`TransitionTable`] binds each [`CommandId`] to one command and to the
//! commands that follow it on success and on failure. The
//! [`CommandService`] walks the table from its start command over one shared
//! context until a command leaves a state with no registered successor.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;

use super::state::DeploymentState;

/// Shared mutable state a pipeline runs over.
pub trait CommandContext: Send {
    /// Current outcome state.
    fn state(&self) -> DeploymentState;

    /// Records the outcome of the running command.
    fn set_state(&mut self, state: DeploymentState);

    /// Writes a progress line.
    fn log_status(&mut self, message: &str);

    /// Writes an error line and moves the context to
    /// [`DeploymentState::HasError`].
    fn log_error(&mut self, message: &str);
}

/// Identity of a command in a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandId {
    /// Applies or deletes manifests.
    Deploy,
    /// Installs or upgrades a release.
    HelmInstall,
    /// Rolls a release back.
    HelmRollback,
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy => write!(f, "deploy"),
            Self::HelmInstall => write!(f, "helm-install"),
            Self::HelmRollback => write!(f, "helm-rollback"),
        }
    }
}

/// One side-effecting pipeline step.
///
/// Commands never return errors: they convert internal failures into
/// [`CommandContext::log_error`], which sets the error state.
#[async_trait]
pub trait Command<C: CommandContext>: Send + Sync {
    /// Runs the step against the shared context.
    async fn execute(&self, context: &mut C);
}

/// Where the pipeline goes after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Run this command next.
    Continue(CommandId),
    /// Stop, reporting the overall result.
    Halt {
        /// Whether the pipeline succeeded.
        success: bool,
    },
}

/// A command bound to its success and failure successors.
pub struct TransitionInfo<C: CommandContext> {
    command: Arc<dyn Command<C>>,
    on_success: Option<CommandId>,
    on_fail: Option<CommandId>,
}

impl<C: CommandContext> fmt::Debug for TransitionInfo<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionInfo")
            .field("on_success", &self.on_success)
            .field("on_fail", &self.on_fail)
            .finish_non_exhaustive()
    }
}

impl<C: CommandContext> TransitionInfo<C> {
    /// Binds a command with no successors.
    #[must_use]
    pub fn new(command: Arc<dyn Command<C>>) -> Self {
        Self {
            command,
            on_success: None,
            on_fail: None,
        }
    }

    /// Sets the command run after a successful step.
    #[must_use]
    pub const fn on_success(mut self, next: CommandId) -> Self {
        self.on_success = Some(next);
        self
    }

    /// Sets the command run after an unsuccessful step.
    #[must_use]
    pub const fn on_fail(mut self, next: CommandId) -> Self {
        self.on_fail = Some(next);
        self
    }

    /// Decides the transition out of `state`.
    ///
    /// The error state halts with failure whatever successors are
    /// registered. A state with no registered successor halts with success.
    #[must_use]
    pub fn next(&self, state: DeploymentState) -> Transition {
        let successor = match state {
            DeploymentState::HasError => return Transition::Halt { success: false },
            DeploymentState::Success => self.on_success,
            DeploymentState::Unsuccessful => self.on_fail,
            DeploymentState::Unknown | DeploymentState::Running | DeploymentState::Done => None,
        };
        successor.map_or(Transition::Halt { success: true }, Transition::Continue)
    }

    fn successors(&self) -> impl Iterator<Item = CommandId> {
        self.on_success.into_iter().chain(self.on_fail)
    }
}

/// Start command plus the transition for every registered command.
pub struct TransitionTable<C: CommandContext> {
    start: Option<CommandId>,
    transitions: BTreeMap<CommandId, TransitionInfo<C>>,
}

impl<C: CommandContext> fmt::Debug for TransitionTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionTable")
            .field("start", &self.start)
            .field("transitions", &self.transitions)
            .finish()
    }
}

impl<C: CommandContext> Default for TransitionTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CommandContext> TransitionTable<C> {
    /// Creates an empty table with no start command.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            start: None,
            transitions: BTreeMap::new(),
        }
    }

    /// Sets the start command.
    pub fn set_start(&mut self, start: CommandId) {
        self.start = Some(start);
    }

    /// Registers the transition for `id`, returning any it replaces.
    pub fn insert(&mut self, id: CommandId, info: TransitionInfo<C>) -> Option<TransitionInfo<C>> {
        self.transitions.insert(id, info)
    }

    /// Start command, if set.
    #[must_use]
    pub const fn start(&self) -> Option<CommandId> {
        self.start
    }

    /// Transition registered for `id`.
    #[must_use]
    pub fn get(&self, id: CommandId) -> Option<&TransitionInfo<C>> {
        self.transitions.get(&id)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns true if no command is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Finds a cycle among the registered successor edges.
    ///
    /// Returns the commands on the cycle in edge order, starting at the
    /// first command reached twice.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<CommandId>> {
        let mut finished = BTreeSet::new();
        for &root in self.transitions.keys() {
            let mut path = Vec::new();
            if let Some(cycle) = self.visit(root, &mut path, &mut finished) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit(
        &self,
        id: CommandId,
        path: &mut Vec<CommandId>,
        finished: &mut BTreeSet<CommandId>,
    ) -> Option<Vec<CommandId>> {
        if let Some(pos) = path.iter().position(|&p| p == id) {
            return Some(path[pos..].to_vec());
        }
        if finished.contains(&id) {
            return None;
        }
        path.push(id);
        if let Some(info) = self.transitions.get(&id) {
            for next in info.successors() {
                if let Some(cycle) = self.visit(next, path, finished) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        finished.insert(id);
        None
    }
}

/// Runs transition tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandService;

impl CommandService {
    /// Creates a service.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Executes `table` from its start command over `context`.
    ///
    /// Returns false if the table is empty, has no start entry, names an
    /// unregistered successor, or a command leaves the error state.
    /// Cyclic tables are reported with a warning and run as given.
    pub async fn execute_commands<C: CommandContext>(
        &self,
        table: &TransitionTable<C>,
        context: &mut C,
    ) -> bool {
        let Some(mut current) = table.start() else {
            error!("No start command configured");
            return false;
        };
        if table.is_empty() {
            error!("No commands registered");
            return false;
        }
        if let Some(cycle) = table.find_cycle() {
            let path: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            warn!("Command graph contains a cycle: {}", path.join(" -> "));
        }

        loop {
            let Some(info) = table.get(current) else {
                let missing = PipelineError::MissingCommand {
                    command: current.to_string(),
                };
                context.log_error(&missing.to_string());
                return false;
            };

            debug!("Executing command {current}");
            context.set_state(DeploymentState::Running);
            info.command.execute(context).await;

            let state = context.state();
            match info.next(state) {
                Transition::Continue(next) => {
                    debug!("Command {current} finished with {state}, continuing with {next}");
                    current = next;
                }
                Transition::Halt { success } => {
                    info!("Command {current} finished with {state}");
                    return success;
                }
            }
        }
    }
}
