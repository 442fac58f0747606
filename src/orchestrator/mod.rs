// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Request orchestration
//!
//! Tracks one compile target per logical component. Every dispatch gets a
//! fresh [`RequestId`] and only the response carrying the latest id for a
//! target is applied; older responses resolve their tickets as
//! [`Outcome::Superseded`]. In-flight compiles are never cancelled.
//!
//! Parameter edits are debounced: the trigger assigns the request id and
//! moves the target to loading right away, and the timer restarts on every
//! edit within the window. When it fires, the committed overrides plus all
//! pending edits are rewritten into the source and compiled once.
//!
//! All methods that dispatch work spawn tokio tasks and must be called from
//! within a runtime.

mod encoding;

pub use encoding::EncodedModel;

use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::params::{rewrite_all, Parameter, ParameterSet, RewriteOptions};
use crate::worker::{CompilationWorker, CompileRequest, CompiledModel, RequestId};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Logical compile target, e.g. a component id
pub type TargetId = String;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("unknown compile target: {0}")]
    UnknownTarget(TargetId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Idle,
    Loading,
    Error,
}

/// How a dispatched request ended, from the caller's point of view
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(EncodedModel),
    Failed(String),
    /// A newer request for the same target was dispatched first
    Superseded,
}

/// Resolves once the request's response is applied or dropped
#[derive(Debug)]
pub struct Ticket {
    id: RequestId,
    rx: oneshot::Receiver<Outcome>,
}

impl Ticket {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub async fn outcome(self) -> Outcome {
        self.rx.await.unwrap_or(Outcome::Superseded)
    }
}

/// Point-in-time view of a target
#[derive(Debug, Clone, Serialize)]
pub struct TargetSnapshot {
    pub status: TargetStatus,
    pub latest: Option<RequestId>,
    /// Last successful model; kept through later failures
    pub model: Option<EncodedModel>,
    pub error: Option<String>,
    pub source: String,
    pub committed: ParameterSet,
    pub pending: ParameterSet,
}

/// Source and defines of one dispatch, kept for retries
#[derive(Debug, Clone)]
struct Dispatch {
    source: String,
    defines: ParameterSet,
}

struct PendingEdit {
    id: RequestId,
    tx: oneshot::Sender<Outcome>,
    timer: AbortHandle,
}

struct TargetState {
    source: String,
    committed: ParameterSet,
    pending: ParameterSet,
    pending_edit: Option<PendingEdit>,
    last_dispatch: Option<Dispatch>,
    latest: Option<RequestId>,
    status: TargetStatus,
    model: Option<EncodedModel>,
    error: Option<String>,
}

impl TargetState {
    fn new(source: String) -> Self {
        Self {
            source,
            committed: ParameterSet::new(),
            pending: ParameterSet::new(),
            pending_edit: None,
            last_dispatch: None,
            latest: None,
            status: TargetStatus::Idle,
            model: None,
            error: None,
        }
    }

    /// Drop an unfired debounced edit and resolve its ticket
    fn cancel_pending(&mut self) {
        if let Some(edit) = self.pending_edit.take() {
            edit.timer.abort();
            let _ = edit.tx.send(Outcome::Superseded);
        }
        self.pending.clear();
    }

    /// Fold pending edits into the committed set and render a dispatch
    fn commit_pending(&mut self) -> Dispatch {
        let pending = std::mem::take(&mut self.pending);
        self.committed.extend(pending);
        Dispatch {
            source: self.rendered_source(),
            defines: ParameterSet::new(),
        }
    }

    fn rendered_source(&self) -> String {
        let parameters: Vec<Parameter> = self
            .committed
            .iter()
            .map(|(name, value)| Parameter::new(name.clone(), value.clone()))
            .collect();
        rewrite_all(&self.source, &parameters, RewriteOptions::injecting())
    }
}

struct Inner {
    worker: CompilationWorker,
    debounce: Duration,
    targets: DashMap<TargetId, TargetState>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(worker: CompilationWorker, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                worker,
                debounce,
                targets: DashMap::new(),
            }),
        }
    }

    /// Build the worker from `config` and use its debounce window
    pub fn from_config(config: &CompilerConfig) -> anyhow::Result<Self> {
        let worker = CompilationWorker::from_config(config)?;
        Ok(Self::new(worker, config.debounce()))
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Set a target's source without compiling it
    pub fn register(&self, target: impl Into<TargetId>, source: impl Into<String>) {
        let target = target.into();
        let source = source.into();
        self.inner
            .targets
            .entry(target)
            .and_modify(|state| state.source = source.clone())
            .or_insert_with(|| TargetState::new(source));
    }

    /// Compile `source` right away, with `overrides` as defines.
    ///
    /// Replaces the target's source and discards committed and pending edits.
    pub fn compile(
        &self,
        target: impl Into<TargetId>,
        source: impl Into<String>,
        overrides: ParameterSet,
    ) -> Ticket {
        let target = target.into();
        let dispatch = Dispatch {
            source: source.into(),
            defines: overrides,
        };
        let id = RequestId::new();
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self
                .inner
                .targets
                .entry(target.clone())
                .or_insert_with(|| TargetState::new(String::new()));
            state.cancel_pending();
            state.source = dispatch.source.clone();
            state.committed.clear();
            begin(&mut state, id, &dispatch);
        }

        self.spawn_dispatch(target, id, dispatch, tx);
        Ticket { id, rx }
    }

    /// Record a parameter edit and (re)start the debounce timer
    pub fn edit_parameter(
        &self,
        target: &str,
        parameter: Parameter,
    ) -> Result<Ticket, OrchestratorError> {
        let mut state = self
            .inner
            .targets
            .get_mut(target)
            .ok_or_else(|| OrchestratorError::UnknownTarget(target.to_string()))?;

        let id = RequestId::new();
        let (tx, rx) = oneshot::channel();

        if let Some(previous) = state.pending_edit.take() {
            previous.timer.abort();
            let _ = previous.tx.send(Outcome::Superseded);
        }
        state.pending.insert(parameter.name, parameter.value);
        state.latest = Some(id);
        state.status = TargetStatus::Loading;

        let orchestrator = self.clone();
        let key = target.to_string();
        let debounce = self.inner.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            orchestrator.fire(&key, id);
        })
        .abort_handle();

        state.pending_edit = Some(PendingEdit { id, tx, timer });
        debug!(target_id = %target, request = %id, pending = state.pending.len(), "Debouncing parameter edit");
        Ok(Ticket { id, rx })
    }

    /// Re-send the target's last dispatch under a new id.
    ///
    /// Edits still waiting on the debounce timer are committed and rendered
    /// into this dispatch instead; their ticket resolves as superseded.
    pub fn retry(&self, target: &str) -> Result<Ticket, OrchestratorError> {
        let id = RequestId::new();
        let (tx, rx) = oneshot::channel();

        let dispatch = {
            let mut state = self
                .inner
                .targets
                .get_mut(target)
                .ok_or_else(|| OrchestratorError::UnknownTarget(target.to_string()))?;
            let dispatch = if !state.pending.is_empty() {
                state.commit_pending()
            } else {
                state.last_dispatch.clone().unwrap_or_else(|| Dispatch {
                    source: state.rendered_source(),
                    defines: ParameterSet::new(),
                })
            };
            state.cancel_pending();
            begin(&mut state, id, &dispatch);
            dispatch
        };

        self.spawn_dispatch(target.to_string(), id, dispatch, tx);
        Ok(Ticket { id, rx })
    }

    pub fn snapshot(&self, target: &str) -> Option<TargetSnapshot> {
        self.inner.targets.get(target).map(|state| TargetSnapshot {
            status: state.status,
            latest: state.latest,
            model: state.model.clone(),
            error: state.error.clone(),
            source: state.source.clone(),
            committed: state.committed.clone(),
            pending: state.pending.clone(),
        })
    }

    /// Forget a target; its outstanding tickets resolve as superseded
    pub fn remove(&self, target: &str) -> bool {
        match self.inner.targets.remove(target) {
            Some((_, mut state)) => {
                state.cancel_pending();
                true
            }
            None => false,
        }
    }

    pub fn targets(&self) -> Vec<TargetId> {
        self.inner.targets.iter().map(|e| e.key().clone()).collect()
    }

    /// Debounce timer expiry: commit pending edits and dispatch
    fn fire(&self, target: &str, id: RequestId) {
        let (dispatch, tx) = {
            let Some(mut state) = self.inner.targets.get_mut(target) else {
                return;
            };
            match &state.pending_edit {
                Some(edit) if edit.id == id => {}
                _ => return,
            }
            let Some(edit) = state.pending_edit.take() else {
                return;
            };
            let dispatch = state.commit_pending();
            state.last_dispatch = Some(dispatch.clone());
            (dispatch, edit.tx)
        };

        self.spawn_dispatch(target.to_string(), id, dispatch, tx);
    }

    fn spawn_dispatch(
        &self,
        target: TargetId,
        id: RequestId,
        dispatch: Dispatch,
        tx: oneshot::Sender<Outcome>,
    ) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let request = CompileRequest {
                id,
                source: dispatch.source,
                overrides: dispatch.defines,
            };
            let result = inner.worker.compile(request).await;
            let outcome = inner.apply(&target, id, result);
            let _ = tx.send(outcome);
        });
    }
}

impl Inner {
    /// Apply a response if it is still the latest for its target
    fn apply(
        &self,
        target: &str,
        id: RequestId,
        result: Result<CompiledModel, CompileError>,
    ) -> Outcome {
        let Some(mut state) = self.targets.get_mut(target) else {
            debug!(target_id = %target, request = %id, "Dropping response for removed target");
            return Outcome::Superseded;
        };
        if state.latest != Some(id) {
            debug!(target_id = %target, request = %id, "Dropping stale response");
            return Outcome::Superseded;
        }

        match result {
            Ok(model) => {
                let encoded = EncodedModel::from_model(&model);
                state.status = TargetStatus::Idle;
                state.error = None;
                state.model = Some(encoded.clone());
                Outcome::Succeeded(encoded)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(target_id = %target, request = %id, "Compile failed: {}", message);
                state.status = TargetStatus::Error;
                state.error = Some(message.clone());
                Outcome::Failed(message)
            }
        }
    }
}

/// Mark `id` as the target's latest dispatch
fn begin(state: &mut TargetState, id: RequestId, dispatch: &Dispatch) {
    state.latest = Some(id);
    state.status = TargetStatus::Loading;
    state.last_dispatch = Some(dispatch.clone());
}
