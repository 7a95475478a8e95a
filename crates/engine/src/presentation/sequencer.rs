use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::phase::{CancelToken, Phase, PhaseContext, PhaseKind, PhaseStatus};

/// A queued entry of a sequence. A slot without a body is skipped with a warning.
pub struct PhaseSlot {
    label: String,
    body: Option<Box<dyn Phase>>,
}

impl PhaseSlot {
    pub fn new(phase: impl Phase + 'static) -> Self {
        Self {
            label: phase.label().to_string(),
            body: Some(Box::new(phase)),
        }
    }

    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            body: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for PhaseSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseSlot")
            .field("label", &self.label)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    /// Was in flight when the sequence was cancelled, aborted or superseded.
    Interrupted,
    /// Never ran.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    pub label: String,
    pub kind: Option<PhaseKind>,
    pub outcome: PhaseOutcome,
    pub finalizer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    Running,
    Finalizing,
    Completed,
    Cancelled,
    Aborted,
}

impl SequenceState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Finalizing)
    }
}

/// Runs one ordered phase list at a time for a single owner.
///
/// A skip request settles the in-flight phase, drops the rest of the queue and
/// runs the finalizer list exactly once. A phase that reports itself as not
/// cancellable defers the skip until it finishes. Aborting settles the
/// in-flight phase and runs nothing else.
pub struct PhaseSequencer {
    owner: String,
    queue: VecDeque<PhaseSlot>,
    finalizer: Vec<PhaseSlot>,
    current: Option<Box<dyn Phase>>,
    token: CancelToken,
    skip_requested: bool,
    state: SequenceState,
    history: Vec<PhaseRecord>,
    finalizer_runs: u32,
}

impl PhaseSequencer {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            queue: VecDeque::new(),
            finalizer: Vec::new(),
            current: None,
            token: CancelToken::default(),
            skip_requested: false,
            state: SequenceState::Idle,
            history: Vec::new(),
            finalizer_runs: 0,
        }
    }

    /// Starts a new sequence. A sequence still in flight on this owner is
    /// cancelled first; its current phase is dropped where it stands.
    pub fn start(&mut self, phases: Vec<PhaseSlot>, finalizer: Vec<PhaseSlot>) {
        if self.state.is_active() {
            self.token.cancel();
            if let Some(phase) = self.current.take() {
                self.record(phase.label(), Some(phase.kind()), PhaseOutcome::Interrupted);
            }
            self.drop_queue();
            info!(owner = self.owner.as_str(), "sequence_superseded");
        }

        self.queue = phases.into();
        self.finalizer = finalizer;
        self.current = None;
        self.token = CancelToken::default();
        self.skip_requested = false;
        self.history.clear();
        self.finalizer_runs = 0;
        self.state = SequenceState::Running;
        debug!(
            owner = self.owner.as_str(),
            phases = self.queue.len(),
            "sequence_started"
        );
    }

    /// Token observed at every tick. Cancelling a clone has the same effect as
    /// [`PhaseSequencer::request_cancel`].
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Requests a skip. Returns `false` if there is nothing to skip or a skip
    /// was already requested for this run.
    pub fn request_cancel(&mut self) -> bool {
        if self.state != SequenceState::Running || self.skip_requested {
            return false;
        }
        self.skip_requested = true;
        self.token.cancel();
        debug!(owner = self.owner.as_str(), "skip_requested");
        true
    }

    pub fn tick(&mut self, cx: &mut PhaseContext<'_>) -> SequenceState {
        loop {
            if !self.state.is_active() {
                return self.state;
            }

            if self.state == SequenceState::Running
                && self.token.is_cancelled()
                && self.current.as_ref().map_or(true, |phase| phase.cancellable())
            {
                self.begin_finalizer(cx);
                continue;
            }

            if self.current.is_none() {
                let Some(slot) = self.queue.pop_front() else {
                    self.finish();
                    return self.state;
                };
                match slot.body {
                    Some(body) => {
                        debug!(
                            owner = self.owner.as_str(),
                            phase = body.label(),
                            "phase_started"
                        );
                        self.current = Some(body);
                    }
                    None => {
                        warn!(
                            owner = self.owner.as_str(),
                            phase = slot.label.as_str(),
                            "phase_body_missing"
                        );
                        self.record(&slot.label, None, PhaseOutcome::Skipped);
                        continue;
                    }
                }
            }

            let Some(phase) = self.current.as_mut() else {
                continue;
            };
            let status = phase.step(cx);
            if status == PhaseStatus::Running {
                return self.state;
            }

            if let Some(phase) = self.current.take() {
                self.record(phase.label(), Some(phase.kind()), PhaseOutcome::Completed);
            }
            if status == PhaseStatus::Done {
                if self.cancel_pending() {
                    self.begin_finalizer(cx);
                } else if self.queue.is_empty() {
                    self.finish();
                }
                return self.state;
            }
        }
    }

    /// Owner destruction: settles the in-flight phase and stops without a finalizer.
    pub fn abort(&mut self, cx: &mut PhaseContext<'_>) {
        if !self.state.is_active() {
            return;
        }
        self.token.cancel();
        self.settle_current(cx);
        self.drop_queue();
        self.finalizer.clear();
        self.state = SequenceState::Aborted;
        info!(owner = self.owner.as_str(), "sequence_aborted");
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_active()
    }

    pub fn history(&self) -> &[PhaseRecord] {
        &self.history
    }

    /// Labels of the phases that ran to completion, in order.
    pub fn completed_labels(&self) -> Vec<&str> {
        self.history
            .iter()
            .filter(|record| record.outcome == PhaseOutcome::Completed)
            .map(|record| record.label.as_str())
            .collect()
    }

    pub fn finalizer_runs(&self) -> u32 {
        self.finalizer_runs
    }

    pub fn current_kind(&self) -> Option<PhaseKind> {
        self.current.as_ref().map(|phase| phase.kind())
    }

    pub fn current_label(&self) -> Option<&str> {
        self.current.as_ref().map(|phase| phase.label())
    }

    fn cancel_pending(&self) -> bool {
        self.state == SequenceState::Running && self.token.is_cancelled()
    }

    fn begin_finalizer(&mut self, cx: &mut PhaseContext<'_>) {
        self.skip_requested = true;
        let interrupted = self.current.as_ref().map(|phase| phase.label().to_string());
        self.settle_current(cx);
        let dropped = self.drop_queue();
        self.queue = std::mem::take(&mut self.finalizer).into();
        self.state = SequenceState::Finalizing;
        self.finalizer_runs += 1;
        info!(
            owner = self.owner.as_str(),
            interrupted = interrupted.as_deref().unwrap_or("none"),
            dropped,
            "sequence_skipped"
        );
    }

    fn settle_current(&mut self, cx: &mut PhaseContext<'_>) {
        if let Some(mut phase) = self.current.take() {
            phase.settle(cx);
            self.record(phase.label(), Some(phase.kind()), PhaseOutcome::Interrupted);
        }
    }

    fn drop_queue(&mut self) -> usize {
        let dropped: Vec<PhaseSlot> = self.queue.drain(..).collect();
        for slot in &dropped {
            let kind = slot.body.as_ref().map(|phase| phase.kind());
            self.record(&slot.label, kind, PhaseOutcome::Skipped);
        }
        dropped.len()
    }

    fn finish(&mut self) {
        self.state = if self.state == SequenceState::Finalizing {
            SequenceState::Cancelled
        } else {
            SequenceState::Completed
        };
        self.finalizer.clear();
        info!(
            owner = self.owner.as_str(),
            state = ?self.state,
            phases = self.history.len(),
            "sequence_finished"
        );
    }

    fn record(&mut self, label: &str, kind: Option<PhaseKind>, outcome: PhaseOutcome) {
        self.history.push(PhaseRecord {
            label: label.to_string(),
            kind,
            outcome,
            finalizer: self.state == SequenceState::Finalizing,
        });
    }
}
