use tracing::debug;

use crate::error::WizardError;
use crate::upload::store::UploadStore;
use crate::upload::types::UploadSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardState {
    /// Not shown.
    #[default]
    Idle,
    AtStep(usize),
    Submitting,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    Open,
    Next,
    Back,
    /// Jump back to an earlier, already completed step.
    GoTo(usize),
    Submit,
    SubmitFinished { success: bool },
    Close,
}

/// What the transition function needs to know about the slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepContext {
    pub total_steps: usize,
    pub current_filled: bool,
}

/// Pure transition function of the upload wizard.
pub fn transition(
    state: WizardState,
    event: WizardEvent,
    ctx: StepContext,
) -> Result<WizardState, WizardError> {
    let last = ctx.total_steps.saturating_sub(1);

    match (state, event) {
        (WizardState::Submitting, WizardEvent::SubmitFinished { success: true }) => {
            Ok(WizardState::Closed)
        }
        (WizardState::Submitting, WizardEvent::SubmitFinished { success: false }) => {
            Ok(WizardState::AtStep(last))
        }
        (WizardState::Submitting, WizardEvent::Close) => Err(WizardError::CloseWhileSubmitting),
        (WizardState::Submitting, _) => Err(WizardError::SubmissionInProgress),

        (_, WizardEvent::SubmitFinished { .. }) => Err(WizardError::NotSubmitting),

        (WizardState::Idle | WizardState::Closed, WizardEvent::Open) => Ok(WizardState::AtStep(0)),
        (WizardState::Idle | WizardState::Closed, WizardEvent::Close) => Ok(WizardState::Closed),
        (WizardState::Idle | WizardState::Closed, _) => Err(WizardError::NotOpen),

        (WizardState::AtStep(step), WizardEvent::Open) => Ok(WizardState::AtStep(step)),
        (WizardState::AtStep(step), WizardEvent::Next) => {
            if step >= last {
                Err(WizardError::AtLastStep)
            } else if !ctx.current_filled {
                Err(WizardError::StepEmpty(step))
            } else {
                Ok(WizardState::AtStep(step + 1))
            }
        }
        (WizardState::AtStep(step), WizardEvent::Back) => {
            if step == 0 {
                Err(WizardError::AtFirstStep)
            } else {
                Ok(WizardState::AtStep(step - 1))
            }
        }
        (WizardState::AtStep(step), WizardEvent::GoTo(target)) => {
            if target < step {
                Ok(WizardState::AtStep(target))
            } else {
                Err(WizardError::StepUnavailable(target))
            }
        }
        (WizardState::AtStep(step), WizardEvent::Submit) => {
            if step != last {
                Err(WizardError::NotLastStep)
            } else if !ctx.current_filled {
                Err(WizardError::StepEmpty(step))
            } else {
                Ok(WizardState::Submitting)
            }
        }
        (WizardState::AtStep(_), WizardEvent::Close) => Ok(WizardState::Closed),
    }
}

/// Share of the wizard completed, as a whole percentage.
pub fn progress_percent(step: usize, current_filled: bool, total_steps: usize) -> u8 {
    if total_steps == 0 {
        return 0;
    }
    let done = (step + usize::from(current_filled)).min(total_steps);
    ((done as f32 / total_steps as f32) * 100.0).round() as u8
}

/// The upload wizard: slot definitions plus the current state.
#[derive(Debug, Clone)]
pub struct StepWizard {
    slots: Vec<UploadSlot>,
    state: WizardState,
}

impl Default for StepWizard {
    fn default() -> Self {
        Self::new(UploadSlot::defaults())
    }
}

impl StepWizard {
    pub fn new(slots: Vec<UploadSlot>) -> Self {
        Self {
            slots,
            state: WizardState::Idle,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn slots(&self) -> &[UploadSlot] {
        &self.slots
    }

    pub fn total_steps(&self) -> usize {
        self.slots.len()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, WizardState::AtStep(_) | WizardState::Submitting)
    }

    pub fn is_submitting(&self) -> bool {
        self.state == WizardState::Submitting
    }

    /// Index of the step on screen. While submitting this is the last step.
    pub fn step(&self) -> Option<usize> {
        match self.state {
            WizardState::AtStep(step) => Some(step),
            WizardState::Submitting => Some(self.total_steps().saturating_sub(1)),
            WizardState::Idle | WizardState::Closed => None,
        }
    }

    pub fn current_slot(&self) -> Option<&UploadSlot> {
        self.step().and_then(|step| self.slots.get(step))
    }

    pub fn is_last_step(&self) -> bool {
        self.step() == Some(self.total_steps().saturating_sub(1))
    }

    pub fn context(&self, store: &UploadStore) -> StepContext {
        StepContext {
            total_steps: self.total_steps(),
            current_filled: self
                .current_slot()
                .is_some_and(|slot| store.is_filled(slot.key)),
        }
    }

    pub fn can_proceed(&self, store: &UploadStore) -> bool {
        self.context(store).current_filled
    }

    pub fn progress_percent(&self, store: &UploadStore) -> u8 {
        let ctx = self.context(store);
        progress_percent(self.step().unwrap_or(0), ctx.current_filled, ctx.total_steps)
    }

    /// Applies `event`; the state is left unchanged when it is rejected.
    pub fn dispatch(&mut self, event: WizardEvent, store: &UploadStore) -> Result<WizardState, WizardError> {
        let ctx = self.context(store);
        let next = transition(self.state, event, ctx).map_err(|e| match e {
            WizardError::StepEmpty(_) => match self.current_slot() {
                Some(slot) => WizardError::SlotEmpty(slot.key),
                None => e,
            },
            other => other,
        });
        match &next {
            Ok(state) => debug!(from = ?self.state, to = ?state, ?event, "wizard transition"),
            Err(e) => debug!(state = ?self.state, ?event, error = %e, "wizard transition rejected"),
        }
        self.state = next?;
        Ok(self.state)
    }
}
