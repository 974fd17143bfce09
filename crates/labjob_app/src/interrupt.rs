use labjob_core::{JobState, JobView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Send a cancel request for the running job.
    Cancel,
    /// No job id yet, or nothing cancellable; keep waiting.
    NothingToCancel,
    /// A cancel is already in flight or acknowledged; stop waiting.
    Exit,
}

/// Decides what a Ctrl-C means given the latest published view.
///
/// The exit path is only armed once a cancel has been sent and the job has
/// not made cancelling available again. A rejected cancel re-enables it, so
/// the next Ctrl-C retries instead of abandoning a running job.
#[derive(Debug, Default)]
pub struct InterruptPolicy {
    cancel_sent: bool,
}

impl InterruptPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_interrupt(&mut self, view: &JobView) -> InterruptAction {
        if view.cancel_enabled {
            self.cancel_sent = true;
            return InterruptAction::Cancel;
        }
        if self.cancel_sent && view.state == JobState::Active {
            return InterruptAction::Exit;
        }
        InterruptAction::NothingToCancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(state: JobState, cancel_enabled: bool) -> JobView {
        JobView {
            state,
            cancel_enabled,
            ..JobView::default()
        }
    }

    #[test]
    fn interrupt_while_submitting_does_not_arm_exit() {
        let mut policy = InterruptPolicy::new();
        assert_eq!(
            policy.on_interrupt(&view(JobState::Submitting, false)),
            InterruptAction::NothingToCancel
        );
        assert_eq!(
            policy.on_interrupt(&view(JobState::Submitting, false)),
            InterruptAction::NothingToCancel
        );
        assert_eq!(
            policy.on_interrupt(&view(JobState::Active, true)),
            InterruptAction::Cancel
        );
    }

    #[test]
    fn second_interrupt_exits_once_cancel_is_pending() {
        let mut policy = InterruptPolicy::new();
        assert_eq!(
            policy.on_interrupt(&view(JobState::Active, true)),
            InterruptAction::Cancel
        );
        assert_eq!(
            policy.on_interrupt(&view(JobState::Active, false)),
            InterruptAction::Exit
        );
    }

    #[test]
    fn rejected_cancel_can_be_retried() {
        let mut policy = InterruptPolicy::new();
        assert_eq!(
            policy.on_interrupt(&view(JobState::Active, true)),
            InterruptAction::Cancel
        );
        // The cancel failed and the job is cancellable again.
        assert_eq!(
            policy.on_interrupt(&view(JobState::Active, true)),
            InterruptAction::Cancel
        );
    }
}
