use super::popup::PointerTarget;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndDayState {
    #[default]
    Idle,
    /// The confirmation dialog is showing.
    Confirming,
    /// Accepted; the bulk delete is in flight and the dialog stays up.
    Clearing,
}

/// Confirmation flow in front of the bulk "end day" delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndDayController {
    state: EndDayState,
}

impl EndDayController {
    pub fn state(&self) -> EndDayState {
        self.state
    }

    /// True while the dialog is on screen, including while clearing.
    pub fn is_confirming(&self) -> bool {
        self.state != EndDayState::Idle
    }

    pub fn is_clearing(&self) -> bool {
        self.state == EndDayState::Clearing
    }

    pub fn request(&mut self) {
        if self.state == EndDayState::Idle {
            self.state = EndDayState::Confirming;
        }
    }

    /// Answers the dialog. Returns true when the caller must now clear the
    /// board and then call [`EndDayController::finish`].
    pub fn decide(&mut self, accept: bool) -> bool {
        if self.state != EndDayState::Confirming {
            return false;
        }
        if accept {
            self.state = EndDayState::Clearing;
            true
        } else {
            self.state = EndDayState::Idle;
            false
        }
    }

    pub fn finish(&mut self) {
        if self.state == EndDayState::Clearing {
            self.state = EndDayState::Idle;
        }
    }

    /// Dismisses the dialog on a press outside it and its button. Ignored
    /// once clearing has started.
    pub fn dismiss_if_outside(&mut self, target: &PointerTarget) -> bool {
        if self.state != EndDayState::Confirming {
            return false;
        }
        match target {
            PointerTarget::EndDayButton | PointerTarget::EndDayDialog => false,
            _ => {
                self.state = EndDayState::Idle;
                true
            }
        }
    }
}
