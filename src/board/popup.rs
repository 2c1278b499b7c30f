use crate::core::appointment::{Appointment, AppointmentId};

/// What a pointer press landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    /// The row itself, which is the trigger for its menu.
    Row(AppointmentId),
    /// Inside the open action menu of a row.
    RowMenu(AppointmentId),
    EndDayButton,
    EndDayDialog,
    Elsewhere,
}

/// Tracks which row's action menu is open. At most one is open at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopupController {
    open: Option<AppointmentId>,
}

impl PopupController {
    pub fn open_id(&self) -> Option<&AppointmentId> {
        self.open.as_ref()
    }

    pub fn is_open(&self, id: &AppointmentId) -> bool {
        self.open.as_ref() == Some(id)
    }

    /// Opens the menu for `id`, closing any other; closes it if already open.
    pub fn toggle(&mut self, id: &AppointmentId) {
        if self.is_open(id) {
            self.open = None;
        } else {
            self.open = Some(id.clone());
        }
    }

    /// Toggles the row at `index` of `rows`. Out-of-range indexes are ignored.
    pub fn toggle_at(&mut self, index: usize, rows: &[Appointment]) {
        if let Some(row) = rows.get(index) {
            self.toggle(&row.id);
        }
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    /// Closes the open menu unless the press was on that row or inside its
    /// menu. Returns whether a menu was closed.
    pub fn dismiss_if_outside(&mut self, target: &PointerTarget) -> bool {
        let Some(open) = &self.open else {
            return false;
        };
        let inside = match target {
            PointerTarget::Row(id) | PointerTarget::RowMenu(id) => id == open,
            _ => false,
        };
        if !inside {
            self.open = None;
        }
        !inside
    }

    /// Closes the menu if its row is gone from `rows`.
    pub fn retain(&mut self, rows: &[Appointment]) {
        if let Some(open) = &self.open {
            if !rows.iter().any(|a| a.id == *open) {
                self.open = None;
            }
        }
    }
}
