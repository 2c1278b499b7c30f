use crate::core::appointment::{AppointmentFields, Field, ValidationError};

/// New-appointment form: four text fields and whether the form is showing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentForm {
    fields: AppointmentFields,
    visible: bool,
}

impl AppointmentForm {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn open(&mut self) {
        self.visible = true;
    }

    /// Hides the form. Typed values are kept for the next open.
    pub fn cancel(&mut self) {
        self.visible = false;
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.fields.set(field, value);
    }

    pub fn value(&self, field: Field) -> &str {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &AppointmentFields {
        &self.fields
    }

    pub fn validate(&self) -> Result<AppointmentFields, ValidationError> {
        self.fields.validated()
    }

    /// Clears and hides the form after a successful submit.
    pub fn complete(&mut self) {
        self.fields = AppointmentFields::default();
        self.visible = false;
    }
}
