use serde::{Deserialize, Serialize};

use super::status::Status;

/// Identifier assigned by the remote collection when an appointment is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(String);

impl AppointmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four required text fields of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Client,
    Porter,
    Advisor,
    Time,
}

impl Field {
    pub const ALL: &'static [Field] = &[Field::Client, Field::Porter, Field::Advisor, Field::Time];

    /// Key under which the field is stored remotely.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Porter => "porter",
            Self::Advisor => "advisor",
            Self::Time => "time",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Porter => "Porter",
            Self::Advisor => "Advisor",
            Self::Time => "Appt. Time",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("please fill all fields (missing: {})", join_labels(.blank))]
pub struct ValidationError {
    pub blank: Vec<Field>,
}

fn join_labels(fields: &[Field]) -> String {
    fields.iter().map(|f| f.label()).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentFields {
    pub client: String,
    pub porter: String,
    pub advisor: String,
    pub time: String,
}

impl AppointmentFields {
    pub fn new(
        client: impl Into<String>,
        porter: impl Into<String>,
        advisor: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            porter: porter.into(),
            advisor: advisor.into(),
            time: time.into(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Client => &self.client,
            Field::Porter => &self.porter,
            Field::Advisor => &self.advisor,
            Field::Time => &self.time,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Client => &mut self.client,
            Field::Porter => &mut self.porter,
            Field::Advisor => &mut self.advisor,
            Field::Time => &mut self.time,
        };
        *slot = value.into();
    }

    /// Trims every field and rejects the set if any is left blank.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        let trimmed = Self {
            client: self.client.trim().to_string(),
            porter: self.porter.trim().to_string(),
            advisor: self.advisor.trim().to_string(),
            time: self.time.trim().to_string(),
        };
        let blank: Vec<Field> = Field::ALL
            .iter()
            .copied()
            .filter(|f| trimmed.get(*f).is_empty())
            .collect();
        if blank.is_empty() {
            Ok(trimmed)
        } else {
            Err(ValidationError { blank })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub client: String,
    pub porter: String,
    pub advisor: String,
    pub time: String,
    pub status: Status,
}

impl Appointment {
    pub fn new(id: AppointmentId, fields: AppointmentFields) -> Self {
        Self::with_status(id, fields, Status::Pending)
    }

    pub fn with_status(id: AppointmentId, fields: AppointmentFields, status: Status) -> Self {
        Self {
            id,
            client: fields.client,
            porter: fields.porter,
            advisor: fields.advisor,
            time: fields.time,
            status,
        }
    }

    pub fn fields(&self) -> AppointmentFields {
        AppointmentFields {
            client: self.client.clone(),
            porter: self.porter.clone(),
            advisor: self.advisor.clone(),
            time: self.time.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validated_trims_all_fields() {
        let fields = AppointmentFields::new("  Ana ", "Bo", " Cy", "9:00 ");
        let ok = fields.validated().unwrap();
        assert_eq!(ok, AppointmentFields::new("Ana", "Bo", "Cy", "9:00"));
    }

    #[test]
    fn validated_lists_every_blank_field() {
        let fields = AppointmentFields::new("Ana", "   ", "", "9:00");
        let err = fields.validated().unwrap_err();
        assert_eq!(err.blank, vec![Field::Porter, Field::Advisor]);
        assert_eq!(
            err.to_string(),
            "please fill all fields (missing: Porter, Advisor)"
        );
    }

    #[test]
    fn new_appointment_starts_pending() {
        let appt = Appointment::new(
            AppointmentId::new("abc"),
            AppointmentFields::new("A", "B", "C", "9:00"),
        );
        assert_eq!(appt.status, Status::Pending);
        assert_eq!(appt.fields().time, "9:00");
    }

    #[test]
    fn set_overwrites_one_field() {
        let mut fields = AppointmentFields::default();
        fields.set(Field::Advisor, "Dee");
        assert_eq!(fields.get(Field::Advisor), "Dee");
        assert_eq!(fields.get(Field::Client), "");
    }
}
