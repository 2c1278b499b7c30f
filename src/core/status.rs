use serde::{Deserialize, Serialize};

/// Where an appointment stands at the desk. Any status can move to any other
/// in one step; removal is a separate action, not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Helped,
    Shipped,
    Left,
    NoShow,
    Reschedule,
    Waiting,
    Escalated,
    /// Written by another client with a value this board does not know.
    /// Never offered in a menu.
    Unrecognized,
}

impl Status {
    pub const ALL: &'static [Status] = &[
        Status::Pending,
        Status::Helped,
        Status::Shipped,
        Status::Left,
        Status::NoShow,
        Status::Reschedule,
        Status::Waiting,
        Status::Escalated,
    ];

    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Helped => "helped",
            Self::Shipped => "shipped",
            Self::Left => "left",
            Self::NoShow => "no_show",
            Self::Reschedule => "reschedule",
            Self::Waiting => "waiting",
            Self::Escalated => "escalated",
            Self::Unrecognized => "unrecognized",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "helped" => Some(Self::Helped),
            "shipped" => Some(Self::Shipped),
            "left" => Some(Self::Left),
            "no_show" => Some(Self::NoShow),
            "reschedule" => Some(Self::Reschedule),
            "waiting" => Some(Self::Waiting),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }

    /// Reads a keyword written by any client. Unknown values keep the row on
    /// the board as [`Status::Unrecognized`].
    pub fn from_keyword_lenient(s: &str) -> Self {
        Self::from_keyword(s).unwrap_or_else(|| {
            log::warn!("Unrecognized appointment status {:?}", s);
            Self::Unrecognized
        })
    }

    /// Plain-text name, used outside the desktop front end.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Needs Advisor",
            Self::Helped => "With Advisor",
            Self::Shipped => "Shipped",
            Self::Left => "Left",
            Self::NoShow => "No Show",
            Self::Reschedule => "Reschedule",
            Self::Waiting => "Waiting",
            Self::Escalated => "Escalated",
            Self::Unrecognized => "Unknown",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_keyword())
    }
}

/// Which statuses a board offers in its row menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusSet {
    #[default]
    Basic,
    Extended,
}

impl StatusSet {
    pub fn statuses(&self) -> &'static [Status] {
        match self {
            Self::Basic => &[Status::Helped, Status::Shipped, Status::Pending],
            Self::Extended => &[
                Status::Helped,
                Status::Shipped,
                Status::Pending,
                Status::Waiting,
                Status::Escalated,
                Status::Reschedule,
                Status::Left,
                Status::NoShow,
            ],
        }
    }

    pub fn contains(&self, status: Status) -> bool {
        self.statuses().contains(&status)
    }

    /// Row menu entries in display order, delete last.
    pub fn menu_actions(&self) -> Vec<MenuAction> {
        let mut actions: Vec<MenuAction> =
            self.statuses().iter().copied().map(MenuAction::SetStatus).collect();
        actions.push(MenuAction::Delete);
        actions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    SetStatus(Status),
    Delete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Row background for a status under a theme.
pub fn palette(status: Status, theme: Theme) -> Rgb {
    match (status, theme) {
        (Status::Helped, Theme::Light) => Rgb(0xcc, 0xe5, 0xff),
        (Status::Helped, Theme::Dark) => Rgb(0x2a, 0x4d, 0x8c),
        (Status::Shipped, Theme::Light) => Rgb(0xd4, 0xed, 0xda),
        (Status::Shipped, Theme::Dark) => Rgb(0x2d, 0x50, 0x34),
        (Status::Pending, Theme::Light) => Rgb(0xf1, 0xb0, 0xb7),
        (Status::Pending, Theme::Dark) => Rgb(0x6b, 0x2f, 0x3a),
        (Status::Waiting, Theme::Light) => Rgb(0xff, 0xf3, 0xcd),
        (Status::Waiting, Theme::Dark) => Rgb(0x6b, 0x5d, 0x1f),
        (Status::Escalated, Theme::Light) => Rgb(0xf8, 0xd7, 0xf0),
        (Status::Escalated, Theme::Dark) => Rgb(0x6b, 0x2f, 0x5e),
        (Status::Reschedule, Theme::Light) => Rgb(0xe2, 0xd9, 0xf3),
        (Status::Reschedule, Theme::Dark) => Rgb(0x4a, 0x3a, 0x6b),
        (Status::NoShow, Theme::Light) => Rgb(0xff, 0xe5, 0xb4),
        (Status::NoShow, Theme::Dark) => Rgb(0x6b, 0x4a, 0x1f),
        (Status::Left, Theme::Light) => Rgb(0xe2, 0xe3, 0xe5),
        (Status::Left, Theme::Dark) => Rgb(0x3a, 0x3d, 0x40),
        (Status::Unrecognized, Theme::Light) => Rgb(0xf8, 0xf9, 0xfa),
        (Status::Unrecognized, Theme::Dark) => Rgb(0x2b, 0x2d, 0x30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_match_stored_values() {
        for status in Status::ALL {
            assert_eq!(Status::from_keyword(status.as_keyword()), Some(*status));
        }
        assert_eq!(Status::NoShow.as_keyword(), "no_show");
        assert_eq!(
            serde_json::to_string(&Status::NoShow).unwrap(),
            "\"no_show\""
        );
    }

    #[test]
    fn unknown_keyword_gets_neutral_fallback() {
        assert_eq!(Status::from_keyword("archived"), None);
        assert_eq!(Status::from_keyword_lenient("archived"), Status::Unrecognized);
        assert_eq!(Status::from_keyword_lenient("shipped"), Status::Shipped);
        assert_eq!(Status::Unrecognized.label(), "Unknown");
        assert_eq!(palette(Status::Unrecognized, Theme::Light).hex(), "#f8f9fa");
        assert_ne!(
            palette(Status::Unrecognized, Theme::Light),
            palette(Status::Pending, Theme::Light)
        );
    }

    #[test]
    fn unrecognized_is_never_offered() {
        assert!(!StatusSet::Basic.contains(Status::Unrecognized));
        assert!(!StatusSet::Extended.contains(Status::Unrecognized));
        assert!(!Status::ALL.contains(&Status::Unrecognized));
    }

    #[test]
    fn basic_set_offers_original_three() {
        let set = StatusSet::Basic;
        assert!(set.contains(Status::Helped));
        assert!(set.contains(Status::Shipped));
        assert!(set.contains(Status::Pending));
        assert!(!set.contains(Status::Escalated));
    }

    #[test]
    fn extended_set_covers_every_status() {
        for status in Status::ALL {
            assert!(StatusSet::Extended.contains(*status));
        }
    }

    #[test]
    fn menu_ends_with_delete() {
        let actions = StatusSet::Basic.menu_actions();
        assert_eq!(actions.len(), 4);
        assert_eq!(
            actions,
            vec![
                MenuAction::SetStatus(Status::Helped),
                MenuAction::SetStatus(Status::Shipped),
                MenuAction::SetStatus(Status::Pending),
                MenuAction::Delete,
            ]
        );
    }

    #[test]
    fn palette_differs_per_theme() {
        for status in Status::ALL {
            assert_ne!(palette(*status, Theme::Light), palette(*status, Theme::Dark));
        }
        assert_eq!(palette(Status::Helped, Theme::Light).hex(), "#cce5ff");
        assert_eq!(palette(Status::Pending, Theme::Dark).hex(), "#6b2f3a");
    }

    #[test]
    fn theme_toggles_back_and_forth() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Light.toggled().toggled(), Theme::Light);
    }
}
