//! Bot roles and their display colors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operational identity of a bot. Each role owns one wallet and one monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Challenger,
    Executor,
    BatchSubmitter,
    OutputSubmitter,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Challenger,
        Role::Executor,
        Role::BatchSubmitter,
        Role::OutputSubmitter,
    ];

    /// Stable name, also the persistence key for the role's sync state
    pub fn name(&self) -> &'static str {
        match self {
            Role::Challenger => "challenger",
            Role::Executor => "executor",
            Role::BatchSubmitter => "batchSubmitter",
            Role::OutputSubmitter => "outputSubmitter",
        }
    }

    pub fn color(&self) -> DisplayColor {
        match self {
            Role::Challenger => DisplayColor::Red,
            Role::Executor => DisplayColor::Green,
            Role::BatchSubmitter => DisplayColor::Cyan,
            Role::OutputSubmitter => DisplayColor::Yellow,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Terminal color used for a role's progress log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayColor {
    #[default]
    Plain,
    Red,
    Green,
    Yellow,
    Cyan,
}

impl DisplayColor {
    fn sgr(&self) -> Option<u8> {
        match self {
            DisplayColor::Plain => None,
            DisplayColor::Red => Some(31),
            DisplayColor::Green => Some(32),
            DisplayColor::Yellow => Some(33),
            DisplayColor::Cyan => Some(36),
        }
    }

    /// Wrap text in ANSI escape codes for this color
    pub fn paint(&self, text: &str) -> String {
        match self.sgr() {
            Some(code) => format!("\x1b[{}m{}\x1b[0m", code, text),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.name().parse::<Role>().unwrap(), role);
        }
        assert!("relayer".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_matches_name() {
        let json = serde_json::to_string(&Role::OutputSubmitter).unwrap();
        assert_eq!(json, "\"outputSubmitter\"");
    }

    #[test]
    fn test_paint() {
        assert_eq!(DisplayColor::Green.paint("x"), "\x1b[32mx\x1b[0m");
        assert_eq!(DisplayColor::Plain.paint("x"), "x");
    }
}
