use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A team number with surrogate markers and leading zeros removed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamNumber(String);

impl TeamNumber {
    /// Normalizes scraped or user-supplied text into a team key.
    ///
    /// `"00123"` and `"123*"` both become `"123"`. Returns `None` for empty or
    /// non-numeric text.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.trim().trim_end_matches('*');
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let trimmed = digits.trim_start_matches('0');
        Some(Self(if trimmed.is_empty() { "0" } else { trimmed }.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two teams playing together. Order is kept as printed on the scoring pages.
pub type Alliance = [TeamNumber; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllianceColor {
    #[serde(alias = "R")]
    Red,
    #[serde(alias = "B")]
    Blue,
}

impl AllianceColor {
    /// Parses the winner marker printed after a score, e.g. the `R` in `"120-80 R"`.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim() {
            "R" | "r" => Some(Self::Red),
            "B" | "b" => Some(Self::Blue),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Red => 'R',
            Self::Blue => 'B',
        }
    }
}

/// One qualification match from a team's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMatch {
    #[serde(rename = "match")]
    pub match_number: u32,
    pub color: AllianceColor,
    pub partner: TeamNumber,
    pub opponents: Alliance,
}

/// Contents of one team's schedule file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSchedule {
    pub division: Option<String>,
    pub matches: Vec<ScheduledMatch>,
}

/// A scored match as first seen on a results page. Never modified after recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// `"<division index> <label>"`, unique across divisions. Stored as the snapshot key.
    #[serde(default, skip_serializing)]
    pub match_id: String,
    /// Match label as printed, with any `Q-` prefix removed.
    #[serde(rename = "match")]
    pub label: String,
    /// Score text, `"<red>-<blue>"`.
    pub score: String,
    /// Winning alliance marker; absent for ties or when the page printed none.
    #[serde(default, deserialize_with = "winner_marker")]
    pub won: Option<AllianceColor>,
    pub red_teams: Alliance,
    pub blue_teams: Alliance,
}

/// Reads a stored winner. Older snapshots hold the raw page marker, including `"T"`
/// for ties; anything that is not a colour reads as no winner.
fn winner_marker<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<AllianceColor>, D::Error> {
    let marker = Option::<String>::deserialize(deserializer)?;
    Ok(marker.and_then(|m| match m.as_str() {
        "red" => Some(AllianceColor::Red),
        "blue" => Some(AllianceColor::Blue),
        other => AllianceColor::from_marker(other),
    }))
}

impl MatchResult {
    pub fn qualified_id(division_index: usize, label: &str) -> String {
        format!("{} {}", division_index, label)
    }

    pub fn teams(&self) -> impl Iterator<Item = &TeamNumber> {
        self.red_teams.iter().chain(self.blue_teams.iter())
    }

    pub fn involves(&self, team: &TeamNumber) -> bool {
        self.teams().any(|t| t == team)
    }

    pub fn color_of(&self, team: &TeamNumber) -> Option<AllianceColor> {
        if self.red_teams.contains(team) {
            Some(AllianceColor::Red)
        } else if self.blue_teams.contains(team) {
            Some(AllianceColor::Blue)
        } else {
            None
        }
    }
}
