use crate::types::{AllianceColor, MatchResult, TeamNumber};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("Invalid score format: {0}")]
    Format(String),
    #[error("Invalid {side} score in {score}")]
    Value { side: &'static str, score: String },
    #[error("Team {0} is not on either alliance")]
    NotPlaying(TeamNumber),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

impl Outcome {
    /// Single character used in pull replies.
    pub fn letter(self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Loss => 'L',
            Outcome::Tie => 'T',
        }
    }

    /// Verb used in push notifications.
    pub fn verb(self) -> &'static str {
        match self {
            Outcome::Win => "WON",
            Outcome::Loss => "LOST",
            Outcome::Tie => "TIED",
        }
    }
}

/// Splits `"120-80"` into `(120, 80)`.
pub fn parse_score(score: &str) -> Result<(u32, u32), ScoreError> {
    let (red, blue) = score
        .trim()
        .split_once('-')
        .ok_or_else(|| ScoreError::Format(score.to_string()))?;
    let red = red.trim().parse::<u32>().map_err(|_| ScoreError::Value {
        side: "red",
        score: score.to_string(),
    })?;
    let blue = blue.trim().parse::<u32>().map_err(|_| ScoreError::Value {
        side: "blue",
        score: score.to_string(),
    })?;
    Ok((red, blue))
}

/// Win/loss/tie for `team` in `result`.
///
/// Equal scores are a tie whatever the winner marker says. Otherwise the marker
/// decides: numeric comparison is only used to detect ties. A non-tie with no
/// marker is scored as a blue win.
pub fn outcome(result: &MatchResult, team: &TeamNumber) -> Result<Outcome, ScoreError> {
    let team_color = result
        .color_of(team)
        .ok_or_else(|| ScoreError::NotPlaying(team.clone()))?;
    let (red, blue) = parse_score(&result.score)?;
    if red == blue {
        return Ok(Outcome::Tie);
    }
    let winner = result.won.unwrap_or(AllianceColor::Blue);
    Ok(if team_color == winner {
        Outcome::Win
    } else {
        Outcome::Loss
    })
}
