use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    html_table::{extract_rows, Row},
    outcome::parse_score,
    types::{Alliance, AllianceColor, MatchResult, TeamNumber},
};

/// Column positions of a results table. Layouts differ between events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultsLayout {
    pub match_col: usize,
    pub score_col: usize,
    pub red_col: usize,
    pub blue_col: usize,
}

impl Default for ResultsLayout {
    fn default() -> Self {
        Self {
            match_col: 0,
            score_col: 1,
            red_col: 2,
            blue_col: 3,
        }
    }
}

impl ResultsLayout {
    /// Parses `"match,score,red,blue"` column indexes.
    pub fn parse(columns: &str) -> Option<Self> {
        let cols: Vec<usize> = columns
            .split(',')
            .map(|c| c.trim().parse().ok())
            .collect::<Option<_>>()?;
        match cols[..] {
            [match_col, score_col, red_col, blue_col] => Some(Self {
                match_col,
                score_col,
                red_col,
                blue_col,
            }),
            _ => None,
        }
    }

    fn min_cells(&self) -> usize {
        [self.match_col, self.score_col, self.red_col, self.blue_col]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[derive(Debug, Default)]
pub struct ParsedResults {
    pub results: Vec<MatchResult>,
    /// Rows that looked like match rows but could not be read.
    pub skipped_rows: usize,
}

/// Reads all scored matches from one division's results page.
///
/// Handles both the single-row layout (both alliance members in one cell) and the
/// detail layout where the second red and blue teams sit alone in the following
/// row. Unscored matches are left out without counting as skipped.
pub fn parse_results_page(html: &str, division_index: usize, layout: &ResultsLayout) -> ParsedResults {
    let rows = extract_rows(html);
    let mut parsed = ParsedResults::default();
    let mut i = 0;

    while i < rows.len() {
        let row = &rows[i];
        i += 1;
        if row.is_header() || row.len() < layout.min_cells() {
            continue;
        }

        let Some(label) = row.cell(layout.match_col).map(match_label) else {
            continue;
        };
        if label.is_empty() {
            continue;
        }

        let score_cell = row.cell(layout.score_col).unwrap_or_default();
        let red_cell = team_tokens(row.cell(layout.red_col).unwrap_or_default());
        let blue_cell = team_tokens(row.cell(layout.blue_col).unwrap_or_default());

        // Detail layout: this row holds red 1 / blue 1, the next holds red 2 / blue 2.
        let (red_teams, blue_teams) = match (red_cell.as_slice(), blue_cell.as_slice()) {
            ([r1, r2], [b1, b2]) => (teams(r1, r2), teams(b1, b2)),
            ([r1], [b1]) => match rows.get(i).and_then(continuation_teams) {
                Some((r2, b2)) => {
                    i += 1;
                    (teams(r1, &r2), teams(b1, &b2))
                }
                None => {
                    if !score_cell.is_empty() {
                        warn!("Match {} has no continuation row, skipping", label);
                        parsed.skipped_rows += 1;
                    }
                    continue;
                }
            },
            _ => (None, None),
        };

        if score_cell.is_empty() {
            debug!("Match {} not scored yet", label);
            continue;
        }

        let (Some(red_teams), Some(blue_teams)) = (red_teams, blue_teams) else {
            warn!("Unreadable alliances for match {}: {:?}", label, row.cells());
            parsed.skipped_rows += 1;
            continue;
        };

        let mut score_parts = score_cell.split_whitespace();
        let score = score_parts.next().unwrap_or_default().to_string();
        if let Err(e) = parse_score(&score) {
            warn!("Skipping match {}: {}", label, e);
            parsed.skipped_rows += 1;
            continue;
        }
        let won = score_parts.next().and_then(AllianceColor::from_marker);

        parsed.results.push(MatchResult {
            match_id: MatchResult::qualified_id(division_index, &label),
            label,
            score,
            won,
            red_teams,
            blue_teams,
        });
    }

    parsed
}

fn match_label(cell: &str) -> String {
    cell.trim_start_matches("Q-").trim().to_string()
}

fn team_tokens(cell: &str) -> Vec<String> {
    cell.split_whitespace().map(str::to_string).collect()
}

fn teams(first: &str, second: &str) -> Option<Alliance> {
    Some([TeamNumber::parse(first)?, TeamNumber::parse(second)?])
}

/// The second-row half of a detail-layout match: exactly two cells, one team each.
fn continuation_teams(row: &Row) -> Option<(String, String)> {
    if row.is_header() || row.len() != 2 {
        return None;
    }
    let red = row.cell(0)?;
    let blue = row.cell(1)?;
    TeamNumber::parse(red)?;
    TeamNumber::parse(blue)?;
    Some((red.to_string(), blue.to_string()))
}
