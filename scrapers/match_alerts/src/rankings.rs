use serde::{Deserialize, Serialize};

use crate::{html_table::extract_rows, types::TeamNumber};

/// Column positions of a rankings table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankingsLayout {
    pub rank_col: usize,
    pub team_col: usize,
    pub qp_col: usize,
    pub rp_col: usize,
    pub matches_col: usize,
}

impl Default for RankingsLayout {
    fn default() -> Self {
        Self {
            rank_col: 0,
            team_col: 1,
            qp_col: 3,
            rp_col: 4,
            matches_col: 6,
        }
    }
}

impl RankingsLayout {
    /// Parses `"rank,team,qp,rp,matches"` column indexes.
    pub fn parse(columns: &str) -> Option<Self> {
        let cols: Vec<usize> = columns
            .split(',')
            .map(|c| c.trim().parse().ok())
            .collect::<Option<_>>()?;
        match cols[..] {
            [rank_col, team_col, qp_col, rp_col, matches_col] => Some(Self {
                rank_col,
                team_col,
                qp_col,
                rp_col,
                matches_col,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingRow {
    pub rank: String,
    pub team: String,
    pub qualifying_points: String,
    pub ranking_points: String,
    pub matches_played: String,
}

pub fn parse_rankings_page(html: &str, layout: &RankingsLayout) -> Vec<RankingRow> {
    extract_rows(html)
        .into_iter()
        .filter(|row| !row.is_header())
        .filter_map(|row| {
            Some(RankingRow {
                rank: row.cell(layout.rank_col)?.to_string(),
                team: row.cell(layout.team_col)?.to_string(),
                qualifying_points: row.cell(layout.qp_col)?.to_string(),
                ranking_points: row.cell(layout.rp_col)?.to_string(),
                matches_played: row.cell(layout.matches_col)?.to_string(),
            })
        })
        .collect()
}

/// Division name followed by the top `top_n` teams, plus `team` wherever it ranks.
pub fn format_division(division: &str, rows: &[RankingRow], top_n: usize, team: Option<&TeamNumber>) -> String {
    let mut out = division.to_string();
    let mut listed = 0;
    for row in rows {
        let is_requester = team.is_some_and(|t| TeamNumber::parse(&row.team).as_ref() == Some(t));
        if listed >= top_n && !is_requester {
            continue;
        }
        out.push_str(&format!(
            "\n{}. {} ({}, {}, {})",
            row.rank, row.team, row.qualifying_points, row.ranking_points, row.matches_played
        ));
        listed += 1;
    }
    out
}
