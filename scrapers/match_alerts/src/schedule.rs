use std::{
    collections::{BTreeMap, HashMap},
    io::ErrorKind,
    path::PathBuf,
};
use tokio::fs;
use tracing::{info, warn};

use crate::{
    config::DivisionUrl,
    fetch::HtmlFetcher,
    html_table::extract_rows,
    types::{Alliance, AllianceColor, ScheduledMatch, TeamNumber, TeamSchedule},
};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("No schedule for team {0}")]
    NotFound(TeamNumber),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid schedule file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-team schedule files, `<dir>/<team>.json`, written once by ingestion.
#[derive(Debug, Clone)]
pub struct FileScheduleStore {
    dir: PathBuf,
}

impl FileScheduleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, team: &TeamNumber) -> PathBuf {
        self.dir.join(format!("{}.json", team))
    }

    pub async fn load(&self, team: &TeamNumber) -> Result<TeamSchedule, ScheduleError> {
        let json = match fs::read_to_string(self.path_for(team)).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ScheduleError::NotFound(team.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut schedule: TeamSchedule = serde_json::from_str(&json)?;
        schedule.matches.sort_by_key(|m| m.match_number);
        Ok(schedule)
    }

    /// Writes one file per team, creating the directory if needed.
    pub async fn write_all(&self, schedules: &BTreeMap<TeamNumber, TeamSchedule>) -> Result<(), ScheduleError> {
        fs::create_dir_all(&self.dir).await?;
        for (team, schedule) in schedules {
            fs::write(self.path_for(team), serde_json::to_string(schedule)?).await?;
        }
        info!("Wrote {} team schedules to {:?}", schedules.len(), self.dir);
        Ok(())
    }
}

/// One row of a division's match list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedMatch {
    pub number: u32,
    pub red_teams: Alliance,
    pub blue_teams: Alliance,
}

/// Reads a match list page.
///
/// Some lists carry a "Field" column between the number and the teams, so the
/// four team cells are taken from the end of the row.
pub fn parse_match_list(html: &str) -> Vec<ListedMatch> {
    let mut matches = Vec::new();
    for row in extract_rows(html) {
        if row.is_header() || row.len() < 5 {
            continue;
        }
        let number = row
            .cell(0)
            .map(|c| c.trim_start_matches("Q-"))
            .and_then(|c| c.parse::<u32>().ok());
        let team = |offset| row.cell_from_end(offset).and_then(TeamNumber::parse);

        match (number, team(4), team(3), team(2), team(1)) {
            (Some(number), Some(r1), Some(r2), Some(b1), Some(b2)) => matches.push(ListedMatch {
                number,
                red_teams: [r1, r2],
                blue_teams: [b1, b2],
            }),
            _ => warn!("Skipping unreadable match list row: {:?}", row.cells()),
        }
    }
    matches
}

/// Turns division match lists into per-team schedules, ordered by match number.
pub fn build_team_schedules(divisions: &[(String, Vec<ListedMatch>)]) -> BTreeMap<TeamNumber, TeamSchedule> {
    let mut schedules: BTreeMap<TeamNumber, TeamSchedule> = BTreeMap::new();

    for (division, matches) in divisions {
        for listed in matches {
            for (color, own, other) in [
                (AllianceColor::Red, &listed.red_teams, &listed.blue_teams),
                (AllianceColor::Blue, &listed.blue_teams, &listed.red_teams),
            ] {
                for (i, team) in own.iter().enumerate() {
                    let schedule = schedules.entry(team.clone()).or_insert_with(|| TeamSchedule {
                        division: None,
                        matches: Vec::new(),
                    });
                    schedule.division = Some(division.clone());
                    schedule.matches.push(ScheduledMatch {
                        match_number: listed.number,
                        color,
                        partner: own[1 - i].clone(),
                        opponents: other.clone(),
                    });
                }
            }
        }
    }

    for schedule in schedules.values_mut() {
        schedule.matches.sort_by_key(|m| m.match_number);
    }

    let mut teams_by_count: HashMap<usize, Vec<&TeamNumber>> = HashMap::new();
    for (team, schedule) in &schedules {
        teams_by_count.entry(schedule.matches.len()).or_default().push(team);
    }
    if teams_by_count.len() > 1 {
        warn!("Unequal match counts: {:?}", teams_by_count);
    }

    schedules
}

/// Fetches every division's match list and rewrites the per-team schedule files.
/// Returns the number of teams written.
pub async fn ingest_schedules<F: HtmlFetcher>(
    fetcher: &F,
    divisions: &[DivisionUrl],
    store: &FileScheduleStore,
) -> anyhow::Result<usize> {
    if divisions.is_empty() {
        anyhow::bail!("No match list pages configured");
    }

    let mut lists = Vec::with_capacity(divisions.len());
    for division in divisions {
        let html = fetcher.fetch_html(&division.url).await?;
        let matches = parse_match_list(&html);
        info!("{}: {} matches listed", division.division, matches.len());
        lists.push((division.division.clone(), matches));
    }

    let schedules = build_team_schedules(&lists);
    store.write_all(&schedules).await?;
    Ok(schedules.len())
}
