use anyhow::anyhow;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    commands::{Command, CommandParser, InboundSms},
    config::{AlertConfig, EventConfig, StorageConfig},
    fetch::HtmlFetcher,
    metrics::{MetricsCollector, PollMetrics},
    notify::{help_text, notifications_for, Notification, Notifier},
    outcome::{outcome, ScoreError},
    rankings::{format_division, parse_rankings_page},
    repository::MatchRepository,
    results_page::parse_results_page,
    schedule::{FileScheduleStore, ScheduleError},
    store::{JsonSnapshot, PersistError},
    subscriptions::SubscriptionRegistry,
    types::{MatchResult, TeamNumber, TeamSchedule},
};

/// Failures of an on-demand request, as the requester sees them.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Team {0} does not exist")]
    UnknownTeam(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// The two owned maps every request reads or mutates.
#[derive(Debug)]
pub struct TrackerState {
    pub matches: MatchRepository,
    pub subscriptions: SubscriptionRegistry,
}

impl TrackerState {
    pub fn in_memory() -> Self {
        Self {
            matches: MatchRepository::in_memory(),
            subscriptions: SubscriptionRegistry::in_memory(),
        }
    }

    pub async fn open(storage: &StorageConfig) -> Result<Self, PersistError> {
        Ok(Self {
            matches: MatchRepository::open(JsonSnapshot::new(&storage.recorded_matches)).await?,
            subscriptions: SubscriptionRegistry::open(JsonSnapshot::new(&storage.registered_numbers)).await?,
        })
    }
}

#[derive(Debug, Default)]
pub struct PollReport {
    pub new_results: Vec<MatchResult>,
    pub failed_pages: Vec<String>,
    pub notifications: Vec<Notification>,
    /// Pushes to a pull requester about the team it asked for. Its reply carries
    /// these results, so they go out only if the reply fails.
    pub held: Vec<Notification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub recorded_matches: usize,
    pub subscribers: usize,
    pub metrics: PollMetrics,
}

/// Polls result pages, records new results, notifies subscribers and answers
/// inbound requests.
///
/// One lock guards both maps for a whole poll-and-respond cycle, so a pull
/// request sees the results its own poll recorded and nothing else in between.
pub struct Tracker<F, N> {
    event: EventConfig,
    sign_off: String,
    fetcher: F,
    notifier: N,
    schedules: FileScheduleStore,
    commands: CommandParser,
    state: Mutex<TrackerState>,
    metrics: MetricsCollector,
}

impl<F, N> Tracker<F, N>
where
    F: HtmlFetcher + Sync,
    N: Notifier + Sync,
{
    pub fn new(config: &AlertConfig, fetcher: F, notifier: N, state: TrackerState) -> Self {
        Self {
            event: config.event.clone(),
            sign_off: config.sms.sign_off.clone(),
            fetcher,
            notifier,
            schedules: FileScheduleStore::new(&config.storage.matches_dir),
            commands: CommandParser::new(),
            state: Mutex::new(state),
            metrics: MetricsCollector::new(),
        }
    }

    /// One scheduled poll: record new results and text their subscribers.
    pub async fn poll(&self) -> PollReport {
        let mut state = self.state.lock().await;
        let mut report = self.poll_locked(&mut state, None).await;
        drop(state);
        self.deliver(std::mem::take(&mut report.notifications)).await;
        report
    }

    async fn poll_locked(&self, state: &mut TrackerState, hold_for: Option<(&str, &TeamNumber)>) -> PollReport {
        let pages = join_all(self.event.results_urls.iter().enumerate().map(
            |(division, url)| async move { (division, url, self.fetcher.fetch_html(url).await) },
        ))
        .await;

        let mut report = PollReport::default();
        let mut pages_fetched = 0;
        let mut rows_skipped = 0;

        for (division, url, page) in pages {
            let html = match page {
                Ok(html) => html,
                Err(e) => {
                    warn!("Skipping results page: {}", e);
                    self.metrics.record_page_failure(e.to_string());
                    report.failed_pages.push(url.clone());
                    continue;
                }
            };
            pages_fetched += 1;

            let parsed = parse_results_page(&html, division, &self.event.results_layout);
            rows_skipped += parsed.skipped_rows;
            for result in parsed.results {
                if state.matches.record(result.clone()).await {
                    report.new_results.push(result);
                }
            }
        }

        for result in &report.new_results {
            let batch = match notifications_for(result, &state.subscriptions, &self.sign_off) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("No notifications for match {}: {}", result.match_id, e);
                    continue;
                }
            };
            for notification in batch {
                let in_reply = hold_for
                    .is_some_and(|(phone, team)| notification.to == phone && result.involves(team));
                if in_reply {
                    report.held.push(notification);
                } else {
                    report.notifications.push(notification);
                }
            }
        }

        self.metrics
            .record_poll(pages_fetched, rows_skipped as u64, report.new_results.len() as u64);
        report
    }

    async fn deliver(&self, notifications: Vec<Notification>) {
        let sends = notifications.iter().map(|n| async move {
            let sent = self.notifier.send(&n.to, &n.body).await;
            (n, sent)
        });
        for (notification, sent) in join_all(sends).await {
            match sent {
                Ok(()) => self.metrics.record_notification(true),
                Err(e) => {
                    error!("Failed to send message to {}: {:#}", notification.to, e);
                    self.metrics.record_notification(false);
                }
            }
        }
    }

    /// Pull request: the team's schedule with every known result, after which
    /// `phone` is subscribed to the team.
    pub async fn team_report(&self, raw_team: &str, phone: &str) -> Result<String, QueryError> {
        let team = TeamNumber::parse(raw_team).ok_or_else(|| QueryError::UnknownTeam(raw_team.to_string()))?;
        let schedule = match self.schedules.load(&team).await {
            Ok(schedule) => schedule,
            Err(ScheduleError::NotFound(team)) => return Err(QueryError::UnknownTeam(team.to_string())),
            Err(e) => return Err(QueryError::Failed(e.into())),
        };

        let mut state = self.state.lock().await;
        let mut report = self.poll_locked(&mut state, Some((phone, &team))).await;
        let mut notifications = std::mem::take(&mut report.notifications);

        let reply = if report.failed_pages.is_empty() {
            let results = state.matches.results_for_team(&team);
            team_report_lines(&team, &schedule, &results).map_err(|e| QueryError::Failed(e.into()))
        } else {
            Err(QueryError::Failed(anyhow!(
                "Could not fetch results pages: {}",
                report.failed_pages.join(", ")
            )))
        };

        let reply = match reply {
            Ok(mut lines) => {
                state.subscriptions.subscribe(&team, phone).await;
                lines.push(format!(
                    "You will now be texted when team {}'s scores are announced. {}",
                    team,
                    help_text(&self.sign_off)
                ));
                Ok(lines.join("\n"))
            }
            Err(e) => {
                notifications.append(&mut report.held);
                Err(e)
            }
        };

        drop(state);
        self.deliver(notifications).await;
        reply
    }

    /// Rankings for the division of the team `phone` follows, or every division.
    pub async fn rankings(&self, phone: &str) -> Result<String, QueryError> {
        let team = self.state.lock().await.subscriptions.team_of(phone).cloned();
        let division = match &team {
            Some(team) => self.schedules.load(team).await.ok().and_then(|s| s.division),
            None => None,
        };

        let mut divisions: Vec<_> = self
            .event
            .ranking_urls
            .iter()
            .filter(|d| division.as_ref().map_or(true, |name| &d.division == name))
            .collect();
        if divisions.is_empty() {
            divisions = self.event.ranking_urls.iter().collect();
        }

        let pages = join_all(
            divisions
                .iter()
                .map(|d| async move { (d, self.fetcher.fetch_html(&d.url).await) }),
        )
        .await;

        let mut blocks = Vec::with_capacity(pages.len());
        for (division, page) in pages {
            let html = page.map_err(|e| QueryError::Failed(e.into()))?;
            let rows = parse_rankings_page(&html, &self.event.rankings_layout);
            blocks.push(format_division(
                &division.division,
                &rows,
                self.event.ranking_top_n,
                team.as_ref(),
            ));
        }

        info!("Responded with rank");
        Ok(format!(
            "(QP, RP, Matches)\n{}\n{}",
            blocks.join("\n\n"),
            self.sign_off
        ))
    }

    pub async fn unsubscribe(&self, phone: &str) -> Option<TeamNumber> {
        self.state.lock().await.subscriptions.unsubscribe(phone).await
    }

    /// Answers one inbound text message.
    pub async fn handle_sms(&self, sms: &InboundSms) -> String {
        let command = self.commands.parse(&sms.body, sms.num_media);
        info!("SMS from {}: {:?} -> {:?}", sms.from, sms.body, command);

        match command {
            Command::MediaRejected => "This is an SMS-only service".to_string(),
            Command::Rankings => self
                .rankings(&sms.from)
                .await
                .unwrap_or_else(|e| error_reply(&e)),
            Command::Unsubscribe => {
                self.unsubscribe(&sms.from).await;
                "Unsubscribed".to_string()
            }
            Command::Help => help_text(&self.sign_off),
            Command::Team(team) => self
                .team_report(&team, &sms.from)
                .await
                .unwrap_or_else(|e| error_reply(&e)),
            Command::Prompt => format!("Please enter a team number. {}", help_text(&self.sign_off)),
        }
    }

    pub async fn status(&self) -> StatusReport {
        let state = self.state.lock().await;
        StatusReport {
            recorded_matches: state.matches.len(),
            subscribers: state.subscriptions.subscriber_count(),
            metrics: self.metrics.get_metrics(),
        }
    }

    pub fn state(&self) -> &Mutex<TrackerState> {
        &self.state
    }
}

fn error_reply(e: &QueryError) -> String {
    match e {
        QueryError::UnknownTeam(_) => e.to_string(),
        QueryError::Failed(inner) => {
            error!("Request failed: {:#}", inner);
            "Error occurred".to_string()
        }
    }
}

/// Reply lines for a pull request.
///
/// Scheduled matches are paired with the team's results by position: the i-th
/// recorded result is taken to be the i-th scheduled match. Results past the end
/// of the schedule (playoffs) get their own lines with just the match label.
pub fn team_report_lines(
    team: &TeamNumber,
    schedule: &TeamSchedule,
    results: &[&MatchResult],
) -> Result<Vec<String>, ScoreError> {
    let mut lines = Vec::with_capacity(results.len().max(schedule.matches.len()));

    for (i, scheduled) in schedule.matches.iter().enumerate() {
        let mut line = format!(
            "{}{} w/ {} v. {} & {}",
            scheduled.match_number,
            scheduled.color.letter(),
            scheduled.partner,
            scheduled.opponents[0],
            scheduled.opponents[1]
        );
        if let Some(result) = results.get(i) {
            line.push_str(&format!(" ({} {})", outcome(result, team)?.letter(), result.score));
        }
        lines.push(line);
    }

    for result in results.iter().skip(schedule.matches.len()) {
        lines.push(format!(
            "{} ({} {})",
            result.label,
            outcome(result, team)?.letter(),
            result.score
        ));
    }

    Ok(lines)
}
