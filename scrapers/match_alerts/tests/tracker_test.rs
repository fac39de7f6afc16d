use match_alerts::{
    commands::InboundSms,
    config::{AlertConfig, DivisionUrl},
    fetch::{FetchError, HtmlFetcher},
    notify::{Notification, Notifier},
    schedule::FileScheduleStore,
    tracker::{Tracker, TrackerState},
    types::{AllianceColor, ScheduledMatch, TeamNumber, TeamSchedule},
};
use pretty_assertions::assert_eq;
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::{Arc, Mutex},
};

const DIVISION_0: &str = "http://scores.test/MatchResultsDetails_championship_1.html";
const DIVISION_1: &str = "http://scores.test/MatchResultsDetails_championship_2.html";
const RANKINGS_POCONO: &str = "http://scores.test/Rankings_championship_1.html";
const RANKINGS_ALLEGHENY: &str = "http://scores.test/Rankings_championship_2.html";
const REQUESTER: &str = "+15550001111";
const WATCHER: &str = "+15550009999";

#[derive(Clone, Default)]
struct FakePages(Arc<Mutex<HashMap<String, String>>>);

impl FakePages {
    fn set(&self, url: &str, html: String) {
        self.0.lock().unwrap().insert(url.to_string(), html);
    }
}

impl HtmlFetcher for FakePages {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let page = self.0.lock().unwrap().get(url).cloned();
        page.ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<Notification>>>);

impl Outbox {
    fn sent(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }

    fn sent_to(&self, phone: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|n| n.to == phone)
            .map(|n| n.body)
            .collect()
    }
}

impl Notifier for Outbox {
    async fn send(&self, to: &str, body: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(Notification {
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

fn team(n: &str) -> TeamNumber {
    TeamNumber::parse(n).unwrap()
}

fn results_page(rows: &[(&str, &str, &str, &str)]) -> String {
    let mut html = String::from("<table><tr><th>Match</th><th>Result</th><th>Red</th><th>Blue</th></tr>");
    for (label, score, red, blue) in rows {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            label, score, red, blue
        ));
    }
    html.push_str("</table>");
    html
}

fn rankings_page(rows: &[(&str, &str, &str, &str)]) -> String {
    let mut html = String::from(
        "<table><tr><th>Rank</th><th>Team</th><th>Name</th><th>QP</th><th>RP</th><th>High</th><th>Matches</th></tr>",
    );
    for (rank, team, qp, rp) in rows {
        html.push_str(&format!(
            "<tr><td>{rank}</td><td>{team}</td><td>Robots</td><td>{qp}</td><td>{rp}</td><td>0</td><td>5</td></tr>"
        ));
    }
    html.push_str("</table>");
    html
}

fn config(dir: &Path) -> AlertConfig {
    let mut config = AlertConfig::default();
    config.event.results_urls = vec![DIVISION_0.to_string(), DIVISION_1.to_string()];
    config.event.ranking_urls = vec![
        DivisionUrl {
            division: "Pocono".to_string(),
            url: RANKINGS_POCONO.to_string(),
        },
        DivisionUrl {
            division: "Allegheny".to_string(),
            url: RANKINGS_ALLEGHENY.to_string(),
        },
    ];
    config.storage.registered_numbers = dir.join("registered-numbers.json");
    config.storage.recorded_matches = dir.join("recorded-matches.json");
    config.storage.matches_dir = dir.join("matches");
    config
}

/// Team 1 plays matches 1..=10 on red with team 2 against teams 3 and 4.
async fn write_schedules(config: &AlertConfig) {
    let mut schedules = BTreeMap::new();
    schedules.insert(
        team("1"),
        TeamSchedule {
            division: Some("Pocono".to_string()),
            matches: (1..=10)
                .map(|n| ScheduledMatch {
                    match_number: n,
                    color: AllianceColor::Red,
                    partner: team("2"),
                    opponents: [team("3"), team("4")],
                })
                .collect(),
        },
    );
    FileScheduleStore::new(&config.storage.matches_dir)
        .write_all(&schedules)
        .await
        .unwrap();
}

fn qualification_rows() -> Vec<(String, String)> {
    (1..=10)
        .map(|n| (format!("Q-{}", n), format!("{}-5 R", n * 10)))
        .collect()
}

fn full_event_page() -> String {
    let quals = qualification_rows();
    let mut rows: Vec<(&str, &str, &str, &str)> = quals
        .iter()
        .map(|(label, score)| (label.as_str(), score.as_str(), "1 2", "3 4"))
        .collect();
    rows.push(("SF-1", "30-40 B", "1 2", "5 6"));
    rows.push(("F-1", "50-50 T", "7 8", "1 2"));
    results_page(&rows)
}

struct Harness {
    _dir: tempfile::TempDir,
    config: AlertConfig,
    pages: FakePages,
    outbox: Outbox,
    tracker: Tracker<FakePages, Outbox>,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    write_schedules(&config).await;

    let pages = FakePages::default();
    pages.set(DIVISION_0, results_page(&[]));
    pages.set(DIVISION_1, results_page(&[]));
    let outbox = Outbox::default();
    let state = TrackerState::open(&config.storage).await.unwrap();
    let tracker = Tracker::new(&config, pages.clone(), outbox.clone(), state);

    Harness {
        _dir: dir,
        config,
        pages,
        outbox,
        tracker,
    }
}

fn sms(from: &str, body: &str) -> InboundSms {
    InboundSms {
        body: body.to_string(),
        from: from.to_string(),
        num_media: 0,
    }
}

async fn subscribe(tracker: &Tracker<FakePages, Outbox>, team_number: &str, phone: &str) {
    let mut state = tracker.state().lock().await;
    state.subscriptions.subscribe(&team(team_number), phone).await;
}

#[tokio::test]
async fn test_pull_reply_zips_schedule_and_appends_playoffs() {
    let h = harness().await;
    h.pages.set(DIVISION_0, full_event_page());

    let reply = h.tracker.handle_sms(&sms(REQUESTER, "1")).await;

    let mut expected: Vec<String> = (1..=10)
        .map(|n| format!("{}R w/ 2 v. 3 & 4 (W {}-5)", n, n * 10))
        .collect();
    expected.push("SF-1 (L 30-40)".to_string());
    expected.push("F-1 (T 50-50)".to_string());
    expected.push(
        "You will now be texted when team 1's scores are announced. \
         Text \"done\" to disable. Text \"rank\" for rankings. Good luck!"
            .to_string(),
    );
    assert_eq!(reply, expected.join("\n"));

    let state = h.tracker.state().lock().await;
    assert_eq!(state.subscriptions.team_of(REQUESTER), Some(&team("1")));
}

#[tokio::test]
async fn test_pull_before_any_results_lists_schedule_only() {
    let h = harness().await;
    let reply = h.tracker.team_report("0001", REQUESTER).await.unwrap();
    let lines: Vec<&str> = reply.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[0], "1R w/ 2 v. 3 & 4");
    assert_eq!(lines[9], "10R w/ 2 v. 3 & 4");
}

#[test_log::test(tokio::test)]
async fn test_repoll_does_not_notify_twice() {
    let h = harness().await;
    subscribe(&h.tracker, "3", WATCHER).await;
    h.pages.set(DIVISION_0, full_event_page());

    let first = h.tracker.poll().await;
    assert_eq!(first.new_results.len(), 12);
    assert!(first.failed_pages.is_empty());
    let pushed = h.outbox.sent_to(WATCHER);
    assert_eq!(pushed.len(), 10);
    assert_eq!(
        pushed[0],
        "LOST match 1 (10-5). Text \"rank\" for rankings. Good luck!"
    );

    let second = h.tracker.poll().await;
    assert!(second.new_results.is_empty());
    assert_eq!(h.outbox.sent_to(WATCHER).len(), 10);

    let status = h.tracker.status().await;
    assert_eq!(status.recorded_matches, 12);
    assert_eq!(status.metrics.polls, 2);
    assert_eq!(status.metrics.notifications_sent, 10);
}

#[tokio::test]
async fn test_unscored_match_is_recorded_once_scored() {
    let h = harness().await;
    subscribe(&h.tracker, "1", WATCHER).await;

    h.pages.set(DIVISION_0, results_page(&[("Q-1", "", "1 2", "3 4")]));
    let report = h.tracker.poll().await;
    assert!(report.new_results.is_empty());
    assert!(h.outbox.sent().is_empty());

    h.pages.set(DIVISION_0, results_page(&[("Q-1", "12-12 T", "1 2", "3 4")]));
    h.tracker.poll().await;
    assert_eq!(
        h.outbox.sent_to(WATCHER),
        vec!["TIED match 1 (12-12). Text \"rank\" for rankings. Good luck!"]
    );
}

#[tokio::test]
async fn test_same_label_in_two_divisions_are_distinct() {
    let h = harness().await;
    subscribe(&h.tracker, "1", WATCHER).await;
    subscribe(&h.tracker, "21", REQUESTER).await;

    h.pages.set(DIVISION_0, results_page(&[("Q-1", "20-10 R", "1 2", "3 4")]));
    h.pages.set(DIVISION_1, results_page(&[("Q-1", "20-10 R", "21 22", "23 24")]));
    let report = h.tracker.poll().await;

    let ids: Vec<&str> = report.new_results.iter().map(|r| r.match_id.as_str()).collect();
    assert_eq!(ids, vec!["0 1", "1 1"]);
    assert_eq!(h.outbox.sent_to(WATCHER).len(), 1);
    assert_eq!(h.outbox.sent_to(REQUESTER).len(), 1);
}

#[tokio::test]
async fn test_requester_is_not_pushed_results_in_its_reply() {
    let h = harness().await;
    subscribe(&h.tracker, "1", REQUESTER).await;
    subscribe(&h.tracker, "2", WATCHER).await;
    h.pages.set(DIVISION_0, results_page(&[("Q-1", "20-10 R", "1 2", "3 4")]));

    let reply = h.tracker.handle_sms(&sms(REQUESTER, "team 1")).await;
    assert!(reply.starts_with("1R w/ 2 v. 3 & 4 (W 20-10)\n"));

    assert!(h.outbox.sent_to(REQUESTER).is_empty());
    assert_eq!(
        h.outbox.sent_to(WATCHER),
        vec!["WON match 1 (20-10). Text \"rank\" for rankings. Good luck!"]
    );
}

#[tokio::test]
async fn test_failed_pull_still_pushes_followed_team() {
    let h = harness().await;
    subscribe(&h.tracker, "3", REQUESTER).await;
    h.pages.set(DIVISION_0, results_page(&[("Q-1", "20-10 R", "1 2", "3 4")]));
    h.pages.0.lock().unwrap().remove(DIVISION_1);

    let reply = h.tracker.handle_sms(&sms(REQUESTER, "1")).await;
    assert_eq!(reply, "Error occurred");

    h.tracker.poll().await;
    let state = h.tracker.state().lock().await;
    assert_eq!(state.subscriptions.team_of(REQUESTER), Some(&team("3")));
    drop(state);
    assert_eq!(
        h.outbox.sent_to(REQUESTER),
        vec!["LOST match 1 (20-10). Text \"rank\" for rankings. Good luck!"]
    );
}

#[tokio::test]
async fn test_pull_still_pushes_results_outside_the_reply() {
    let h = harness().await;
    subscribe(&h.tracker, "5", REQUESTER).await;
    h.pages.set(
        DIVISION_0,
        results_page(&[("Q-1", "20-10 R", "1 2", "3 4"), ("Q-2", "8-9 B", "5 6", "7 8")]),
    );

    let reply = h.tracker.handle_sms(&sms(REQUESTER, "1")).await;
    assert!(reply.starts_with("1R w/ 2 v. 3 & 4 (W 20-10)\n"));
    assert_eq!(
        h.outbox.sent_to(REQUESTER),
        vec!["LOST match 2 (8-9). Text \"rank\" for rankings. Good luck!"]
    );
}

#[tokio::test]
async fn test_unknown_team() {
    let h = harness().await;
    let reply = h.tracker.handle_sms(&sms(REQUESTER, "00555")).await;
    assert_eq!(reply, "Team 555 does not exist");

    let state = h.tracker.state().lock().await;
    assert_eq!(state.subscriptions.team_of(REQUESTER), None);
}

#[tokio::test]
async fn test_fetch_failure_during_pull() {
    let h = harness().await;
    h.pages.0.lock().unwrap().remove(DIVISION_1);

    let reply = h.tracker.handle_sms(&sms(REQUESTER, "1")).await;
    assert_eq!(reply, "Error occurred");

    let state = h.tracker.state().lock().await;
    assert_eq!(state.subscriptions.team_of(REQUESTER), None);
    drop(state);
    assert_eq!(h.tracker.status().await.metrics.page_failures, 1);
}

#[tokio::test]
async fn test_rankings_for_subscribed_division() {
    let h = harness().await;
    h.pages.set(
        RANKINGS_POCONO,
        rankings_page(&[("1", "9", "10", "100"), ("2", "1", "8", "90")]),
    );
    h.pages.set(RANKINGS_ALLEGHENY, rankings_page(&[("1", "21", "10", "99")]));

    let everything = h.tracker.handle_sms(&sms(REQUESTER, "RANK")).await;
    assert_eq!(
        everything,
        "(QP, RP, Matches)\n\
         Pocono\n1. 9 (10, 100, 5)\n2. 1 (8, 90, 5)\n\n\
         Allegheny\n1. 21 (10, 99, 5)\n\
         Good luck!"
    );

    subscribe(&h.tracker, "1", REQUESTER).await;
    let mine = h.tracker.handle_sms(&sms(REQUESTER, "rank")).await;
    assert_eq!(
        mine,
        "(QP, RP, Matches)\nPocono\n1. 9 (10, 100, 5)\n2. 1 (8, 90, 5)\nGood luck!"
    );
}

#[tokio::test]
async fn test_rankings_fetch_failure() {
    let h = harness().await;
    h.pages.set(RANKINGS_POCONO, rankings_page(&[]));
    let reply = h.tracker.handle_sms(&sms(REQUESTER, "rank")).await;
    assert_eq!(reply, "Error occurred");
}

#[tokio::test]
async fn test_stop_unsubscribes() {
    let h = harness().await;
    subscribe(&h.tracker, "1", REQUESTER).await;

    assert_eq!(h.tracker.handle_sms(&sms(REQUESTER, "Stop")).await, "Unsubscribed");
    let state = h.tracker.state().lock().await;
    assert_eq!(state.subscriptions.team_of(REQUESTER), None);
}

#[tokio::test]
async fn test_prompt_and_media() {
    let h = harness().await;
    assert_eq!(
        h.tracker.handle_sms(&sms(REQUESTER, "hello")).await,
        "Please enter a team number. Text \"done\" to disable. Text \"rank\" for rankings. Good luck!"
    );

    let mms = InboundSms {
        num_media: 2,
        ..sms(REQUESTER, "1")
    };
    assert_eq!(h.tracker.handle_sms(&mms).await, "This is an SMS-only service");
}

#[tokio::test]
async fn test_state_survives_restart() {
    let h = harness().await;
    subscribe(&h.tracker, "3", WATCHER).await;
    h.pages.set(DIVISION_0, full_event_page());
    h.tracker.poll().await;

    let reopened = TrackerState::open(&h.config.storage).await.unwrap();
    assert_eq!(reopened.matches.len(), 12);
    let labels: Vec<&str> = reopened
        .matches
        .results_for_team(&team("1"))
        .into_iter()
        .map(|r| r.label.as_str())
        .collect();
    assert_eq!(labels[0], "1");
    assert_eq!(labels[11], "F-1");
    assert_eq!(reopened.subscriptions.team_of(WATCHER), Some(&team("3")));
}
