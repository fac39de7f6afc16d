use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::{
    store::{JsonSnapshot, PersistError},
    types::TeamNumber,
};

/// Team number to subscribed phone numbers.
pub type SubscriptionMap = BTreeMap<TeamNumber, Vec<String>>;

/// Who gets texted about which team. A phone number follows at most one team.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    teams: SubscriptionMap,
    snapshot: Option<JsonSnapshot<SubscriptionMap>>,
}

impl SubscriptionRegistry {
    pub fn in_memory() -> Self {
        Self {
            teams: SubscriptionMap::new(),
            snapshot: None,
        }
    }

    pub async fn open(snapshot: JsonSnapshot<SubscriptionMap>) -> Result<Self, PersistError> {
        let teams = snapshot.load().await?.unwrap_or_default();
        info!(
            "Loaded {} subscriptions from {:?}",
            teams.values().map(Vec::len).sum::<usize>(),
            snapshot.path()
        );
        Ok(Self {
            teams,
            snapshot: Some(snapshot),
        })
    }

    /// Subscribes `phone` to `team`, dropping any previous subscription first.
    pub async fn subscribe(&mut self, team: &TeamNumber, phone: &str) {
        self.remove(phone);
        self.teams
            .entry(team.clone())
            .or_default()
            .push(phone.to_string());
        info!("Subscribed {} to team {}", phone, team);
        self.flush().await;
    }

    /// Drops `phone`'s subscription, returning the team it followed.
    pub async fn unsubscribe(&mut self, phone: &str) -> Option<TeamNumber> {
        let team = self.remove(phone);
        if let Some(team) = &team {
            info!("Unsubscribed {} from team {}", phone, team);
        }
        self.flush().await;
        team
    }

    pub fn team_of(&self, phone: &str) -> Option<&TeamNumber> {
        self.teams
            .iter()
            .find(|(_, phones)| phones.iter().any(|p| p == phone))
            .map(|(team, _)| team)
    }

    pub fn subscribers(&self, team: &TeamNumber) -> &[String] {
        self.teams.get(team).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn snapshot(&self) -> &SubscriptionMap {
        &self.teams
    }

    pub fn subscriber_count(&self) -> usize {
        self.teams.values().map(Vec::len).sum()
    }

    // First match is the only match while the one-team invariant holds.
    fn remove(&mut self, phone: &str) -> Option<TeamNumber> {
        for (team, phones) in self.teams.iter_mut() {
            if let Some(pos) = phones.iter().position(|p| p == phone) {
                phones.remove(pos);
                return Some(team.clone());
            }
        }
        None
    }

    async fn flush(&self) {
        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.flush(&self.teams).await {
                warn!("Failed to save registered numbers: {}", e);
            }
        }
    }
}
