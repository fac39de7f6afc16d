use anyhow::{Context, Result};
use serde::Deserialize;
use std::{future::Future, path::Path};
use tracing::info;

use crate::{
    config::SmsConfig,
    outcome::{outcome, Outcome},
    subscriptions::SubscriptionRegistry,
    types::MatchResult,
};

/// Outbound text message sender.
pub trait Notifier {
    fn send(&self, to: &str, body: &str) -> impl Future<Output = Result<()>> + Send;
}

/// One push message waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwilioAccount {
    pub sid: String,
    pub auth_token: String,
}

impl TwilioAccount {
    /// Credentials from the environment, else from the JSON account file.
    pub async fn resolve(config: &SmsConfig) -> Result<Self> {
        if let (Some(sid), Some(auth_token)) = (&config.account_sid, &config.auth_token) {
            return Ok(Self {
                sid: sid.clone(),
                auth_token: auth_token.clone(),
            });
        }
        Self::from_file(&config.account_file).await
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Could not read SMS account file {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid SMS account file {:?}", path))
    }
}

/// Sends messages through the Twilio REST API.
#[derive(Clone)]
pub struct TwilioNotifier {
    client: reqwest::Client,
    account: TwilioAccount,
    from_number: String,
    api_base: String,
}

impl TwilioNotifier {
    pub fn new(account: TwilioAccount, config: &SmsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            account,
            from_number: config.from_number.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }
}

impl Notifier for TwilioNotifier {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account.sid
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account.sid, Some(&self.account.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .with_context(|| format!("Failed to send message to {}", to))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("SMS provider returned HTTP {} for {}: {}", status, to, detail);
        }
        info!("Sent message to {}: {:?}", to, body);
        Ok(())
    }
}

/// `Text "rank" for rankings. <sign-off>`
pub fn rank_text(sign_off: &str) -> String {
    format!("Text \"rank\" for rankings. {}", sign_off)
}

/// `Text "done" to disable. Text "rank" for rankings. <sign-off>`
pub fn help_text(sign_off: &str) -> String {
    format!("Text \"done\" to disable. {}", rank_text(sign_off))
}

pub fn result_message(outcome: Outcome, result: &MatchResult, sign_off: &str) -> String {
    format!(
        "{} match {} ({}). {}",
        outcome.verb(),
        result.label,
        result.score,
        rank_text(sign_off)
    )
}

/// One message per subscriber of each team in a newly recorded match.
pub fn notifications_for(
    result: &MatchResult,
    registry: &SubscriptionRegistry,
    sign_off: &str,
) -> Result<Vec<Notification>> {
    let mut notifications = Vec::new();
    for team in result.teams() {
        let subscribers = registry.subscribers(team);
        if subscribers.is_empty() {
            continue;
        }
        let body = result_message(outcome(result, team)?, result, sign_off);
        for phone in subscribers {
            notifications.push(Notification {
                to: phone.clone(),
                body: body.clone(),
            });
        }
    }
    Ok(notifications)
}
