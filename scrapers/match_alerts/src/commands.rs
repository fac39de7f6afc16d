use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer};

/// The SMS provider's incoming-message webhook fields.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundSms {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "NumMedia", default, deserialize_with = "media_count")]
    pub num_media: u32,
}

/// Any `NumMedia` value other than empty or zero counts as an attachment.
fn media_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    Ok(raw.parse().unwrap_or(1))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The message carried attachments.
    MediaRejected,
    Rankings,
    Unsubscribe,
    Help,
    /// Digits found in the message, not yet normalized.
    Team(String),
    /// Nothing recognizable; ask for a team number.
    Prompt,
}

struct Rule {
    pattern: Regex,
    build: fn(&Captures) -> Command,
}

/// Ordered text rules; the first matching rule decides the command.
pub struct CommandParser {
    rules: Vec<Rule>,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    pub fn new() -> Self {
        let rule = |pattern: &str, build: fn(&Captures) -> Command| Rule {
            pattern: Regex::new(pattern).unwrap(),
            build,
        };
        Self {
            rules: vec![
                rule(r"(?i)rank", |_| Command::Rankings),
                rule(r"(?i)done|stop", |_| Command::Unsubscribe),
                rule(r"\?", |_| Command::Help),
                rule(r"(\d{1,5})", |caps| Command::Team(caps[1].to_string())),
            ],
        }
    }

    pub fn parse(&self, body: &str, num_media: u32) -> Command {
        if num_media > 0 {
            return Command::MediaRejected;
        }
        self.rules
            .iter()
            .find_map(|rule| rule.pattern.captures(body).map(|caps| (rule.build)(&caps)))
            .unwrap_or(Command::Prompt)
    }
}
