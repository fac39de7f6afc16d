use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{collections::HashMap, fmt};
use tracing::{info, warn};

use crate::{
    store::{JsonSnapshot, PersistError},
    types::{MatchResult, TeamNumber},
};

/// Recorded results in first-seen order.
///
/// Serialized as a JSON object keyed by match id; entries are written and read back
/// in document order so the order survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedMatches(Vec<MatchResult>);

impl RecordedMatches {
    pub fn as_slice(&self) -> &[MatchResult] {
        &self.0
    }
}

impl Serialize for RecordedMatches {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in &self.0 {
            map.serialize_entry(&result.match_id, result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RecordedMatches {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = RecordedMatches;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of match ids to match results")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((match_id, mut result)) = access.next_entry::<String, MatchResult>()? {
                    result.match_id = match_id;
                    results.push(result);
                }
                Ok(RecordedMatches(results))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// The authoritative set of recorded match results.
#[derive(Debug)]
pub struct MatchRepository {
    matches: RecordedMatches,
    index: HashMap<String, usize>,
    snapshot: Option<JsonSnapshot<RecordedMatches>>,
}

impl MatchRepository {
    /// An empty repository that is never written to disk.
    pub fn in_memory() -> Self {
        Self::from_matches(RecordedMatches::default(), None)
    }

    /// Loads the snapshot at `snapshot`'s path, starting empty if there is none.
    pub async fn open(snapshot: JsonSnapshot<RecordedMatches>) -> Result<Self, PersistError> {
        let matches = snapshot.load().await?.unwrap_or_default();
        info!(
            "Loaded {} recorded matches from {:?}",
            matches.0.len(),
            snapshot.path()
        );
        Ok(Self::from_matches(matches, Some(snapshot)))
    }

    fn from_matches(mut matches: RecordedMatches, snapshot: Option<JsonSnapshot<RecordedMatches>>) -> Self {
        let mut index = HashMap::with_capacity(matches.0.len());
        // A hand-edited snapshot may repeat a key; keep the first.
        matches.0.retain(|r| {
            if index.contains_key(&r.match_id) {
                return false;
            }
            index.insert(r.match_id.clone(), index.len());
            true
        });
        Self {
            matches,
            index,
            snapshot,
        }
    }

    /// Records `result` unless its match id is already present.
    ///
    /// Returns `true` only for a new insert, which is then flushed to the snapshot.
    /// A failed flush is logged; the in-memory insert stands.
    pub async fn record(&mut self, result: MatchResult) -> bool {
        if self.index.contains_key(&result.match_id) {
            return false;
        }
        info!("New match: {}", result.match_id);
        self.index.insert(result.match_id.clone(), self.matches.0.len());
        self.matches.0.push(result);

        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.flush(&self.matches).await {
                warn!("Failed to save recorded matches: {}", e);
            }
        }
        true
    }

    pub fn get(&self, match_id: &str) -> Option<&MatchResult> {
        self.index.get(match_id).map(|&i| &self.matches.0[i])
    }

    /// Every result involving `team`, in the order they were first recorded.
    pub fn results_for_team(&self, team: &TeamNumber) -> Vec<&MatchResult> {
        self.matches.0.iter().filter(|r| r.involves(team)).collect()
    }

    pub fn len(&self) -> usize {
        self.matches.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.0.is_empty()
    }

    pub fn snapshot(&self) -> &RecordedMatches {
        &self.matches
    }
}
