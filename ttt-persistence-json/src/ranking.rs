use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ttt_server_domain::{
    ServiceError, ServiceResult,
    mirror::ArcDocumentMirror,
    player::PlayerUsername,
    ranking::{MatchOutcome, RankingEntry, RankingRepository},
};

use crate::{RANKING_FILE, document::JsonDocument};

/// Keyed by player name. Key order is insertion order and breaks ties in the ranking.
type RankingDocument = Map<String, Value>;

#[derive(Serialize, Deserialize, Default)]
struct RankingRecord {
    #[serde(default)]
    points: u32,
    #[serde(default)]
    wins: u32,
    #[serde(default)]
    draws: u32,
    #[serde(default)]
    losses: u32,
}

impl From<RankingRecord> for RankingEntry {
    fn from(record: RankingRecord) -> Self {
        RankingEntry {
            points: record.points,
            wins: record.wins,
            draws: record.draws,
            losses: record.losses,
        }
    }
}

impl From<&RankingEntry> for RankingRecord {
    fn from(entry: &RankingEntry) -> Self {
        RankingRecord {
            points: entry.points,
            wins: entry.wins,
            draws: entry.draws,
            losses: entry.losses,
        }
    }
}

fn parse_entry(player: &str, value: &Value) -> ServiceResult<RankingEntry> {
    RankingRecord::deserialize(value)
        .map(RankingEntry::from)
        .map_err(|e| ServiceError::Internal(format!("Invalid ranking entry for {}: {}", player, e)))
}

fn to_value(entry: &RankingEntry) -> ServiceResult<Value> {
    serde_json::to_value(RankingRecord::from(entry))
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

pub struct JsonRankingRepository {
    document: JsonDocument<RankingDocument>,
}

impl JsonRankingRepository {
    pub fn new(data_dir: &Path, mirror: ArcDocumentMirror) -> Self {
        Self {
            document: JsonDocument::new(data_dir, RANKING_FILE, mirror),
        }
    }
}

#[async_trait::async_trait]
impl RankingRepository for JsonRankingRepository {
    async fn get_entries(&self) -> ServiceResult<Vec<(PlayerUsername, RankingEntry)>> {
        let document = self.document.load().await?;
        document
            .iter()
            .map(|(player, value)| Ok((player.clone(), parse_entry(player, value)?)))
            .collect()
    }

    async fn record_outcomes(
        &self,
        outcomes: &[(PlayerUsername, MatchOutcome)],
    ) -> ServiceResult<()> {
        let _guard = self.document.lock().await;
        let mut document = self.document.load().await?;
        for (player, outcome) in outcomes {
            let mut entry = match document.get(player) {
                Some(value) => parse_entry(player, value)?,
                None => RankingEntry::default(),
            };
            entry.apply(*outcome);
            document.insert(player.clone(), to_value(&entry)?);
        }
        self.document.store(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{RecordingMirror, temp_data_dir};

    #[tokio::test]
    async fn test_record_outcomes() {
        let dir = temp_data_dir();
        let mirror = RecordingMirror::default();
        let repository = JsonRankingRepository::new(&dir, mirror.arc());
        let alice = "alice".to_string();
        for outcome in [MatchOutcome::Win, MatchOutcome::Draw, MatchOutcome::Loss] {
            repository
                .record_outcomes(&[(alice.clone(), outcome)])
                .await
                .unwrap();
        }
        let entries = repository.get_entries().await.unwrap();
        assert_eq!(
            entries,
            vec![(
                alice,
                RankingEntry {
                    points: 4,
                    wins: 1,
                    draws: 1,
                    losses: 1,
                }
            )]
        );
        assert_eq!(mirror.paths().len(), 3);
    }

    #[tokio::test]
    async fn test_insertion_order_is_kept() {
        let dir = temp_data_dir();
        let repository = JsonRankingRepository::new(&dir, RecordingMirror::default().arc());
        repository
            .record_outcomes(&[
                ("zoe".to_string(), MatchOutcome::Win),
                ("adam".to_string(), MatchOutcome::Loss),
            ])
            .await
            .unwrap();
        repository
            .record_outcomes(&[("zoe".to_string(), MatchOutcome::Draw)])
            .await
            .unwrap();

        let reopened = JsonRankingRepository::new(&dir, RecordingMirror::default().arc());
        let names: Vec<String> = reopened
            .get_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["zoe", "adam"]);
    }

    #[tokio::test]
    async fn test_reads_existing_ranking_document() {
        let dir = temp_data_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(RANKING_FILE),
            r#"{
    "maria": { "points": 7, "wins": 2, "draws": 1, "losses": 0 },
    "joao": { "points": 3, "wins": 1, "draws": 0, "losses": 2 }
}"#,
        )
        .unwrap();
        let repository = JsonRankingRepository::new(&dir, RecordingMirror::default().arc());
        let entries = repository.get_entries().await.unwrap();
        assert_eq!(entries[0].0, "maria");
        assert_eq!(entries[0].1.points, 7);
        assert_eq!(entries[1].1.losses, 2);
    }
}
