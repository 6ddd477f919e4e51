use std::{str::FromStr, sync::Arc};

use log::info;
use ttt_core::{TttMark, TttMatchResult};

use crate::{ServiceError, ServiceResult, player::PlayerUsername};

const WIN_POINTS: u32 = 3;
const DRAW_POINTS: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Win,
    Draw,
    Loss,
}

impl MatchOutcome {
    pub fn for_mark(result: TttMatchResult, mark: TttMark) -> Self {
        match result {
            TttMatchResult::Draw => MatchOutcome::Draw,
            TttMatchResult::Win(winner) if winner == mark => MatchOutcome::Win,
            TttMatchResult::Win(_) => MatchOutcome::Loss,
        }
    }
}

impl FromStr for MatchOutcome {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "win" => Ok(MatchOutcome::Win),
            "draw" => Ok(MatchOutcome::Draw),
            "loss" => Ok(MatchOutcome::Loss),
            _ => ServiceError::bad_request(format!("Unknown outcome: {}", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankingEntry {
    pub points: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl RankingEntry {
    pub fn apply(&mut self, outcome: MatchOutcome) {
        match outcome {
            MatchOutcome::Win => {
                self.points = self.points.saturating_add(WIN_POINTS);
                self.wins = self.wins.saturating_add(1);
            }
            MatchOutcome::Draw => {
                self.points = self.points.saturating_add(DRAW_POINTS);
                self.draws = self.draws.saturating_add(1);
            }
            MatchOutcome::Loss => {
                self.losses = self.losses.saturating_add(1);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub position: usize,
    pub player: PlayerUsername,
    pub entry: RankingEntry,
}

pub type ArcRankingRepository = Arc<Box<dyn RankingRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait RankingRepository {
    /// Entries in insertion order.
    async fn get_entries(&self) -> ServiceResult<Vec<(PlayerUsername, RankingEntry)>>;
    /// Applies every outcome in one write, creating missing entries.
    async fn record_outcomes(&self, outcomes: &[(PlayerUsername, MatchOutcome)])
    -> ServiceResult<()>;
}

pub type ArcRankingService = Arc<Box<dyn RankingService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait RankingService {
    async fn record_result(
        &self,
        player: &PlayerUsername,
        outcome: MatchOutcome,
    ) -> ServiceResult<()>;
    async fn record_match_result(
        &self,
        result: TttMatchResult,
        players: &[PlayerUsername; 2],
    ) -> ServiceResult<()>;
    async fn get_ranking(&self) -> ServiceResult<Vec<Standing>>;
    async fn get_entry(&self, player: &PlayerUsername) -> ServiceResult<RankingEntry>;
}

pub struct RankingServiceImpl {
    ranking_repository: ArcRankingRepository,
}

impl RankingServiceImpl {
    pub fn new(ranking_repository: ArcRankingRepository) -> Self {
        Self { ranking_repository }
    }
}

#[async_trait::async_trait]
impl RankingService for RankingServiceImpl {
    async fn record_result(
        &self,
        player: &PlayerUsername,
        outcome: MatchOutcome,
    ) -> ServiceResult<()> {
        if player.trim().is_empty() {
            return ServiceError::bad_request("Player name must not be empty");
        }
        self.ranking_repository
            .record_outcomes(&[(player.clone(), outcome)])
            .await?;
        info!("Recorded {:?} for {}", outcome, player);
        Ok(())
    }

    async fn record_match_result(
        &self,
        result: TttMatchResult,
        players: &[PlayerUsername; 2],
    ) -> ServiceResult<()> {
        let outcomes: Vec<(PlayerUsername, MatchOutcome)> = TttMark::ALL
            .iter()
            .map(|mark| {
                (
                    players[mark.seat()].clone(),
                    MatchOutcome::for_mark(result, *mark),
                )
            })
            .collect();
        self.ranking_repository.record_outcomes(&outcomes).await?;
        info!(
            "Recorded match result ({}) for {} vs {}",
            result, players[0], players[1]
        );
        Ok(())
    }

    async fn get_ranking(&self) -> ServiceResult<Vec<Standing>> {
        let mut entries = self.ranking_repository.get_entries().await?;
        // stable, so equal points keep insertion order
        entries.sort_by(|a, b| b.1.points.cmp(&a.1.points));
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, (player, entry))| Standing {
                position: i + 1,
                player,
                entry,
            })
            .collect())
    }

    async fn get_entry(&self, player: &PlayerUsername) -> ServiceResult<RankingEntry> {
        let entries = self.ranking_repository.get_entries().await?;
        match entries.into_iter().find(|(name, _)| name == player) {
            Some((_, entry)) => Ok(entry),
            None => ServiceError::not_found("Player has no ranking entry"),
        }
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockRankingRepository {
    entries: Arc<std::sync::Mutex<Vec<(PlayerUsername, RankingEntry)>>>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl RankingRepository for MockRankingRepository {
    async fn get_entries(&self) -> ServiceResult<Vec<(PlayerUsername, RankingEntry)>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn record_outcomes(
        &self,
        outcomes: &[(PlayerUsername, MatchOutcome)],
    ) -> ServiceResult<()> {
        let mut entries = self.entries.lock().unwrap();
        for (player, outcome) in outcomes {
            match entries.iter_mut().find(|(name, _)| name == player) {
                Some((_, entry)) => entry.apply(*outcome),
                None => {
                    let mut entry = RankingEntry::default();
                    entry.apply(*outcome);
                    entries.push((player.clone(), entry));
                }
            }
        }
        Ok(())
    }
}
