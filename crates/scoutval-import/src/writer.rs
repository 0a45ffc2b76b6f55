// Upsert writer: persist mapped records by their natural keys.

use scoutval_core::db::Database;
use scoutval_core::model::{NewPlayer, NewPlayerStatistic};
use thiserror::Error;

/// The store rejected an upsert. Carries the store's own message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WriteError {
    #[error("failed to write player {name:?}: {message}")]
    Player { name: String, message: String },

    #[error("failed to write statistics for player {player_id} season {season:?}: {message}")]
    Statistics {
        player_id: i64,
        season: String,
        message: String,
    },
}

/// Destination for imported rows. Both writes are insert-or-update on the
/// record's conflict key, so re-submitting identical input is idempotent.
pub trait PlayerSink {
    /// Upsert on `name`; returns the id of the written player row.
    fn upsert_player(&self, player: &NewPlayer) -> Result<i64, WriteError>;

    /// Upsert on `(player_id, season)`.
    fn upsert_statistics(&self, stats: &NewPlayerStatistic) -> Result<(), WriteError>;
}

impl PlayerSink for Database {
    fn upsert_player(&self, player: &NewPlayer) -> Result<i64, WriteError> {
        Database::upsert_player(self, player).map_err(|e| WriteError::Player {
            name: player.name.clone(),
            message: format!("{e:#}"),
        })
    }

    fn upsert_statistics(&self, stats: &NewPlayerStatistic) -> Result<(), WriteError> {
        Database::upsert_statistics(self, stats).map_err(|e| WriteError::Statistics {
            player_id: stats.player_id,
            season: stats.season.clone(),
            message: format!("{e:#}"),
        })
    }
}
