// Player, statistics and prediction records as stored and served.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stored rows
// ---------------------------------------------------------------------------

/// A football player. `name` is the business key used for import upserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub position: String,
    pub club: String,
    pub club_logo: Option<String>,
    pub nationality: String,
    pub nationality_flag: Option<String>,
    pub market_value: i64,
    pub estimated_value: Option<i64>,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One season of statistics for a player, keyed by `(player_id, season)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatistic {
    pub id: i64,
    pub player_id: i64,
    pub season: String,
    pub goals: i64,
    pub assists: i64,
    pub appearances: i64,
    pub minutes_played: i64,
    pub pass_accuracy: Option<f64>,
    pub tackles: i64,
    pub interceptions: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A user-entered market value prediction for a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub user_id: String,
    pub player_id: i64,
    pub predicted_value: i64,
    pub confidence_score: Option<f64>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Populated only by queries that join the owning player.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<Player>,
}

/// Display details for a signed-in user, keyed by the gateway's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Write-side records
// ---------------------------------------------------------------------------

/// Player fields written by an import. Surrogate id and timestamps are owned
/// by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlayer {
    pub name: String,
    pub age: i64,
    pub position: String,
    pub club: String,
    pub club_logo: Option<String>,
    pub nationality: String,
    pub nationality_flag: Option<String>,
    pub market_value: i64,
    pub image_url: Option<String>,
}

/// Statistics fields written by an import, linked to an already-written player.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlayerStatistic {
    pub player_id: i64,
    pub season: String,
    pub goals: i64,
    pub assists: i64,
    pub appearances: i64,
    pub minutes_played: i64,
    pub pass_accuracy: Option<f64>,
    pub tackles: i64,
    pub interceptions: i64,
}

/// Fields a user supplies when creating or updating a prediction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionInput {
    pub predicted_value: i64,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial profile update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Valuation comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueDirection {
    Up,
    Down,
    Same,
}

/// How far the estimated value sits from the market value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValueDifference {
    pub value: i64,
    pub percent: i64,
    pub direction: ValueDirection,
}

impl Player {
    /// Compare `estimated_value` against `market_value`. Returns `None` when
    /// there is no estimate or the market value is zero (percent undefined).
    pub fn value_difference(&self) -> Option<ValueDifference> {
        let estimated = self.estimated_value?;
        if self.market_value == 0 {
            return None;
        }
        let difference = estimated.saturating_sub(self.market_value);
        let percent = (difference as f64 / self.market_value as f64 * 100.0).round() as i64;
        let direction = match difference.signum() {
            1 => ValueDirection::Up,
            -1 => ValueDirection::Down,
            _ => ValueDirection::Same,
        };
        Some(ValueDifference {
            value: difference.saturating_abs(),
            percent: percent.saturating_abs(),
            direction,
        })
    }
}
