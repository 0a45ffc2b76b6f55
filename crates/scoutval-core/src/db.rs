// SQLite persistence layer for players, statistics, predictions and profiles.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{
    NewPlayer, NewPlayerStatistic, Player, PlayerStatistic, Prediction, PredictionInput, Profile,
    ProfileUpdate,
};

/// Maximum rows returned by a name search.
pub const SEARCH_LIMIT: usize = 20;

const PLAYER_COLUMNS: &str = "id, name, age, position, club, club_logo, nationality, \
     nationality_flag, market_value, estimated_value, image_url, created_at, updated_at";

const STATISTIC_COLUMNS: &str = "id, player_id, season, goals, assists, appearances, \
     minutes_played, pass_accuracy, tackles, interceptions, created_at, updated_at";

const PREDICTION_COLUMNS: &str = "id, user_id, player_id, predicted_value, confidence_score, \
     notes, created_at, updated_at";

const PROFILE_COLUMNS: &str = "id, full_name, avatar_url, created_at, updated_at";

/// SQLite-backed store for the `players`, `player_statistics`,
/// `predictions` and `profiles` tables.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                name             TEXT NOT NULL UNIQUE,
                age              INTEGER NOT NULL,
                position         TEXT NOT NULL,
                club             TEXT NOT NULL,
                club_logo        TEXT,
                nationality      TEXT NOT NULL,
                nationality_flag TEXT,
                market_value     INTEGER NOT NULL,
                estimated_value  INTEGER,
                image_url        TEXT,
                created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS player_statistics (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id      INTEGER NOT NULL REFERENCES players(id),
                season         TEXT NOT NULL,
                goals          INTEGER NOT NULL DEFAULT 0,
                assists        INTEGER NOT NULL DEFAULT 0,
                appearances    INTEGER NOT NULL DEFAULT 0,
                minutes_played INTEGER NOT NULL DEFAULT 0,
                pass_accuracy  REAL,
                tackles        INTEGER NOT NULL DEFAULT 0,
                interceptions  INTEGER NOT NULL DEFAULT 0,
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(player_id, season)
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          TEXT NOT NULL,
                player_id        INTEGER NOT NULL REFERENCES players(id),
                predicted_value  INTEGER NOT NULL,
                confidence_score REAL,
                notes            TEXT,
                created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_predictions_user_id ON predictions(user_id);

            CREATE TABLE IF NOT EXISTS profiles (
                id         TEXT PRIMARY KEY,
                full_name  TEXT,
                avatar_url TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Import upserts
    // ------------------------------------------------------------------

    /// Insert a player or overwrite the existing row with the same `name`.
    /// Returns the player's row id in a single atomic statement.
    ///
    /// `created_at` and `estimated_value` survive an update; `updated_at` is
    /// refreshed.
    pub fn upsert_player(&self, player: &NewPlayer) -> Result<i64> {
        let conn = self.conn();
        let id: i64 = conn
            .query_row(
                "INSERT INTO players
                    (name, age, position, club, club_logo, nationality, nationality_flag, market_value, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(name) DO UPDATE SET
                    age              = excluded.age,
                    position         = excluded.position,
                    club             = excluded.club,
                    club_logo        = excluded.club_logo,
                    nationality      = excluded.nationality,
                    nationality_flag = excluded.nationality_flag,
                    market_value     = excluded.market_value,
                    image_url        = excluded.image_url,
                    updated_at       = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 RETURNING id",
                params![
                    player.name,
                    player.age,
                    player.position,
                    player.club,
                    player.club_logo,
                    player.nationality,
                    player.nationality_flag,
                    player.market_value,
                    player.image_url,
                ],
                |row| row.get(0),
            )
            .context("failed to upsert player")?;
        Ok(id)
    }

    /// Insert a statistics row or overwrite the existing row for the same
    /// `(player_id, season)`.
    pub fn upsert_statistics(&self, stats: &NewPlayerStatistic) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO player_statistics
                (player_id, season, goals, assists, appearances, minutes_played, pass_accuracy, tackles, interceptions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(player_id, season) DO UPDATE SET
                goals          = excluded.goals,
                assists        = excluded.assists,
                appearances    = excluded.appearances,
                minutes_played = excluded.minutes_played,
                pass_accuracy  = excluded.pass_accuracy,
                tackles        = excluded.tackles,
                interceptions  = excluded.interceptions,
                updated_at     = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![
                stats.player_id,
                stats.season,
                stats.goals,
                stats.assists,
                stats.appearances,
                stats.minutes_played,
                stats.pass_accuracy,
                stats.tackles,
                stats.interceptions,
            ],
        )
        .context("failed to upsert player statistics")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// All players ordered by name.
    pub fn list_players(&self) -> Result<Vec<Player>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {PLAYER_COLUMNS} FROM players ORDER BY name"))
            .context("failed to prepare list_players query")?;
        let players = stmt
            .query_map([], player_from_row)
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    /// Look up a player by id. Returns `None` if no such row exists.
    pub fn get_player(&self, id: i64) -> Result<Option<Player>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
            params![id],
            player_from_row,
        )
        .optional()
        .with_context(|| format!("failed to fetch player {id}"))
    }

    /// Case-insensitive substring match on name, ordered by name and capped at
    /// [`SEARCH_LIMIT`] rows.
    pub fn search_players(&self, query: &str) -> Result<Vec<Player>> {
        let conn = self.conn();
        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY name LIMIT ?2"
            ))
            .context("failed to prepare search_players query")?;
        let players = stmt
            .query_map(params![pattern, SEARCH_LIMIT as i64], player_from_row)
            .context("failed to search players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    pub fn player_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .context("failed to count players")?;
        Ok(count as usize)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// All statistics rows for a player, most recent season label first.
    pub fn player_statistics(&self, player_id: i64) -> Result<Vec<PlayerStatistic>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {STATISTIC_COLUMNS} FROM player_statistics
                 WHERE player_id = ?1 ORDER BY season DESC"
            ))
            .context("failed to prepare player_statistics query")?;
        let stats = stmt
            .query_map(params![player_id], statistic_from_row)
            .context("failed to query player statistics")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map statistics rows")?;
        Ok(stats)
    }

    pub fn statistics_for_season(
        &self,
        player_id: i64,
        season: &str,
    ) -> Result<Option<PlayerStatistic>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {STATISTIC_COLUMNS} FROM player_statistics
                 WHERE player_id = ?1 AND season = ?2"
            ),
            params![player_id, season],
            statistic_from_row,
        )
        .optional()
        .with_context(|| format!("failed to fetch statistics for player {player_id} season {season}"))
    }

    pub fn statistics_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM player_statistics", [], |row| row.get(0))
            .context("failed to count player statistics")?;
        Ok(count as usize)
    }

    // ------------------------------------------------------------------
    // Predictions
    // ------------------------------------------------------------------

    pub fn create_prediction(
        &self,
        user_id: &str,
        player_id: i64,
        input: &PredictionInput,
    ) -> Result<Prediction> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "INSERT INTO predictions (user_id, player_id, predicted_value, confidence_score, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {PREDICTION_COLUMNS}"
            ),
            params![
                user_id,
                player_id,
                input.predicted_value,
                input.confidence_score,
                input.notes,
            ],
            prediction_from_row,
        )
        .context("failed to create prediction")
    }

    /// Overwrite a prediction owned by `user_id`. Returns `None` when the
    /// prediction does not exist or belongs to another user.
    pub fn update_prediction(
        &self,
        prediction_id: i64,
        user_id: &str,
        input: &PredictionInput,
    ) -> Result<Option<Prediction>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "UPDATE predictions SET
                    predicted_value  = ?1,
                    confidence_score = ?2,
                    notes            = ?3,
                    updated_at       = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4 AND user_id = ?5
                 RETURNING {PREDICTION_COLUMNS}"
            ),
            params![
                input.predicted_value,
                input.confidence_score,
                input.notes,
                prediction_id,
                user_id,
            ],
            prediction_from_row,
        )
        .optional()
        .with_context(|| format!("failed to update prediction {prediction_id}"))
    }

    /// Delete a prediction owned by `user_id`. Returns `true` if a row was
    /// removed.
    pub fn delete_prediction(&self, prediction_id: i64, user_id: &str) -> Result<bool> {
        let conn = self.conn();
        let removed = conn
            .execute(
                "DELETE FROM predictions WHERE id = ?1 AND user_id = ?2",
                params![prediction_id, user_id],
            )
            .with_context(|| format!("failed to delete prediction {prediction_id}"))?;
        Ok(removed > 0)
    }

    /// A user's predictions, newest first, each with its player attached.
    pub fn user_predictions(&self, user_id: &str) -> Result<Vec<Prediction>> {
        let conn = self.conn();
        let player_cols = PLAYER_COLUMNS
            .split(", ")
            .map(|c| format!("p.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let prediction_cols = PREDICTION_COLUMNS
            .split(", ")
            .map(|c| format!("pr.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {prediction_cols}, {player_cols}
                 FROM predictions pr JOIN players p ON p.id = pr.player_id
                 WHERE pr.user_id = ?1
                 ORDER BY pr.created_at DESC, pr.id DESC"
            ))
            .context("failed to prepare user_predictions query")?;
        let predictions = stmt
            .query_map(params![user_id], |row| {
                let mut prediction = prediction_from_row(row)?;
                prediction.player = Some(player_from_row_at(row, 8)?);
                Ok(prediction)
            })
            .context("failed to query user predictions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map prediction rows")?;
        Ok(predictions)
    }

    pub fn player_predictions_for_user(
        &self,
        player_id: i64,
        user_id: &str,
    ) -> Result<Vec<Prediction>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PREDICTION_COLUMNS} FROM predictions
                 WHERE player_id = ?1 AND user_id = ?2 ORDER BY id"
            ))
            .context("failed to prepare player_predictions_for_user query")?;
        let predictions = stmt
            .query_map(params![player_id, user_id], prediction_from_row)
            .context("failed to query player predictions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map prediction rows")?;
        Ok(predictions)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            params![user_id],
            profile_from_row,
        )
        .optional()
        .with_context(|| format!("failed to load profile {user_id}"))
    }

    /// Apply `update` to the user's profile, creating the row on first write.
    /// Fields left as `None` keep their stored value; `updated_at` is always
    /// refreshed.
    pub fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "INSERT INTO profiles (id, full_name, avatar_url) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    full_name  = COALESCE(excluded.full_name, full_name),
                    avatar_url = COALESCE(excluded.avatar_url, avatar_url),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 RETURNING {PROFILE_COLUMNS}"
            ),
            params![user_id, update.full_name, update.avatar_url],
            profile_from_row,
        )
        .with_context(|| format!("failed to update profile {user_id}"))
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    player_from_row_at(row, 0)
}

/// Map a player whose columns start at `offset` (joined queries put the
/// player after the owning row's columns).
fn player_from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        age: row.get(offset + 2)?,
        position: row.get(offset + 3)?,
        club: row.get(offset + 4)?,
        club_logo: row.get(offset + 5)?,
        nationality: row.get(offset + 6)?,
        nationality_flag: row.get(offset + 7)?,
        market_value: row.get(offset + 8)?,
        estimated_value: row.get(offset + 9)?,
        image_url: row.get(offset + 10)?,
        created_at: row.get(offset + 11)?,
        updated_at: row.get(offset + 12)?,
    })
}

fn statistic_from_row(row: &Row<'_>) -> rusqlite::Result<PlayerStatistic> {
    Ok(PlayerStatistic {
        id: row.get(0)?,
        player_id: row.get(1)?,
        season: row.get(2)?,
        goals: row.get(3)?,
        assists: row.get(4)?,
        appearances: row.get(5)?,
        minutes_played: row.get(6)?,
        pass_accuracy: row.get(7)?,
        tackles: row.get(8)?,
        interceptions: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<Prediction> {
    Ok(Prediction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        player_id: row.get(2)?,
        predicted_value: row.get(3)?,
        confidence_score: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        player: None,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        avatar_url: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
