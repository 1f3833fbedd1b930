//! SQLite Memory Store
//!
//! Implements `MemoryInterface` over the `prompt_request_pieces` and `scores`
//! tables. Identifiers, labels and converter lists are stored as JSON text;
//! `orchestrator_id` is denormalized out of the orchestrator identifier so
//! per-orchestrator lookups can use an index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdk::memory::Result;
use sdk::{
    Identifier, MemoryError, MemoryInterface, PromptRequestPiece, PromptRequestResponse, Score,
};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::Database;

/// Bound parameters per `IN (...)` query, below SQLite's variable limit
const IN_CLAUSE_CHUNK: usize = 500;

const PIECE_COLUMNS: &str = "id, role, conversation_id, sequence, timestamp, labels, \
     converter_identifiers, prompt_target_identifier, orchestrator_identifier, \
     original_value_data_type, original_value, original_value_sha256, \
     converted_value_data_type, converted_value, converted_value_sha256, response_error";

/// Insert column order; `sequence` is last so it can be computed in place
const INSERT_COLUMNS: &str = "id, role, conversation_id, timestamp, labels, \
     converter_identifiers, prompt_target_identifier, orchestrator_identifier, orchestrator_id, \
     original_value_data_type, original_value, original_value_sha256, \
     converted_value_data_type, converted_value, converted_value_sha256, response_error, sequence";

const SCORE_COLUMNS: &str = "id, score_type, score_value, score_value_description, \
     score_category, score_rationale, score_metadata, scorer_class_identifier, \
     prompt_request_response_id, timestamp";

/// Memory store backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteMemory {
    pool: SqlitePool,
}

impl SqliteMemory {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a file-backed store, creating it if needed
    pub async fn new(db_path: &Path) -> anyhow::Result<Self> {
        Ok(Database::new(db_path).await?.memory())
    }

    /// Open a private in-memory store
    pub async fn in_memory() -> anyhow::Result<Self> {
        Ok(Database::in_memory().await?.memory())
    }

    async fn fetch_pieces_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PromptRequestPiece>> {
        let mut pieces = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM prompt_request_pieces WHERE id IN (",
                PIECE_COLUMNS
            ));
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.to_string());
            }
            separated.push_unseparated(")");

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            for row in &rows {
                pieces.push(piece_from_row(row)?);
            }
        }
        Ok(pieces)
    }
}

#[async_trait]
impl MemoryInterface for SqliteMemory {
    async fn add_request_response_to_memory(
        &self,
        request: &mut PromptRequestResponse,
    ) -> Result<()> {
        self.add_turns_to_memory(std::slice::from_mut(request)).await
    }

    async fn add_turns_to_memory(&self, turns: &mut [PromptRequestResponse]) -> Result<()> {
        // Rolled back on drop, so an abandoned append leaves the connection clean
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for turn in turns.iter_mut() {
            append_turn(&mut *tx, turn).await?;
        }
        tx.commit().await.map_err(db_error)?;

        for turn in turns.iter() {
            debug!(
                "Stored {} piece(s) on conversation {} at sequence {}",
                turn.request_pieces.len(),
                turn.conversation_id().unwrap_or_default(),
                turn.request_pieces.first().map_or(0, |p| p.sequence)
            );
        }
        Ok(())
    }

    async fn add_request_pieces_to_memory(&self, pieces: &[PromptRequestPiece]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for piece in pieces {
            insert_piece(&mut *tx, piece).await?;
        }
        tx.commit().await.map_err(db_error)
    }

    async fn add_scores_to_memory(&self, scores: &[Score]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for score in scores {
            sqlx::query(
                r#"
                INSERT INTO scores (
                    id, score_type, score_value, score_value_description, score_category,
                    score_rationale, score_metadata, scorer_class_identifier,
                    prompt_request_response_id, timestamp
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(score.id.to_string())
            .bind(score.score_type.as_str())
            .bind(&score.score_value)
            .bind(&score.score_value_description)
            .bind(&score.score_category)
            .bind(&score.score_rationale)
            .bind(&score.score_metadata)
            .bind(serde_json::to_string(&score.scorer_class_identifier)?)
            .bind(score.prompt_request_response_id.to_string())
            .bind(score.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Vec<PromptRequestResponse>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM prompt_request_pieces WHERE conversation_id = ? \
             ORDER BY sequence, rowid",
            PIECE_COLUMNS
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut turns: Vec<PromptRequestResponse> = Vec::new();
        for row in &rows {
            let piece = piece_from_row(row)?;
            match turns.last_mut() {
                Some(turn) if turn.request_pieces[0].sequence == piece.sequence => {
                    turn.request_pieces.push(piece);
                }
                _ => turns.push(PromptRequestResponse::new(vec![piece])),
            }
        }
        Ok(turns)
    }

    async fn get_prompt_request_pieces_by_id(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<PromptRequestPiece>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<Uuid, PromptRequestPiece> = self
            .fetch_pieces_by_ids(ids)
            .await?
            .into_iter()
            .map(|piece| (piece.id, piece))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_prompt_request_pieces_by_orchestrator(
        &self,
        orchestrator_id: &str,
    ) -> Result<Vec<PromptRequestPiece>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM prompt_request_pieces WHERE orchestrator_id = ? ORDER BY rowid",
            PIECE_COLUMNS
        ))
        .bind(orchestrator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(piece_from_row).collect()
    }

    async fn get_prompt_request_pieces_by_labels(
        &self,
        labels: &HashMap<String, String>,
    ) -> Result<Vec<PromptRequestPiece>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM prompt_request_pieces WHERE 1 = 1",
            PIECE_COLUMNS
        ));
        for (key, value) in labels {
            builder
                .push(" AND EXISTS (SELECT 1 FROM json_each(labels) WHERE json_each.key = ")
                .push_bind(key.clone())
                .push(" AND json_each.value = ")
                .push_bind(value.clone())
                .push(")");
        }
        builder.push(" ORDER BY rowid");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(piece_from_row).collect()
    }

    async fn get_scores_by_orchestrator_id(&self, orchestrator_id: &str) -> Result<Vec<Score>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scores WHERE prompt_request_response_id IN \
             (SELECT id FROM prompt_request_pieces WHERE orchestrator_id = ?) \
             ORDER BY rowid",
            SCORE_COLUMNS
        ))
        .bind(orchestrator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(score_from_row).collect()
    }

    async fn get_scores_by_prompt_ids(&self, ids: &[Uuid]) -> Result<Vec<Score>> {
        let mut scores = Vec::new();
        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM scores WHERE prompt_request_response_id IN (",
                SCORE_COLUMNS
            ));
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.to_string());
            }
            separated.push_unseparated(") ORDER BY rowid");

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            for row in &rows {
                scores.push(score_from_row(row)?);
            }
        }
        Ok(scores)
    }
}

/// Number the turn after its conversation's last sequence and insert its pieces
///
/// The first insert reads the next sequence number itself. Being the write
/// that opens the transaction, it takes SQLite's write lock before reading, so
/// concurrent writers on one conversation cannot pick the same number.
async fn append_turn(conn: &mut SqliteConnection, turn: &mut PromptRequestResponse) -> Result<()> {
    let Some(first) = turn.request_pieces.first() else {
        return Ok(());
    };

    let sql = format!(
        "INSERT INTO prompt_request_pieces ({}) \
         SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, COALESCE(MAX(sequence) + 1, 0) \
         FROM prompt_request_pieces WHERE conversation_id = ? \
         RETURNING sequence",
        INSERT_COLUMNS
    );
    let row = bind_piece(sqlx::query(&sql), first)?
        .bind(&first.conversation_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;
    let next: i64 = column(&row, "sequence")?;

    turn.set_sequence(next);
    for piece in turn.request_pieces.iter().skip(1) {
        insert_piece(conn, piece).await?;
    }
    Ok(())
}

async fn insert_piece(conn: &mut SqliteConnection, piece: &PromptRequestPiece) -> Result<()> {
    let sql = format!(
        "INSERT INTO prompt_request_pieces ({}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        INSERT_COLUMNS
    );
    bind_piece(sqlx::query(&sql), piece)?
        .bind(piece.sequence)
        .execute(conn)
        .await
        .map_err(db_error)?;
    Ok(())
}

/// Bind every column of `INSERT_COLUMNS` except the trailing `sequence`
fn bind_piece<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    piece: &'q PromptRequestPiece,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    Ok(query
        .bind(piece.id.to_string())
        .bind(piece.role.as_str())
        .bind(&piece.conversation_id)
        .bind(piece.timestamp.to_rfc3339())
        .bind(serde_json::to_string(&piece.labels)?)
        .bind(serde_json::to_string(&piece.converter_identifiers)?)
        .bind(optional_json(&piece.prompt_target_identifier)?)
        .bind(optional_json(&piece.orchestrator_identifier)?)
        .bind(piece.orchestrator_identifier.as_ref().map(|i| i.id.clone()))
        .bind(piece.original_value_data_type.as_str())
        .bind(&piece.original_value)
        .bind(&piece.original_value_sha256)
        .bind(piece.converted_value_data_type.as_str())
        .bind(&piece.converted_value)
        .bind(&piece.converted_value_sha256)
        .bind(piece.response_error.as_str()))
}

fn optional_json(identifier: &Option<Identifier>) -> Result<Option<String>> {
    identifier
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(MemoryError::from)
}

fn piece_from_row(row: &SqliteRow) -> Result<PromptRequestPiece> {
    let prompt_target_identifier: Option<String> = column(row, "prompt_target_identifier")?;
    let orchestrator_identifier: Option<String> = column(row, "orchestrator_identifier")?;

    Ok(PromptRequestPiece {
        id: parse_uuid(&column::<String>(row, "id")?)?,
        role: parse_enum(&column::<String>(row, "role")?)?,
        conversation_id: column(row, "conversation_id")?,
        sequence: column(row, "sequence")?,
        timestamp: parse_timestamp(&column::<String>(row, "timestamp")?)?,
        labels: serde_json::from_str(&column::<String>(row, "labels")?)?,
        converter_identifiers: serde_json::from_str(&column::<String>(
            row,
            "converter_identifiers",
        )?)?,
        prompt_target_identifier: prompt_target_identifier
            .map(|json| serde_json::from_str(&json))
            .transpose()?,
        orchestrator_identifier: orchestrator_identifier
            .map(|json| serde_json::from_str(&json))
            .transpose()?,
        original_value_data_type: parse_enum(&column::<String>(row, "original_value_data_type")?)?,
        original_value: column(row, "original_value")?,
        original_value_sha256: column(row, "original_value_sha256")?,
        converted_value_data_type: parse_enum(&column::<String>(
            row,
            "converted_value_data_type",
        )?)?,
        converted_value: column(row, "converted_value")?,
        converted_value_sha256: column(row, "converted_value_sha256")?,
        response_error: parse_enum(&column::<String>(row, "response_error")?)?,
    })
}

fn score_from_row(row: &SqliteRow) -> Result<Score> {
    Ok(Score {
        id: parse_uuid(&column::<String>(row, "id")?)?,
        score_type: parse_enum(&column::<String>(row, "score_type")?)?,
        score_value: column(row, "score_value")?,
        score_value_description: column(row, "score_value_description")?,
        score_category: column(row, "score_category")?,
        score_rationale: column(row, "score_rationale")?,
        score_metadata: column(row, "score_metadata")?,
        scorer_class_identifier: serde_json::from_str(&column::<String>(
            row,
            "scorer_class_identifier",
        )?)?,
        prompt_request_response_id: parse_uuid(&column::<String>(
            row,
            "prompt_request_response_id",
        )?)?,
        timestamp: parse_timestamp(&column::<String>(row, "timestamp")?)?,
    })
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| MemoryError::Serialization(format!("column {}: {}", name, e)))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| MemoryError::Serialization(e.to_string()))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| MemoryError::Serialization(e.to_string()))
}

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse().map_err(MemoryError::Serialization)
}

/// Map a sqlx error, reporting a primary-key clash as an identity collision
fn db_error(e: sqlx::Error) -> MemoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            MemoryError::IdentityCollision(db.message().to_string())
        }
        _ => MemoryError::Database(e.to_string()),
    }
}
