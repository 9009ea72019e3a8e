// src/db/activity_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::activity::{ActivityEntry, NewActivity},
};

// Quantas entradas a tela de atividades recentes mostra
pub const RECENT_ACTIVITY_LIMIT: i64 = 15;

#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grava a entrada. Chamado com a mesma transação da mutação.
    pub async fn record<'e, E>(&self, executor: E, entry: &NewActivity) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // O rótulo é truncado para caber na coluna
        let label: String = entry.label.chars().take(200).collect();

        sqlx::query(
            r#"
            INSERT INTO activity_log (actor_id, entity_type, entity_id, label, action, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.entity.code())
        .bind(entry.entity_id)
        .bind(label)
        .bind(entry.action.code())
        .bind(&entry.message)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn recent(&self) -> Result<Vec<ActivityEntry>, AppError> {
        let entries = sqlx::query_as::<_, ActivityEntry>(
            r#"
            SELECT a.id, a.actor_id, u.username AS actor_username, a.entity_type, a.entity_id,
                   a.label, a.action, a.message, a.created_at
            FROM activity_log a
            LEFT JOIN users u ON u.id = a.actor_id
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT $1
            "#,
        )
        .bind(RECENT_ACTIVITY_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
