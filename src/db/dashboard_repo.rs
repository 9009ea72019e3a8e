// src/db/dashboard_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    db::filters::ITEM_SUBTOTAL_NTD_SQL,
    models::dashboard::{DashboardGoal, DashboardMetrics, GoalForm, Period},
};

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Todas as métricas do intervalo [start, end] em uma única leitura.
    // Os clientes "cotados" e "fechados" contam pela data da cotação.
    pub async fn metrics<'e, E>(
        &self,
        executor: E,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DashboardMetrics, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            WITH window_enquiries AS (
                SELECT e.id, e.customer_id, e.status,
                       COALESCE((SELECT SUM({ITEM_SUBTOTAL_NTD_SQL}) FROM enquiry_items i
                                 WHERE i.enquiry_id = e.id), 0) AS total_ntd
                FROM enquiries e
                WHERE e.created_at >= $1 AND e.created_at <= $2
            )
            SELECT
                (SELECT COUNT(*) FROM customers
                 WHERE created_at >= $1 AND created_at <= $2) AS new_customers_count,
                COUNT(DISTINCT customer_id) AS inquired_customers_count,
                COUNT(DISTINCT customer_id) FILTER (WHERE status = 'success') AS success_customers_count,
                COUNT(*) AS new_enquiries_count,
                COALESCE(SUM(total_ntd), 0) AS new_enquiries_amount,
                COUNT(*) FILTER (WHERE status = 'success') AS success_enquiries_count,
                COALESCE(SUM(total_ntd) FILTER (WHERE status = 'success'), 0) AS success_enquiries_amount
            FROM window_enquiries
            "#
        );

        let metrics = sqlx::query_as::<_, DashboardMetrics>(&sql)
            .bind(start)
            .bind(end)
            .fetch_one(executor)
            .await?;

        Ok(metrics)
    }

    // =========================================================================
    //  METAS
    // =========================================================================

    pub async fn find_goal<'e, E>(&self, executor: E, period: Period) -> Result<Option<DashboardGoal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let goal = sqlx::query_as::<_, DashboardGoal>(
            r#"
            SELECT period, new_customer_target, new_enquiry_target,
                   enquiry_amount_target, success_amount_target
            FROM dashboard_goals
            WHERE period = $1
            "#,
        )
        .bind(period.code())
        .fetch_optional(executor)
        .await?;
        Ok(goal)
    }

    /// Busca a meta do período, criando com os valores padrão se ainda não existir.
    pub async fn get_or_create_goal(&self, defaults: &DashboardGoal) -> Result<DashboardGoal, AppError> {
        // Dois acessos concorrentes podem tentar criar a mesma linha: o segundo não faz nada
        sqlx::query(
            r#"
            INSERT INTO dashboard_goals (
                period, new_customer_target, new_enquiry_target,
                enquiry_amount_target, success_amount_target
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (period) DO NOTHING
            "#,
        )
        .bind(defaults.period.code())
        .bind(defaults.new_customer_target)
        .bind(defaults.new_enquiry_target)
        .bind(defaults.enquiry_amount_target)
        .bind(defaults.success_amount_target)
        .execute(&self.pool)
        .await?;

        self.find_goal(&self.pool, defaults.period)
            .await?
            .ok_or(AppError::NotFound("Meta"))
    }

    pub async fn upsert_goal<'e, E>(
        &self,
        executor: E,
        period: Period,
        form: &GoalForm,
    ) -> Result<DashboardGoal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let goal = sqlx::query_as::<_, DashboardGoal>(
            r#"
            INSERT INTO dashboard_goals (
                period, new_customer_target, new_enquiry_target,
                enquiry_amount_target, success_amount_target
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (period) DO UPDATE SET
                new_customer_target = EXCLUDED.new_customer_target,
                new_enquiry_target = EXCLUDED.new_enquiry_target,
                enquiry_amount_target = EXCLUDED.enquiry_amount_target,
                success_amount_target = EXCLUDED.success_amount_target
            RETURNING period, new_customer_target, new_enquiry_target,
                      enquiry_amount_target, success_amount_target
            "#,
        )
        .bind(period.code())
        .bind(form.new_customer_target)
        .bind(form.new_enquiry_target)
        .bind(form.enquiry_amount_target)
        .bind(form.success_amount_target)
        .fetch_one(executor)
        .await?;
        Ok(goal)
    }
}
