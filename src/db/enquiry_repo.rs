// src/db/enquiry_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::PageWindow},
    db::filters::{EnquiryFilter, ITEM_SUBTOTAL_NTD_SQL},
    models::{
        enquiry::{
            Enquiry, EnquiryAttachment, EnquiryForm, EnquiryItem, EnquiryItemForm, EnquiryListRow,
            EnquirySummary, EnquiryTrack, EnquiryTrackView,
        },
        responses::DependentCounts,
    },
};

const ENQUIRY_COLUMNS: &str =
    "id, internal_no, customer_id, external_no, status, is_pinned, created_by, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, enquiry_id, item_name, item_spec, material, unit_price, \
    exchange_rate, quantity, cost, cost_rate, supplier, note";

const ATTACHMENT_COLUMNS: &str =
    "id, enquiry_id, file_path, file_name, description, uploaded_at, uploaded_by";

// Número interno duplicado vira 409 em vez de 500
fn map_internal_no_conflict(e: sqlx::Error, internal_no: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(format!(
                "O número interno '{}' já está em uso.",
                internal_no
            ));
        }
    }
    e.into()
}

#[derive(Clone)]
pub struct EnquiryRepository {
    pool: PgPool,
}

impl EnquiryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    //  LISTAGEM
    // =========================================================================

    pub async fn count_enquiries<'e, E>(&self, executor: E, filter: &EnquiryFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total = filter
            .count_query()
            .build_query_scalar::<i64>()
            .fetch_one(executor)
            .await?;
        Ok(total)
    }

    pub async fn list_enquiries_page<'e, E>(
        &self,
        executor: E,
        filter: &EnquiryFilter,
        window: &PageWindow,
    ) -> Result<Vec<EnquiryListRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = filter
            .page_query(window)
            .build_query_as::<EnquiryListRow>()
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    pub async fn list_enquiries<'e, E>(
        &self,
        executor: E,
        filter: &EnquiryFilter,
    ) -> Result<Vec<EnquiryListRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = filter
            .select_query()
            .build_query_as::<EnquiryListRow>()
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Resumo das cotações de um cliente (detalhe do cliente).
    pub async fn summaries_for_customer<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
    ) -> Result<Vec<EnquirySummary>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT e.id, e.internal_no, e.external_no, e.status, c.company_name AS customer_name,
                   COALESCE((SELECT SUM({ITEM_SUBTOTAL_NTD_SQL}) FROM enquiry_items i
                             WHERE i.enquiry_id = e.id), 0) AS total_amount_ntd,
                   e.created_at
            FROM enquiries e
            JOIN customers c ON c.id = e.customer_id
            WHERE e.customer_id = $1
            ORDER BY e.created_at DESC, e.id ASC
            "#
        );
        let rows = sqlx::query_as::<_, EnquirySummary>(&sql)
            .bind(customer_id)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    // =========================================================================
    //  COTAÇÃO
    // =========================================================================

    pub async fn find_enquiry<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Enquiry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {ENQUIRY_COLUMNS} FROM enquiries WHERE id = $1");
        let enquiry = sqlx::query_as::<_, Enquiry>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(enquiry)
    }

    /// Cabeçalho com cliente, moeda, criador e total em moeda base.
    pub async fn find_enquiry_row<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<EnquiryListRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT e.*, c.company_name AS customer_name, c.currency,
                   u.username AS created_by_username,
                   COALESCE((SELECT SUM({ITEM_SUBTOTAL_NTD_SQL}) FROM enquiry_items i
                             WHERE i.enquiry_id = e.id), 0) AS total_amount_ntd
            FROM enquiries e
            JOIN customers c ON c.id = e.customer_id
            JOIN users u ON u.id = e.created_by
            WHERE e.id = $1
            "#
        );
        let row = sqlx::query_as::<_, EnquiryListRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn create_enquiry<'e, E>(
        &self,
        executor: E,
        form: &EnquiryForm,
        created_by: Uuid,
    ) -> Result<Enquiry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO enquiries (internal_no, customer_id, external_no, status, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ENQUIRY_COLUMNS}
            "#
        );
        let enquiry = sqlx::query_as::<_, Enquiry>(&sql)
            .bind(&form.internal_no)
            .bind(form.customer_id)
            .bind(&form.external_no)
            .bind(form.status)
            .bind(created_by)
            .fetch_one(executor)
            .await
            .map_err(|e| map_internal_no_conflict(e, &form.internal_no))?;
        Ok(enquiry)
    }

    // O criador e o destaque não mudam na edição
    pub async fn update_enquiry<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        form: &EnquiryForm,
    ) -> Result<Enquiry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE enquiries SET
                internal_no = $2, customer_id = $3, external_no = $4, status = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {ENQUIRY_COLUMNS}
            "#
        );
        let enquiry = sqlx::query_as::<_, Enquiry>(&sql)
            .bind(id)
            .bind(&form.internal_no)
            .bind(form.customer_id)
            .bind(&form.external_no)
            .bind(form.status)
            .fetch_optional(executor)
            .await
            .map_err(|e| map_internal_no_conflict(e, &form.internal_no))?
            .ok_or(AppError::NotFound("Cotação"))?;
        Ok(enquiry)
    }

    pub async fn toggle_enquiry_pin<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pinned = sqlx::query_scalar::<_, bool>(
            "UPDATE enquiries SET is_pinned = NOT is_pinned, updated_at = NOW() WHERE id = $1 RETURNING is_pinned",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Cotação"))?;
        Ok(pinned)
    }

    // Itens, acompanhamentos e anexos vão junto (ON DELETE CASCADE)
    pub async fn delete_enquiry<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM enquiries WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Cotação"));
        }
        Ok(())
    }

    pub async fn enquiry_dependents<'e, E>(&self, executor: E, id: Uuid) -> Result<DependentCounts, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (items, tracks, attachments) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM enquiry_items WHERE enquiry_id = $1),
                (SELECT COUNT(*) FROM enquiry_tracks WHERE enquiry_id = $1),
                (SELECT COUNT(*) FROM enquiry_attachments WHERE enquiry_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(executor)
        .await?;

        Ok(DependentCounts {
            items: Some(items),
            tracks: Some(tracks),
            attachments: Some(attachments),
            ..Default::default()
        })
    }

    // =========================================================================
    //  ITENS
    // =========================================================================

    pub async fn find_item<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<EnquiryItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM enquiry_items WHERE id = $1");
        let item = sqlx::query_as::<_, EnquiryItem>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(item)
    }

    pub async fn list_items<'e, E>(&self, executor: E, enquiry_id: Uuid) -> Result<Vec<EnquiryItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM enquiry_items WHERE enquiry_id = $1 ORDER BY item_name ASC, id ASC"
        );
        let items = sqlx::query_as::<_, EnquiryItem>(&sql)
            .bind(enquiry_id)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    pub async fn create_item<'e, E>(
        &self,
        executor: E,
        enquiry_id: Uuid,
        form: &EnquiryItemForm,
    ) -> Result<EnquiryItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO enquiry_items (
                enquiry_id, item_name, item_spec, material, unit_price, exchange_rate,
                quantity, cost, cost_rate, supplier, note
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let item = sqlx::query_as::<_, EnquiryItem>(&sql)
            .bind(enquiry_id)
            .bind(&form.item_name)
            .bind(&form.item_spec)
            .bind(&form.material)
            .bind(form.unit_price)
            .bind(form.exchange_rate)
            .bind(form.quantity)
            .bind(form.cost)
            .bind(form.cost_rate)
            .bind(&form.supplier)
            .bind(&form.note)
            .fetch_one(executor)
            .await?;
        Ok(item)
    }

    pub async fn update_item<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        form: &EnquiryItemForm,
    ) -> Result<EnquiryItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE enquiry_items SET
                item_name = $2, item_spec = $3, material = $4, unit_price = $5,
                exchange_rate = $6, quantity = $7, cost = $8, cost_rate = $9,
                supplier = $10, note = $11
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let item = sqlx::query_as::<_, EnquiryItem>(&sql)
            .bind(id)
            .bind(&form.item_name)
            .bind(&form.item_spec)
            .bind(&form.material)
            .bind(form.unit_price)
            .bind(form.exchange_rate)
            .bind(form.quantity)
            .bind(form.cost)
            .bind(form.cost_rate)
            .bind(&form.supplier)
            .bind(&form.note)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::NotFound("Item"))?;
        Ok(item)
    }

    pub async fn delete_item<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM enquiry_items WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Item"));
        }
        Ok(())
    }

    // =========================================================================
    //  ACOMPANHAMENTOS
    // =========================================================================

    pub async fn find_track<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<EnquiryTrack>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let track = sqlx::query_as::<_, EnquiryTrack>(
            "SELECT id, enquiry_id, content, created_at, created_by FROM enquiry_tracks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(track)
    }

    pub async fn list_track_views<'e, E>(
        &self,
        executor: E,
        enquiry_id: Uuid,
    ) -> Result<Vec<EnquiryTrackView>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tracks = sqlx::query_as::<_, EnquiryTrackView>(
            r#"
            SELECT t.id, t.enquiry_id, t.content, t.created_at, t.created_by,
                   u.username AS created_by_username
            FROM enquiry_tracks t
            JOIN users u ON u.id = t.created_by
            WHERE t.enquiry_id = $1
            ORDER BY t.created_at DESC, t.id ASC
            "#,
        )
        .bind(enquiry_id)
        .fetch_all(executor)
        .await?;
        Ok(tracks)
    }

    pub async fn create_track<'e, E>(
        &self,
        executor: E,
        enquiry_id: Uuid,
        content: &str,
        created_by: Uuid,
    ) -> Result<EnquiryTrack, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let track = sqlx::query_as::<_, EnquiryTrack>(
            r#"
            INSERT INTO enquiry_tracks (enquiry_id, content, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, enquiry_id, content, created_at, created_by
            "#,
        )
        .bind(enquiry_id)
        .bind(content)
        .bind(created_by)
        .fetch_one(executor)
        .await?;
        Ok(track)
    }

    pub async fn update_track<'e, E>(&self, executor: E, id: Uuid, content: &str) -> Result<EnquiryTrack, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let track = sqlx::query_as::<_, EnquiryTrack>(
            r#"
            UPDATE enquiry_tracks SET content = $2
            WHERE id = $1
            RETURNING id, enquiry_id, content, created_at, created_by
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Acompanhamento"))?;
        Ok(track)
    }

    pub async fn delete_track<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM enquiry_tracks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Acompanhamento"));
        }
        Ok(())
    }

    // =========================================================================
    //  ANEXOS
    // =========================================================================

    pub async fn find_attachment<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<EnquiryAttachment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {ATTACHMENT_COLUMNS} FROM enquiry_attachments WHERE id = $1");
        let attachment = sqlx::query_as::<_, EnquiryAttachment>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(attachment)
    }

    pub async fn list_attachments<'e, E>(
        &self,
        executor: E,
        enquiry_id: Uuid,
    ) -> Result<Vec<EnquiryAttachment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM enquiry_attachments WHERE enquiry_id = $1 ORDER BY uploaded_at DESC, id ASC"
        );
        let attachments = sqlx::query_as::<_, EnquiryAttachment>(&sql)
            .bind(enquiry_id)
            .fetch_all(executor)
            .await?;
        Ok(attachments)
    }

    pub async fn create_attachment<'e, E>(
        &self,
        executor: E,
        enquiry_id: Uuid,
        file_path: &str,
        file_name: &str,
        description: &str,
        uploaded_by: Uuid,
    ) -> Result<EnquiryAttachment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO enquiry_attachments (enquiry_id, file_path, file_name, description, uploaded_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ATTACHMENT_COLUMNS}
            "#
        );
        let attachment = sqlx::query_as::<_, EnquiryAttachment>(&sql)
            .bind(enquiry_id)
            .bind(file_path)
            .bind(file_name)
            .bind(description)
            .bind(uploaded_by)
            .fetch_one(executor)
            .await?;
        Ok(attachment)
    }

    pub async fn delete_attachment<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM enquiry_attachments WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Anexo"));
        }
        Ok(())
    }

    /// Arquivos a remover depois do delete em cascata de uma cotação.
    pub async fn attachment_paths_for_enquiry<'e, E>(
        &self,
        executor: E,
        enquiry_id: Uuid,
    ) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let paths = sqlx::query_scalar::<_, String>(
            "SELECT file_path FROM enquiry_attachments WHERE enquiry_id = $1",
        )
        .bind(enquiry_id)
        .fetch_all(executor)
        .await?;
        Ok(paths)
    }

    /// Idem, para todas as cotações de um cliente.
    pub async fn attachment_paths_for_customer<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
    ) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let paths = sqlx::query_scalar::<_, String>(
            r#"
            SELECT a.file_path
            FROM enquiry_attachments a
            JOIN enquiries e ON e.id = a.enquiry_id
            WHERE e.customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;
        Ok(paths)
    }
}
