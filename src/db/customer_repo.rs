// src/db/customer_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::PageWindow},
    db::filters::CustomerFilter,
    models::{
        crm::{
            Contact, ContactForm, ContactLog, ContactLogView, Customer, CustomerForm,
            CustomerListRow, IndustrySet,
        },
        responses::DependentCounts,
    },
};

const CUSTOMER_COLUMNS: &str = "id, company_name, country, address, phone, email, website, \
    currency, status, company_type, industries, required_products, rank, source, \
    sales_owner_id, is_visitable, notes, is_pinned, created_at, updated_at";

#[derive(Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    //  LISTAGEM
    // =========================================================================

    pub async fn count_customers<'e, E>(
        &self,
        executor: E,
        filter: &CustomerFilter,
    ) -> Result<i64, AppError>
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

    pub async fn list_customers_page<'e, E>(
        &self,
        executor: E,
        filter: &CustomerFilter,
        window: &PageWindow,
    ) -> Result<Vec<CustomerListRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = filter
            .page_query(window)
            .build_query_as::<CustomerListRow>()
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Todas as linhas do filtro, sem paginação (exportação, destaques).
    pub async fn list_customers<'e, E>(
        &self,
        executor: E,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerListRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = filter
            .select_query()
            .build_query_as::<CustomerListRow>()
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    // =========================================================================
    //  CLIENTE
    // =========================================================================

    pub async fn find_customer<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(customer)
    }

    /// Cliente com responsável e último contato resolvidos.
    pub async fn find_customer_row<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<CustomerListRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, CustomerListRow>(
            r#"
            SELECT c.*, u.username AS sales_owner,
                   (SELECT MAX(l.created_at) FROM contact_logs l WHERE l.customer_id = c.id) AS last_contacted_at
            FROM customers c
            LEFT JOIN users u ON u.id = c.sales_owner_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn create_customer<'e, E>(
        &self,
        executor: E,
        form: &CustomerForm,
        sales_owner_id: Uuid,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let industries = IndustrySet::from(form.industries.clone()).to_codes();
        let sql = format!(
            r#"
            INSERT INTO customers (
                company_name, country, address, phone, email, website, currency, status,
                company_type, industries, required_products, rank, source,
                sales_owner_id, is_visitable, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(&form.company_name)
            .bind(form.country)
            .bind(&form.address)
            .bind(&form.phone)
            .bind(form.email.clone().unwrap_or_default())
            .bind(form.website.clone().unwrap_or_default())
            .bind(form.currency)
            .bind(form.status)
            .bind(form.company_type)
            .bind(industries)
            .bind(&form.required_products)
            .bind(form.rank)
            .bind(form.source)
            .bind(sales_owner_id)
            .bind(form.is_visitable)
            .bind(&form.notes)
            .fetch_one(executor)
            .await?;

        Ok(customer)
    }

    /// Atualiza os campos editáveis. O responsável e o destaque são preservados.
    pub async fn update_customer<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        form: &CustomerForm,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let industries = IndustrySet::from(form.industries.clone()).to_codes();
        let sql = format!(
            r#"
            UPDATE customers SET
                company_name = $2, country = $3, address = $4, phone = $5, email = $6,
                website = $7, currency = $8, status = $9, company_type = $10,
                industries = $11, required_products = $12, rank = $13, source = $14,
                is_visitable = $15, notes = $16, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .bind(&form.company_name)
            .bind(form.country)
            .bind(&form.address)
            .bind(&form.phone)
            .bind(form.email.clone().unwrap_or_default())
            .bind(form.website.clone().unwrap_or_default())
            .bind(form.currency)
            .bind(form.status)
            .bind(form.company_type)
            .bind(industries)
            .bind(&form.required_products)
            .bind(form.rank)
            .bind(form.source)
            .bind(form.is_visitable)
            .bind(&form.notes)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::NotFound("Cliente"))?;

        Ok(customer)
    }

    /// Inverte o destaque e devolve o novo estado.
    pub async fn toggle_customer_pin<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pinned = sqlx::query_scalar::<_, bool>(
            "UPDATE customers SET is_pinned = NOT is_pinned, updated_at = NOW() WHERE id = $1 RETURNING is_pinned",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Cliente"))?;
        Ok(pinned)
    }

    // Contatos, registros e cotações vão junto (ON DELETE CASCADE)
    pub async fn delete_customer<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Cliente"));
        }
        Ok(())
    }

    pub async fn customer_dependents<'e, E>(&self, executor: E, id: Uuid) -> Result<DependentCounts, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (contacts, logs, enquiries) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM contacts WHERE customer_id = $1),
                (SELECT COUNT(*) FROM contact_logs WHERE customer_id = $1),
                (SELECT COUNT(*) FROM enquiries WHERE customer_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(executor)
        .await?;

        Ok(DependentCounts {
            contacts: Some(contacts),
            contact_logs: Some(logs),
            enquiries: Some(enquiries),
            ..Default::default()
        })
    }

    // =========================================================================
    //  CONTATOS
    // =========================================================================

    pub async fn find_contact<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Contact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contact = sqlx::query_as::<_, Contact>(
            "SELECT id, customer_id, name, position, phone, email, notes FROM contacts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(contact)
    }

    pub async fn list_contacts<'e, E>(&self, executor: E, customer_id: Uuid) -> Result<Vec<Contact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, customer_id, name, position, phone, email, notes
            FROM contacts
            WHERE customer_id = $1
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;
        Ok(contacts)
    }

    pub async fn create_contact<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
        form: &ContactForm,
    ) -> Result<Contact, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (customer_id, name, position, phone, email, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, customer_id, name, position, phone, email, notes
            "#,
        )
        .bind(customer_id)
        .bind(&form.name)
        .bind(&form.position)
        .bind(&form.phone)
        .bind(form.email.clone().unwrap_or_default())
        .bind(&form.notes)
        .fetch_one(executor)
        .await?;
        Ok(contact)
    }

    pub async fn update_contact<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        form: &ContactForm,
    ) -> Result<Contact, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts SET name = $2, position = $3, phone = $4, email = $5, notes = $6
            WHERE id = $1
            RETURNING id, customer_id, name, position, phone, email, notes
            "#,
        )
        .bind(id)
        .bind(&form.name)
        .bind(&form.position)
        .bind(&form.phone)
        .bind(form.email.clone().unwrap_or_default())
        .bind(&form.notes)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Contato"))?;
        Ok(contact)
    }

    // Os registros que apontavam para o contato ficam sem contato (SET NULL)
    pub async fn delete_contact<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Contato"));
        }
        Ok(())
    }

    pub async fn contact_belongs_to<'e, E>(
        &self,
        executor: E,
        contact_id: Uuid,
        customer_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM contacts WHERE id = $1 AND customer_id = $2)",
        )
        .bind(contact_id)
        .bind(customer_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    // =========================================================================
    //  REGISTROS DE CONTATO
    // =========================================================================

    pub async fn find_log<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<ContactLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, ContactLog>(
            r#"
            SELECT id, customer_id, contact_id, topic, content, created_at, created_by
            FROM contact_logs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(log)
    }

    /// Registros do cliente, mais recentes primeiro.
    pub async fn list_log_views<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
    ) -> Result<Vec<ContactLogView>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let logs = sqlx::query_as::<_, ContactLogView>(
            r#"
            SELECT l.id, l.customer_id, l.contact_id, l.topic, l.content, l.created_at, l.created_by,
                   ct.name AS contact_name, u.username AS created_by_username
            FROM contact_logs l
            LEFT JOIN contacts ct ON ct.id = l.contact_id
            LEFT JOIN users u ON u.id = l.created_by
            WHERE l.customer_id = $1
            ORDER BY l.created_at DESC, l.id ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;
        Ok(logs)
    }

    pub async fn create_log<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
        contact_id: Option<Uuid>,
        topic: &str,
        content: &str,
        created_by: Uuid,
    ) -> Result<ContactLog, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, ContactLog>(
            r#"
            INSERT INTO contact_logs (customer_id, contact_id, topic, content, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, customer_id, contact_id, topic, content, created_at, created_by
            "#,
        )
        .bind(customer_id)
        .bind(contact_id)
        .bind(topic)
        .bind(content)
        .bind(created_by)
        .fetch_one(executor)
        .await?;
        Ok(log)
    }

    pub async fn update_log<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        contact_id: Option<Uuid>,
        topic: &str,
        content: &str,
    ) -> Result<ContactLog, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, ContactLog>(
            r#"
            UPDATE contact_logs SET contact_id = $2, topic = $3, content = $4
            WHERE id = $1
            RETURNING id, customer_id, contact_id, topic, content, created_at, created_by
            "#,
        )
        .bind(id)
        .bind(contact_id)
        .bind(topic)
        .bind(content)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Registro de contato"))?;
        Ok(log)
    }

    pub async fn delete_log<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM contact_logs WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Registro de contato"));
        }
        Ok(())
    }
}
