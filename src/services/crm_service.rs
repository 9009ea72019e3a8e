// src/services/crm_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        pagination::{Page, PageWindow},
    },
    db::{
        filters::{CustomerFilter, ListQuery},
        ActivityRepository, CustomerRepository, EnquiryRepository,
    },
    models::{
        activity::{ActionKind, AuditedEntity, NewActivity},
        auth::Actor,
        crm::{
            Contact, ContactForm, ContactLog, ContactLogForm, Customer, CustomerDetail, CustomerForm,
            CustomerListRow,
        },
        responses::DeleteConfirmation,
    },
    services::{
        aggregation::{ensure_author, last_contacted_at},
        storage::{remove_files, FileStorage},
    },
};

#[derive(Clone)]
pub struct CrmService {
    repo: CustomerRepository,
    enquiry_repo: EnquiryRepository,
    activity: ActivityRepository,
    storage: Arc<dyn FileStorage>,
    page_size: i64,
}

impl CrmService {
    pub fn new(
        repo: CustomerRepository,
        enquiry_repo: EnquiryRepository,
        activity: ActivityRepository,
        storage: Arc<dyn FileStorage>,
        page_size: i64,
    ) -> Self {
        Self { repo, enquiry_repo, activity, storage, page_size }
    }

    fn entry(
        actor: &Actor,
        entity: AuditedEntity,
        entity_id: Uuid,
        label: String,
        action: ActionKind,
        message: impl Into<String>,
    ) -> NewActivity {
        NewActivity { actor_id: actor.id, entity, entity_id, label, action, message: message.into() }
    }

    // =========================================================================
    //  CLIENTES
    // =========================================================================

    pub async fn list_customers(&self, query: &ListQuery) -> Result<Page<CustomerListRow>, AppError> {
        let pool = self.repo.pool();
        let filter = CustomerFilter::from_query(query);

        let total = self.repo.count_customers(pool, &filter).await?;
        let window = PageWindow::resolve(query.page.as_deref(), total, self.page_size);
        let rows = self.repo.list_customers_page(pool, &filter, &window).await?;

        Ok(Page::new(rows, window, total))
    }

    /// Mesmo filtro e ordenação da listagem, sem paginação.
    pub async fn export_customers(&self, query: &ListQuery) -> Result<Vec<CustomerListRow>, AppError> {
        let filter = CustomerFilter::from_query(query);
        self.repo.list_customers(self.repo.pool(), &filter).await
    }

    pub async fn customer_detail(&self, id: Uuid) -> Result<CustomerDetail, AppError> {
        let pool = self.repo.pool();
        let row = self
            .repo
            .find_customer_row(pool, id)
            .await?
            .ok_or(AppError::NotFound("Cliente"))?;

        let contacts = self.repo.list_contacts(pool, id).await?;
        let logs = self.repo.list_log_views(pool, id).await?;
        let enquiries = self.enquiry_repo.summaries_for_customer(pool, id).await?;

        Ok(CustomerDetail {
            last_contacted_at: last_contacted_at(logs.iter().map(|view| &view.log)),
            customer: row.customer,
            sales_owner: row.sales_owner,
            contacts,
            logs,
            enquiries,
        })
    }

    async fn get_customer(&self, id: Uuid) -> Result<Customer, AppError> {
        self.repo
            .find_customer(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Cliente"))
    }

    pub async fn create_customer(&self, actor: &Actor, form: &CustomerForm) -> Result<Customer, AppError> {
        let mut tx = self.repo.pool().begin().await?;

        // O responsável é sempre quem cria
        let customer = self.repo.create_customer(&mut *tx, form, actor.id).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::Customer, customer.id, customer.display_label(), ActionKind::Addition, "Cliente criado."),
            )
            .await?;

        tx.commit().await?;
        tracing::info!("Cliente '{}' criado por {}.", customer.company_name, actor.username);
        Ok(customer)
    }

    pub async fn update_customer(&self, actor: &Actor, id: Uuid, form: &CustomerForm) -> Result<Customer, AppError> {
        self.get_customer(id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let customer = self.repo.update_customer(&mut *tx, id, form).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::Customer, id, customer.display_label(), ActionKind::Change, "Cliente alterado."),
            )
            .await?;

        tx.commit().await?;
        Ok(customer)
    }

    pub async fn toggle_customer_pin(&self, actor: &Actor, id: Uuid) -> Result<bool, AppError> {
        let customer = self.get_customer(id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let pinned = self.repo.toggle_customer_pin(&mut *tx, id).await?;
        let message = if pinned { "Cliente destacado." } else { "Destaque do cliente removido." };
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::Customer, id, customer.display_label(), ActionKind::Change, message),
            )
            .await?;

        tx.commit().await?;
        Ok(pinned)
    }

    pub async fn customer_delete_confirmation(&self, id: Uuid) -> Result<DeleteConfirmation, AppError> {
        let customer = self.get_customer(id).await?;
        let dependents = self.repo.customer_dependents(self.repo.pool(), id).await?;
        Ok(DeleteConfirmation::new("customer", id, customer.display_label()).with_dependents(dependents))
    }

    pub async fn delete_customer(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        let customer = self.get_customer(id).await?;
        let mut tx = self.repo.pool().begin().await?;

        // Os arquivos das cotações em cascata só somem depois do commit
        let paths = self.enquiry_repo.attachment_paths_for_customer(&mut *tx, id).await?;
        self.repo.delete_customer(&mut *tx, id).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::Customer, id, customer.display_label(), ActionKind::Deletion, "Cliente excluído."),
            )
            .await?;

        tx.commit().await?;
        remove_files(self.storage.as_ref(), &paths).await;

        tracing::info!("Cliente '{}' excluído por {}.", customer.company_name, actor.username);
        Ok(())
    }

    // =========================================================================
    //  CONTATOS
    // =========================================================================

    pub async fn get_contact(&self, id: Uuid) -> Result<Contact, AppError> {
        self.repo
            .find_contact(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Contato"))
    }

    pub async fn create_contact(
        &self,
        actor: &Actor,
        customer_id: Uuid,
        form: &ContactForm,
    ) -> Result<Contact, AppError> {
        let customer = self.get_customer(customer_id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let contact = self.repo.create_contact(&mut *tx, customer_id, form).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(
                    actor,
                    AuditedEntity::Contact,
                    contact.id,
                    contact.display_label(&customer.company_name),
                    ActionKind::Addition,
                    "Contato criado.",
                ),
            )
            .await?;

        tx.commit().await?;
        Ok(contact)
    }

    pub async fn update_contact(&self, actor: &Actor, id: Uuid, form: &ContactForm) -> Result<Contact, AppError> {
        let existing = self.get_contact(id).await?;
        let customer = self.get_customer(existing.customer_id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let contact = self.repo.update_contact(&mut *tx, id, form).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(
                    actor,
                    AuditedEntity::Contact,
                    id,
                    contact.display_label(&customer.company_name),
                    ActionKind::Change,
                    "Contato alterado.",
                ),
            )
            .await?;

        tx.commit().await?;
        Ok(contact)
    }

    pub async fn contact_delete_confirmation(&self, id: Uuid) -> Result<DeleteConfirmation, AppError> {
        let contact = self.get_contact(id).await?;
        let customer = self.get_customer(contact.customer_id).await?;
        Ok(DeleteConfirmation::new("contact", id, contact.display_label(&customer.company_name)))
    }

    pub async fn delete_contact(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        let contact = self.get_contact(id).await?;
        let customer = self.get_customer(contact.customer_id).await?;
        let mut tx = self.repo.pool().begin().await?;

        self.repo.delete_contact(&mut *tx, id).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(
                    actor,
                    AuditedEntity::Contact,
                    id,
                    contact.display_label(&customer.company_name),
                    ActionKind::Deletion,
                    "Contato excluído.",
                ),
            )
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    //  REGISTROS DE CONTATO (sem log de atividades)
    // =========================================================================

    pub async fn get_log(&self, id: Uuid) -> Result<ContactLog, AppError> {
        self.repo
            .find_log(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Registro de contato"))
    }

    // O contato escolhido tem que ser do mesmo cliente
    async fn check_contact(&self, customer_id: Uuid, contact_id: Option<Uuid>) -> Result<(), AppError> {
        if let Some(contact_id) = contact_id {
            if !self.repo.contact_belongs_to(self.repo.pool(), contact_id, customer_id).await? {
                return Err(AppError::field(
                    "contact_id",
                    "invalid_choice",
                    "O contato não pertence a este cliente.",
                ));
            }
        }
        Ok(())
    }

    pub async fn create_log(
        &self,
        actor: &Actor,
        customer_id: Uuid,
        form: &ContactLogForm,
    ) -> Result<ContactLog, AppError> {
        self.get_customer(customer_id).await?;
        self.check_contact(customer_id, form.contact_id).await?;

        self.repo
            .create_log(self.repo.pool(), customer_id, form.contact_id, &form.topic, &form.content, actor.id)
            .await
    }

    pub async fn update_log(&self, actor: &Actor, id: Uuid, form: &ContactLogForm) -> Result<ContactLog, AppError> {
        let log = self.get_log(id).await?;
        ensure_author(actor, log.created_by, "registro de contato")?;
        self.check_contact(log.customer_id, form.contact_id).await?;

        self.repo
            .update_log(self.repo.pool(), id, form.contact_id, &form.topic, &form.content)
            .await
    }

    pub async fn log_delete_confirmation(&self, actor: &Actor, id: Uuid) -> Result<DeleteConfirmation, AppError> {
        let log = self.get_log(id).await?;
        ensure_author(actor, log.created_by, "registro de contato")?;
        Ok(DeleteConfirmation::new("contact_log", id, log.topic))
    }

    pub async fn delete_log(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        let log = self.get_log(id).await?;
        ensure_author(actor, log.created_by, "registro de contato")?;
        self.repo.delete_log(self.repo.pool(), id).await
    }
}
