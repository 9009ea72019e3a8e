// src/services/enquiry_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        pagination::{Page, PageWindow},
    },
    db::{
        filters::{EnquiryFilter, ListQuery},
        ActivityRepository, CustomerRepository, EnquiryRepository,
    },
    models::{
        activity::{ActionKind, AuditedEntity, NewActivity},
        auth::Actor,
        enquiry::{
            Enquiry, EnquiryAttachment, EnquiryDetail, EnquiryForm, EnquiryItem, EnquiryItemForm,
            EnquiryItemView, EnquiryListRow, EnquiryTrack, EnquiryTrackForm,
        },
        responses::DeleteConfirmation,
    },
    services::{
        aggregation::{ensure_author, enquiry_totals},
        storage::{remove_files, FileStorage},
    },
};

#[derive(Clone)]
pub struct EnquiryService {
    repo: EnquiryRepository,
    customer_repo: CustomerRepository,
    activity: ActivityRepository,
    storage: Arc<dyn FileStorage>,
    page_size: i64,
}

impl EnquiryService {
    pub fn new(
        repo: EnquiryRepository,
        customer_repo: CustomerRepository,
        activity: ActivityRepository,
        storage: Arc<dyn FileStorage>,
        page_size: i64,
    ) -> Self {
        Self { repo, customer_repo, activity, storage, page_size }
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
    //  COTAÇÕES
    // =========================================================================

    pub async fn list_enquiries(&self, query: &ListQuery) -> Result<Page<EnquiryListRow>, AppError> {
        let pool = self.repo.pool();
        let filter = EnquiryFilter::from_query(query);

        let total = self.repo.count_enquiries(pool, &filter).await?;
        let window = PageWindow::resolve(query.page.as_deref(), total, self.page_size);
        let rows = self.repo.list_enquiries_page(pool, &filter, &window).await?;

        Ok(Page::new(rows, window, total))
    }

    pub async fn export_enquiries(&self, query: &ListQuery) -> Result<Vec<EnquiryListRow>, AppError> {
        let filter = EnquiryFilter::from_query(query);
        self.repo.list_enquiries(self.repo.pool(), &filter).await
    }

    pub async fn enquiry_detail(&self, id: Uuid) -> Result<EnquiryDetail, AppError> {
        let pool = self.repo.pool();
        let header = self
            .repo
            .find_enquiry_row(pool, id)
            .await?
            .ok_or(AppError::NotFound("Cotação"))?;

        let items = self.repo.list_items(pool, id).await?;
        let tracks = self.repo.list_track_views(pool, id).await?;
        let attachments = self.repo.list_attachments(pool, id).await?;

        Ok(EnquiryDetail {
            totals: enquiry_totals(&items),
            enquiry: header.enquiry,
            customer_name: header.customer_name,
            currency: header.currency,
            created_by_username: header.created_by_username,
            items: items.into_iter().map(EnquiryItemView::from).collect(),
            tracks,
            attachments,
        })
    }

    async fn get_enquiry(&self, id: Uuid) -> Result<Enquiry, AppError> {
        self.repo
            .find_enquiry(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Cotação"))
    }

    // Cliente inexistente no corpo é erro de campo, não 404
    async fn check_customer(&self, customer_id: Uuid) -> Result<(), AppError> {
        let exists = self
            .customer_repo
            .find_customer(self.repo.pool(), customer_id)
            .await?
            .is_some();
        if !exists {
            return Err(AppError::field("customer_id", "invalid_choice", "Cliente inexistente."));
        }
        Ok(())
    }

    pub async fn create_enquiry(&self, actor: &Actor, form: &EnquiryForm) -> Result<Enquiry, AppError> {
        self.check_customer(form.customer_id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let enquiry = self.repo.create_enquiry(&mut *tx, form, actor.id).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::Enquiry, enquiry.id, enquiry.display_label(), ActionKind::Addition, "Cotação criada."),
            )
            .await?;

        tx.commit().await?;
        tracing::info!("Cotação '{}' criada por {}.", enquiry.internal_no, actor.username);
        Ok(enquiry)
    }

    pub async fn update_enquiry(&self, actor: &Actor, id: Uuid, form: &EnquiryForm) -> Result<Enquiry, AppError> {
        self.get_enquiry(id).await?;
        self.check_customer(form.customer_id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let enquiry = self.repo.update_enquiry(&mut *tx, id, form).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::Enquiry, id, enquiry.display_label(), ActionKind::Change, "Cotação alterada."),
            )
            .await?;

        tx.commit().await?;
        Ok(enquiry)
    }

    pub async fn toggle_enquiry_pin(&self, actor: &Actor, id: Uuid) -> Result<bool, AppError> {
        let enquiry = self.get_enquiry(id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let pinned = self.repo.toggle_enquiry_pin(&mut *tx, id).await?;
        let message = if pinned { "Cotação destacada." } else { "Destaque da cotação removido." };
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::Enquiry, id, enquiry.display_label(), ActionKind::Change, message),
            )
            .await?;

        tx.commit().await?;
        Ok(pinned)
    }

    pub async fn enquiry_delete_confirmation(&self, id: Uuid) -> Result<DeleteConfirmation, AppError> {
        let enquiry = self.get_enquiry(id).await?;
        let dependents = self.repo.enquiry_dependents(self.repo.pool(), id).await?;
        Ok(DeleteConfirmation::new("enquiry", id, enquiry.display_label()).with_dependents(dependents))
    }

    pub async fn delete_enquiry(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        let enquiry = self.get_enquiry(id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let paths = self.repo.attachment_paths_for_enquiry(&mut *tx, id).await?;
        self.repo.delete_enquiry(&mut *tx, id).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::Enquiry, id, enquiry.display_label(), ActionKind::Deletion, "Cotação excluída."),
            )
            .await?;

        tx.commit().await?;
        remove_files(self.storage.as_ref(), &paths).await;

        tracing::info!("Cotação '{}' excluída por {}.", enquiry.internal_no, actor.username);
        Ok(())
    }

    // =========================================================================
    //  ITENS
    // =========================================================================

    pub async fn get_item(&self, id: Uuid) -> Result<EnquiryItem, AppError> {
        self.repo
            .find_item(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Item"))
    }

    pub async fn create_item(
        &self,
        actor: &Actor,
        enquiry_id: Uuid,
        form: &EnquiryItemForm,
    ) -> Result<EnquiryItem, AppError> {
        self.get_enquiry(enquiry_id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let item = self.repo.create_item(&mut *tx, enquiry_id, form).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::EnquiryItem, item.id, item.display_label(), ActionKind::Addition, "Item adicionado."),
            )
            .await?;

        tx.commit().await?;
        Ok(item)
    }

    pub async fn update_item(&self, actor: &Actor, id: Uuid, form: &EnquiryItemForm) -> Result<EnquiryItem, AppError> {
        self.get_item(id).await?;
        let mut tx = self.repo.pool().begin().await?;

        let item = self.repo.update_item(&mut *tx, id, form).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::EnquiryItem, id, item.display_label(), ActionKind::Change, "Item alterado."),
            )
            .await?;

        tx.commit().await?;
        Ok(item)
    }

    pub async fn item_delete_confirmation(&self, id: Uuid) -> Result<DeleteConfirmation, AppError> {
        let item = self.get_item(id).await?;
        Ok(DeleteConfirmation::new("enquiry_item", id, item.display_label()))
    }

    /// Devolve a cotação dona do item (para o front voltar ao detalhe).
    pub async fn delete_item(&self, actor: &Actor, id: Uuid) -> Result<Uuid, AppError> {
        let item = self.get_item(id).await?;
        let mut tx = self.repo.pool().begin().await?;

        self.repo.delete_item(&mut *tx, id).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(actor, AuditedEntity::EnquiryItem, id, item.display_label(), ActionKind::Deletion, "Item excluído."),
            )
            .await?;

        tx.commit().await?;
        Ok(item.enquiry_id)
    }

    // =========================================================================
    //  ACOMPANHAMENTOS (sem log de atividades)
    // =========================================================================

    pub async fn get_track(&self, id: Uuid) -> Result<EnquiryTrack, AppError> {
        self.repo
            .find_track(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Acompanhamento"))
    }

    pub async fn create_track(
        &self,
        actor: &Actor,
        enquiry_id: Uuid,
        form: &EnquiryTrackForm,
    ) -> Result<EnquiryTrack, AppError> {
        self.get_enquiry(enquiry_id).await?;
        self.repo
            .create_track(self.repo.pool(), enquiry_id, &form.content, actor.id)
            .await
    }

    pub async fn update_track(&self, actor: &Actor, id: Uuid, form: &EnquiryTrackForm) -> Result<EnquiryTrack, AppError> {
        let track = self.get_track(id).await?;
        ensure_author(actor, Some(track.created_by), "acompanhamento")?;
        self.repo.update_track(self.repo.pool(), id, &form.content).await
    }

    pub async fn track_delete_confirmation(&self, actor: &Actor, id: Uuid) -> Result<DeleteConfirmation, AppError> {
        let track = self.get_track(id).await?;
        ensure_author(actor, Some(track.created_by), "acompanhamento")?;
        let label: String = track.content.chars().take(50).collect();
        Ok(DeleteConfirmation::new("enquiry_track", id, label))
    }

    pub async fn delete_track(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        let track = self.get_track(id).await?;
        ensure_author(actor, Some(track.created_by), "acompanhamento")?;
        self.repo.delete_track(self.repo.pool(), id).await
    }

    // =========================================================================
    //  ANEXOS
    // =========================================================================

    pub async fn get_attachment(&self, id: Uuid) -> Result<EnquiryAttachment, AppError> {
        self.repo
            .find_attachment(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Anexo"))
    }

    pub async fn upload_attachment(
        &self,
        actor: &Actor,
        enquiry_id: Uuid,
        file_name: &str,
        description: &str,
        bytes: &[u8],
    ) -> Result<EnquiryAttachment, AppError> {
        self.get_enquiry(enquiry_id).await?;

        // Primeiro o arquivo; se o banco falhar, o arquivo recém-gravado é removido
        let path = self.storage.save(enquiry_id, file_name, bytes).await?;

        let result = async {
            let mut tx = self.repo.pool().begin().await?;
            let attachment = self
                .repo
                .create_attachment(&mut *tx, enquiry_id, &path, file_name, description, actor.id)
                .await?;
            self.activity
                .record(
                    &mut *tx,
                    &Self::entry(
                        actor,
                        AuditedEntity::EnquiryAttachment,
                        attachment.id,
                        attachment.file_name.clone(),
                        ActionKind::Addition,
                        "Anexo enviado.",
                    ),
                )
                .await?;
            tx.commit().await?;
            Ok::<_, AppError>(attachment)
        }
        .await;

        if result.is_err() {
            remove_files(self.storage.as_ref(), std::slice::from_ref(&path)).await;
        }
        result
    }

    pub async fn download_attachment(&self, id: Uuid) -> Result<(EnquiryAttachment, Vec<u8>), AppError> {
        let attachment = self.get_attachment(id).await?;
        let bytes = self.storage.read(&attachment.file_path).await?;
        Ok((attachment, bytes))
    }

    pub async fn attachment_delete_confirmation(&self, id: Uuid) -> Result<DeleteConfirmation, AppError> {
        let attachment = self.get_attachment(id).await?;
        Ok(DeleteConfirmation::new("enquiry_attachment", id, attachment.file_name))
    }

    // Fronteira não atômica: a linha sai no commit, o arquivo depois
    pub async fn delete_attachment(&self, actor: &Actor, id: Uuid) -> Result<Uuid, AppError> {
        let attachment = self.get_attachment(id).await?;
        let mut tx = self.repo.pool().begin().await?;

        self.repo.delete_attachment(&mut *tx, id).await?;
        self.activity
            .record(
                &mut *tx,
                &Self::entry(
                    actor,
                    AuditedEntity::EnquiryAttachment,
                    id,
                    attachment.file_name.clone(),
                    ActionKind::Deletion,
                    "Anexo excluído.",
                ),
            )
            .await?;

        tx.commit().await?;
        remove_files(self.storage.as_ref(), std::slice::from_ref(&attachment.file_path)).await;
        Ok(attachment.enquiry_id)
    }
}
