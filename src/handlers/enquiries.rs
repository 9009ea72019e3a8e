// src/handlers/enquiries.rs

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, pagination::Page, payload::Payload},
    config::AppState,
    db::filters::ListQuery,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::{
        enquiry::{
            EnquiryAttachment, EnquiryDetail, EnquiryForm, EnquiryItem, EnquiryItemForm, EnquiryListRow,
            EnquiryTrack, EnquiryTrackForm,
        },
        responses::{ActionResult, DeleteConfirmation},
    },
    services::export::enquiries_csv,
};

const DESCRIPTION_MAX_CHARS: usize = 255;
// Mesmo limite da coluna enquiry_attachments.file_name
const FILE_NAME_MAX_CHARS: usize = 255;

// =============================================================================
//  COTAÇÕES
// =============================================================================

// GET /api/enquiries
#[utoipa::path(
    get,
    path = "/api/enquiries",
    tag = "Enquiries",
    params(ListQuery),
    responses(
        (status = 200, description = "Página de cotações com totais em NTD", body = Page<EnquiryListRow>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_enquiries(
    State(app_state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<EnquiryListRow>>, AppError> {
    Ok(Json(app_state.enquiry_service.list_enquiries(&query).await?))
}

// GET /api/enquiries/export
#[utoipa::path(
    get,
    path = "/api/enquiries/export",
    tag = "Enquiries",
    params(ListQuery),
    responses(
        (status = 200, description = "CSV (UTF-8 com BOM) com as cotações filtradas", content_type = "text/csv")
    ),
    security(("api_jwt" = []))
)]
pub async fn export_enquiries(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let rows = app_state.enquiry_service.export_enquiries(&query).await?;
    let bytes = enquiries_csv(&rows, locale.lang(), app_state.settings.report_offset)?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
        (header::CONTENT_DISPOSITION, "attachment; filename=\"enquiries.csv\""),
    ];
    Ok((headers, bytes).into_response())
}

// POST /api/enquiries
#[utoipa::path(
    post,
    path = "/api/enquiries",
    tag = "Enquiries",
    request_body = EnquiryForm,
    responses(
        (status = 201, description = "Cotação criada", body = ActionResult),
        (status = 400, description = "Dados inválidos ou cliente inexistente"),
        (status = 409, description = "Número interno já usado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_enquiry(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Payload(form): Payload<EnquiryForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()?;

    let enquiry = app_state.enquiry_service.create_enquiry(&user.actor(), &form).await?;
    Ok((StatusCode::CREATED, Json(ActionResult::created(enquiry.id))))
}

// GET /api/enquiries/{id}
#[utoipa::path(
    get,
    path = "/api/enquiries/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    responses(
        (status = 200, description = "Cotação com itens, acompanhamentos e anexos", body = EnquiryDetail),
        (status = 404, description = "Cotação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_enquiry(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EnquiryDetail>, AppError> {
    Ok(Json(app_state.enquiry_service.enquiry_detail(id).await?))
}

// PUT /api/enquiries/{id}
#[utoipa::path(
    put,
    path = "/api/enquiries/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    request_body = EnquiryForm,
    responses(
        (status = 200, description = "Cotação alterada", body = ActionResult),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cotação não encontrada"),
        (status = 409, description = "Número interno já usado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_enquiry(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Payload(form): Payload<EnquiryForm>,
) -> Result<Json<ActionResult>, AppError> {
    form.validate()?;

    app_state.enquiry_service.update_enquiry(&user.actor(), id, &form).await?;
    Ok(Json(ActionResult::ok()))
}

// GET /api/enquiries/{id}/delete
#[utoipa::path(
    get,
    path = "/api/enquiries/{id}/delete",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    responses(
        (status = 200, description = "O que será excluído junto", body = DeleteConfirmation),
        (status = 404, description = "Cotação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_delete_enquiry(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    Ok(Json(app_state.enquiry_service.enquiry_delete_confirmation(id).await?))
}

// DELETE /api/enquiries/{id}
#[utoipa::path(
    delete,
    path = "/api/enquiries/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    responses(
        (status = 200, description = "Cotação excluída; redireciona para a lista", body = ActionResult),
        (status = 404, description = "Cotação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_enquiry(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    app_state.enquiry_service.delete_enquiry(&user.actor(), id).await?;
    Ok(Json(ActionResult::redirect("/api/enquiries")))
}

// POST /api/enquiries/{id}/pin
#[utoipa::path(
    post,
    path = "/api/enquiries/{id}/pin",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    responses(
        (status = 200, description = "Novo estado do destaque", body = ActionResult),
        (status = 404, description = "Cotação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn toggle_enquiry_pin(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    let pinned = app_state.enquiry_service.toggle_enquiry_pin(&user.actor(), id).await?;
    Ok(Json(ActionResult::pinned(pinned)))
}

// =============================================================================
//  ITENS
// =============================================================================

// POST /api/enquiries/{id}/items
#[utoipa::path(
    post,
    path = "/api/enquiries/{id}/items",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    request_body = EnquiryItemForm,
    responses(
        (status = 201, description = "Item criado", body = ActionResult),
        (status = 404, description = "Cotação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_item(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(enquiry_id): Path<Uuid>,
    Payload(form): Payload<EnquiryItemForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()?;

    let item = app_state.enquiry_service.create_item(&user.actor(), enquiry_id, &form).await?;
    Ok((StatusCode::CREATED, Json(ActionResult::created(item.id))))
}

// GET /api/enquiries/items/{id}
#[utoipa::path(
    get,
    path = "/api/enquiries/items/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do item")),
    responses(
        (status = 200, description = "Item", body = EnquiryItem),
        (status = 404, description = "Item não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_item(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EnquiryItem>, AppError> {
    Ok(Json(app_state.enquiry_service.get_item(id).await?))
}

// PUT /api/enquiries/items/{id}
#[utoipa::path(
    put,
    path = "/api/enquiries/items/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do item")),
    request_body = EnquiryItemForm,
    responses(
        (status = 200, description = "Item alterado", body = ActionResult),
        (status = 404, description = "Item não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_item(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Payload(form): Payload<EnquiryItemForm>,
) -> Result<Json<ActionResult>, AppError> {
    form.validate()?;

    app_state.enquiry_service.update_item(&user.actor(), id, &form).await?;
    Ok(Json(ActionResult::ok()))
}

// GET /api/enquiries/items/{id}/delete
#[utoipa::path(
    get,
    path = "/api/enquiries/items/{id}/delete",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do item")),
    responses(
        (status = 200, description = "Confirmação de exclusão", body = DeleteConfirmation),
        (status = 404, description = "Item não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_delete_item(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    Ok(Json(app_state.enquiry_service.item_delete_confirmation(id).await?))
}

// DELETE /api/enquiries/items/{id}
#[utoipa::path(
    delete,
    path = "/api/enquiries/items/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do item")),
    responses(
        (status = 200, description = "Item excluído; redireciona para a cotação", body = ActionResult),
        (status = 404, description = "Item não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_item(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    let enquiry_id = app_state.enquiry_service.delete_item(&user.actor(), id).await?;
    Ok(Json(ActionResult::redirect(format!("/api/enquiries/{enquiry_id}"))))
}

// =============================================================================
//  ACOMPANHAMENTOS (escrita só pelo criador)
// =============================================================================

// POST /api/enquiries/{id}/tracks
#[utoipa::path(
    post,
    path = "/api/enquiries/{id}/tracks",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    request_body = EnquiryTrackForm,
    responses(
        (status = 201, description = "Acompanhamento criado", body = ActionResult),
        (status = 400, description = "Conteúdo vazio"),
        (status = 404, description = "Cotação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_track(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(enquiry_id): Path<Uuid>,
    Payload(form): Payload<EnquiryTrackForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()?;

    let track = app_state.enquiry_service.create_track(&user.actor(), enquiry_id, &form).await?;
    Ok((StatusCode::CREATED, Json(ActionResult::created(track.id))))
}

// GET /api/enquiries/tracks/{id}
#[utoipa::path(
    get,
    path = "/api/enquiries/tracks/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do acompanhamento")),
    responses(
        (status = 200, description = "Acompanhamento", body = EnquiryTrack),
        (status = 404, description = "Acompanhamento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_track(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EnquiryTrack>, AppError> {
    Ok(Json(app_state.enquiry_service.get_track(id).await?))
}

// PUT /api/enquiries/tracks/{id}
#[utoipa::path(
    put,
    path = "/api/enquiries/tracks/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do acompanhamento")),
    request_body = EnquiryTrackForm,
    responses(
        (status = 200, description = "Acompanhamento alterado", body = ActionResult),
        (status = 403, description = "Somente o criador pode alterar"),
        (status = 404, description = "Acompanhamento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_track(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Payload(form): Payload<EnquiryTrackForm>,
) -> Result<Json<ActionResult>, AppError> {
    form.validate()?;

    app_state.enquiry_service.update_track(&user.actor(), id, &form).await?;
    Ok(Json(ActionResult::ok()))
}

// GET /api/enquiries/tracks/{id}/delete
#[utoipa::path(
    get,
    path = "/api/enquiries/tracks/{id}/delete",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do acompanhamento")),
    responses(
        (status = 200, description = "Confirmação de exclusão", body = DeleteConfirmation),
        (status = 403, description = "Somente o criador pode excluir"),
        (status = 404, description = "Acompanhamento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_delete_track(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    Ok(Json(app_state.enquiry_service.track_delete_confirmation(&user.actor(), id).await?))
}

// DELETE /api/enquiries/tracks/{id}
#[utoipa::path(
    delete,
    path = "/api/enquiries/tracks/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do acompanhamento")),
    responses(
        (status = 200, description = "Acompanhamento excluído", body = ActionResult),
        (status = 403, description = "Somente o criador pode excluir"),
        (status = 404, description = "Acompanhamento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_track(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    app_state.enquiry_service.delete_track(&user.actor(), id).await?;
    Ok(Json(ActionResult::ok()))
}

// =============================================================================
//  ANEXOS
// =============================================================================

// Corpo acima do DefaultBodyLimit vira 413; o resto é requisição malformada
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::InvalidPayload(err.body_text())
    }
}

// Campos lidos do multipart
#[derive(Debug, Default)]
struct UploadFields {
    file_name: Option<String>,
    bytes: Vec<u8>,
    description: String,
}

impl UploadFields {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut fields = UploadFields::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
        {
            match field.name() {
                Some("file") => {
                    fields.file_name = field.file_name().map(str::to_owned);
                    fields.bytes = field
                        .bytes()
                        .await
                        .map_err(multipart_error)?
                        .to_vec();
                }
                Some("description") => {
                    fields.description = field
                        .text()
                        .await
                        .map_err(multipart_error)?
                        .trim()
                        .to_string();
                }
                // Campos desconhecidos são ignorados
                _ => {}
            }
        }

        Ok(fields)
    }

    fn validate(self) -> Result<(String, String, Vec<u8>), AppError> {
        if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(AppError::field(
                "description",
                "length",
                "A descrição deve ter no máximo 255 caracteres.",
            ));
        }

        let file_name = self
            .file_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::field("file", "required", "Selecione um arquivo."))?;

        if file_name.chars().count() > FILE_NAME_MAX_CHARS {
            return Err(AppError::field(
                "file",
                "length",
                "O nome do arquivo deve ter no máximo 255 caracteres.",
            ));
        }

        Ok((file_name, self.description, self.bytes))
    }
}

// Nome seguro para o cabeçalho Content-Disposition
fn disposition(file_name: &str) -> HeaderValue {
    let ascii: String = file_name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{ascii}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

// POST /api/enquiries/{id}/attachments
#[utoipa::path(
    post,
    path = "/api/enquiries/{id}/attachments",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    request_body(content_type = "multipart/form-data", description = "Campos `file` e `description`"),
    responses(
        (status = 201, description = "Anexo enviado", body = ActionResult),
        (status = 400, description = "Arquivo ausente ou descrição longa demais"),
        (status = 404, description = "Cotação não encontrada"),
        (status = 413, description = "Arquivo acima do limite de upload")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_attachment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(enquiry_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (file_name, description, bytes) = UploadFields::read(multipart).await?.validate()?;

    let attachment = app_state
        .enquiry_service
        .upload_attachment(&user.actor(), enquiry_id, &file_name, &description, &bytes)
        .await?;

    Ok((StatusCode::CREATED, Json(ActionResult::created(attachment.id))))
}

// GET /api/enquiries/attachments/{id}
#[utoipa::path(
    get,
    path = "/api/enquiries/attachments/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do anexo")),
    responses(
        (status = 200, description = "Metadados do anexo", body = EnquiryAttachment),
        (status = 404, description = "Anexo não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_attachment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EnquiryAttachment>, AppError> {
    Ok(Json(app_state.enquiry_service.get_attachment(id).await?))
}

// GET /api/enquiries/attachments/{id}/download
#[utoipa::path(
    get,
    path = "/api/enquiries/attachments/{id}/download",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do anexo")),
    responses(
        (status = 200, description = "Conteúdo do arquivo", content_type = "application/octet-stream"),
        (status = 404, description = "Anexo ou arquivo não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn download_attachment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (attachment, bytes) = app_state.enquiry_service.download_attachment(id).await?;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
        (header::CONTENT_DISPOSITION, disposition(&attachment.file_name)),
    ];
    Ok((headers, bytes).into_response())
}

// GET /api/enquiries/attachments/{id}/delete
#[utoipa::path(
    get,
    path = "/api/enquiries/attachments/{id}/delete",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do anexo")),
    responses(
        (status = 200, description = "Confirmação de exclusão", body = DeleteConfirmation),
        (status = 404, description = "Anexo não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_delete_attachment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    Ok(Json(app_state.enquiry_service.attachment_delete_confirmation(id).await?))
}

// DELETE /api/enquiries/attachments/{id}
#[utoipa::path(
    delete,
    path = "/api/enquiries/attachments/{id}",
    tag = "Enquiries",
    params(("id" = Uuid, Path, description = "ID do anexo")),
    responses(
        (status = 200, description = "Anexo excluído; redireciona para a cotação", body = ActionResult),
        (status = 404, description = "Anexo não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_attachment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    let enquiry_id = app_state.enquiry_service.delete_attachment(&user.actor(), id).await?;
    Ok(Json(ActionResult::redirect(format!("/api/enquiries/{enquiry_id}"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(file_name: Option<&str>, description: &str) -> UploadFields {
        UploadFields {
            file_name: file_name.map(str::to_owned),
            bytes: b"conteudo".to_vec(),
            description: description.to_string(),
        }
    }

    #[test]
    fn upload_requires_a_named_file() {
        let err = fields(None, "").validate().unwrap_err();
        match err {
            AppError::ValidationError(e) => assert!(e.field_errors().contains_key("file")),
            other => panic!("erro inesperado: {other:?}"),
        }

        assert!(fields(Some("  "), "").validate().is_err());
    }

    #[test]
    fn upload_description_is_limited() {
        let long = "x".repeat(DESCRIPTION_MAX_CHARS + 1);
        let err = fields(Some("a.pdf"), &long).validate().unwrap_err();
        match err {
            AppError::ValidationError(e) => assert!(e.field_errors().contains_key("description")),
            other => panic!("erro inesperado: {other:?}"),
        }

        let exact = "x".repeat(DESCRIPTION_MAX_CHARS);
        let (name, description, bytes) = fields(Some("a.pdf"), &exact).validate().unwrap();
        assert_eq!(name, "a.pdf");
        assert_eq!(description.len(), DESCRIPTION_MAX_CHARS);
        assert_eq!(bytes, b"conteudo");
    }

    #[test]
    fn upload_file_name_is_limited() {
        let long = format!("{}.pdf", "a".repeat(FILE_NAME_MAX_CHARS));
        match fields(Some(&long), "").validate().unwrap_err() {
            AppError::ValidationError(e) => assert!(e.field_errors().contains_key("file")),
            other => panic!("erro inesperado: {other:?}"),
        }

        // Limite é em caracteres, não em bytes
        let wide = format!("{}.pdf", "報".repeat(100));
        let (name, _, _) = fields(Some(&wide), "").validate().unwrap();
        assert_eq!(name, wide);
    }

    #[test]
    fn disposition_replaces_unsafe_characters() {
        let value = disposition("報價 \"v2\".pdf");
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"__ _v2_.pdf\"");
    }
}
