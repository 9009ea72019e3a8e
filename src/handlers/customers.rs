// src/handlers/customers.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
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
        crm::{Contact, ContactForm, ContactLog, ContactLogForm, CustomerDetail, CustomerForm, CustomerListRow},
        responses::{ActionResult, DeleteConfirmation},
    },
    services::export::customers_csv,
};

// =============================================================================
//  CLIENTES
// =============================================================================

// GET /api/crm/customers
#[utoipa::path(
    get,
    path = "/api/crm/customers",
    tag = "CRM",
    params(ListQuery),
    responses(
        (status = 200, description = "Página de clientes filtrada e ordenada", body = Page<CustomerListRow>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_customers(
    State(app_state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<CustomerListRow>>, AppError> {
    let page = app_state.crm_service.list_customers(&query).await?;
    Ok(Json(page))
}

// GET /api/crm/customers/export
#[utoipa::path(
    get,
    path = "/api/crm/customers/export",
    tag = "CRM",
    params(ListQuery),
    responses(
        (status = 200, description = "CSV (UTF-8 com BOM) com os clientes filtrados", content_type = "text/csv")
    ),
    security(("api_jwt" = []))
)]
pub async fn export_customers(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let rows = app_state.crm_service.export_customers(&query).await?;
    let bytes = customers_csv(&rows, locale.lang(), app_state.settings.report_offset)?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
        (header::CONTENT_DISPOSITION, "attachment; filename=\"customers.csv\""),
    ];
    Ok((headers, bytes).into_response())
}

// POST /api/crm/customers
#[utoipa::path(
    post,
    path = "/api/crm/customers",
    tag = "CRM",
    request_body(content = CustomerForm, description = "JSON ou application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Cliente criado", body = ActionResult),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_customer(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Payload(form): Payload<CustomerForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()?;

    let customer = app_state.crm_service.create_customer(&user.actor(), &form).await?;
    Ok((StatusCode::CREATED, Json(ActionResult::created(customer.id))))
}

// GET /api/crm/customers/{id}
#[utoipa::path(
    get,
    path = "/api/crm/customers/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente com contatos, registros e cotações", body = CustomerDetail),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_customer(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerDetail>, AppError> {
    Ok(Json(app_state.crm_service.customer_detail(id).await?))
}

// PUT /api/crm/customers/{id}
#[utoipa::path(
    put,
    path = "/api/crm/customers/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = CustomerForm,
    responses(
        (status = 200, description = "Cliente alterado", body = ActionResult),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_customer(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Payload(form): Payload<CustomerForm>,
) -> Result<Json<ActionResult>, AppError> {
    form.validate()?;

    app_state.crm_service.update_customer(&user.actor(), id, &form).await?;
    Ok(Json(ActionResult::ok()))
}

// GET /api/crm/customers/{id}/delete
#[utoipa::path(
    get,
    path = "/api/crm/customers/{id}/delete",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "O que será excluído junto", body = DeleteConfirmation),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_delete_customer(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    Ok(Json(app_state.crm_service.customer_delete_confirmation(id).await?))
}

// DELETE /api/crm/customers/{id}
#[utoipa::path(
    delete,
    path = "/api/crm/customers/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente excluído (com contatos, registros e cotações)", body = ActionResult),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_customer(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    app_state.crm_service.delete_customer(&user.actor(), id).await?;
    Ok(Json(ActionResult::ok()))
}

// POST /api/crm/customers/{id}/pin
#[utoipa::path(
    post,
    path = "/api/crm/customers/{id}/pin",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Novo estado do destaque", body = ActionResult),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn toggle_customer_pin(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    let pinned = app_state.crm_service.toggle_customer_pin(&user.actor(), id).await?;
    Ok(Json(ActionResult::pinned(pinned)))
}

// =============================================================================
//  CONTATOS
// =============================================================================

// POST /api/crm/customers/{id}/contacts
#[utoipa::path(
    post,
    path = "/api/crm/customers/{id}/contacts",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = ContactForm,
    responses(
        (status = 201, description = "Contato criado", body = ActionResult),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_contact(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(customer_id): Path<Uuid>,
    Payload(form): Payload<ContactForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()?;

    let contact = app_state.crm_service.create_contact(&user.actor(), customer_id, &form).await?;
    Ok((StatusCode::CREATED, Json(ActionResult::created(contact.id))))
}

// GET /api/crm/contacts/{id}
#[utoipa::path(
    get,
    path = "/api/crm/contacts/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do contato")),
    responses(
        (status = 200, description = "Contato", body = Contact),
        (status = 404, description = "Contato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_contact(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Contact>, AppError> {
    Ok(Json(app_state.crm_service.get_contact(id).await?))
}

// PUT /api/crm/contacts/{id}
#[utoipa::path(
    put,
    path = "/api/crm/contacts/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do contato")),
    request_body = ContactForm,
    responses(
        (status = 200, description = "Contato alterado", body = ActionResult),
        (status = 404, description = "Contato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_contact(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Payload(form): Payload<ContactForm>,
) -> Result<Json<ActionResult>, AppError> {
    form.validate()?;

    app_state.crm_service.update_contact(&user.actor(), id, &form).await?;
    Ok(Json(ActionResult::ok()))
}

// GET /api/crm/contacts/{id}/delete
#[utoipa::path(
    get,
    path = "/api/crm/contacts/{id}/delete",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do contato")),
    responses(
        (status = 200, description = "Confirmação de exclusão", body = DeleteConfirmation),
        (status = 404, description = "Contato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_delete_contact(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    Ok(Json(app_state.crm_service.contact_delete_confirmation(id).await?))
}

// DELETE /api/crm/contacts/{id}
#[utoipa::path(
    delete,
    path = "/api/crm/contacts/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do contato")),
    responses(
        (status = 200, description = "Contato excluído", body = ActionResult),
        (status = 404, description = "Contato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_contact(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    app_state.crm_service.delete_contact(&user.actor(), id).await?;
    Ok(Json(ActionResult::ok()))
}

// =============================================================================
//  REGISTROS DE CONTATO (escrita só pelo criador)
// =============================================================================

// POST /api/crm/customers/{id}/logs
#[utoipa::path(
    post,
    path = "/api/crm/customers/{id}/logs",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = ContactLogForm,
    responses(
        (status = 201, description = "Registro criado", body = ActionResult),
        (status = 400, description = "Dados inválidos ou contato de outro cliente"),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_log(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(customer_id): Path<Uuid>,
    Payload(form): Payload<ContactLogForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()?;

    let log = app_state.crm_service.create_log(&user.actor(), customer_id, &form).await?;
    Ok((StatusCode::CREATED, Json(ActionResult::created(log.id))))
}

// GET /api/crm/logs/{id}
#[utoipa::path(
    get,
    path = "/api/crm/logs/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do registro")),
    responses(
        (status = 200, description = "Registro de contato", body = ContactLog),
        (status = 404, description = "Registro não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_log(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactLog>, AppError> {
    Ok(Json(app_state.crm_service.get_log(id).await?))
}

// PUT /api/crm/logs/{id}
#[utoipa::path(
    put,
    path = "/api/crm/logs/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do registro")),
    request_body = ContactLogForm,
    responses(
        (status = 200, description = "Registro alterado", body = ActionResult),
        (status = 403, description = "Somente o criador pode alterar"),
        (status = 404, description = "Registro não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_log(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Payload(form): Payload<ContactLogForm>,
) -> Result<Json<ActionResult>, AppError> {
    form.validate()?;

    app_state.crm_service.update_log(&user.actor(), id, &form).await?;
    Ok(Json(ActionResult::ok()))
}

// GET /api/crm/logs/{id}/delete
#[utoipa::path(
    get,
    path = "/api/crm/logs/{id}/delete",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do registro")),
    responses(
        (status = 200, description = "Confirmação de exclusão", body = DeleteConfirmation),
        (status = 403, description = "Somente o criador pode excluir"),
        (status = 404, description = "Registro não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_delete_log(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    Ok(Json(app_state.crm_service.log_delete_confirmation(&user.actor(), id).await?))
}

// DELETE /api/crm/logs/{id}
#[utoipa::path(
    delete,
    path = "/api/crm/logs/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do registro")),
    responses(
        (status = 200, description = "Registro excluído", body = ActionResult),
        (status = 403, description = "Somente o criador pode excluir"),
        (status = 404, description = "Registro não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_log(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, AppError> {
    app_state.crm_service.delete_log(&user.actor(), id).await?;
    Ok(Json(ActionResult::ok()))
}
