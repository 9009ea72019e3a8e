// src/integration_tests.rs
//
// Fluxos completos contra um Postgres real. Cada teste recebe um banco novo
// com as migrações aplicadas. Rodar com:
//   DATABASE_URL=postgres://... cargo test -- --ignored

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use tempfile::TempDir;

use crate::{
    common::{error::AppError, labels::Lang},
    config::{AppState, Settings},
    db::filters::ListQuery,
    models::{
        auth::Actor,
        crm::{ContactForm, ContactLogForm, CustomerForm},
        dashboard::Period,
        enquiry::{EnquiryForm, EnquiryItemForm, EnquiryStatus, EnquiryTrackForm},
    },
    services::storage::LocalFileStorage,
};

fn state(pool: PgPool, media: &TempDir) -> AppState {
    let settings = Settings::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        "JWT_SECRET" => Some("integration-secret".to_string()),
        _ => None,
    })
    .unwrap();
    AppState::from_parts(pool, settings, Arc::new(LocalFileStorage::new(media.path())))
}

async fn actor(state: &AppState, username: &str) -> Actor {
    let token = state.auth_service.register_user(username, None, "secret123").await.unwrap();
    let user = state.auth_service.validate_token(&token).await.unwrap();
    Actor::from(&user)
}

fn customer_form(name: &str) -> CustomerForm {
    serde_json::from_value(json!({
        "companyName": name,
        "country": "germany",
        "currency": "EUR",
        "companyType": "stamping",
        "industries": ["aerospace"],
        "email": "",
        "rank": ""
    }))
    .unwrap()
}

fn enquiry_form(internal_no: &str, customer_id: uuid::Uuid, status: &str) -> EnquiryForm {
    serde_json::from_value(json!({
        "internalNo": internal_no,
        "customerId": customer_id,
        "status": status
    }))
    .unwrap()
}

fn item_form(quantity: i32, unit_price: &str, exchange_rate: &str) -> EnquiryItemForm {
    serde_json::from_value(json!({
        "itemName": "Punch",
        "quantity": quantity,
        "unitPrice": unit_price,
        "exchangeRate": exchange_rate
    }))
    .unwrap()
}

fn query(pairs: &[(&str, &str)]) -> ListQuery {
    let mut q = ListQuery::default();
    for (key, value) in pairs {
        let value = Some(value.to_string());
        match *key {
            "q" => q.q = value,
            "status" => q.status = value,
            "sort" => q.sort = value,
            "order" => q.order = value,
            "page" => q.page = value,
            _ => panic!("chave desconhecida: {key}"),
        }
    }
    q
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn customer_lifecycle_with_contacts_and_logs(pool: PgPool) {
    let media = TempDir::new().unwrap();
    let state = state(pool, &media);
    let alice = actor(&state, "alice").await;
    let bob = actor(&state, "bob").await;
    let crm = &state.crm_service;

    let customer = crm.create_customer(&alice, &customer_form("ACME Tooling")).await.unwrap();
    assert_eq!(customer.sales_owner_id, Some(alice.id));
    assert_eq!(customer.email, "");

    let contact_form: ContactForm = serde_json::from_value(json!({ "name": "Jane" })).unwrap();
    let contact = crm.create_contact(&alice, customer.id, &contact_form).await.unwrap();

    let log_form: ContactLogForm = serde_json::from_value(json!({
        "contactId": contact.id,
        "topic": "Follow-up",
        "content": "Pediu nova cotação"
    }))
    .unwrap();
    let log = crm.create_log(&alice, customer.id, &log_form).await.unwrap();

    // Só o criador altera ou exclui o registro
    let denied = crm.update_log(&bob, log.id, &log_form).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));
    assert!(matches!(crm.delete_log(&bob, log.id).await, Err(AppError::Forbidden(_))));
    let kept = crm.get_log(log.id).await.unwrap();
    assert_eq!(kept.topic, "Follow-up");

    // Contato de outro cliente não pode ser usado
    let other = crm.create_customer(&bob, &customer_form("Globex")).await.unwrap();
    let foreign: ContactLogForm = serde_json::from_value(json!({
        "contactId": contact.id,
        "topic": "Visita"
    }))
    .unwrap();
    assert!(matches!(
        crm.create_log(&bob, other.id, &foreign).await,
        Err(AppError::ValidationError(_))
    ));

    let detail = crm.customer_detail(customer.id).await.unwrap();
    assert_eq!(detail.sales_owner.as_deref(), Some("alice"));
    assert_eq!(detail.contacts.len(), 1);
    assert_eq!(detail.logs.len(), 1);
    assert_eq!(detail.last_contacted_at, Some(log.created_at));

    let page = crm.list_customers(&query(&[("q", "acme")])).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].last_contacted_at, Some(log.created_at));

    let confirmation = crm.customer_delete_confirmation(customer.id).await.unwrap();
    assert_eq!(confirmation.dependents.contacts, Some(1));
    assert_eq!(confirmation.dependents.contact_logs, Some(1));

    crm.delete_customer(&alice, customer.id).await.unwrap();
    assert!(matches!(crm.customer_detail(customer.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(crm.get_log(log.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(crm.get_contact(contact.id).await, Err(AppError::NotFound(_))));
}

fn company_names(page: &crate::common::pagination::Page<crate::models::crm::CustomerListRow>) -> Vec<&str> {
    page.items.iter().map(|row| row.customer.company_name.as_str()).collect()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn customers_without_logs_sort_last_in_both_directions(pool: PgPool) {
    let media = TempDir::new().unwrap();
    let state = state(pool, &media);
    let alice = actor(&state, "alice").await;
    let crm = &state.crm_service;

    let a = crm.create_customer(&alice, &customer_form("A")).await.unwrap();
    crm.create_customer(&alice, &customer_form("B")).await.unwrap();
    let c = crm.create_customer(&alice, &customer_form("C")).await.unwrap();

    let log_form: ContactLogForm = serde_json::from_value(json!({ "topic": "Ligação" })).unwrap();
    let first = crm.create_log(&alice, a.id, &log_form).await.unwrap();
    let second = crm.create_log(&alice, c.id, &log_form).await.unwrap();
    assert!(first.created_at < second.created_at);

    // Padrão: last_contacted_at decrescente
    let page = crm.list_customers(&ListQuery::default()).await.unwrap();
    assert_eq!(company_names(&page), ["C", "A", "B"]);

    let page = crm.list_customers(&query(&[("sort", "last_contacted_at"), ("order", "asc")])).await.unwrap();
    assert_eq!(company_names(&page), ["A", "C", "B"]);

    let page = crm.list_customers(&query(&[("sort", "last_contacted_at"), ("order", "desc")])).await.unwrap();
    assert_eq!(company_names(&page), ["C", "A", "B"]);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn enquiry_search_matches_customer_name(pool: PgPool) {
    let media = TempDir::new().unwrap();
    let state = state(pool, &media);
    let alice = actor(&state, "alice").await;

    let acme = state.crm_service.create_customer(&alice, &customer_form("ACME Corp")).await.unwrap();
    let other = state.crm_service.create_customer(&alice, &customer_form("Globex")).await.unwrap();
    let enquiries = &state.enquiry_service;
    let wanted = enquiries.create_enquiry(&alice, &enquiry_form("Q-100", acme.id, "tracking")).await.unwrap();
    let unrelated = enquiries.create_enquiry(&alice, &enquiry_form("Q-200", other.id, "tracking")).await.unwrap();
    enquiries.create_item(&alice, unrelated.id, &item_form(1, "5", "1")).await.unwrap();

    let page = enquiries.list_enquiries(&query(&[("q", "acme")])).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].enquiry.id, wanted.id);

    // Busca por nome de item também encontra, sem duplicar linhas
    enquiries.create_item(&alice, unrelated.id, &item_form(2, "5", "1")).await.unwrap();
    let page = enquiries.list_enquiries(&query(&[("q", "punch")])).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].enquiry.id, unrelated.id);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_contact_keeps_its_logs(pool: PgPool) {
    let media = TempDir::new().unwrap();
    let state = state(pool, &media);
    let alice = actor(&state, "alice").await;
    let crm = &state.crm_service;

    let customer = crm.create_customer(&alice, &customer_form("Hooli")).await.unwrap();
    let contact_form: ContactForm = serde_json::from_value(json!({ "name": "Gavin" })).unwrap();
    let contact = crm.create_contact(&alice, customer.id, &contact_form).await.unwrap();
    let log_form: ContactLogForm = serde_json::from_value(json!({
        "contactId": contact.id,
        "topic": "Reunião"
    }))
    .unwrap();
    let log = crm.create_log(&alice, customer.id, &log_form).await.unwrap();
    assert_eq!(log.contact_id, Some(contact.id));

    crm.delete_contact(&alice, contact.id).await.unwrap();

    let kept = crm.get_log(log.id).await.unwrap();
    assert_eq!(kept.contact_id, None);
    let detail = crm.customer_detail(customer.id).await.unwrap();
    assert!(detail.contacts.is_empty());
    assert_eq!(detail.logs.len(), 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn pin_toggles_and_feeds_the_dashboard(pool: PgPool) {
    let media = TempDir::new().unwrap();
    let state = state(pool, &media);
    let alice = actor(&state, "alice").await;

    let customer = state.crm_service.create_customer(&alice, &customer_form("Initech")).await.unwrap();
    assert!(state.crm_service.toggle_customer_pin(&alice, customer.id).await.unwrap());

    let enquiries = &state.enquiry_service;
    let won = enquiries.create_enquiry(&alice, &enquiry_form("Q-1", customer.id, "success")).await.unwrap();
    enquiries.create_item(&alice, won.id, &item_form(10, "2.5", "30")).await.unwrap();
    let open = enquiries.create_enquiry(&alice, &enquiry_form("Q-2", customer.id, "tracking")).await.unwrap();
    enquiries.create_item(&alice, open.id, &item_form(4, "100", "0")).await.unwrap();

    let report = state.dashboard_service.report(Period::Monthly, Lang::En).await.unwrap();
    assert_eq!(report.metrics.new_customers_count, 1);
    assert_eq!(report.metrics.inquired_customers_count, 1);
    assert_eq!(report.metrics.success_customers_count, 1);
    assert_eq!(report.metrics.new_enquiries_count, 2);
    // 10 × 2.5 × 30 + 4 × 100 × 1 (câmbio zero conta como 1)
    assert_eq!(report.metrics.new_enquiries_amount, Decimal::from(1150));
    assert_eq!(report.metrics.success_enquiries_amount, Decimal::from(750));
    assert_eq!(report.goal.new_enquiry_target, 20);
    assert_eq!(report.pinned_customers.len(), 1);
    assert!(report.pinned_enquiries.is_empty());

    assert!(!state.crm_service.toggle_customer_pin(&alice, customer.id).await.unwrap());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn enquiry_rules_and_totals(pool: PgPool) {
    let media = TempDir::new().unwrap();
    let state = state(pool, &media);
    let alice = actor(&state, "alice").await;
    let bob = actor(&state, "bob").await;
    let enquiries = &state.enquiry_service;

    let customer = state.crm_service.create_customer(&alice, &customer_form("Umbrella")).await.unwrap();
    let enquiry = enquiries.create_enquiry(&alice, &enquiry_form("Q-7", customer.id, "untracked")).await.unwrap();
    assert_eq!(enquiry.status, EnquiryStatus::Untracked);

    // Número interno único
    let duplicate = enquiries.create_enquiry(&bob, &enquiry_form("Q-7", customer.id, "untracked")).await;
    assert!(matches!(duplicate, Err(AppError::UniqueConstraintViolation(_))));

    // Cliente inexistente é erro de campo
    let orphan = enquiries.create_enquiry(&alice, &enquiry_form("Q-8", uuid::Uuid::new_v4(), "untracked")).await;
    assert!(matches!(orphan, Err(AppError::ValidationError(_))));

    enquiries.create_item(&alice, enquiry.id, &item_form(2, "10", "")).await.unwrap();
    let detail = enquiries.enquiry_detail(enquiry.id).await.unwrap();
    assert_eq!(detail.totals.total_amount, Decimal::from(20));
    assert_eq!(detail.totals.total_amount_ntd, Decimal::from(20));

    let track_form = EnquiryTrackForm { content: "Cliente pediu prazo".into() };
    let track = enquiries.create_track(&alice, enquiry.id, &track_form).await.unwrap();
    assert!(matches!(enquiries.delete_track(&bob, track.id).await, Err(AppError::Forbidden(_))));
    enquiries.delete_track(&alice, track.id).await.unwrap();

    let page = enquiries.list_enquiries(&query(&[("status", "untracked"), ("sort", "total_amount")])).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].total_amount_ntd, Decimal::from(20));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn attachments_round_trip_through_storage(pool: PgPool) {
    let media = TempDir::new().unwrap();
    let state = state(pool, &media);
    let alice = actor(&state, "alice").await;
    let enquiries = &state.enquiry_service;

    let customer = state.crm_service.create_customer(&alice, &customer_form("Stark")).await.unwrap();
    let enquiry = enquiries.create_enquiry(&alice, &enquiry_form("Q-9", customer.id, "tracking")).await.unwrap();

    let first = enquiries
        .upload_attachment(&alice, enquiry.id, "desenho.pdf", "rev A", b"%PDF-1")
        .await
        .unwrap();
    let second = enquiries
        .upload_attachment(&alice, enquiry.id, "desenho.pdf", "rev B", b"%PDF-2")
        .await
        .unwrap();
    assert_ne!(first.file_path, second.file_path);
    assert_eq!(second.file_name, "desenho.pdf");

    let (_, bytes) = enquiries.download_attachment(second.id).await.unwrap();
    assert_eq!(bytes, b"%PDF-2");

    let enquiry_id = enquiries.delete_attachment(&alice, first.id).await.unwrap();
    assert_eq!(enquiry_id, enquiry.id);
    assert!(!media.path().join(&first.file_path).exists());

    // Excluir a cotação remove os arquivos restantes
    enquiries.delete_enquiry(&alice, enquiry.id).await.unwrap();
    assert!(!media.path().join(&second.file_path).exists());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn activity_log_skips_contact_logs(pool: PgPool) {
    let media = TempDir::new().unwrap();
    let state = state(pool, &media);
    let alice = actor(&state, "alice").await;

    let customer = state.crm_service.create_customer(&alice, &customer_form("Wayne")).await.unwrap();
    let log_form: ContactLogForm = serde_json::from_value(json!({ "topic": "Ligação" })).unwrap();
    state.crm_service.create_log(&alice, customer.id, &log_form).await.unwrap();

    let recent = state.activity_repo.recent().await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].entity_type, "customer");
    assert_eq!(recent[0].action, "addition");
    assert_eq!(recent[0].actor_username.as_deref(), Some("alice"));
}
