// src/main.rs

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

#[cfg(test)]
mod integration_tests;

use crate::config::{AppState, Settings};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; padrão "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Configuração inválida impede a aplicação de iniciar
    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr.clone();
    let app_state = AppState::new(settings).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let app = build_router(app_state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(app_state: AppState) -> Router {
    // Rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let user_routes = Router::new().route("/me", get(handlers::auth::get_me));

    let crm_routes = Router::new()
        // Clientes
        .route(
            "/customers",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route("/customers/export", get(handlers::customers::export_customers))
        .route(
            "/customers/{id}",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        )
        .route("/customers/{id}/delete", get(handlers::customers::confirm_delete_customer))
        .route("/customers/{id}/pin", post(handlers::customers::toggle_customer_pin))
        // Contatos
        .route("/customers/{id}/contacts", post(handlers::customers::create_contact))
        .route(
            "/contacts/{id}",
            get(handlers::customers::get_contact)
                .put(handlers::customers::update_contact)
                .delete(handlers::customers::delete_contact),
        )
        .route("/contacts/{id}/delete", get(handlers::customers::confirm_delete_contact))
        // Registros de contato
        .route("/customers/{id}/logs", post(handlers::customers::create_log))
        .route(
            "/logs/{id}",
            get(handlers::customers::get_log)
                .put(handlers::customers::update_log)
                .delete(handlers::customers::delete_log),
        )
        .route("/logs/{id}/delete", get(handlers::customers::confirm_delete_log));

    let enquiry_routes = Router::new()
        .route(
            "/",
            get(handlers::enquiries::list_enquiries).post(handlers::enquiries::create_enquiry),
        )
        .route("/export", get(handlers::enquiries::export_enquiries))
        .route(
            "/{id}",
            get(handlers::enquiries::get_enquiry)
                .put(handlers::enquiries::update_enquiry)
                .delete(handlers::enquiries::delete_enquiry),
        )
        .route("/{id}/delete", get(handlers::enquiries::confirm_delete_enquiry))
        .route("/{id}/pin", post(handlers::enquiries::toggle_enquiry_pin))
        // Itens
        .route("/{id}/items", post(handlers::enquiries::create_item))
        .route(
            "/items/{id}",
            get(handlers::enquiries::get_item)
                .put(handlers::enquiries::update_item)
                .delete(handlers::enquiries::delete_item),
        )
        .route("/items/{id}/delete", get(handlers::enquiries::confirm_delete_item))
        // Acompanhamentos
        .route("/{id}/tracks", post(handlers::enquiries::create_track))
        .route(
            "/tracks/{id}",
            get(handlers::enquiries::get_track)
                .put(handlers::enquiries::update_track)
                .delete(handlers::enquiries::delete_track),
        )
        .route("/tracks/{id}/delete", get(handlers::enquiries::confirm_delete_track))
        // Anexos
        .route("/{id}/attachments", post(handlers::enquiries::upload_attachment))
        .route(
            "/attachments/{id}",
            get(handlers::enquiries::get_attachment).delete(handlers::enquiries::delete_attachment),
        )
        .route("/attachments/{id}/delete", get(handlers::enquiries::confirm_delete_attachment))
        .route("/attachments/{id}/download", get(handlers::enquiries::download_attachment));

    let dashboard_routes = Router::new()
        .route("/", get(handlers::dashboard::get_report))
        .route("/goals/{period}", put(handlers::dashboard::update_goal));

    // Tudo abaixo exige Bearer token
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/crm", crm_routes)
        .nest("/api/enquiries", enquiry_routes)
        .nest("/api/dashboard", dashboard_routes)
        .route("/api/activity", get(handlers::activity::recent_activity))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let max_upload_bytes = app_state.settings.max_upload_bytes;

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::services::storage::LocalFileStorage;

    // Pool preguiçoso: nenhuma destas rotas chega ao banco
    fn router() -> Router {
        let settings = Settings::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/unused".to_string()),
            "JWT_SECRET" => Some("test-secret".to_string()),
            _ => None,
        })
        .unwrap();
        let pool = PgPoolOptions::new().connect_lazy(&settings.database_url).unwrap();
        let storage = Arc::new(LocalFileStorage::new(std::env::temp_dir()));
        build_router(AppState::from_parts(pool, settings, storage))
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = router()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        for uri in ["/api/crm/customers", "/api/enquiries", "/api/dashboard", "/api/activity", "/api/users/me"] {
            let response = router()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_before_the_database() {
        let response = router()
            .oneshot(
                Request::get("/api/crm/customers")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let response = router()
            .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
