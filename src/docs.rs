// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- CRM: clientes ---
        handlers::customers::list_customers,
        handlers::customers::export_customers,
        handlers::customers::create_customer,
        handlers::customers::get_customer,
        handlers::customers::update_customer,
        handlers::customers::confirm_delete_customer,
        handlers::customers::delete_customer,
        handlers::customers::toggle_customer_pin,

        // --- CRM: contatos ---
        handlers::customers::create_contact,
        handlers::customers::get_contact,
        handlers::customers::update_contact,
        handlers::customers::confirm_delete_contact,
        handlers::customers::delete_contact,

        // --- CRM: registros de contato ---
        handlers::customers::create_log,
        handlers::customers::get_log,
        handlers::customers::update_log,
        handlers::customers::confirm_delete_log,
        handlers::customers::delete_log,

        // --- ENQUIRIES ---
        handlers::enquiries::list_enquiries,
        handlers::enquiries::export_enquiries,
        handlers::enquiries::create_enquiry,
        handlers::enquiries::get_enquiry,
        handlers::enquiries::update_enquiry,
        handlers::enquiries::confirm_delete_enquiry,
        handlers::enquiries::delete_enquiry,
        handlers::enquiries::toggle_enquiry_pin,
        handlers::enquiries::create_item,
        handlers::enquiries::get_item,
        handlers::enquiries::update_item,
        handlers::enquiries::confirm_delete_item,
        handlers::enquiries::delete_item,
        handlers::enquiries::create_track,
        handlers::enquiries::get_track,
        handlers::enquiries::update_track,
        handlers::enquiries::confirm_delete_track,
        handlers::enquiries::delete_track,
        handlers::enquiries::upload_attachment,
        handlers::enquiries::get_attachment,
        handlers::enquiries::download_attachment,
        handlers::enquiries::confirm_delete_attachment,
        handlers::enquiries::delete_attachment,

        // --- Dashboard ---
        handlers::dashboard::get_report,
        handlers::dashboard::update_goal,

        // --- Activity ---
        handlers::activity::recent_activity,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- CRM ---
            models::crm::Country,
            models::crm::Currency,
            models::crm::CustomerStatus,
            models::crm::CustomerRank,
            models::crm::CompanyType,
            models::crm::CustomerSource,
            models::crm::Industry,
            models::crm::Customer,
            models::crm::CustomerListRow,
            models::crm::Contact,
            models::crm::ContactLog,
            models::crm::ContactLogView,
            models::crm::CustomerDetail,
            models::crm::CustomerForm,
            models::crm::ContactForm,
            models::crm::ContactLogForm,

            // --- ENQUIRIES ---
            models::enquiry::EnquiryStatus,
            models::enquiry::Enquiry,
            models::enquiry::EnquiryListRow,
            models::enquiry::EnquirySummary,
            models::enquiry::EnquiryItem,
            models::enquiry::EnquiryItemView,
            models::enquiry::EnquiryTotals,
            models::enquiry::EnquiryTrack,
            models::enquiry::EnquiryTrackView,
            models::enquiry::EnquiryAttachment,
            models::enquiry::EnquiryDetail,
            models::enquiry::EnquiryForm,
            models::enquiry::EnquiryItemForm,
            models::enquiry::EnquiryTrackForm,

            // --- DASHBOARD ---
            models::dashboard::Period,
            models::dashboard::DashboardGoal,
            models::dashboard::GoalForm,
            models::dashboard::DashboardMetrics,
            models::dashboard::GoalProgress,
            models::dashboard::DashboardReport,

            // --- Respostas ---
            models::responses::ActionResult,
            models::responses::DependentCounts,
            models::responses::DeleteConfirmation,
            models::activity::ActionKind,
            models::activity::ActivityEntry,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário"),
        (name = "CRM", description = "Clientes, Contatos e Registros de Contato"),
        (name = "Enquiries", description = "Cotações, Itens, Acompanhamentos e Anexos"),
        (name = "Dashboard", description = "Metas e Indicadores do Período"),
        (name = "Activity", description = "Log de Atividades Recentes")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/api/auth/login",
            "/api/crm/customers",
            "/api/crm/logs/{id}",
            "/api/enquiries/{id}/attachments",
            "/api/dashboard/goals/{period}",
            "/api/activity",
        ] {
            assert!(paths.contains_key(path), "rota ausente na documentação: {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
