// src/models/activity.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Addition,
    Change,
    Deletion,
}

impl ActionKind {
    pub fn code(&self) -> &'static str {
        match self {
            ActionKind::Addition => "addition",
            ActionKind::Change => "change",
            ActionKind::Deletion => "deletion",
        }
    }
}

// Entidades que aparecem no log de atividades.
// Registros de contato e acompanhamentos ficam de fora de propósito.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditedEntity {
    Customer,
    Contact,
    Enquiry,
    EnquiryItem,
    EnquiryAttachment,
}

impl AuditedEntity {
    pub fn code(&self) -> &'static str {
        match self {
            AuditedEntity::Customer => "customer",
            AuditedEntity::Contact => "contact",
            AuditedEntity::Enquiry => "enquiry",
            AuditedEntity::EnquiryItem => "enquiry_item",
            AuditedEntity::EnquiryAttachment => "enquiry_attachment",
        }
    }
}

// Entrada a ser gravada
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub actor_id: Uuid,
    pub entity: AuditedEntity,
    pub entity_id: Uuid,
    pub label: String,
    pub action: ActionKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: i64,
    pub actor_id: Option<Uuid>,
    pub actor_username: Option<String>,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub label: String,
    pub action: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
