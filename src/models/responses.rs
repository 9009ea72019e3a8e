// src/models/responses.rs

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

// Resposta padrão das mutações "AJAX"
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub success: bool,
    // Id do registro criado
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    // Estado resultante do toggle de destaque
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self { success: true, id: None, redirect_url: None, is_pinned: None }
    }

    pub fn created(id: Uuid) -> Self {
        Self { id: Some(id), ..Self::ok() }
    }

    pub fn redirect(url: impl Into<String>) -> Self {
        Self { redirect_url: Some(url.into()), ..Self::ok() }
    }

    pub fn pinned(is_pinned: bool) -> Self {
        Self { is_pinned: Some(is_pinned), ..Self::ok() }
    }
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DependentCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_logs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enquiries: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<i64>,
}

// Primeira etapa do delete: o que será removido, sem alterar nada
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConfirmation {
    pub entity: &'static str,
    pub id: Uuid,
    pub label: String,
    pub dependents: DependentCounts,
}

impl DeleteConfirmation {
    pub fn new(entity: &'static str, id: Uuid, label: impl Into<String>) -> Self {
        Self { entity, id, label: label.into(), dependents: DependentCounts::default() }
    }

    pub fn with_dependents(mut self, dependents: DependentCounts) -> Self {
        self.dependents = dependents;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_results_only_carry_what_is_set() {
        assert_eq!(serde_json::to_value(ActionResult::ok()).unwrap(), json!({"success": true}));
        assert_eq!(
            serde_json::to_value(ActionResult::redirect("/api/enquiries")).unwrap(),
            json!({"success": true, "redirectUrl": "/api/enquiries"})
        );
        assert_eq!(
            serde_json::to_value(ActionResult::pinned(false)).unwrap(),
            json!({"success": true, "isPinned": false})
        );
    }

    #[test]
    fn delete_confirmation_lists_dependents() {
        let id = Uuid::nil();
        let confirmation = DeleteConfirmation::new("customer", id, "ACME").with_dependents(DependentCounts {
            contacts: Some(2),
            enquiries: Some(1),
            ..Default::default()
        });

        assert_eq!(
            serde_json::to_value(confirmation).unwrap(),
            json!({
                "entity": "customer",
                "id": "00000000-0000-0000-0000-000000000000",
                "label": "ACME",
                "dependents": {"contacts": 2, "enquiries": 1}
            })
        );
    }
}
