// src/models/enquiry.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::common::{
    labels::{Labeled, Lang},
    payload::optional_number,
};
use crate::models::crm::Currency;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "enquiry_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnquiryStatus {
    #[default]
    Untracked,
    Tracking,
    Success,
    Lost,
}

impl Labeled for EnquiryStatus {
    fn label(&self, lang: Lang) -> &'static str {
        match self {
            EnquiryStatus::Untracked => lang.pick("Not tracked", "Não acompanhada", "未追蹤"),
            EnquiryStatus::Tracking => lang.pick("Tracking", "Em acompanhamento", "追蹤中"),
            EnquiryStatus::Success => lang.pick("Won", "Fechada", "已成交"),
            EnquiryStatus::Lost => lang.pick("Lost", "Perdida", "已失去"),
        }
    }
}

// --- COTAÇÃO (cabeçalho) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Enquiry {
    pub id: Uuid,
    // Número interno, único
    #[schema(example = "Q-2025-0042")]
    pub internal_no: String,
    pub customer_id: Uuid,
    // Número da cotação do lado do cliente
    pub external_no: String,
    pub status: EnquiryStatus,
    pub is_pinned: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Linha da listagem (com total em moeda base agregado no SQL)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryListRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub enquiry: Enquiry,
    pub customer_name: String,
    pub currency: Currency,
    pub created_by_username: String,
    pub total_amount_ntd: Decimal,
}

// Resumo usado no detalhe do cliente e no dashboard
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquirySummary {
    pub id: Uuid,
    pub internal_no: String,
    pub external_no: String,
    pub status: EnquiryStatus,
    pub customer_name: String,
    pub total_amount_ntd: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<EnquiryListRow> for EnquirySummary {
    fn from(row: EnquiryListRow) -> Self {
        Self {
            id: row.enquiry.id,
            internal_no: row.enquiry.internal_no,
            external_no: row.enquiry.external_no,
            status: row.enquiry.status,
            customer_name: row.customer_name,
            total_amount_ntd: row.total_amount_ntd,
            created_at: row.enquiry.created_at,
        }
    }
}

impl Enquiry {
    pub fn display_label(&self) -> String {
        self.internal_no.clone()
    }
}

// --- ITENS ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryItem {
    pub id: Uuid,
    pub enquiry_id: Uuid,
    pub item_name: String,
    pub item_spec: String,
    pub material: String,
    pub unit_price: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
    pub quantity: Option<i32>,
    pub cost: Option<Decimal>,
    pub cost_rate: Option<Decimal>,
    pub supplier: String,
    pub note: String,
}

impl EnquiryItem {
    /// Subtotal na moeda de origem: quantidade × preço (0 se faltar algum).
    pub fn subtotal(&self) -> Decimal {
        match (self.quantity, self.unit_price) {
            (Some(qty), Some(price)) => Decimal::from(qty) * price,
            _ => Decimal::ZERO,
        }
    }

    /// Taxa efetiva: ausente ou zero vale 1.0.
    pub fn effective_rate(&self) -> Decimal {
        match self.exchange_rate {
            Some(rate) if !rate.is_zero() => rate,
            _ => Decimal::ONE,
        }
    }

    /// Subtotal convertido para a moeda base (NTD).
    pub fn subtotal_ntd(&self) -> Decimal {
        self.subtotal() * self.effective_rate()
    }

    pub fn display_label(&self) -> String {
        format!(
            "{}-{}-{}",
            self.item_name,
            self.unit_price.map(|p| p.to_string()).unwrap_or_default(),
            self.quantity.map(|q| q.to_string()).unwrap_or_default()
        )
    }
}

// Item com os valores derivados, para a resposta
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryItemView {
    #[serde(flatten)]
    pub item: EnquiryItem,
    pub subtotal: Decimal,
    pub subtotal_ntd: Decimal,
}

impl From<EnquiryItem> for EnquiryItemView {
    fn from(item: EnquiryItem) -> Self {
        let subtotal = item.subtotal();
        let subtotal_ntd = item.subtotal_ntd();
        Self { item, subtotal, subtotal_ntd }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryTotals {
    pub total_amount: Decimal,
    pub total_amount_ntd: Decimal,
}

// --- ACOMPANHAMENTO ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryTrack {
    pub id: Uuid,
    pub enquiry_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryTrackView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub track: EnquiryTrack,
    pub created_by_username: String,
}

// --- ANEXOS ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryAttachment {
    pub id: Uuid,
    pub enquiry_id: Uuid,
    // Caminho relativo dentro do storage: enquiries/{enquiry_id}/{arquivo}
    pub file_path: String,
    pub file_name: String,
    pub description: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: Option<Uuid>,
}

// --- DETALHE ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryDetail {
    #[serde(flatten)]
    pub enquiry: Enquiry,
    pub customer_name: String,
    // A moeda é a do cliente
    pub currency: Currency,
    pub created_by_username: String,
    #[serde(flatten)]
    pub totals: EnquiryTotals,
    pub items: Vec<EnquiryItemView>,
    pub tracks: Vec<EnquiryTrackView>,
    pub attachments: Vec<EnquiryAttachment>,
}

// --- PAYLOADS ---

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_quantity(val: i32) -> Result<(), ValidationError> {
    if val < 0 {
        let mut err = ValidationError::new("range");
        err.message = Some("A quantidade não pode ser negativa.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryForm {
    #[validate(length(min = 1, max = 20, message = "Informe o número interno (até 20 caracteres)."))]
    #[schema(example = "Q-2025-0042")]
    pub internal_no: String,

    pub customer_id: Uuid,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub external_no: String,

    #[serde(default)]
    pub status: EnquiryStatus,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryItemForm {
    #[serde(default)]
    #[validate(length(max = 30))]
    pub item_name: String,

    #[serde(default)]
    #[validate(length(max = 30))]
    pub item_spec: String,

    #[serde(default)]
    #[validate(length(max = 30))]
    pub material: String,

    #[serde(default, deserialize_with = "optional_number")]
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = Option<f64>, example = 10.5)]
    pub unit_price: Option<Decimal>,

    #[serde(default, deserialize_with = "optional_number")]
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = Option<f64>, example = 30.0)]
    pub exchange_rate: Option<Decimal>,

    #[serde(default, deserialize_with = "optional_number")]
    #[validate(custom(function = "validate_quantity"))]
    pub quantity: Option<i32>,

    #[serde(default, deserialize_with = "optional_number")]
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = Option<f64>)]
    pub cost: Option<Decimal>,

    #[serde(default, deserialize_with = "optional_number")]
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = Option<f64>)]
    pub cost_rate: Option<Decimal>,

    #[serde(default)]
    #[validate(length(max = 30))]
    pub supplier: String,

    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryTrackForm {
    #[validate(length(min = 1, message = "Informe o conteúdo do acompanhamento."))]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(qty: Option<i32>, price: Option<i64>, rate: Option<i64>) -> EnquiryItem {
        EnquiryItem {
            id: Uuid::new_v4(),
            enquiry_id: Uuid::nil(),
            item_name: "Punch".into(),
            item_spec: String::new(),
            material: String::new(),
            unit_price: price.map(Decimal::from),
            exchange_rate: rate.map(Decimal::from),
            quantity: qty,
            cost: None,
            cost_rate: None,
            supplier: String::new(),
            note: String::new(),
        }
    }

    #[test]
    fn subtotal_is_quantity_times_price() {
        let it = item(Some(2), Some(10), Some(30));
        assert_eq!(it.subtotal(), Decimal::from(20));
        assert_eq!(it.subtotal_ntd(), Decimal::from(600));
    }

    #[test]
    fn missing_factor_yields_zero_subtotal() {
        assert_eq!(item(None, Some(10), Some(30)).subtotal(), Decimal::ZERO);
        assert_eq!(item(Some(3), None, Some(30)).subtotal_ntd(), Decimal::ZERO);
    }

    #[test]
    fn missing_or_zero_rate_falls_back_to_one() {
        assert_eq!(item(Some(2), Some(5), None).subtotal_ntd(), Decimal::from(10));
        assert_eq!(item(Some(2), Some(5), Some(0)).subtotal_ntd(), Decimal::from(10));
    }

    #[test]
    fn item_view_carries_derived_values() {
        let view = EnquiryItemView::from(item(Some(1), Some(5), Some(32)));
        assert_eq!(view.subtotal, Decimal::from(5));
        assert_eq!(view.subtotal_ntd, Decimal::from(160));
    }

    #[test]
    fn negative_price_is_rejected() {
        let form: EnquiryItemForm = serde_json::from_value(serde_json::json!({
            "itemName": "Die set",
            "unitPrice": -1,
            "quantity": 2
        }))
        .unwrap();
        assert!(form.validate().is_err());
    }

    #[test]
    fn quantity_must_not_be_negative() {
        let form: EnquiryItemForm = serde_json::from_value(serde_json::json!({ "quantity": -3 })).unwrap();
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));

        let form: EnquiryItemForm = serde_json::from_value(serde_json::json!({ "quantity": 0 })).unwrap();
        assert!(form.validate().is_ok());

        let form: EnquiryItemForm = serde_json::from_value(serde_json::json!({ "quantity": "" })).unwrap();
        assert!(form.validate().is_ok());
    }
}
