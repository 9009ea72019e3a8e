// src/models/dashboard.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::common::labels::{Labeled, Lang};
use crate::models::{crm::CustomerListRow, enquiry::EnquirySummary};

// Período de apuração do dashboard. Também é a chave da meta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    pub fn code(&self) -> &'static str {
        match self {
            Period::Monthly => "monthly",
            Period::Quarterly => "quarterly",
            Period::Yearly => "yearly",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "monthly" => Some(Period::Monthly),
            "quarterly" => Some(Period::Quarterly),
            "yearly" => Some(Period::Yearly),
            _ => None,
        }
    }

    /// Valor vindo da query string: qualquer coisa desconhecida vira mensal.
    pub fn from_query(raw: Option<&str>) -> Self {
        raw.and_then(Self::from_code).unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("período desconhecido: {0}")]
pub struct UnknownPeriod(pub String);

impl TryFrom<String> for Period {
    type Error = UnknownPeriod;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Period::from_code(&code).ok_or(UnknownPeriod(code))
    }
}

impl Labeled for Period {
    fn label(&self, lang: Lang) -> &'static str {
        match self {
            Period::Monthly => lang.pick("Monthly goal", "Meta mensal", "本月目標"),
            Period::Quarterly => lang.pick("Quarterly goal", "Meta trimestral", "本季目標"),
            Period::Yearly => lang.pick("Yearly goal", "Meta anual", "年度目標"),
        }
    }
}

// Uma linha por período, criada sob demanda com os valores padrão
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardGoal {
    #[sqlx(try_from = "String")]
    pub period: Period,
    // Meta de novos clientes fechados
    pub new_customer_target: i32,
    pub new_enquiry_target: i32,
    #[schema(value_type = f64, example = 500000.0)]
    pub enquiry_amount_target: Decimal,
    #[schema(value_type = f64, example = 100000.0)]
    pub success_amount_target: Decimal,
}

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("A meta não pode ser negativa.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoalForm {
    #[validate(range(min = 0, message = "A meta não pode ser negativa."))]
    pub new_customer_target: i32,
    #[validate(range(min = 0, message = "A meta não pode ser negativa."))]
    pub new_enquiry_target: i32,
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = f64)]
    pub enquiry_amount_target: Decimal,
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = f64)]
    pub success_amount_target: Decimal,
}

// Intervalo [início, agora] do período
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardWindow {
    pub period: Period,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    // Bloco de clientes
    pub new_customers_count: i64,
    pub inquired_customers_count: i64,
    pub success_customers_count: i64,
    // Bloco de cotações
    pub new_enquiries_count: i64,
    #[schema(value_type = f64)]
    pub new_enquiries_amount: Decimal,
    pub success_enquiries_count: i64,
    #[schema(value_type = f64)]
    pub success_enquiries_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    #[schema(value_type = f64)]
    pub success_customers_percentage: Decimal,
    #[schema(value_type = f64)]
    pub new_enquiries_percentage: Decimal,
    #[schema(value_type = f64)]
    pub new_enquiries_amount_percentage: Decimal,
    #[schema(value_type = f64)]
    pub success_enquiries_amount_percentage: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub period: Period,
    pub period_label: &'static str,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub goal: DashboardGoal,
    #[serde(flatten)]
    pub metrics: DashboardMetrics,
    #[serde(flatten)]
    pub progress: GoalProgress,
    pub pinned_customers: Vec<CustomerListRow>,
    pub pinned_enquiries: Vec<EnquirySummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_period_defaults_to_monthly() {
        assert_eq!(Period::from_query(Some("weekly")), Period::Monthly);
        assert_eq!(Period::from_query(None), Period::Monthly);
        assert_eq!(Period::from_query(Some("quarterly")), Period::Quarterly);
        assert_eq!(Period::from_query(Some("yearly")), Period::Yearly);
    }

    #[test]
    fn stored_period_codes_round_trip() {
        for period in [Period::Monthly, Period::Quarterly, Period::Yearly] {
            assert_eq!(Period::try_from(period.code().to_string()).unwrap(), period);
        }
        assert!(Period::try_from("daily".to_string()).is_err());
    }
}
