// src/models/crm.rs

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::{
    labels::{Labeled, Lang},
    payload::empty_as_none,
};
use crate::models::enquiry::EnquirySummary;

// --- ENUMS ---

// Mapeia o CREATE TYPE country do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "country", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Country {
    Usa,
    Taiwan,
    Japan,
    Denmark,
    Germany,
    Sweden,
    Canada,
    Switzerland,
    Italy,
    France,
}

impl Labeled for Country {
    fn label(&self, lang: Lang) -> &'static str {
        match self {
            Country::Usa => lang.pick("United States", "Estados Unidos", "美國"),
            Country::Taiwan => lang.pick("Taiwan", "Taiwan", "台灣"),
            Country::Japan => lang.pick("Japan", "Japão", "日本"),
            Country::Denmark => lang.pick("Denmark", "Dinamarca", "丹麥"),
            Country::Germany => lang.pick("Germany", "Alemanha", "德國"),
            Country::Sweden => lang.pick("Sweden", "Suécia", "瑞典"),
            Country::Canada => lang.pick("Canada", "Canadá", "加拿大"),
            Country::Switzerland => lang.pick("Switzerland", "Suíça", "瑞士"),
            Country::Italy => lang.pick("Italy", "Itália", "義大利"),
            Country::France => lang.pick("France", "França", "法國"),
        }
    }
}

// Moeda de negociação do cliente (as cotações herdam daqui)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "currency", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Ntd,
    Usd,
    Eur,
    Jpy,
}

impl Labeled for Currency {
    fn label(&self, lang: Lang) -> &'static str {
        match self {
            Currency::Ntd => lang.pick("New Taiwan Dollar", "Novo Dólar Taiwanês", "新台幣"),
            Currency::Usd => lang.pick("US Dollar", "Dólar Americano", "美金"),
            Currency::Eur => lang.pick("Euro", "Euro", "歐元"),
            Currency::Jpy => lang.pick("Japanese Yen", "Iene", "日幣"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "customer_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    #[default]
    Uncontacted,
    Contacted,
    Deal,
    Refused,
}

impl Labeled for CustomerStatus {
    fn label(&self, lang: Lang) -> &'static str {
        match self {
            CustomerStatus::Uncontacted => lang.pick("Not contacted", "Não contatado", "未聯絡"),
            CustomerStatus::Contacted => lang.pick("In development", "Em prospecção", "開發中"),
            CustomerStatus::Deal => lang.pick("Closed deal", "Negócio fechado", "已成交"),
            CustomerStatus::Refused => lang.pick("Refused", "Recusou", "拒絕往來"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "customer_rank", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum CustomerRank {
    A,
    B,
    C,
}

impl Labeled for CustomerRank {
    fn label(&self, _lang: Lang) -> &'static str {
        match self {
            CustomerRank::A => "A",
            CustomerRank::B => "B",
            CustomerRank::C => "C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "company_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompanyType {
    Resale,
    DieMaker,
    Stamping,
    Injection,
    Misc,
}

impl Labeled for CompanyType {
    fn label(&self, lang: Lang) -> &'static str {
        match self {
            CompanyType::Resale => lang.pick("Trading / resale", "Revenda", "貿易轉售"),
            CompanyType::DieMaker => lang.pick("Die design / making", "Projeto e fabricação de moldes", "模具設計/製造"),
            CompanyType::Stamping => lang.pick("Metal stamping", "Estampagem de metal", "金屬沖壓"),
            CompanyType::Injection => lang.pick("Plastic injection", "Injeção plástica", "塑膠射出"),
            CompanyType::Misc => lang.pick("Other", "Outros", "其他"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "customer_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CustomerSource {
    Website,
    Event,
    Search,
    Introduced,
}

impl Labeled for CustomerSource {
    fn label(&self, lang: Lang) -> &'static str {
        match self {
            CustomerSource::Website => lang.pick("Company website", "Site da empresa", "官網"),
            CustomerSource::Event => lang.pick("Trade show", "Feira", "展覽開發"),
            CustomerSource::Search => lang.pick("Search engine", "Buscador", "搜尋引擎"),
            CustomerSource::Introduced => lang.pick("Referral", "Indicação", "客戶轉介"),
        }
    }
}

// Indústrias: conjunto multi-seleção. No banco é TEXT[] com os códigos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Industry {
    Aerospace,
    Automotive,
    Electronic,
    SemiConductor,
    Medical,
    Automation,
    Architectural,
    Food,
    Others,
}

impl Industry {
    pub const ALL: [Industry; 9] = [
        Industry::Aerospace,
        Industry::Automotive,
        Industry::Electronic,
        Industry::SemiConductor,
        Industry::Medical,
        Industry::Automation,
        Industry::Architectural,
        Industry::Food,
        Industry::Others,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Industry::Aerospace => "aerospace",
            Industry::Automotive => "automotive",
            Industry::Electronic => "electronic",
            Industry::SemiConductor => "semi-conductor",
            Industry::Medical => "medical",
            Industry::Automation => "automation",
            Industry::Architectural => "architectural",
            Industry::Food => "food",
            Industry::Others => "others",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.code() == code)
    }
}

impl Labeled for Industry {
    fn label(&self, lang: Lang) -> &'static str {
        match self {
            Industry::Aerospace => lang.pick("Aerospace", "Aeroespacial", "航太"),
            Industry::Automotive => lang.pick("Automotive tooling", "Moldes automotivos", "汽車模具"),
            Industry::Electronic => lang.pick("Electronics", "Eletrônicos", "電子"),
            Industry::SemiConductor => lang.pick("Semiconductor", "Semicondutores", "半導體"),
            Industry::Medical => lang.pick("Medical", "Médico", "醫療"),
            Industry::Automation => lang.pick("Automation", "Automação", "自動化"),
            Industry::Architectural => lang.pick("Architectural", "Construção", "建築"),
            Industry::Food => lang.pick("Food", "Alimentos", "食品"),
            Industry::Others => lang.pick("Others", "Outros", "其他"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("código de indústria desconhecido: {0}")]
pub struct UnknownIndustry(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndustrySet(pub BTreeSet<Industry>);

impl IndustrySet {
    /// Serialização explícita para a coluna TEXT[].
    pub fn to_codes(&self) -> Vec<String> {
        self.0.iter().map(|i| i.code().to_string()).collect()
    }

    pub fn labels(&self, lang: Lang) -> Vec<&'static str> {
        self.0.iter().map(|i| i.label(lang)).collect()
    }
}

impl TryFrom<Vec<String>> for IndustrySet {
    type Error = UnknownIndustry;

    fn try_from(codes: Vec<String>) -> Result<Self, Self::Error> {
        codes
            .into_iter()
            .map(|code| Industry::from_code(&code).ok_or(UnknownIndustry(code)))
            .collect::<Result<BTreeSet<_>, _>>()
            .map(IndustrySet)
    }
}

impl From<BTreeSet<Industry>> for IndustrySet {
    fn from(set: BTreeSet<Industry>) -> Self {
        IndustrySet(set)
    }
}

// --- CLIENTE ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    #[schema(example = "ACME Tooling GmbH")]
    pub company_name: String,
    pub country: Country,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub currency: Currency,
    pub status: CustomerStatus,
    pub company_type: CompanyType,

    #[sqlx(try_from = "Vec<String>")]
    #[schema(value_type = Vec<Industry>)]
    pub industries: IndustrySet,

    pub required_products: String,
    pub rank: Option<CustomerRank>,
    pub source: Option<CustomerSource>,

    // Vendedor responsável (definido pelo servidor na criação)
    pub sales_owner_id: Option<Uuid>,

    pub is_visitable: bool,
    pub notes: String,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Linha da listagem: cliente + dados derivados por JOIN/agregação
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerListRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub customer: Customer,
    pub sales_owner: Option<String>,
    pub last_contacted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub position: String,
    pub phone: String,
    pub email: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactLog {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub topic: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

// Registro de contato com nomes resolvidos para exibição
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactLogView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub log: ContactLog,
    pub contact_name: Option<String>,
    pub created_by_username: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub sales_owner: Option<String>,
    // Derivado dos registros de contato, nunca persistido
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub contacts: Vec<Contact>,
    pub logs: Vec<ContactLogView>,
    pub enquiries: Vec<EnquirySummary>,
}

impl Customer {
    pub fn display_label(&self) -> String {
        self.company_name.clone()
    }
}

impl Contact {
    /// Ex: "Jane (ACME)"
    pub fn display_label(&self, company_name: &str) -> String {
        format!("{} ({})", self.name, company_name)
    }
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerForm {
    #[validate(length(min = 1, max = 100, message = "Informe o nome da empresa (até 100 caracteres)."))]
    #[schema(example = "ACME Tooling GmbH")]
    pub company_name: String,

    pub country: Country,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub address: String,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: String,

    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(url(message = "URL inválida."))]
    pub website: Option<String>,

    pub currency: Currency,

    #[serde(default)]
    pub status: CustomerStatus,

    pub company_type: CompanyType,

    #[serde(default)]
    #[schema(value_type = Vec<Industry>)]
    pub industries: BTreeSet<Industry>,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub required_products: String,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub rank: Option<CustomerRank>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub source: Option<CustomerSource>,

    #[serde(default)]
    pub is_visitable: bool,

    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub position: String,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: String,

    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,

    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactLogForm {
    // Precisa pertencer ao mesmo cliente do registro
    #[serde(default, deserialize_with = "empty_as_none")]
    pub contact_id: Option<Uuid>,

    #[validate(length(min = 1, max = 30, message = "Informe o assunto (até 30 caracteres)."))]
    #[schema(example = "Follow-up call")]
    pub topic: String,

    #[serde(default)]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn industries_round_trip_through_storage_codes() {
        let set: IndustrySet =
            BTreeSet::from([Industry::SemiConductor, Industry::Aerospace]).into();
        let codes = set.to_codes();
        assert_eq!(codes, vec!["aerospace".to_string(), "semi-conductor".to_string()]);
        assert_eq!(IndustrySet::try_from(codes).unwrap(), set);
    }

    #[test]
    fn unknown_industry_code_is_rejected() {
        let err = IndustrySet::try_from(vec!["mining".to_string()]).unwrap_err();
        assert_eq!(err.0, "mining");
    }

    #[test]
    fn industry_serde_uses_storage_codes() {
        let json = serde_json::to_string(&Industry::SemiConductor).unwrap();
        assert_eq!(json, "\"semi-conductor\"");
    }

    #[test]
    fn optional_labels_are_blank_when_missing() {
        let rank: Option<CustomerRank> = None;
        assert_eq!(rank.label(Lang::En), "");
        assert_eq!(Some(CustomerRank::B).label(Lang::Zh), "B");
        assert_eq!(Country::Japan.label(Lang::Zh), "日本");
        assert_eq!(CustomerStatus::Deal.label(Lang::Pt), "Negócio fechado");
    }

    #[test]
    fn customer_form_validates_required_company_name() {
        let form: CustomerForm = serde_json::from_value(serde_json::json!({
            "companyName": "",
            "country": "japan",
            "currency": "JPY",
            "companyType": "stamping",
            "email": "not-an-email"
        }))
        .unwrap();

        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("company_name"));
        assert!(fields.contains_key("email"));
    }
}
