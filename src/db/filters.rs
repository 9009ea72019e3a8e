// src/db/filters.rs

// Motor de filtro/ordenação das listagens (clientes e cotações).
// Só expressões SQL estáticas da allow-list entram no texto da query;
// tudo que vem do usuário vai por bind.

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use utoipa::IntoParams;

use crate::common::pagination::PageWindow;

/// Subtotal de um item (alias `i`) em moeda base, com os mesmos fallbacks do modelo.
pub const ITEM_SUBTOTAL_NTD_SQL: &str =
    "COALESCE(i.quantity, 0) * COALESCE(i.unit_price, 0) * COALESCE(NULLIF(i.exchange_rate, 0), 1)";

// Parâmetros de query string aceitos pelas listagens e exportações
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Busca livre (case-insensitive)
    pub q: Option<String>,
    pub status: Option<String>,
    /// Só para clientes
    pub rank: Option<String>,
    /// Username do responsável / criador
    pub owner: Option<String>,
    pub sort: Option<String>,
    /// `desc` (padrão) ou qualquer outro valor para ascendente
    pub order: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Ausente => desc; "desc" => desc; qualquer outro valor => asc.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("desc") => SortOrder::Desc,
            Some(_) => SortOrder::Asc,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

fn non_empty(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Monta o padrão do ILIKE escapando os curingas do próprio usuário.
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

// =========================================================================
//  CLIENTES
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerSort {
    CompanyName,
    Country,
    Rank,
    Status,
    CreatedAt,
    LastContactedAt,
}

impl CustomerSort {
    /// Campo fora da allow-list cai silenciosamente no padrão (último contato).
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("company_name") => CustomerSort::CompanyName,
            Some("country") => CustomerSort::Country,
            Some("rank") => CustomerSort::Rank,
            Some("status") => CustomerSort::Status,
            Some("created_at") => CustomerSort::CreatedAt,
            _ => CustomerSort::LastContactedAt,
        }
    }

    fn expression(&self) -> &'static str {
        match self {
            CustomerSort::CompanyName => "c.company_name",
            CustomerSort::Country => "c.country::text",
            CustomerSort::Rank => "c.rank::text",
            CustomerSort::Status => "c.status::text",
            CustomerSort::CreatedAt => "c.created_at",
            CustomerSort::LastContactedAt => "lc.last_contacted_at",
        }
    }
}

const CUSTOMER_SELECT: &str = "SELECT c.*, u.username AS sales_owner, lc.last_contacted_at";

// O último contato é sempre calculado a partir dos registros (MAX), nunca lido de coluna
const CUSTOMER_FROM: &str = " FROM customers c \
    LEFT JOIN users u ON u.id = c.sales_owner_id \
    LEFT JOIN (SELECT customer_id, MAX(created_at) AS last_contacted_at \
               FROM contact_logs GROUP BY customer_id) lc ON lc.customer_id = c.id";

#[derive(Debug, Clone)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub rank: Option<String>,
    pub owner: Option<String>,
    pub pinned_only: bool,
    pub sort: CustomerSort,
    pub order: SortOrder,
}

impl CustomerFilter {
    pub fn from_query(query: &ListQuery) -> Self {
        Self {
            search: non_empty(&query.q),
            status: non_empty(&query.status),
            rank: non_empty(&query.rank),
            owner: non_empty(&query.owner),
            pinned_only: false,
            sort: CustomerSort::from_query(query.sort.as_deref()),
            order: SortOrder::from_query(query.order.as_deref()),
        }
    }

    /// Clientes em destaque (dashboard), mais recentes primeiro.
    pub fn pinned() -> Self {
        Self {
            search: None,
            status: None,
            rank: None,
            owner: None,
            pinned_only: true,
            sort: CustomerSort::LastContactedAt,
            order: SortOrder::Desc,
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" WHERE TRUE");

        if let Some(q) = &self.search {
            let pattern = like_pattern(q);
            qb.push(" AND (c.company_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR array_to_string(c.industries, ',') ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.required_products ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = &self.status {
            qb.push(" AND c.status::text = ").push_bind(status.clone());
        }
        if let Some(rank) = &self.rank {
            // Os códigos de rank são gravados em minúsculo (a, b, c)
            qb.push(" AND c.rank::text = ").push_bind(rank.to_lowercase());
        }
        if let Some(owner) = &self.owner {
            qb.push(" AND u.username = ").push_bind(owner.clone());
        }
        if self.pinned_only {
            qb.push(" AND c.is_pinned");
        }
    }

    fn push_order(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        // Sem valor (ex: cliente sem registros) vai sempre para o fim
        qb.push(" ORDER BY ")
            .push(self.sort.expression())
            .push(" ")
            .push(self.order.sql())
            .push(" NULLS LAST, c.id ASC");
    }

    pub fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*)");
        qb.push(CUSTOMER_FROM);
        self.push_where(&mut qb);
        qb
    }

    /// Query completa (sem paginação), usada na exportação.
    pub fn select_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(CUSTOMER_SELECT);
        qb.push(CUSTOMER_FROM);
        self.push_where(&mut qb);
        self.push_order(&mut qb);
        qb
    }

    pub fn page_query(&self, window: &PageWindow) -> QueryBuilder<'static, Postgres> {
        let mut qb = self.select_query();
        qb.push(" LIMIT ")
            .push_bind(window.limit())
            .push(" OFFSET ")
            .push_bind(window.offset());
        qb
    }
}

// =========================================================================
//  COTAÇÕES
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnquirySort {
    InternalNo,
    CustomerName,
    Status,
    CreatedAt,
    TotalAmountNtd,
}

impl EnquirySort {
    /// Campo fora da allow-list cai silenciosamente no padrão (data de criação).
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("internal_no") => EnquirySort::InternalNo,
            Some("customer_name") => EnquirySort::CustomerName,
            Some("status") => EnquirySort::Status,
            Some("total_amount_ntd") => EnquirySort::TotalAmountNtd,
            _ => EnquirySort::CreatedAt,
        }
    }

    fn expression(&self) -> &'static str {
        match self {
            EnquirySort::InternalNo => "e.internal_no",
            EnquirySort::CustomerName => "c.company_name",
            EnquirySort::Status => "e.status::text",
            EnquirySort::CreatedAt => "e.created_at",
            EnquirySort::TotalAmountNtd => "COALESCE(t.total_amount_ntd, 0)",
        }
    }
}

const ENQUIRY_SELECT: &str = "SELECT e.*, c.company_name AS customer_name, c.currency, \
    u.username AS created_by_username, COALESCE(t.total_amount_ntd, 0) AS total_amount_ntd";

fn enquiry_from() -> String {
    format!(
        " FROM enquiries e \
         JOIN customers c ON c.id = e.customer_id \
         JOIN users u ON u.id = e.created_by \
         LEFT JOIN (SELECT i.enquiry_id, SUM({}) AS total_amount_ntd \
                    FROM enquiry_items i GROUP BY i.enquiry_id) t ON t.enquiry_id = e.id",
        ITEM_SUBTOTAL_NTD_SQL
    )
}

#[derive(Debug, Clone)]
pub struct EnquiryFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub owner: Option<String>,
    pub pinned_only: bool,
    pub sort: EnquirySort,
    pub order: SortOrder,
}

impl EnquiryFilter {
    pub fn from_query(query: &ListQuery) -> Self {
        Self {
            search: non_empty(&query.q),
            status: non_empty(&query.status),
            owner: non_empty(&query.owner),
            pinned_only: false,
            sort: EnquirySort::from_query(query.sort.as_deref()),
            order: SortOrder::from_query(query.order.as_deref()),
        }
    }

    pub fn pinned() -> Self {
        Self {
            search: None,
            status: None,
            owner: None,
            pinned_only: true,
            sort: EnquirySort::CreatedAt,
            order: SortOrder::Desc,
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" WHERE TRUE");

        if let Some(q) = &self.search {
            let pattern = like_pattern(q);
            // EXISTS nos itens evita linhas duplicadas do JOIN 1:N
            qb.push(" AND (e.internal_no ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.company_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR e.external_no ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR EXISTS (SELECT 1 FROM enquiry_items si WHERE si.enquiry_id = e.id AND si.item_name ILIKE ")
                .push_bind(pattern)
                .push("))");
        }
        if let Some(status) = &self.status {
            qb.push(" AND e.status::text = ").push_bind(status.clone());
        }
        if let Some(owner) = &self.owner {
            qb.push(" AND u.username = ").push_bind(owner.clone());
        }
        if self.pinned_only {
            qb.push(" AND e.is_pinned");
        }
    }

    fn push_order(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" ORDER BY ")
            .push(self.sort.expression())
            .push(" ")
            .push(self.order.sql())
            .push(" NULLS LAST, e.id ASC");
    }

    pub fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*)");
        qb.push(enquiry_from());
        self.push_where(&mut qb);
        qb
    }

    pub fn select_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(ENQUIRY_SELECT);
        qb.push(enquiry_from());
        self.push_where(&mut qb);
        self.push_order(&mut qb);
        qb
    }

    pub fn page_query(&self, window: &PageWindow) -> QueryBuilder<'static, Postgres> {
        let mut qb = self.select_query();
        qb.push(" LIMIT ")
            .push_bind(window.limit())
            .push(" OFFSET ")
            .push_bind(window.offset());
        qb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let mut q = ListQuery::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "q" => q.q = value,
                "status" => q.status = value,
                "rank" => q.rank = value,
                "owner" => q.owner = value,
                "sort" => q.sort = value,
                "order" => q.order = value,
                "page" => q.page = value,
                _ => unreachable!(),
            }
        }
        q
    }

    #[test]
    fn unknown_sort_falls_back_to_default_field() {
        assert_eq!(CustomerSort::from_query(Some("password")), CustomerSort::LastContactedAt);
        assert_eq!(CustomerSort::from_query(None), CustomerSort::LastContactedAt);
        assert_eq!(EnquirySort::from_query(Some("created_by__password")), EnquirySort::CreatedAt);
        assert_eq!(EnquirySort::from_query(Some("total_amount_ntd")), EnquirySort::TotalAmountNtd);
    }

    #[test]
    fn order_is_descending_only_for_desc_or_missing() {
        assert_eq!(SortOrder::from_query(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::from_query(None), SortOrder::Desc);
        assert_eq!(SortOrder::from_query(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::from_query(Some("DESC")), SortOrder::Asc);
        assert_eq!(SortOrder::from_query(Some("sideways")), SortOrder::Asc);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ACME"), "%ACME%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn empty_filters_are_ignored() {
        let filter = CustomerFilter::from_query(&query(&[("q", "  "), ("status", ""), ("owner", "")]));
        let sql = filter.count_query().sql().to_string();
        assert!(sql.ends_with("WHERE TRUE"), "{sql}");
    }

    #[test]
    fn customer_search_targets_company_industries_and_products() {
        let filter = CustomerFilter::from_query(&query(&[("q", "acme"), ("rank", "A"), ("owner", "bob")]));
        let sql = filter.select_query().sql().to_string();

        assert!(sql.contains("c.company_name ILIKE $1"));
        assert!(sql.contains("array_to_string(c.industries, ',') ILIKE $2"));
        assert!(sql.contains("c.required_products ILIKE $3"));
        assert!(sql.contains("c.rank::text = $4"));
        assert!(sql.contains("u.username = $5"));
        assert!(!sql.contains("acme"));
    }

    #[test]
    fn customers_without_logs_sort_last_in_both_directions() {
        let desc = CustomerFilter::from_query(&query(&[("sort", "last_contacted_at"), ("order", "desc")]));
        let asc = CustomerFilter::from_query(&query(&[("sort", "last_contacted_at"), ("order", "asc")]));

        assert!(desc
            .select_query()
            .sql()
            .contains("ORDER BY lc.last_contacted_at DESC NULLS LAST, c.id ASC"));
        assert!(asc
            .select_query()
            .sql()
            .contains("ORDER BY lc.last_contacted_at ASC NULLS LAST, c.id ASC"));
    }

    #[test]
    fn last_contact_is_derived_from_logs() {
        let sql = CustomerFilter::from_query(&ListQuery::default()).select_query().sql().to_string();
        assert!(sql.contains("MAX(created_at) AS last_contacted_at FROM contact_logs"));
    }

    #[test]
    fn enquiry_search_covers_customer_name_and_items_without_duplicates() {
        let filter = EnquiryFilter::from_query(&query(&[("q", "ACME")]));
        let sql = filter.select_query().sql().to_string();

        assert!(sql.contains("e.internal_no ILIKE $1"));
        assert!(sql.contains("c.company_name ILIKE $2"));
        assert!(sql.contains("e.external_no ILIKE $3"));
        assert!(sql.contains("EXISTS (SELECT 1 FROM enquiry_items si WHERE si.enquiry_id = e.id AND si.item_name ILIKE $4)"));
        assert!(!sql.contains("JOIN enquiry_items si"));
    }

    #[test]
    fn enquiry_total_sort_uses_null_safe_item_formula() {
        let filter = EnquiryFilter::from_query(&query(&[("sort", "total_amount_ntd"), ("order", "asc")]));
        let sql = filter.select_query().sql().to_string();

        assert!(sql.contains(ITEM_SUBTOTAL_NTD_SQL));
        assert!(sql.contains("ORDER BY COALESCE(t.total_amount_ntd, 0) ASC NULLS LAST, e.id ASC"));
    }

    #[test]
    fn page_query_binds_limit_and_offset() {
        let filter = EnquiryFilter::from_query(&query(&[("status", "success")]));
        let window = PageWindow::resolve(Some("2"), 45, 20);
        let sql = filter.page_query(&window).sql().to_string();

        assert!(sql.contains("e.status::text = $1"));
        assert!(sql.ends_with("LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn pinned_filters_restrict_to_highlighted_rows() {
        assert!(CustomerFilter::pinned().select_query().sql().contains("AND c.is_pinned"));
        assert!(EnquiryFilter::pinned().select_query().sql().contains("AND e.is_pinned"));
    }
}
