// src/common/pagination.rs

use serde::Serialize;
use utoipa::ToSchema;

// Janela de paginação já resolvida contra o total de linhas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub per_page: i64,
}

impl PageWindow {
    /// Página não numérica ou ausente vira 1; página além da última vira a última.
    pub fn resolve(requested: Option<&str>, total: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let num_pages = ((total + per_page - 1) / per_page).max(1);

        let number = match requested.and_then(|p| p.trim().parse::<i64>().ok()) {
            Some(n) if n < 1 => num_pages,
            Some(n) if n > num_pages => num_pages,
            Some(n) => n,
            None => 1,
        };

        Self { number, num_pages, per_page }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub num_pages: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total: i64) -> Self {
        Self {
            items,
            page: window.number,
            num_pages: window.num_pages,
            per_page: window.per_page,
            total,
        }
    }
}
