// src/services/aggregation.rs

// Valores derivados calculados na leitura. Mesma regra do SQL das listagens:
// fator ausente conta como 0, taxa ausente ou zero conta como 1.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::Actor,
        crm::ContactLog,
        enquiry::{EnquiryItem, EnquiryTotals},
    },
};

pub fn enquiry_totals(items: &[EnquiryItem]) -> EnquiryTotals {
    items.iter().fold(EnquiryTotals::default(), |acc, item| EnquiryTotals {
        total_amount: acc.total_amount + item.subtotal(),
        total_amount_ntd: acc.total_amount_ntd + item.subtotal_ntd(),
    })
}

/// Data do registro de contato mais recente, ou `None` sem registros.
pub fn last_contacted_at<'a>(logs: impl IntoIterator<Item = &'a ContactLog>) -> Option<DateTime<Utc>> {
    logs.into_iter().map(|log| log.created_at).max()
}

/// Só o criador pode alterar ou excluir. Registro sem criador não pertence a ninguém.
pub fn ensure_author(actor: &Actor, created_by: Option<Uuid>, what: &str) -> Result<(), AppError> {
    match created_by {
        Some(author) if author == actor.id => Ok(()),
        _ => Err(AppError::Forbidden(format!(
            "Somente quem criou o {} pode alterá-lo.",
            what
        ))),
    }
}
