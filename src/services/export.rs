// src/services/export.rs

// Exportação CSV das listagens filtradas. UTF-8 com BOM para o Excel abrir direito.

use chrono::{DateTime, FixedOffset, Utc};
use csv::Writer;

use crate::{
    common::{
        error::AppError,
        labels::{Labeled, Lang},
    },
    models::{crm::CustomerListRow, enquiry::EnquiryListRow},
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%Y-%m-%d").to_string()
}

fn local_datetime(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string()
}

fn finish(writer: Writer<Vec<u8>>) -> Result<Vec<u8>, AppError> {
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Falha ao finalizar o CSV: {}", e.error()).into())
}

fn csv_error(e: csv::Error) -> AppError {
    anyhow::anyhow!("Falha ao gerar o CSV: {}", e).into()
}

pub fn customers_csv(rows: &[CustomerListRow], lang: Lang, offset: FixedOffset) -> Result<Vec<u8>, AppError> {
    let mut writer = Writer::from_writer(UTF8_BOM.to_vec());

    writer
        .write_record([
            lang.pick("Company", "Empresa", "公司名稱"),
            lang.pick("Country", "País", "國家"),
            lang.pick("Rank", "Classificação", "等級"),
            lang.pick("Status", "Situação", "狀態"),
            lang.pick("Sales owner", "Responsável", "負責業務"),
            lang.pick("Last contacted", "Último contato", "最後聯絡"),
            lang.pick("Created", "Criado em", "建立時間"),
        ])
        .map_err(csv_error)?;

    for row in rows {
        let c = &row.customer;
        let last_contacted = row
            .last_contacted_at
            .map(|at| local_date(at, offset))
            .unwrap_or_default();
        let created = local_datetime(c.created_at, offset);

        writer
            .write_record([
                c.company_name.as_str(),
                c.country.label(lang),
                c.rank.label(lang),
                c.status.label(lang),
                row.sales_owner.as_deref().unwrap_or(""),
                last_contacted.as_str(),
                created.as_str(),
            ])
            .map_err(csv_error)?;
    }

    finish(writer)
}

pub fn enquiries_csv(rows: &[EnquiryListRow], lang: Lang, offset: FixedOffset) -> Result<Vec<u8>, AppError> {
    let mut writer = Writer::from_writer(UTF8_BOM.to_vec());

    writer
        .write_record([
            lang.pick("Internal no.", "Nº interno", "內部編號"),
            lang.pick("Customer enquiry no.", "Nº do cliente", "客戶詢價單號"),
            lang.pick("Customer", "Cliente", "客戶"),
            lang.pick("Status", "Situação", "狀態"),
            lang.pick("Total (NTD)", "Total (NTD)", "總金額 (NTD)"),
            lang.pick("Created by", "Criado por", "建立者"),
            lang.pick("Created", "Criado em", "建立時間"),
        ])
        .map_err(csv_error)?;

    for row in rows {
        let e = &row.enquiry;
        let total = row.total_amount_ntd.round_dp(2).to_string();
        let created = local_datetime(e.created_at, offset);

        writer
            .write_record([
                e.internal_no.as_str(),
                e.external_no.as_str(),
                row.customer_name.as_str(),
                e.status.label(lang),
                total.as_str(),
                row.created_by_username.as_str(),
                created.as_str(),
            ])
            .map_err(csv_error)?;
    }

    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::{
        crm::{CompanyType, Country, Currency, Customer, CustomerRank, CustomerStatus, IndustrySet},
        enquiry::{Enquiry, EnquiryStatus},
    };

    fn customer_row() -> CustomerListRow {
        let created = Utc.with_ymd_and_hms(2025, 2, 1, 23, 30, 0).unwrap();
        CustomerListRow {
            customer: Customer {
                id: Uuid::new_v4(),
                company_name: "ACME, Inc.".into(),
                country: Country::Germany,
                address: String::new(),
                phone: String::new(),
                email: String::new(),
                website: String::new(),
                currency: Currency::Eur,
                status: CustomerStatus::Deal,
                company_type: CompanyType::Stamping,
                industries: IndustrySet::default(),
                required_products: String::new(),
                rank: Some(CustomerRank::A),
                source: None,
                sales_owner_id: None,
                is_visitable: false,
                notes: String::new(),
                is_pinned: false,
                created_at: created,
                updated_at: created,
            },
            sales_owner: Some("bob".into()),
            last_contacted_at: Some(Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap()),
        }
    }

    fn parse(bytes: &[u8]) -> Vec<Vec<String>> {
        let body = bytes.strip_prefix(UTF8_BOM).expect("sem BOM");
        csv::Reader::from_reader(body)
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn customer_export_has_bom_header_and_labels() {
        let bytes = customers_csv(&[customer_row()], Lang::En, FixedOffset::east_opt(0).unwrap()).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let header = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert!(header.starts_with("Company,Country,Rank,Status,Sales owner,Last contacted,Created"));

        let rows = parse(&bytes);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "ACME, Inc.");
        assert_eq!(rows[0][4], "bob");
        assert_eq!(rows[0][5], "2025-03-04");
        assert_eq!(rows[0][6], "2025-02-01 23:30");
    }

    #[test]
    fn dates_follow_the_report_offset() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let rows = parse(&customers_csv(&[customer_row()], Lang::Zh, offset).unwrap());
        assert_eq!(rows[0][6], "2025-02-02 07:30");
    }

    #[test]
    fn enquiry_export_includes_base_currency_total() {
        let created = Utc.with_ymd_and_hms(2025, 5, 6, 8, 15, 0).unwrap();
        let row = EnquiryListRow {
            enquiry: Enquiry {
                id: Uuid::new_v4(),
                internal_no: "Q-001".into(),
                customer_id: Uuid::new_v4(),
                external_no: "PO-9".into(),
                status: EnquiryStatus::Success,
                is_pinned: false,
                created_by: Uuid::new_v4(),
                created_at: created,
                updated_at: created,
            },
            customer_name: "ACME".into(),
            currency: Currency::Usd,
            created_by_username: "alice".into(),
            total_amount_ntd: Decimal::new(76000, 2),
        };

        let rows = parse(&enquiries_csv(&[row], Lang::En, FixedOffset::east_opt(0).unwrap()).unwrap());
        assert_eq!(rows[0], vec!["Q-001", "PO-9", "ACME", "Won", "760.00", "alice", "2025-05-06 08:15"]);
    }

    #[test]
    fn empty_export_still_has_a_header() {
        let bytes = enquiries_csv(&[], Lang::Pt, FixedOffset::east_opt(0).unwrap()).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert!(text.starts_with("Nº interno,"));
        assert!(parse(&bytes).is_empty());
    }
}
