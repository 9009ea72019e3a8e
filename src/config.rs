// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::FixedOffset;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{ActivityRepository, CustomerRepository, DashboardRepository, EnquiryRepository, UserRepository},
    models::dashboard::{DashboardGoal, Period},
    services::{
        auth::AuthService,
        crm_service::CrmService,
        dashboard_service::DashboardService,
        enquiry_service::EnquiryService,
        storage::{FileStorage, LocalFileStorage},
    },
};

// Valores das metas criadas sob demanda
#[derive(Debug, Clone, PartialEq)]
pub struct GoalDefaults {
    pub new_customers: i32,
    pub new_enquiries: i32,
    pub enquiry_amount: Decimal,
    pub success_amount: Decimal,
}

impl GoalDefaults {
    pub fn for_period(&self, period: Period) -> DashboardGoal {
        DashboardGoal {
            period,
            new_customer_target: self.new_customers,
            new_enquiry_target: self.new_enquiries,
            enquiry_amount_target: self.enquiry_amount,
            success_amount_target: self.success_amount,
        }
    }
}

impl Default for GoalDefaults {
    fn default() -> Self {
        Self {
            new_customers: 10,
            new_enquiries: 20,
            enquiry_amount: Decimal::from(500_000),
            success_amount: Decimal::from(100_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub media_root: String,
    pub db_max_connections: u32,
    pub page_size: i64,
    pub max_upload_bytes: usize,
    pub report_offset: FixedOffset,
    pub goal_defaults: GoalDefaults,
}

// Lê uma variável opcional; valor presente mas inválido é erro de inicialização
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} inválida ('{raw}'): {e}")),
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let offset_hours: i32 = parse_or(&lookup, "REPORT_UTC_OFFSET_HOURS", 0)?;
        let report_offset = FixedOffset::east_opt(offset_hours * 3600)
            .with_context(|| format!("REPORT_UTC_OFFSET_HOURS fora do intervalo: {offset_hours}"))?;

        let page_size: i64 = parse_or(&lookup, "PAGE_SIZE", 20)?;
        anyhow::ensure!(page_size > 0, "PAGE_SIZE deve ser positivo");

        let defaults = GoalDefaults::default();
        let goal_defaults = GoalDefaults {
            new_customers: parse_or(&lookup, "GOAL_NEW_CUSTOMERS", defaults.new_customers)?,
            new_enquiries: parse_or(&lookup, "GOAL_NEW_ENQUIRIES", defaults.new_enquiries)?,
            enquiry_amount: parse_or(&lookup, "GOAL_ENQUIRY_AMOUNT", defaults.enquiry_amount)?,
            success_amount: parse_or(&lookup, "GOAL_SUCCESS_AMOUNT", defaults.success_amount)?,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            media_root: lookup("MEDIA_ROOT").unwrap_or_else(|| "./media".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            page_size,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            report_offset,
            goal_defaults,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub auth_service: AuthService,
    pub crm_service: CrmService,
    pub enquiry_service: EnquiryService,
    pub dashboard_service: DashboardService,
    pub activity_repo: ActivityRepository,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let storage = Arc::new(LocalFileStorage::new(&settings.media_root));
        Ok(Self::from_parts(db_pool, settings, storage))
    }

    // --- Monta o gráfico de dependências ---
    pub fn from_parts(db_pool: PgPool, settings: Settings, storage: Arc<dyn FileStorage>) -> Self {
        let user_repo = UserRepository::new(db_pool.clone());
        let customer_repo = CustomerRepository::new(db_pool.clone());
        let enquiry_repo = EnquiryRepository::new(db_pool.clone());
        let dashboard_repo = DashboardRepository::new(db_pool.clone());
        let activity_repo = ActivityRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo, settings.jwt_secret.clone());
        let crm_service = CrmService::new(
            customer_repo.clone(),
            enquiry_repo.clone(),
            activity_repo.clone(),
            storage.clone(),
            settings.page_size,
        );
        let enquiry_service = EnquiryService::new(
            enquiry_repo.clone(),
            customer_repo.clone(),
            activity_repo.clone(),
            storage,
            settings.page_size,
        );
        let dashboard_service = DashboardService::new(
            dashboard_repo,
            customer_repo,
            enquiry_repo,
            settings.goal_defaults.clone(),
            settings.report_offset,
        );

        Self {
            db_pool,
            settings: Arc::new(settings),
            auth_service,
            crm_service,
            enquiry_service,
            dashboard_service,
            activity_repo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [("DATABASE_URL", "postgres://localhost/crm"), ("JWT_SECRET", "s3cret")];

    #[test]
    fn defaults_apply_when_optional_vars_are_missing() {
        let s = settings(&REQUIRED).unwrap();
        assert_eq!(s.bind_addr, "0.0.0.0:3000");
        assert_eq!(s.media_root, "./media");
        assert_eq!(s.db_max_connections, 5);
        assert_eq!(s.page_size, 20);
        assert_eq!(s.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(s.report_offset, FixedOffset::east_opt(0).unwrap());
        assert_eq!(s.goal_defaults, GoalDefaults::default());
    }

    #[test]
    fn required_vars_must_be_present() {
        assert!(settings(&[("JWT_SECRET", "x")]).is_err());
        assert!(settings(&[("DATABASE_URL", "postgres://localhost/crm")]).is_err());
    }

    #[test]
    fn invalid_values_fail_at_startup() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PAGE_SIZE", "twenty"));
        assert!(settings(&vars).is_err());

        let mut vars = REQUIRED.to_vec();
        vars.push(("PAGE_SIZE", "0"));
        assert!(settings(&vars).is_err());

        let mut vars = REQUIRED.to_vec();
        vars.push(("REPORT_UTC_OFFSET_HOURS", "30"));
        assert!(settings(&vars).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("REPORT_UTC_OFFSET_HOURS", "8"),
            ("GOAL_ENQUIRY_AMOUNT", "750000.50"),
            ("GOAL_NEW_CUSTOMERS", "3"),
        ]);
        let s = settings(&vars).unwrap();

        assert_eq!(s.report_offset, FixedOffset::east_opt(8 * 3600).unwrap());
        assert_eq!(s.goal_defaults.enquiry_amount, Decimal::new(75_000_050, 2));
        assert_eq!(s.goal_defaults.new_customers, 3);

        let goal = s.goal_defaults.for_period(Period::Quarterly);
        assert_eq!(goal.period, Period::Quarterly);
        assert_eq!(goal.new_enquiry_target, 20);
    }
}
