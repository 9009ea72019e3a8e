// src/services/dashboard_service.rs

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::{
    common::{
        error::AppError,
        labels::{Labeled, Lang},
    },
    config::GoalDefaults,
    db::{
        filters::{CustomerFilter, EnquiryFilter},
        CustomerRepository, DashboardRepository, EnquiryRepository,
    },
    models::dashboard::{
        DashboardGoal, DashboardMetrics, DashboardReport, DashboardWindow, GoalForm, GoalProgress, Period,
    },
};

/// Intervalo [início do período, agora]. Os limites de dia seguem o fuso do relatório.
pub fn window_for(period: Period, now: DateTime<Utc>, offset: FixedOffset) -> DashboardWindow {
    let local = now.with_timezone(&offset);
    let start_month = match period {
        Period::Monthly => local.month(),
        Period::Quarterly => (local.month() - 1) / 3 * 3 + 1,
        Period::Yearly => 1,
    };

    let start = NaiveDate::from_ymd_opt(local.year(), start_month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    DashboardWindow { period, start, end: now }
}

/// metric / target × 100, com duas casas. Meta zerada (ou negativa) dá 0.
pub fn percentage(metric: Decimal, target: Decimal) -> Decimal {
    if target <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    metric
        .checked_div(target)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

pub fn progress(metrics: &DashboardMetrics, goal: &DashboardGoal) -> GoalProgress {
    GoalProgress {
        success_customers_percentage: percentage(
            Decimal::from(metrics.success_customers_count),
            Decimal::from(goal.new_customer_target),
        ),
        new_enquiries_percentage: percentage(
            Decimal::from(metrics.new_enquiries_count),
            Decimal::from(goal.new_enquiry_target),
        ),
        new_enquiries_amount_percentage: percentage(metrics.new_enquiries_amount, goal.enquiry_amount_target),
        success_enquiries_amount_percentage: percentage(
            metrics.success_enquiries_amount,
            goal.success_amount_target,
        ),
    }
}

#[derive(Clone)]
pub struct DashboardService {
    repo: DashboardRepository,
    customer_repo: CustomerRepository,
    enquiry_repo: EnquiryRepository,
    goal_defaults: GoalDefaults,
    offset: FixedOffset,
}

impl DashboardService {
    pub fn new(
        repo: DashboardRepository,
        customer_repo: CustomerRepository,
        enquiry_repo: EnquiryRepository,
        goal_defaults: GoalDefaults,
        offset: FixedOffset,
    ) -> Self {
        Self { repo, customer_repo, enquiry_repo, goal_defaults, offset }
    }

    pub async fn report(&self, period: Period, lang: Lang) -> Result<DashboardReport, AppError> {
        let window = window_for(period, Utc::now(), self.offset);
        let pool = self.customer_repo.pool();

        // A meta é buscada pelo período já resolvido
        let goal = self.repo.get_or_create_goal(&self.goal_defaults.for_period(period)).await?;
        let metrics = self.repo.metrics(pool, window.start, window.end).await?;
        let progress = progress(&metrics, &goal);

        let pinned_customers = self.customer_repo.list_customers(pool, &CustomerFilter::pinned()).await?;
        let pinned_enquiries = self
            .enquiry_repo
            .list_enquiries(pool, &EnquiryFilter::pinned())
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(DashboardReport {
            period,
            period_label: period.label(lang),
            window_start: window.start,
            window_end: window.end,
            goal,
            metrics,
            progress,
            pinned_customers,
            pinned_enquiries,
        })
    }

    pub async fn update_goal(&self, period: Period, form: &GoalForm) -> Result<DashboardGoal, AppError> {
        let goal = self.repo.upsert_goal(self.customer_repo.pool(), period, form).await?;
        tracing::info!("Meta '{}' atualizada.", period.code());
        Ok(goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn utc0() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn monthly_window_starts_on_the_first_of_the_month() {
        let now = utc(2025, 8, 20, 15);
        let window = window_for(Period::Monthly, now, utc0());
        assert_eq!(window.start, utc(2025, 8, 1, 0));
        assert_eq!(window.end, now);
    }

    #[test]
    fn quarterly_window_starts_on_the_quarter() {
        assert_eq!(window_for(Period::Quarterly, utc(2025, 8, 20, 15), utc0()).start, utc(2025, 7, 1, 0));
        assert_eq!(window_for(Period::Quarterly, utc(2025, 3, 31, 23), utc0()).start, utc(2025, 1, 1, 0));
        assert_eq!(window_for(Period::Quarterly, utc(2025, 12, 1, 0), utc0()).start, utc(2025, 10, 1, 0));
    }

    #[test]
    fn yearly_window_starts_on_january_first() {
        assert_eq!(window_for(Period::Yearly, utc(2025, 8, 20, 15), utc0()).start, utc(2025, 1, 1, 0));
    }

    #[test]
    fn window_boundaries_follow_the_report_offset() {
        // 2025-08-31 20:00 UTC já é 1º de setembro em UTC+8
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let window = window_for(Period::Monthly, utc(2025, 8, 31, 20), offset);
        assert_eq!(window.start, utc(2025, 8, 31, 16));
    }

    #[test]
    fn percentage_of_goal() {
        assert_eq!(percentage(Decimal::from(5), Decimal::from(20)), Decimal::from(25));
        assert_eq!(percentage(Decimal::from(1), Decimal::from(3)), Decimal::new(3333, 2));
        assert_eq!(percentage(Decimal::from(7), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage(Decimal::from(7), Decimal::from(-1)), Decimal::ZERO);
    }

    #[test]
    fn progress_compares_each_metric_with_its_target() {
        let goal = DashboardGoal {
            period: Period::Monthly,
            new_customer_target: 10,
            new_enquiry_target: 20,
            enquiry_amount_target: Decimal::from(500_000),
            success_amount_target: Decimal::ZERO,
        };
        let metrics = DashboardMetrics {
            success_customers_count: 2,
            new_enquiries_count: 5,
            new_enquiries_amount: Decimal::from(125_000),
            success_enquiries_amount: Decimal::from(9_999),
            ..Default::default()
        };

        let p = progress(&metrics, &goal);
        assert_eq!(p.success_customers_percentage, Decimal::from(20));
        assert_eq!(p.new_enquiries_percentage, Decimal::from(25));
        assert_eq!(p.new_enquiries_amount_percentage, Decimal::from(25));
        assert_eq!(p.success_enquiries_amount_percentage, Decimal::ZERO);
    }
}
