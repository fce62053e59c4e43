use async_trait::async_trait;
use chrono::NaiveDate;

use super::analytics_model::*;
use crate::errors::Result;

/// Opaque advisory function: aggregates in, structured narrative out.
/// The shipped implementation is a deterministic placeholder; a language
/// model can be slotted in behind this seam without touching the core.
pub trait SpendAdvisoryTrait: Send + Sync {
    fn generate(&self, snapshot: &SpendSnapshot) -> InsightNarrative;
}

/// Trait defining the contract for insight report persistence.
#[async_trait]
pub trait InsightRepositoryTrait: Send + Sync {
    fn get_insight(&self, owner_id: &str, insight_id: &str) -> Result<Option<InsightReport>>;

    fn list_insights(&self, owner_id: &str) -> Result<Vec<InsightReport>>;

    async fn insert_insight(&self, report: NewInsightReport) -> Result<InsightReport>;
}

/// Trait defining the contract for the read-side aggregation service.
#[async_trait]
pub trait AnalyticsServiceTrait: Send + Sync {
    fn category_totals(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<CategoryTotal>>;

    fn merchant_totals(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<MerchantTotal>>;

    fn trend_series(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        interval: TrendInterval,
    ) -> Result<Vec<TrendPoint>>;

    fn build_snapshot(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<SpendSnapshot>;

    async fn generate_insight(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<InsightReport>;

    fn get_insight(&self, owner_id: &str, insight_id: &str) -> Result<InsightReport>;
}
