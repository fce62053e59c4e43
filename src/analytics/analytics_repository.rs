use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use super::analytics_model::*;
use super::analytics_traits::InsightRepositoryTrait;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{Error, Result, ValidationError};
use crate::schema::insight_reports;

pub struct InsightRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl InsightRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        InsightRepository { pool, writer }
    }
}

fn to_domain(db: InsightReportDB) -> Result<InsightReport> {
    let narrative: InsightNarrative = serde_json::from_str(&db.payload_json).map_err(|e| {
        Error::Validation(ValidationError::InvalidInput(format!(
            "Stored insight payload is not parseable: {}",
            e
        )))
    })?;
    Ok(InsightReport {
        id: db.id,
        owner_id: db.owner_id,
        start_date: db.start_date,
        end_date: db.end_date,
        summary: db.summary,
        narrative,
        created_at: DateTime::from_naive_utc_and_offset(db.created_at, Utc),
    })
}

#[async_trait]
impl InsightRepositoryTrait for InsightRepository {
    fn get_insight(&self, owner_id: &str, insight_id: &str) -> Result<Option<InsightReport>> {
        let mut conn = get_connection(&self.pool)?;
        let row = insight_reports::table
            .filter(insight_reports::id.eq(insight_id))
            .filter(insight_reports::owner_id.eq(owner_id))
            .first::<InsightReportDB>(&mut conn)
            .optional()?;
        row.map(to_domain).transpose()
    }

    fn list_insights(&self, owner_id: &str) -> Result<Vec<InsightReport>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = insight_reports::table
            .filter(insight_reports::owner_id.eq(owner_id))
            .order(insight_reports::created_at.desc())
            .load::<InsightReportDB>(&mut conn)?;
        rows.into_iter().map(to_domain).collect()
    }

    async fn insert_insight(&self, report: NewInsightReport) -> Result<InsightReport> {
        let payload_json = serde_json::to_string(&report.narrative)?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<InsightReport> {
                let row = InsightReportDB {
                    id: Uuid::new_v4().to_string(),
                    owner_id: report.owner_id.clone(),
                    start_date: report.start_date,
                    end_date: report.end_date,
                    summary: report.summary.clone(),
                    payload_json,
                    created_at: Utc::now().naive_utc(),
                };
                diesel::insert_into(insight_reports::table)
                    .values(&row)
                    .execute(conn)?;

                to_domain(
                    insight_reports::table
                        .find(&row.id)
                        .first::<InsightReportDB>(conn)?,
                )
            })
            .await
    }
}
