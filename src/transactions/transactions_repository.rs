use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::SqliteConnection;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::constants::DISPLAY_DECIMAL_PRECISION;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{Error, Result, ValidationError};
use crate::schema::transactions;
use crate::transactions::transactions_model::*;
use crate::transactions::transactions_traits::TransactionRepositoryTrait;

pub struct TransactionRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl TransactionRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        TransactionRepository { pool, writer }
    }
}

fn duplicate_insert_error(existing_hint: &str) -> Error {
    Error::Validation(ValidationError::InvalidInput(format!(
        "Duplicate transaction exists with same date, merchant, amount, and direction. {}",
        existing_hint
    )))
}

#[async_trait]
impl TransactionRepositoryTrait for TransactionRepository {
    fn get_transactions(
        &self,
        owner_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = transactions::table
            .filter(transactions::owner_id.eq(owner_id))
            .into_boxed();

        if let Some(start_date) = filter.start_date {
            query = query.filter(transactions::transaction_date.ge(start_date));
        }
        if let Some(end_date) = filter.end_date {
            query = query.filter(transactions::transaction_date.le(end_date));
        }
        if let Some(ref category) = filter.category {
            query = query.filter(transactions::category.eq(category.clone()));
        }

        query = query.order((
            transactions::transaction_date.desc(),
            transactions::created_at.desc(),
        ));

        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let rows = query.load::<TransactionDB>(&mut conn)?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    fn get_transaction_by_id(
        &self,
        owner_id: &str,
        transaction_id: &str,
    ) -> Result<Option<Transaction>> {
        let mut conn = get_connection(&self.pool)?;
        let row = transactions::table
            .filter(transactions::id.eq(transaction_id))
            .filter(transactions::owner_id.eq(owner_id))
            .first::<TransactionDB>(&mut conn)
            .optional()?;
        Ok(row.map(Transaction::from))
    }

    fn find_by_fingerprint(&self, owner_id: &str, fingerprint: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(transactions::table
            .filter(transactions::owner_id.eq(owner_id))
            .filter(transactions::dedupe_fingerprint.eq(fingerprint))
            .select(transactions::id)
            .first::<String>(&mut conn)
            .optional()?)
    }

    fn find_by_natural_key(
        &self,
        owner_id: &str,
        transaction_date: NaiveDate,
        merchant: &str,
        amount: Decimal,
        direction: TransactionDirection,
    ) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;

        // Amounts are stored as decimal text, so the 2-dp comparison
        // happens here instead of in SQL. The candidate set is already
        // narrowed to one owner, day and direction.
        let candidates: Vec<(String, String, String)> = transactions::table
            .filter(transactions::owner_id.eq(owner_id))
            .filter(transactions::transaction_date.eq(transaction_date))
            .filter(transactions::direction.eq(direction.as_str()))
            .select((
                transactions::id,
                transactions::merchant_normalized,
                transactions::amount,
            ))
            .load(&mut conn)?;

        let wanted_merchant = merchant.trim().to_lowercase();
        let wanted_amount = amount.abs().round_dp(DISPLAY_DECIMAL_PRECISION);

        Ok(candidates.into_iter().find_map(|(id, merchant, amount)| {
            let amount = Decimal::from_str(&amount).unwrap_or_default();
            if merchant.trim().to_lowercase() == wanted_merchant
                && amount.round_dp(DISPLAY_DECIMAL_PRECISION) == wanted_amount
            {
                Some(id)
            } else {
                None
            }
        }))
    }

    fn get_merchant_amount_dates(
        &self,
        owner_id: &str,
        merchant: &str,
        amount: Decimal,
    ) -> Result<Vec<NaiveDate>> {
        let mut conn = get_connection(&self.pool)?;

        let rows: Vec<(NaiveDate, String)> = transactions::table
            .filter(transactions::owner_id.eq(owner_id))
            .filter(transactions::merchant_normalized.eq(merchant))
            .select((transactions::transaction_date, transactions::amount))
            .order(transactions::transaction_date.asc())
            .load(&mut conn)?;

        let wanted = amount.abs().round_dp(DISPLAY_DECIMAL_PRECISION);
        Ok(rows
            .into_iter()
            .filter(|(_, stored)| {
                Decimal::from_str(stored)
                    .unwrap_or_default()
                    .round_dp(DISPLAY_DECIMAL_PRECISION)
                    == wanted
            })
            .map(|(date, _)| date)
            .collect())
    }

    async fn insert_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Transaction> {
                let id = Uuid::new_v4().to_string();
                let now = Utc::now().naive_utc();
                let db = new_transaction.into_db(id.clone(), now);

                diesel::insert_into(transactions::table)
                    .values(&db)
                    .execute(conn)
                    .map_err(|e| match e {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            duplicate_insert_error("Fingerprint already committed.")
                        }
                        other => Error::from(other),
                    })?;

                let row = transactions::table
                    .find(&id)
                    .first::<TransactionDB>(conn)?;
                Ok(Transaction::from(row))
            })
            .await
    }

    async fn set_category(
        &self,
        owner_id: &str,
        transaction_id: &str,
        category: &str,
        confidence: f64,
        is_user_assigned: bool,
    ) -> Result<Transaction> {
        let owner_id = owner_id.to_string();
        let transaction_id = transaction_id.to_string();
        let category = category.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Transaction> {
                let now = Utc::now().naive_utc();
                let affected = diesel::update(
                    transactions::table
                        .filter(transactions::id.eq(&transaction_id))
                        .filter(transactions::owner_id.eq(&owner_id)),
                )
                .set((
                    transactions::category.eq(&category),
                    transactions::category_confidence.eq(confidence),
                    transactions::is_user_assigned.eq(is_user_assigned),
                    transactions::updated_at.eq(now),
                ))
                .execute(conn)?;

                if affected == 0 {
                    return Err(Error::Validation(ValidationError::InvalidInput(format!(
                        "Transaction not found: {}",
                        transaction_id
                    ))));
                }

                let row = transactions::table
                    .find(&transaction_id)
                    .first::<TransactionDB>(conn)?;
                Ok(Transaction::from(row))
            })
            .await
    }

    async fn apply_reassignments(&self, reassignments: Vec<CategoryReassignment>) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let now = Utc::now().naive_utc();
                let mut updated = 0;
                for reassignment in &reassignments {
                    updated += diesel::update(
                        transactions::table.find(&reassignment.transaction_id),
                    )
                    .set((
                        transactions::category.eq(&reassignment.category),
                        transactions::category_confidence.eq(reassignment.confidence),
                        transactions::is_user_assigned.eq(false),
                        transactions::updated_at.eq(now),
                    ))
                    .execute(conn)?;
                }
                Ok(updated)
            })
            .await
    }
}
