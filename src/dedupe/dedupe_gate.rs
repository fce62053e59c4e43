use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::Result;
use crate::ingest::TransactionDraft;
use crate::transactions::TransactionRepositoryTrait;

/// Where the colliding counterpart of a duplicate row lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateScope {
    SameImport,
    ExistingData,
}

impl DuplicateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateScope::SameImport => "same_import",
            DuplicateScope::ExistingData => "existing_data",
        }
    }
}

impl FromStr for DuplicateScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "same_import" => Ok(DuplicateScope::SameImport),
            "existing_data" => Ok(DuplicateScope::ExistingData),
            other => Err(format!("Unknown duplicate scope: {}", other)),
        }
    }
}

/// Which comparison produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    FingerprintMatch,
    NaturalKeyMatch,
}

impl DuplicateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateReason::FingerprintMatch => "fingerprint_match",
            DuplicateReason::NaturalKeyMatch => "natural_key_match",
        }
    }
}

impl FromStr for DuplicateReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fingerprint_match" => Ok(DuplicateReason::FingerprintMatch),
            "natural_key_match" => Ok(DuplicateReason::NaturalKeyMatch),
            other => Err(format!("Unknown duplicate reason: {}", other)),
        }
    }
}

/// Outcome of the gate for one normalized draft.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// No collision: the draft proceeds to classification and persistence.
    Insert,
    /// Collision: the draft is withheld and queued for human review.
    Duplicate {
        scope: DuplicateScope,
        reason: DuplicateReason,
        matched_transaction_id: Option<String>,
    },
}

/// Per-import duplicate gate. Tracks fingerprints already accepted earlier
/// in the same batch and consults committed data for the owner. The final
/// arbiter for races between concurrent imports is the unique index on
/// (owner, fingerprint); this gate handles everything observable before
/// that point.
pub struct DedupeGate {
    transactions: Arc<dyn TransactionRepositoryTrait>,
    seen: HashSet<String>,
}

impl DedupeGate {
    pub fn new(transactions: Arc<dyn TransactionRepositoryTrait>) -> Self {
        DedupeGate {
            transactions,
            seen: HashSet::new(),
        }
    }

    pub fn check(
        &mut self,
        owner_id: &str,
        draft: &TransactionDraft,
        fingerprint: &str,
    ) -> Result<GateDecision> {
        if self.seen.contains(fingerprint) {
            return Ok(GateDecision::Duplicate {
                scope: DuplicateScope::SameImport,
                reason: DuplicateReason::FingerprintMatch,
                matched_transaction_id: None,
            });
        }

        if let Some(existing_id) = self
            .transactions
            .find_by_fingerprint(owner_id, fingerprint)?
        {
            return Ok(GateDecision::Duplicate {
                scope: DuplicateScope::ExistingData,
                reason: DuplicateReason::FingerprintMatch,
                matched_transaction_id: Some(existing_id),
            });
        }

        if let Some(existing_id) = self.transactions.find_by_natural_key(
            owner_id,
            draft.transaction_date,
            &draft.merchant_normalized,
            draft.amount,
            draft.direction,
        )? {
            return Ok(GateDecision::Duplicate {
                scope: DuplicateScope::ExistingData,
                reason: DuplicateReason::NaturalKeyMatch,
                matched_transaction_id: Some(existing_id),
            });
        }

        self.seen.insert(fingerprint.to_string());
        Ok(GateDecision::Insert)
    }
}
