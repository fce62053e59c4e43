use chrono::NaiveDate;
use lazy_static::lazy_static;
use num_traits::Zero;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::constants::MERCHANT_MAX_LEN;
use crate::ingest::ingest_model::{IngestConfig, RawRowFields, RowValidationError, TransactionDraft};
use crate::transactions::TransactionDirection;

lazy_static! {
    // Payment-processor boilerplate stripped from merchant names. Input is
    // lowercased before this runs.
    static ref BOILERPLATE_RE: Regex = Regex::new(
        r"(?:\b(?:pos|ach|ppd|web|pmt|autopay|recurring|debit|credit|purchase|payment|card|chk|check)\b)|(?:\bx{2,}\d+\b)|(?:#\d+)|(?:\b\d{4,}\b)"
    )
    .unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d", "%d %b %Y"];

/// Parses a statement date. Month-first layouts are preferred for
/// ambiguous separators, matching the statement formats we ingest.
pub fn parse_statement_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Parses a statement amount. Tolerates currency signs, thousands
/// separators and parenthesized negatives; returns the signed value.
pub fn parse_statement_amount(value: &str) -> Option<Decimal> {
    let cleaned = value.replace('$', "").replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.starts_with('(') && cleaned.ends_with(')') {
        format!("-{}", &cleaned[1..cleaned.len() - 1])
    } else {
        cleaned.to_string()
    };

    Decimal::from_str(normalized.trim()).ok()
}

/// Deterministic merchant cleanup: casefold, strip processor boilerplate,
/// squeeze whitespace, substitute known aliases, truncate. The same raw
/// description always yields the same merchant, so the result is safe to
/// use for matching and fingerprinting.
pub fn normalize_merchant(description: &str, aliases: &HashMap<String, String>) -> String {
    let lowered = description.to_lowercase();
    let stripped = BOILERPLATE_RE.replace_all(&lowered, " ");
    let squeezed = WHITESPACE_RE.replace_all(stripped.trim(), " ").to_string();

    let cleaned = if squeezed.is_empty() {
        "unknown".to_string()
    } else {
        squeezed
    };

    let aliased = aliases.get(&cleaned).cloned().unwrap_or(cleaned);
    aliased.chars().take(MERCHANT_MAX_LEN).collect()
}

/// Maps one parsed row into a canonical transaction draft, or fails with
/// a validation error naming the offending field.
///
/// Sign and direction are reconciled here: split debit/credit columns take
/// precedence and must not both be populated; a signed amount column puts
/// negative values on the debit side and stores the absolute value.
pub fn normalize_row(
    row: &RawRowFields,
    config: &IngestConfig,
) -> std::result::Result<TransactionDraft, RowValidationError> {
    let description = row
        .description
        .as_deref()
        .ok_or(RowValidationError::MissingField("description"))?;

    let date_raw = row
        .date
        .as_deref()
        .ok_or(RowValidationError::MissingField("date"))?;
    let transaction_date =
        parse_statement_date(date_raw).ok_or_else(|| RowValidationError::MalformedField {
            field: "date",
            value: date_raw.to_string(),
        })?;

    // Unparseable posted dates are dropped rather than failing the row;
    // the field is optional.
    let posted_date = row.posted_date.as_deref().and_then(parse_statement_date);

    let debit_amount = row.debit.as_deref().and_then(parse_statement_amount);
    let credit_amount = row.credit.as_deref().and_then(parse_statement_amount);

    let debit_populated = debit_amount.map(|a| !a.is_zero()).unwrap_or(false);
    let credit_populated = credit_amount.map(|a| !a.is_zero()).unwrap_or(false);

    let (amount, direction) = if debit_populated && credit_populated {
        return Err(RowValidationError::ConflictingAmounts);
    } else if debit_populated {
        (debit_amount.unwrap_or_default().abs(), TransactionDirection::Debit)
    } else if credit_populated {
        (credit_amount.unwrap_or_default().abs(), TransactionDirection::Credit)
    } else {
        let amount_raw = row
            .amount
            .as_deref()
            .ok_or(RowValidationError::MissingField("amount"))?;
        let signed =
            parse_statement_amount(amount_raw).ok_or_else(|| RowValidationError::MalformedField {
                field: "amount",
                value: amount_raw.to_string(),
            })?;
        if signed.is_sign_negative() {
            (signed.abs(), TransactionDirection::Debit)
        } else {
            (signed, TransactionDirection::Credit)
        }
    };

    Ok(TransactionDraft {
        transaction_date,
        posted_date,
        description_raw: description.to_string(),
        merchant_normalized: normalize_merchant(description, &config.merchant_aliases),
        amount,
        currency: config.home_currency.clone(),
        direction,
        source_category: row.source_category.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> IngestConfig {
        IngestConfig::default()
    }

    #[test]
    fn amount_parsing_handles_statement_formats() {
        assert_eq!(parse_statement_amount("$1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_statement_amount("(42.50)"), Some(dec!(-42.50)));
        assert_eq!(parse_statement_amount("-17.80"), Some(dec!(-17.80)));
        assert_eq!(parse_statement_amount(""), None);
        assert_eq!(parse_statement_amount("n/a"), None);
    }

    #[test]
    fn date_parsing_accepts_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_statement_date("2024-03-01"), Some(expected));
        assert_eq!(parse_statement_date("03/01/2024"), Some(expected));
        assert_eq!(parse_statement_date("03/01/24"), Some(expected));
        assert_eq!(parse_statement_date("not a date"), None);
    }

    #[test]
    fn merchant_normalization_is_stable_across_boilerplate_variants() {
        let aliases = HashMap::new();
        let first = normalize_merchant("POS DEBIT AMAZON MKTPLACE", &aliases);
        let second = normalize_merchant("AMAZON   MKTPLACE purchase #1234", &aliases);
        assert_eq!(first, "amazon mktplace");
        assert_eq!(first, second);
        // Repeated runs never drift.
        assert_eq!(normalize_merchant("POS DEBIT AMAZON MKTPLACE", &aliases), first);
    }

    #[test]
    fn merchant_aliases_substitute_after_cleanup() {
        let mut aliases = HashMap::new();
        aliases.insert("amzn mktp us".to_string(), "amazon".to_string());
        assert_eq!(normalize_merchant("AMZN MKTP US", &aliases), "amazon");
    }

    #[test]
    fn empty_merchant_falls_back_to_unknown() {
        let aliases = HashMap::new();
        assert_eq!(normalize_merchant("#12345", &aliases), "unknown");
    }

    #[test]
    fn signed_amount_decides_direction_and_stores_magnitude() {
        let row = RawRowFields {
            date: Some("2024-03-01".to_string()),
            description: Some("COFFEE SHOP".to_string()),
            amount: Some("-4.50".to_string()),
            ..Default::default()
        };
        let draft = normalize_row(&row, &config()).unwrap();
        assert_eq!(draft.direction, TransactionDirection::Debit);
        assert_eq!(draft.amount, dec!(4.50));

        let row = RawRowFields {
            amount: Some("25.00".to_string()),
            ..row
        };
        let draft = normalize_row(&row, &config()).unwrap();
        assert_eq!(draft.direction, TransactionDirection::Credit);
        assert_eq!(draft.amount, dec!(25.00));
    }

    #[test]
    fn split_columns_take_precedence_over_amount() {
        let row = RawRowFields {
            date: Some("2024-03-01".to_string()),
            description: Some("GROCERY".to_string()),
            amount: Some("99.99".to_string()),
            debit: Some("30.00".to_string()),
            ..Default::default()
        };
        let draft = normalize_row(&row, &config()).unwrap();
        assert_eq!(draft.direction, TransactionDirection::Debit);
        assert_eq!(draft.amount, dec!(30.00));
    }

    #[test]
    fn populated_debit_and_credit_is_a_row_error() {
        let row = RawRowFields {
            date: Some("2024-03-01".to_string()),
            description: Some("GROCERY".to_string()),
            debit: Some("30.00".to_string()),
            credit: Some("30.00".to_string()),
            ..Default::default()
        };
        assert_eq!(
            normalize_row(&row, &config()),
            Err(RowValidationError::ConflictingAmounts)
        );
    }

    #[test]
    fn missing_required_fields_name_the_field() {
        let row = RawRowFields {
            description: Some("GROCERY".to_string()),
            amount: Some("1.00".to_string()),
            ..Default::default()
        };
        assert_eq!(
            normalize_row(&row, &config()),
            Err(RowValidationError::MissingField("date"))
        );

        let row = RawRowFields {
            date: Some("2024-03-01".to_string()),
            description: Some("GROCERY".to_string()),
            ..Default::default()
        };
        assert_eq!(
            normalize_row(&row, &config()),
            Err(RowValidationError::MissingField("amount"))
        );
    }

    #[test]
    fn unparseable_posted_date_is_tolerated() {
        let row = RawRowFields {
            date: Some("2024-03-01".to_string()),
            posted_date: Some("garbage".to_string()),
            description: Some("GROCERY".to_string()),
            amount: Some("-1.00".to_string()),
            ..Default::default()
        };
        let draft = normalize_row(&row, &config()).unwrap();
        assert_eq!(draft.posted_date, None);
    }
}
