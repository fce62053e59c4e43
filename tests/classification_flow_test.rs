use spendscope_core::classification::{
    ClassificationServiceTrait, NewClassificationRule, RecategorizeRequest, RuleType,
    UpdateClassificationRule,
};
use spendscope_core::imports::ImportStatus;
use spendscope_core::transactions::{TransactionFilter, TransactionServiceTrait};

mod common;
use common::{ingest, setup, OWNER};

fn rule(rule_type: &str, pattern: &str, category: &str, priority: i32) -> NewClassificationRule {
    NewClassificationRule {
        rule_type: rule_type.to_string(),
        pattern: pattern.to_string(),
        category: category.to_string(),
        confidence: 0.9,
        priority,
        is_active: true,
    }
}

#[tokio::test]
async fn lower_priority_value_wins_end_to_end() {
    let ctx = setup().await;

    // Created first, but evaluated second because of its weaker priority.
    ctx.classification
        .create_rule(OWNER, rule("merchant_contains", "grocery", "groceries_other", 10))
        .await
        .expect("Failed to create rule");
    ctx.classification
        .create_rule(OWNER, rule("merchant_contains", "grocery", "eating_out", 5))
        .await
        .expect("Failed to create rule");

    let record = ingest(
        &ctx,
        "march.csv",
        "Date,Description,Amount\n2024-03-01,GROCERY MART,-30.00\n",
    )
    .await;
    assert_eq!(record.status, ImportStatus::Completed);

    let transactions = ctx
        .transactions
        .get_transactions(OWNER, &TransactionFilter::default())
        .expect("Failed to list transactions");
    assert_eq!(transactions[0].category, "eating_out");
}

#[tokio::test]
async fn user_assigned_categories_survive_a_default_recategorize() {
    let ctx = setup().await;
    ingest(
        &ctx,
        "march.csv",
        "Date,Description,Amount\n\
         2024-03-01,GROCERY MART,-30.00\n\
         2024-03-02,GAS STATION,-45.00\n",
    )
    .await;

    let transactions = ctx
        .transactions
        .get_transactions(OWNER, &TransactionFilter::default())
        .expect("Failed to list transactions");
    let grocery = transactions
        .iter()
        .find(|t| t.description_raw.contains("GROCERY"))
        .expect("grocery row missing");

    // Human pins the category.
    let pinned = ctx
        .transactions
        .set_category(OWNER, &grocery.id, "entertainment")
        .await
        .expect("Failed to set category");
    assert!(pinned.is_user_assigned);
    assert_eq!(pinned.category_confidence, 1.0);

    // A rule now disagrees with the human.
    ctx.classification
        .create_rule(OWNER, rule("merchant_contains", "grocery", "groceries_other", 10))
        .await
        .expect("Failed to create rule");
    ctx.classification
        .create_rule(OWNER, rule("merchant_contains", "gas", "transportation", 20))
        .await
        .expect("Failed to create rule");

    let summary = ctx
        .classification
        .recategorize(OWNER, RecategorizeRequest::default())
        .await
        .expect("Failed to recategorize");

    assert_eq!(summary.scanned_rows, 2);
    assert_eq!(summary.skipped_user_assigned_rows, 1);
    assert_eq!(summary.updated_rows, 1);

    let after = ctx
        .transactions
        .get_transactions(OWNER, &TransactionFilter::default())
        .expect("Failed to list transactions");
    let grocery_after = after.iter().find(|t| t.id == grocery.id).unwrap();
    assert_eq!(grocery_after.category, "entertainment");
    assert!(grocery_after.is_user_assigned);

    // An explicit opt-in overrides the pin.
    let summary = ctx
        .classification
        .recategorize(
            OWNER,
            RecategorizeRequest {
                include_user_assigned: true,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to recategorize");
    assert_eq!(summary.skipped_user_assigned_rows, 0);
    assert_eq!(summary.updated_rows, 1);

    let after = ctx
        .transactions
        .get_transactions(OWNER, &TransactionFilter::default())
        .expect("Failed to list transactions");
    let grocery_after = after.iter().find(|t| t.id == grocery.id).unwrap();
    assert_eq!(grocery_after.category, "groceries_other");
    assert!(!grocery_after.is_user_assigned);
}

#[tokio::test]
async fn recategorize_never_downgrades_to_the_fallback() {
    let ctx = setup().await;

    ctx.classification
        .create_rule(OWNER, rule("merchant_contains", "grocery", "groceries_other", 10))
        .await
        .expect("Failed to create rule");

    ingest(
        &ctx,
        "march.csv",
        "Date,Description,Amount\n2024-03-01,GROCERY MART,-30.00\n",
    )
    .await;

    // Narrow the rule so it no longer matches anything.
    let rules = ctx
        .classification
        .list_rules(OWNER, None, None)
        .expect("Failed to list rules");
    ctx.classification
        .update_rule(
            OWNER,
            &rules[0].id,
            UpdateClassificationRule {
                pattern: Some("something else entirely".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update rule");

    let summary = ctx
        .classification
        .recategorize(OWNER, RecategorizeRequest::default())
        .await
        .expect("Failed to recategorize");

    assert_eq!(summary.scanned_rows, 1);
    assert_eq!(summary.updated_rows, 0);
    assert_eq!(summary.unchanged_rows, 1);

    let transactions = ctx
        .transactions
        .get_transactions(OWNER, &TransactionFilter::default())
        .expect("Failed to list transactions");
    assert_eq!(transactions[0].category, "groceries_other");
}

#[tokio::test]
async fn rule_edits_are_validated_never_clamped() {
    let ctx = setup().await;

    let err = ctx
        .classification
        .create_rule(OWNER, {
            let mut bad = rule("merchant_contains", "grocery", "groceries_other", 10);
            bad.confidence = 1.2;
            bad
        })
        .await
        .expect_err("out-of-range confidence must be rejected");
    assert!(err.to_string().contains("within [0, 1]"));

    let created = ctx
        .classification
        .create_rule(OWNER, rule("merchant_contains", "grocery", "groceries_other", 10))
        .await
        .expect("Failed to create rule");

    let err = ctx
        .classification
        .update_rule(
            OWNER,
            &created.id,
            UpdateClassificationRule {
                priority: Some(-5),
                ..Default::default()
            },
        )
        .await
        .expect_err("negative priority must be rejected");
    assert!(err.to_string().contains("non-negative"));
}

#[tokio::test]
async fn rule_config_round_trips_through_the_file_format() {
    let ctx = setup().await;
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("rules.json");

    ctx.classification
        .create_rule(OWNER, rule("merchant_contains", "netflix", "subscriptions", 10))
        .await
        .expect("Failed to create rule");
    ctx.classification
        .create_rule(OWNER, rule("description_contains", "uber", "transportation", 20))
        .await
        .expect("Failed to create rule");

    let exported = ctx
        .classification
        .export_rules(OWNER, &path)
        .await
        .expect("Failed to export rules");
    assert_eq!(exported, 2);

    // Reload into a clean slate and compare the observable rule set.
    let loaded = ctx
        .classification
        .load_rules(OWNER, &path, true)
        .await
        .expect("Failed to load rules");
    assert_eq!(loaded, 2);

    let rules = ctx
        .classification
        .list_rules(OWNER, None, None)
        .expect("Failed to list rules");
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].pattern, "netflix");
    assert_eq!(rules[0].category, "subscriptions");
    assert_eq!(rules[1].pattern, "uber");
    assert_eq!(rules[1].category, "transportation");

    // Loading in merge mode appends instead of replacing.
    let merged = ctx
        .classification
        .load_rules(OWNER, &path, false)
        .await
        .expect("Failed to load rules");
    assert_eq!(merged, 2);
    assert_eq!(
        ctx.classification
            .list_rules(OWNER, None, None)
            .expect("Failed to list rules")
            .len(),
        4
    );

    // Filters narrow the listing.
    let by_type = ctx
        .classification
        .list_rules(OWNER, Some(RuleType::MerchantContains), Some(true))
        .expect("Failed to list rules");
    assert_eq!(by_type.len(), 2);
}
