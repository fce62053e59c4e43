#![allow(dead_code)]

use std::sync::Arc;

use spendscope_core::analytics::{AnalyticsService, DeterministicSpendAdvisory, InsightRepository};
use spendscope_core::categories::{CategoryRepository, CategoryService, CategoryServiceTrait};
use spendscope_core::classification::{ClassificationRuleRepository, ClassificationService};
use spendscope_core::db::{create_pool, run_migrations, spawn_writer, DbPool};
use spendscope_core::imports::{
    ImportRepository, ImportService, ImportServiceTrait, StatementImport,
};
use spendscope_core::ingest::IngestConfig;
use spendscope_core::reviews::{ReviewRepository, ReviewService};
use spendscope_core::transactions::{TransactionRepository, TransactionService};

pub const OWNER: &str = "owner-1";

/// Everything wired against one temp database, the way the embedding
/// application would assemble the services.
pub struct TestContext {
    pub pool: Arc<DbPool>,
    pub imports: Arc<ImportService>,
    pub transactions: Arc<TransactionService>,
    pub categories: Arc<CategoryService>,
    pub classification: Arc<ClassificationService>,
    pub reviews: Arc<ReviewService>,
    pub analytics: Arc<AnalyticsService>,
    pub transaction_repo: Arc<TransactionRepository>,
    pub review_repo: Arc<ReviewRepository>,
    pub import_repo: Arc<ImportRepository>,
    _temp_dir: tempfile::TempDir,
}

pub async fn setup() -> TestContext {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    spendscope_core::db::init(&db_path).expect("Failed to initialize database");
    let pool = create_pool(&db_path).expect("Failed to create pool");
    run_migrations(&pool).expect("Failed to run migrations");
    let writer = spawn_writer((*pool).clone());

    let transaction_repo = Arc::new(TransactionRepository::new(
        Arc::clone(&pool),
        writer.clone(),
    ));
    let category_repo = Arc::new(CategoryRepository::new(Arc::clone(&pool), writer.clone()));
    let rule_repo = Arc::new(ClassificationRuleRepository::new(
        Arc::clone(&pool),
        writer.clone(),
    ));
    let import_repo = Arc::new(ImportRepository::new(Arc::clone(&pool), writer.clone()));
    let review_repo = Arc::new(ReviewRepository::new(Arc::clone(&pool), writer.clone()));
    let insight_repo = Arc::new(InsightRepository::new(Arc::clone(&pool), writer.clone()));

    let categories = Arc::new(CategoryService::new(category_repo.clone()));
    categories
        .seed_defaults(OWNER)
        .await
        .expect("Failed to seed default categories");

    let classification = Arc::new(ClassificationService::new(
        rule_repo.clone(),
        transaction_repo.clone(),
        category_repo.clone(),
    ));
    let transactions = Arc::new(TransactionService::new(
        transaction_repo.clone(),
        category_repo.clone(),
        import_repo.clone(),
    ));
    let reviews = Arc::new(ReviewService::new(
        review_repo.clone(),
        classification.clone(),
    ));
    let imports = Arc::new(ImportService::new(
        import_repo.clone(),
        transaction_repo.clone(),
        classification.clone(),
        IngestConfig::default(),
    ));
    let analytics = Arc::new(AnalyticsService::new(
        transaction_repo.clone(),
        insight_repo.clone(),
        Arc::new(DeterministicSpendAdvisory),
    ));

    TestContext {
        pool,
        imports,
        transactions,
        categories,
        classification,
        reviews,
        analytics,
        transaction_repo,
        review_repo,
        import_repo,
        _temp_dir: temp_dir,
    }
}

/// Uploads and fully processes one statement file for the default owner.
pub async fn ingest(ctx: &TestContext, filename: &str, content: &str) -> StatementImport {
    let record = ctx
        .imports
        .create_import(OWNER, filename, content.as_bytes(), None)
        .await
        .expect("Failed to create import");
    ctx.imports
        .process_import(OWNER, &record.id)
        .await
        .expect("Failed to process import")
}
