/// Sentinel category every unclassified transaction falls back to
pub const UNCATEGORIZED: &str = "uncategorized";

/// Category assigned by the recurrence heuristic
pub const RECURRING_CATEGORY: &str = "subscriptions";

/// Fixed confidence for recurrence-heuristic matches
pub const RECURRING_CONFIDENCE: f64 = 0.6;

/// Home currency assumed when the source file carries none
pub const DEFAULT_CURRENCY: &str = "USD";

/// Decimal precision for display and natural-key comparison
pub const DISPLAY_DECIMAL_PRECISION: u32 = 2;

/// Longest merchant name kept after normalization
pub const MERCHANT_MAX_LEN: usize = 100;

/// Rows per write batch while processing an import
pub const IMPORT_BATCH_SIZE: usize = 100;

/// Upper bound on one bulk duplicate-review resolution
pub const BULK_REVIEW_MAX: usize = 500;

/// Longest error message stored on a failed import
pub const ERROR_MESSAGE_MAX_LEN: usize = 1000;

/// Recurrence heuristic: minimum committed occurrences before the candidate
pub const RECURRENCE_MIN_PRIOR: usize = 2;

/// Recurrence heuristic: accepted median gap range, in days (weekly..yearly)
pub const RECURRENCE_MIN_GAP_DAYS: i64 = 6;
pub const RECURRENCE_MAX_GAP_DAYS: i64 = 366;

/// Recurrence heuristic: allowed deviation of each gap from the median gap
pub const RECURRENCE_GAP_TOLERANCE_DAYS: i64 = 4;

/// Default category taxonomy seeded for every owner
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "groceries_indian",
    "groceries_other",
    "eating_out",
    "merchandise_shopping",
    "subscriptions",
    "travel",
    "transportation",
    "utilities",
    "rent_or_mortgage",
    "insurance",
    "healthcare",
    "entertainment",
    "education",
    "transfers",
    UNCATEGORIZED,
];
