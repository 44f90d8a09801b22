use super::{Outcome, RowOutcome, UploadResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub total_processed: u64,
    pub success_count: u32,
    pub error_count: u32,
    pub created_manufacturers_count: u32,
    pub created_categories_count: u32,
}

/// Per-row outcomes split by kind, each side in the order the backend reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultDetails {
    pub created: Vec<RowOutcome>,
    pub errors: Vec<RowOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedResults {
    pub summary: UploadSummary,
    pub details: ResultDetails,
}

pub fn format_results(result: &UploadResult) -> FormattedResults {
    let (created, errors): (Vec<RowOutcome>, Vec<RowOutcome>) = result
        .rows
        .iter()
        .cloned()
        .partition(|row| row.outcome == Outcome::Created);

    FormattedResults {
        summary: UploadSummary {
            total_processed: u64::from(result.success_count) + u64::from(result.error_count),
            success_count: result.success_count,
            error_count: result.error_count,
            created_manufacturers_count: result.created_manufacturers_count,
            created_categories_count: result.created_categories_count,
        },
        details: ResultDetails { created, errors },
    }
}
