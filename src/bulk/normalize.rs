use serde_json::Value;

use crate::api::{RawBulkResult, UploadResponse};

use super::{Outcome, RowOutcome, UploadKind, UploadResult};

pub const MEDICINE_ACK_MESSAGE: &str = "Bulk upload completed";
pub const STOCK_ACK_MESSAGE: &str = "Bulk stock update completed";

/// Maps whatever the upload endpoint answered into the canonical result.
pub fn normalize(response: UploadResponse) -> UploadResult {
    match response {
        UploadResponse::Detailed(raw) => from_detailed(raw),
        UploadResponse::Acknowledged(kind) => acknowledged(kind),
    }
}

// Acknowledgment-only endpoints report no counts.
fn acknowledged(kind: UploadKind) -> UploadResult {
    let message = match kind {
        UploadKind::Stock => STOCK_ACK_MESSAGE,
        UploadKind::Medicine | UploadKind::MedicineWithStock => MEDICINE_ACK_MESSAGE,
    };

    UploadResult {
        message: message.to_string(),
        ..UploadResult::default()
    }
}

fn from_detailed(raw: RawBulkResult) -> UploadResult {
    let RawBulkResult {
        message,
        success_count,
        error_count,
        created_manufacturers_count,
        created_categories_count,
        results,
    } = raw;

    // Backend order: created entries, then errors, each as listed.
    let rows: Vec<RowOutcome> = results
        .medicines
        .iter()
        .map(|entry| RowOutcome {
            row: row_index(entry),
            entity: entity_name(entry),
            outcome: Outcome::Created,
            error: None,
            details: None,
        })
        .chain(results.errors.into_iter().map(|failure| RowOutcome {
            row: failure.row,
            entity: failure.medicine,
            outcome: Outcome::Error,
            error: Some(failure.error).filter(|text| !text.is_empty()),
            details: failure.details.filter(|text| !text.is_empty()),
        }))
        .collect();

    UploadResult {
        message: if message.is_empty() {
            MEDICINE_ACK_MESSAGE.to_string()
        } else {
            message
        },
        success_count,
        error_count,
        created_manufacturers_count,
        created_categories_count,
        rows,
        created_manufacturers: results.created_manufacturers.iter().map(entity_name).collect(),
        created_categories: results.created_categories.iter().map(entity_name).collect(),
    }
}

fn row_index(entry: &Value) -> Option<u32> {
    entry
        .get("row")
        .and_then(Value::as_u64)
        .and_then(|row| u32::try_from(row).ok())
}

fn entity_name(entry: &Value) -> String {
    match entry {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| {
                map.get("medicine").and_then(|medicine| match medicine {
                    Value::String(text) => Some(text.as_str()),
                    other => other.get("name").and_then(Value::as_str),
                })
            })
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
