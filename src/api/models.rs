use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::bulk::UploadKind;

/// Snapshot of the signed-in account as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Fresh credential pair returned by the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
}

/// A spreadsheet chosen for bulk import, held in memory until submitted.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: mime::Mime,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: mime::Mime, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }
}

/// What an upload endpoint answered with. Only the combined kind reports a structured body.
#[derive(Debug, Clone)]
pub enum UploadResponse {
    Detailed(RawBulkResult),
    Acknowledged(UploadKind),
}

/// Body of the combined upload endpoint. Fields may be missing or `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBulkResult {
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub success_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub error_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub created_manufacturers_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub created_categories_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub results: RawBulkDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBulkDetails {
    #[serde(deserialize_with = "null_as_default")]
    pub medicines: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub errors: Vec<RawRowError>,
    #[serde(deserialize_with = "null_as_default")]
    pub created_manufacturers: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub created_categories: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRowError {
    pub row: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub medicine: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    #[serde(default)]
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub sell_price: String,
    #[serde(default)]
    pub manufacturer: Option<NamedRef>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub unit: Option<NamedRef>,
    #[serde(default)]
    pub stock: Option<StockLevel>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Medicine {
    pub fn quantity(&self) -> i64 {
        self.stock.as_ref().map(|stock| stock.quantity).unwrap_or(0)
    }
}

#[derive(Debug, Serialize)]
pub struct StockAdjustment {
    pub adjustment: i64,
}

/// Body for creating or replacing a medicine. Manufacturer and category are sent by
/// name; the backend creates them when they do not exist yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineDraft {
    pub name: String,
    pub manufacturer: String,
    pub category: String,
    pub unit: String,
    pub sell_price: f64,
    pub dosage: Option<String>,
}

/// Sets the stock level of a medicine within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub quantity: i64,
    pub batch_id: i64,
}

// `null` reads as the type's default, like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(value)) => value,
        Some(Raw::Int(value)) => value.to_string(),
        Some(Raw::Float(value)) => value.to_string(),
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_accepts_legacy_token_field() {
        let body = r#"{
            "token": "abc",
            "refreshToken": "def",
            "user": {"id": 7, "email": "a@b.c", "role": "admin", "name": "Ana"}
        }"#;
        let parsed: LoginResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.user.id, "7");
    }

    #[test]
    fn bulk_result_tolerates_missing_fields() {
        let parsed: RawBulkResult = serde_json::from_str(r#"{"successCount": 2}"#).unwrap();
        assert_eq!(parsed.success_count, 2);
        assert_eq!(parsed.error_count, 0);
        assert!(parsed.results.errors.is_empty());
    }

    #[test]
    fn medicine_reads_nested_stock() {
        let body = r#"{
            "id": 3,
            "name": "Paracetamol",
            "sellPrice": "12.50",
            "manufacturer": {"id": 1, "name": "Acme"},
            "stock": {"id": 9, "medicineId": 3, "quantity": 40},
            "updatedAt": "2024-05-01T10:00:00.000Z"
        }"#;
        let medicine: Medicine = serde_json::from_str(body).unwrap();
        assert_eq!(medicine.quantity(), 40);
        assert_eq!(medicine.sell_price, "12.50");
        assert!(medicine.category.is_none());
    }

    #[test]
    fn draft_serializes_in_backend_casing() {
        let draft = MedicineDraft {
            name: "Paracetamol".into(),
            manufacturer: "Acme".into(),
            category: "Analgesic".into(),
            unit: "tablet".into(),
            sell_price: 2.5,
            dosage: None,
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["sellPrice"], 2.5);
        assert!(value["dosage"].is_null());

        let update = serde_json::to_value(StockUpdate { quantity: 10, batch_id: 1 }).unwrap();
        assert_eq!(update, serde_json::json!({"quantity": 10, "batchId": 1}));
    }

    #[test]
    fn null_price_does_not_break_the_listing() {
        let body = r#"[
            {"id": 1, "name": "Paracetamol", "sellPrice": null, "stock": null},
            {"id": 2, "name": null, "sellPrice": 4.5}
        ]"#;
        let medicines: Vec<Medicine> = serde_json::from_str(body).unwrap();
        assert_eq!(medicines[0].sell_price, "");
        assert_eq!(medicines[0].quantity(), 0);
        assert_eq!(medicines[1].name, "");
        assert_eq!(medicines[1].sell_price, "4.5");
    }

    #[test]
    fn null_row_fields_read_as_empty() {
        let body = r#"{
            "successCount": null,
            "results": {"errors": [{"row": 3, "medicine": null, "error": "Missing name"}], "medicines": null}
        }"#;
        let parsed: RawBulkResult = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.success_count, 0);
        assert_eq!(parsed.results.errors[0].medicine, "");
        assert_eq!(parsed.results.errors[0].error, "Missing name");
        assert!(parsed.results.medicines.is_empty());
    }
}
