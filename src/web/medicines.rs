use std::collections::BTreeSet;

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    api::{Medicine, MedicineDraft, NamedRef, StockUpdate},
    web::{
        AppState, PageLayout, escape_html, render_page,
        auth::{SessionContext, require_session},
    },
};

const DEFAULT_UNIT: &str = "tablet";
const DEFAULT_BATCH_ID: i64 = 1;

/// Raw add/edit form. Numbers stay text until validated.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct MedicineForm {
    pub name: String,
    pub dosage: String,
    pub manufacturer: String,
    pub category: String,
    pub quantity: String,
    pub buy_price: String,
    pub sell_price: String,
    pub unit: String,
}

impl MedicineForm {
    fn from_medicine(medicine: &Medicine) -> Self {
        let name_of = |named: &Option<NamedRef>| {
            named.as_ref().map(|n| n.name.clone()).unwrap_or_default()
        };
        Self {
            name: medicine.name.clone(),
            dosage: medicine.dosage.clone().unwrap_or_default(),
            manufacturer: name_of(&medicine.manufacturer),
            category: name_of(&medicine.category),
            quantity: String::new(),
            buy_price: String::new(),
            sell_price: medicine.sell_price.clone(),
            unit: name_of(&medicine.unit),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidMedicine {
    pub draft: MedicineDraft,
    pub opening_stock: Option<i64>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Edit(i64),
}

impl Mode {
    fn title(self) -> &'static str {
        match self {
            Mode::Create => "Add Medicine",
            Mode::Edit(_) => "Edit Medicine",
        }
    }

    fn action(self) -> String {
        match self {
            Mode::Create => "/inventory/medicines".to_string(),
            Mode::Edit(id) => format!("/inventory/medicines/{id}"),
        }
    }
}

pub async fn new_medicine_page(State(state): State<AppState>) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let known = known_names(&state, &ctx).await;
    Html(form_page(&ctx, Mode::Create, &MedicineForm::default(), &known, None)).into_response()
}

pub async fn create_medicine(State(state): State<AppState>, Form(form): Form<MedicineForm>) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let valid = match validate(&form, true) {
        Ok(valid) => valid,
        Err(message) => return form_error(&state, &ctx, Mode::Create, &form, &message).await,
    };

    let created = match state.api().create_medicine(&ctx.token, &valid.draft).await {
        Ok(created) => created,
        Err(err) if err.is_unauthorized() => return expired(&state).await,
        Err(err) => {
            warn!(error = %err, "medicine creation rejected");
            return form_error(&state, &ctx, Mode::Create, &form, &err.to_string()).await;
        }
    };
    info!(medicine = created.id, name = %created.name, "medicine created");

    if let Some(quantity) = valid.opening_stock {
        let update = StockUpdate {
            quantity,
            batch_id: DEFAULT_BATCH_ID,
        };
        if let Err(err) = state.api().update_stock(&ctx.token, created.id, &update).await {
            warn!(error = %err, medicine = created.id, "opening stock not recorded");
            return Redirect::to("/inventory?error=stock_failed").into_response();
        }
    }

    Redirect::to("/inventory?status=medicine_added").into_response()
}

pub async fn edit_medicine_page(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let medicines = match state.api().list_medicines(&ctx.token).await {
        Ok(medicines) => medicines,
        Err(err) if err.is_unauthorized() => return expired(&state).await,
        Err(err) => {
            warn!(error = %err, "failed to load medicine for editing");
            return Redirect::to("/inventory?error=update_failed").into_response();
        }
    };
    let Some(medicine) = medicines.iter().find(|m| m.id == id) else {
        return Redirect::to("/inventory?error=not_found").into_response();
    };

    let known = KnownNames::from_medicines(&medicines);
    let form = MedicineForm::from_medicine(medicine);
    Html(form_page(&ctx, Mode::Edit(id), &form, &known, None)).into_response()
}

pub async fn update_medicine(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<MedicineForm>,
) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let valid = match validate(&form, false) {
        Ok(valid) => valid,
        Err(message) => return form_error(&state, &ctx, Mode::Edit(id), &form, &message).await,
    };

    match state.api().update_medicine(&ctx.token, id, &valid.draft).await {
        Ok(_) => {
            info!(medicine = id, "medicine updated");
            Redirect::to("/inventory?status=medicine_updated").into_response()
        }
        Err(err) if err.is_unauthorized() => expired(&state).await,
        Err(err) => {
            warn!(error = %err, medicine = id, "medicine update rejected");
            form_error(&state, &ctx, Mode::Edit(id), &form, &err.to_string()).await
        }
    }
}

/// Checks the form the way the add dialog does and builds the backend body.
///
/// `with_stock` requires a positive opening quantity; edits leave stock alone.
pub fn validate(form: &MedicineForm, with_stock: bool) -> Result<ValidMedicine, String> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err("Medicine name is required".into());
    }
    let manufacturer = form.manufacturer.trim();
    if manufacturer.is_empty() {
        return Err("Manufacturer is required".into());
    }
    let category = form.category.trim();
    if category.is_empty() {
        return Err("Category is required".into());
    }

    let opening_stock = if with_stock {
        let quantity = form.quantity.trim().parse::<i64>().unwrap_or(0);
        if quantity <= 0 {
            return Err("Quantity must be greater than 0".into());
        }
        let buy_price = parse_price(&form.buy_price).ok_or("Buy price must be a number")?;
        if buy_price < 0.0 {
            return Err("Buy price cannot be negative".into());
        }
        Some(quantity)
    } else {
        None
    };

    let sell_price = parse_price(&form.sell_price).ok_or("Sell price must be a number")?;
    if sell_price <= 0.0 {
        return Err("Sell price must be greater than 0".into());
    }

    let dosage = form.dosage.trim();
    let unit = form.unit.trim();
    Ok(ValidMedicine {
        draft: MedicineDraft {
            name: name.to_string(),
            manufacturer: manufacturer.to_string(),
            category: category.to_string(),
            unit: if unit.is_empty() { DEFAULT_UNIT } else { unit }.to_string(),
            sell_price,
            dosage: (!dosage.is_empty()).then(|| dosage.to_string()),
        },
        opening_stock,
    })
}

// Blank reads as zero; anything else must be a finite number.
fn parse_price(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0.0);
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Manufacturer and category names already in the inventory, for the form's suggestions.
#[derive(Debug, Default)]
struct KnownNames {
    manufacturers: BTreeSet<String>,
    categories: BTreeSet<String>,
}

impl KnownNames {
    fn from_medicines(medicines: &[Medicine]) -> Self {
        let mut known = Self::default();
        for medicine in medicines {
            if let Some(manufacturer) = &medicine.manufacturer {
                known.manufacturers.insert(manufacturer.name.clone());
            }
            if let Some(category) = &medicine.category {
                known.categories.insert(category.name.clone());
            }
        }
        known.manufacturers.remove("");
        known.categories.remove("");
        known
    }
}

async fn known_names(state: &AppState, ctx: &SessionContext) -> KnownNames {
    match state.api().list_medicines(&ctx.token).await {
        Ok(medicines) => KnownNames::from_medicines(&medicines),
        Err(err) => {
            warn!(error = %err, "no name suggestions for the medicine form");
            KnownNames::default()
        }
    }
}

async fn form_error(
    state: &AppState,
    ctx: &SessionContext,
    mode: Mode,
    form: &MedicineForm,
    message: &str,
) -> Response {
    let known = known_names(state, ctx).await;
    (
        StatusCode::BAD_REQUEST,
        Html(form_page(ctx, mode, form, &known, Some(message))),
    )
        .into_response()
}

async fn expired(state: &AppState) -> Response {
    warn!("backend rejected the access token, signing out");
    state.session().write().await.logout();
    Redirect::to("/login").into_response()
}

fn form_page(
    ctx: &SessionContext,
    mode: Mode,
    form: &MedicineForm,
    known: &KnownNames,
    error: Option<&str>,
) -> String {
    let flash_html = error
        .map(|message| format!(r#"<div class="flash error">{}</div>"#, escape_html(message)))
        .unwrap_or_default();

    let options = |names: &BTreeSet<String>| {
        names
            .iter()
            .map(|name| format!(r#"<option value="{}">"#, escape_html(name)))
            .collect::<Vec<_>>()
            .join("")
    };

    let stock_fields = if mode == Mode::Create {
        format!(
            r#"<label for="quantity">Stock quantity *</label>
                <input id="quantity" type="number" name="quantity" min="1" step="1" value="{quantity}" required>
                <label for="buy_price">Buy price (cost per unit)</label>
                <input id="buy_price" type="number" name="buy_price" min="0" step="0.01" value="{buy_price}">"#,
            quantity = escape_html(&form.quantity),
            buy_price = escape_html(&form.buy_price),
        )
    } else {
        String::new()
    };

    let body_html = format!(
        r#"        <section class="panel">
            <form method="post" action="{action}">
                <input type="hidden" name="unit" value="{unit}">
                <label for="name">Medicine name *</label>
                <input id="name" type="text" name="name" value="{name}" required>
                <label for="dosage">Dosage</label>
                <input id="dosage" type="text" name="dosage" value="{dosage}" placeholder="e.g. 500mg">
                <label for="manufacturer">Manufacturer *</label>
                <input id="manufacturer" type="text" name="manufacturer" list="manufacturers" value="{manufacturer}" required>
                <datalist id="manufacturers">{manufacturer_options}</datalist>
                <label for="category">Category *</label>
                <input id="category" type="text" name="category" list="categories" value="{category}" required>
                <datalist id="categories">{category_options}</datalist>
                {stock_fields}
                <label for="sell_price">Sell price *</label>
                <input id="sell_price" type="number" name="sell_price" min="0" step="0.01" value="{sell_price}" required>
                <div class="row-actions">
                    <button type="submit">Save</button>
                    <a href="/inventory">Cancel</a>
                </div>
            </form>
        </section>"#,
        action = mode.action(),
        unit = escape_html(&form.unit),
        name = escape_html(&form.name),
        dosage = escape_html(&form.dosage),
        manufacturer = escape_html(&form.manufacturer),
        manufacturer_options = options(&known.manufacturers),
        category = escape_html(&form.category),
        category_options = options(&known.categories),
        stock_fields = stock_fields,
        sell_price = escape_html(&form.sell_price),
    );

    render_page(PageLayout {
        title: mode.title(),
        user_name: ctx.display_name(),
        flash_html,
        body_html,
        refresh_after: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> MedicineForm {
        MedicineForm {
            name: " Paracetamol ".into(),
            dosage: "".into(),
            manufacturer: "Acme".into(),
            category: "Analgesic".into(),
            quantity: "20".into(),
            buy_price: "".into(),
            sell_price: "2.5".into(),
            unit: "".into(),
        }
    }

    fn ctx() -> SessionContext {
        SessionContext {
            token: "tok".into(),
            user: None,
        }
    }

    #[test]
    fn valid_form_builds_tablet_draft_with_opening_stock() {
        let valid = validate(&filled(), true).unwrap();
        assert_eq!(valid.opening_stock, Some(20));
        assert_eq!(valid.draft.name, "Paracetamol");
        assert_eq!(valid.draft.unit, "tablet");
        assert_eq!(valid.draft.sell_price, 2.5);
        assert_eq!(valid.draft.dosage, None);
    }

    #[test]
    fn required_fields_are_checked_in_order() {
        let mut form = filled();
        form.name = "  ".into();
        form.manufacturer.clear();
        assert_eq!(validate(&form, true).unwrap_err(), "Medicine name is required");

        let mut form = filled();
        form.category.clear();
        assert_eq!(validate(&form, true).unwrap_err(), "Category is required");
    }

    #[test]
    fn quantity_and_prices_are_bounded() {
        let mut form = filled();
        form.quantity = "0".into();
        assert_eq!(validate(&form, true).unwrap_err(), "Quantity must be greater than 0");

        let mut form = filled();
        form.buy_price = "-1".into();
        assert_eq!(validate(&form, true).unwrap_err(), "Buy price cannot be negative");

        let mut form = filled();
        form.sell_price = "0".into();
        assert_eq!(validate(&form, true).unwrap_err(), "Sell price must be greater than 0");

        let mut form = filled();
        form.sell_price = "abc".into();
        assert!(validate(&form, true).is_err());
    }

    #[test]
    fn edits_ignore_stock_fields() {
        let mut form = filled();
        form.quantity.clear();
        form.unit = "box".into();
        let valid = validate(&form, false).unwrap();
        assert_eq!(valid.opening_stock, None);
        assert_eq!(valid.draft.unit, "box");
    }

    #[test]
    fn known_names_are_unique_and_non_blank() {
        let medicine = |id, manufacturer: &str| Medicine {
            id,
            name: format!("M{id}"),
            dosage: None,
            sell_price: "1".into(),
            manufacturer: Some(NamedRef { name: manufacturer.into() }),
            category: None,
            unit: None,
            stock: None,
            updated_at: None,
        };
        let known = KnownNames::from_medicines(&[medicine(1, "Acme"), medicine(2, "Acme"), medicine(3, "")]);
        assert_eq!(known.manufacturers.into_iter().collect::<Vec<_>>(), vec!["Acme"]);
        assert!(known.categories.is_empty());
    }

    #[test]
    fn create_form_has_stock_fields_and_edit_form_does_not() {
        let known = KnownNames::default();
        let create = form_page(&ctx(), Mode::Create, &filled(), &known, Some("<bad>"));
        assert!(create.contains(r#"name="quantity""#));
        assert!(create.contains(r#"action="/inventory/medicines""#));
        assert!(create.contains("&lt;bad&gt;"));

        let edit = form_page(&ctx(), Mode::Edit(9), &filled(), &known, None);
        assert!(!edit.contains(r#"name="quantity""#));
        assert!(edit.contains(r#"action="/inventory/medicines/9""#));
    }
}
