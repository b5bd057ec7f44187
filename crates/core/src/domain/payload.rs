//! Kind-specific request payloads and their field validation.
//!
//! Validation collects every failing field instead of stopping at the first
//! one, so clients can render all problems of a form submission at once.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::RequestKind;
use crate::errors::{DomainError, FieldError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelType {
    Domestic,
    Overseas,
    HomeLeave,
    ExternalParties,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItinerarySegment {
    pub date: NaiveDate,
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub flight_class: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPayload {
    pub purpose: String,
    pub travel_type: TravelType,
    pub cost_center: String,
    pub estimated_cost: Decimal,
    pub itinerary: Vec<ItinerarySegment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub date: NaiveDate,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimPayload {
    pub purpose: String,
    #[serde(default)]
    pub linked_trf_id: Option<String>,
    pub items: Vec<ExpenseItem>,
}

impl ClaimPayload {
    pub fn total_amount(&self) -> Decimal {
        self.items.iter().map(|item| item.amount).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Single,
    Multiple,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaPayload {
    pub destination_country: String,
    pub travel_purpose: String,
    pub entry_type: EntryType,
    pub passport_number: String,
    pub intended_entry_date: NaiveDate,
    pub intended_exit_date: NaiveDate,
    #[serde(default)]
    pub linked_trf_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportPayload {
    pub purpose: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub pickup_at: DateTime<Utc>,
    pub passengers: u32,
    #[serde(default)]
    pub vehicle_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccommodationPayload {
    pub location: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub room_type: String,
    pub guests: u32,
    #[serde(default)]
    pub linked_trf_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestPayload {
    Trf(TravelPayload),
    Claims(ClaimPayload),
    Visa(VisaPayload),
    Transport(TransportPayload),
    Accommodation(AccommodationPayload),
}

impl RequestPayload {
    /// Decodes and validates a submitted payload for `kind`.
    pub fn from_json(kind: RequestKind, value: serde_json::Value) -> Result<Self, DomainError> {
        let shape_errors = check_shape(payload_fields(kind), &value);
        if !shape_errors.is_empty() {
            return Err(DomainError::Validation(shape_errors));
        }
        let mut payload = Self::decode(kind, value)?;
        payload.normalize();
        let errors = payload.validate();
        if errors.is_empty() {
            Ok(payload)
        } else {
            Err(DomainError::Validation(errors))
        }
    }

    /// Decodes without validation; used when reading persisted rows.
    pub fn decode(kind: RequestKind, value: serde_json::Value) -> Result<Self, DomainError> {
        let decoded = match kind {
            RequestKind::Trf => serde_json::from_value(value).map(Self::Trf),
            RequestKind::Claims => serde_json::from_value(value).map(Self::Claims),
            RequestKind::Visa => serde_json::from_value(value).map(Self::Visa),
            RequestKind::Transport => serde_json::from_value(value).map(Self::Transport),
            RequestKind::Accommodation => serde_json::from_value(value).map(Self::Accommodation),
        };
        decoded.map_err(|error| {
            DomainError::Validation(vec![FieldError::new("payload", error.to_string())])
        })
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Trf(_) => RequestKind::Trf,
            Self::Claims(_) => RequestKind::Claims,
            Self::Visa(_) => RequestKind::Visa,
            Self::Transport(_) => RequestKind::Transport,
            Self::Accommodation(_) => RequestKind::Accommodation,
        }
    }

    fn normalize(&mut self) {
        if let Self::Claims(claim) = self {
            for item in &mut claim.items {
                item.currency = item.currency.trim().to_ascii_uppercase();
            }
        }
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match self {
            Self::Trf(payload) => validate_travel(payload, &mut errors),
            Self::Claims(payload) => validate_claim(payload, &mut errors),
            Self::Visa(payload) => validate_visa(payload, &mut errors),
            Self::Transport(payload) => validate_transport(payload, &mut errors),
            Self::Accommodation(payload) => validate_accommodation(payload, &mut errors),
        }
        errors
    }
}

fn require_text(field: &str, value: &str, errors: &mut Vec<FieldError>) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "is required"));
    }
}

fn validate_travel(payload: &TravelPayload, errors: &mut Vec<FieldError>) {
    require_text("purpose", &payload.purpose, errors);
    require_text("cost_center", &payload.cost_center, errors);
    if payload.estimated_cost < Decimal::ZERO {
        errors.push(FieldError::new("estimated_cost", "must not be negative"));
    }
    if payload.itinerary.is_empty() {
        errors.push(FieldError::new("itinerary", "at least one segment is required"));
    }

    let mut previous_date: Option<NaiveDate> = None;
    for (index, segment) in payload.itinerary.iter().enumerate() {
        require_text(&format!("itinerary[{index}].origin"), &segment.origin, errors);
        require_text(&format!("itinerary[{index}].destination"), &segment.destination, errors);
        if !segment.origin.trim().is_empty()
            && segment.origin.trim().eq_ignore_ascii_case(segment.destination.trim())
        {
            errors.push(FieldError::new(
                format!("itinerary[{index}].destination"),
                "must differ from origin",
            ));
        }
        if previous_date.is_some_and(|previous| segment.date < previous) {
            errors.push(FieldError::new(
                format!("itinerary[{index}].date"),
                "segments must be in chronological order",
            ));
        }
        previous_date = Some(segment.date);
    }
}

fn validate_claim(payload: &ClaimPayload, errors: &mut Vec<FieldError>) {
    require_text("purpose", &payload.purpose, errors);
    if payload.items.is_empty() {
        errors.push(FieldError::new("items", "at least one expense item is required"));
    }

    let mut claim_currency: Option<String> = None;
    for (index, item) in payload.items.iter().enumerate() {
        require_text(&format!("items[{index}].category"), &item.category, errors);
        require_text(&format!("items[{index}].description"), &item.description, errors);
        if item.amount <= Decimal::ZERO {
            errors.push(FieldError::new(format!("items[{index}].amount"), "must be positive"));
        }

        let currency = item.currency.as_str();
        if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
            errors.push(FieldError::new(
                format!("items[{index}].currency"),
                "must be a three-letter currency code",
            ));
            continue;
        }
        match &claim_currency {
            Some(existing) if existing != currency => errors.push(FieldError::new(
                format!("items[{index}].currency"),
                format!("all items must use {existing}"),
            )),
            Some(_) => {}
            None => claim_currency = Some(currency.to_string()),
        }
    }
}

fn validate_visa(payload: &VisaPayload, errors: &mut Vec<FieldError>) {
    require_text("destination_country", &payload.destination_country, errors);
    require_text("travel_purpose", &payload.travel_purpose, errors);

    let passport = payload.passport_number.trim();
    if !(6..=20).contains(&passport.len()) || !passport.chars().all(|ch| ch.is_ascii_alphanumeric())
    {
        errors.push(FieldError::new("passport_number", "must be 6-20 letters or digits"));
    }
    if payload.intended_exit_date < payload.intended_entry_date {
        errors.push(FieldError::new("intended_exit_date", "must not be before the entry date"));
    }
}

fn validate_transport(payload: &TransportPayload, errors: &mut Vec<FieldError>) {
    require_text("purpose", &payload.purpose, errors);
    require_text("pickup_location", &payload.pickup_location, errors);
    require_text("dropoff_location", &payload.dropoff_location, errors);
    if !payload.pickup_location.trim().is_empty()
        && payload.pickup_location.trim().eq_ignore_ascii_case(payload.dropoff_location.trim())
    {
        errors.push(FieldError::new("dropoff_location", "must differ from pickup location"));
    }
    if !(1..=50).contains(&payload.passengers) {
        errors.push(FieldError::new("passengers", "must be between 1 and 50"));
    }
}

fn validate_accommodation(payload: &AccommodationPayload, errors: &mut Vec<FieldError>) {
    require_text("location", &payload.location, errors);
    require_text("room_type", &payload.room_type, errors);
    if payload.check_out <= payload.check_in {
        errors.push(FieldError::new("check_out", "must be after check-in"));
    }
    if !(1..=10).contains(&payload.guests) {
        errors.push(FieldError::new("guests", "must be between 1 and 10"));
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Text,
    Date,
    Timestamp,
    Amount,
    Count,
    Choice(&'static [&'static str]),
    List(&'static [FieldSpec]),
}

#[derive(Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    shape: Shape,
    required: bool,
}

const fn required(name: &'static str, shape: Shape) -> FieldSpec {
    FieldSpec { name, shape, required: true }
}

const fn optional(name: &'static str, shape: Shape) -> FieldSpec {
    FieldSpec { name, shape, required: false }
}

const SEGMENT_FIELDS: &[FieldSpec] = &[
    required("date", Shape::Date),
    required("origin", Shape::Text),
    required("destination", Shape::Text),
    optional("flight_class", Shape::Text),
];

const TRAVEL_FIELDS: &[FieldSpec] = &[
    required("purpose", Shape::Text),
    required(
        "travel_type",
        Shape::Choice(&["domestic", "overseas", "home_leave", "external_parties"]),
    ),
    required("cost_center", Shape::Text),
    required("estimated_cost", Shape::Amount),
    required("itinerary", Shape::List(SEGMENT_FIELDS)),
];

const EXPENSE_FIELDS: &[FieldSpec] = &[
    required("date", Shape::Date),
    required("category", Shape::Text),
    required("description", Shape::Text),
    required("amount", Shape::Amount),
    required("currency", Shape::Text),
];

const CLAIM_FIELDS: &[FieldSpec] = &[
    required("purpose", Shape::Text),
    optional("linked_trf_id", Shape::Text),
    required("items", Shape::List(EXPENSE_FIELDS)),
];

const VISA_FIELDS: &[FieldSpec] = &[
    required("destination_country", Shape::Text),
    required("travel_purpose", Shape::Text),
    required("entry_type", Shape::Choice(&["single", "multiple"])),
    required("passport_number", Shape::Text),
    required("intended_entry_date", Shape::Date),
    required("intended_exit_date", Shape::Date),
    optional("linked_trf_id", Shape::Text),
];

const TRANSPORT_FIELDS: &[FieldSpec] = &[
    required("purpose", Shape::Text),
    required("pickup_location", Shape::Text),
    required("dropoff_location", Shape::Text),
    required("pickup_at", Shape::Timestamp),
    required("passengers", Shape::Count),
    optional("vehicle_type", Shape::Text),
];

const ACCOMMODATION_FIELDS: &[FieldSpec] = &[
    required("location", Shape::Text),
    required("check_in", Shape::Date),
    required("check_out", Shape::Date),
    required("room_type", Shape::Text),
    required("guests", Shape::Count),
    optional("linked_trf_id", Shape::Text),
];

fn payload_fields(kind: RequestKind) -> &'static [FieldSpec] {
    match kind {
        RequestKind::Trf => TRAVEL_FIELDS,
        RequestKind::Claims => CLAIM_FIELDS,
        RequestKind::Visa => VISA_FIELDS,
        RequestKind::Transport => TRANSPORT_FIELDS,
        RequestKind::Accommodation => ACCOMMODATION_FIELDS,
    }
}

/// Checks presence and JSON types of every field before typed decoding,
/// which would otherwise stop at the first bad field.
fn check_shape(fields: &[FieldSpec], value: &serde_json::Value) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match value.as_object() {
        Some(object) => check_object(fields, object, "", &mut errors),
        None => errors.push(FieldError::new("payload", "must be a JSON object")),
    }
    errors
}

fn check_object(
    fields: &[FieldSpec],
    object: &serde_json::Map<String, serde_json::Value>,
    prefix: &str,
    errors: &mut Vec<FieldError>,
) {
    for spec in fields {
        let path = format!("{prefix}{}", spec.name);
        match object.get(spec.name) {
            None | Some(serde_json::Value::Null) => {
                if spec.required {
                    errors.push(FieldError::new(path, "is required"));
                }
            }
            Some(value) => check_value(spec.shape, value, &path, errors),
        }
    }
}

fn check_value(shape: Shape, value: &serde_json::Value, path: &str, errors: &mut Vec<FieldError>) {
    let problem = match shape {
        Shape::Text => (!value.is_string()).then_some("must be a string".to_string()),
        Shape::Date => value
            .as_str()
            .and_then(|raw| raw.parse::<NaiveDate>().ok())
            .is_none()
            .then_some("must be a date (YYYY-MM-DD)".to_string()),
        Shape::Timestamp => value
            .as_str()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .is_none()
            .then_some("must be an RFC 3339 timestamp".to_string()),
        Shape::Amount => {
            let parses = match value {
                serde_json::Value::Number(_) => true,
                serde_json::Value::String(raw) => raw.parse::<Decimal>().is_ok(),
                _ => false,
            };
            (!parses).then_some("must be a decimal amount".to_string())
        }
        Shape::Count => value
            .as_u64()
            .filter(|count| u32::try_from(*count).is_ok())
            .is_none()
            .then_some("must be a non-negative whole number".to_string()),
        Shape::Choice(options) => value
            .as_str()
            .filter(|raw| options.contains(raw))
            .is_none()
            .then(|| format!("must be one of: {}", options.join(", "))),
        Shape::List(item_fields) => match value.as_array() {
            Some(items) => {
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{index}]");
                    match item.as_object() {
                        Some(object) => {
                            check_object(item_fields, object, &format!("{item_path}."), errors)
                        }
                        None => errors.push(FieldError::new(item_path, "must be an object")),
                    }
                }
                None
            }
            None => Some("must be a list".to_string()),
        },
    };
    if let Some(message) = problem {
        errors.push(FieldError::new(path, message));
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::RequestPayload;
    use crate::domain::request::RequestKind;
    use crate::errors::DomainError;

    fn field_names(error: DomainError) -> Vec<String> {
        match error {
            DomainError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn travel_payload_accepts_well_formed_itinerary() {
        let payload = RequestPayload::from_json(
            RequestKind::Trf,
            json!({
                "purpose": "Site survey",
                "travel_type": "overseas",
                "cost_center": "CC-410",
                "estimated_cost": "2450.00",
                "itinerary": [
                    { "date": "2026-11-02", "origin": "KUL", "destination": "SIN" },
                    { "date": "2026-11-05", "origin": "SIN", "destination": "KUL", "flight_class": "economy" }
                ]
            }),
        )
        .expect("valid travel payload");

        assert_eq!(payload.kind(), RequestKind::Trf);
    }

    #[test]
    fn travel_payload_collects_all_field_errors() {
        let error = RequestPayload::from_json(
            RequestKind::Trf,
            json!({
                "purpose": " ",
                "travel_type": "domestic",
                "cost_center": "",
                "estimated_cost": -1,
                "itinerary": [
                    { "date": "2026-11-05", "origin": "KUL", "destination": "kul" },
                    { "date": "2026-11-01", "origin": "KUL", "destination": "PEN" }
                ]
            }),
        )
        .expect_err("invalid payload");

        let fields = field_names(error);
        assert!(fields.contains(&"purpose".to_string()));
        assert!(fields.contains(&"cost_center".to_string()));
        assert!(fields.contains(&"estimated_cost".to_string()));
        assert!(fields.contains(&"itinerary[0].destination".to_string()));
        assert!(fields.contains(&"itinerary[1].date".to_string()));
    }

    #[test]
    fn claim_total_sums_items_and_rejects_mixed_currencies() {
        let payload = RequestPayload::from_json(
            RequestKind::Claims,
            json!({
                "purpose": "Conference",
                "items": [
                    { "date": "2026-10-01", "category": "meals", "description": "Dinner", "amount": "45.50", "currency": "MYR" },
                    { "date": "2026-10-02", "category": "taxi", "description": "Airport", "amount": "80", "currency": "myr" }
                ]
            }),
        )
        .expect("valid claim");
        let RequestPayload::Claims(claim) = payload else { panic!("expected claim payload") };
        assert_eq!(claim.total_amount(), Decimal::new(12_550, 2));
        assert!(claim.items.iter().all(|item| item.currency == "MYR"));

        let error = RequestPayload::from_json(
            RequestKind::Claims,
            json!({
                "purpose": "Conference",
                "items": [
                    { "date": "2026-10-01", "category": "meals", "description": "Dinner", "amount": "45.50", "currency": "MYR" },
                    { "date": "2026-10-02", "category": "taxi", "description": "Airport", "amount": "0", "currency": "USD" }
                ]
            }),
        )
        .expect_err("mixed currencies");
        let fields = field_names(error);
        assert_eq!(fields, vec!["items[1].amount".to_string(), "items[1].currency".to_string()]);
    }

    #[test]
    fn visa_exit_must_not_precede_entry() {
        let error = RequestPayload::from_json(
            RequestKind::Visa,
            json!({
                "destination_country": "Japan",
                "travel_purpose": "Training",
                "entry_type": "single",
                "passport_number": "A1234567",
                "intended_entry_date": "2026-12-10",
                "intended_exit_date": "2026-12-01"
            }),
        )
        .expect_err("exit before entry");

        assert_eq!(field_names(error), vec!["intended_exit_date".to_string()]);
    }

    #[test]
    fn accommodation_requires_checkout_after_checkin() {
        let error = RequestPayload::from_json(
            RequestKind::Accommodation,
            json!({
                "location": "Miri camp",
                "check_in": "2026-11-03",
                "check_out": "2026-11-03",
                "room_type": "single",
                "guests": 0
            }),
        )
        .expect_err("same-day checkout");

        assert_eq!(field_names(error), vec!["check_out".to_string(), "guests".to_string()]);
    }

    #[test]
    fn non_object_payload_reports_payload_field() {
        let error = RequestPayload::from_json(RequestKind::Transport, json!(["purpose", 42]))
            .expect_err("wrong shape");

        assert_eq!(field_names(error), vec!["payload".to_string()]);
    }

    #[test]
    fn missing_and_mistyped_fields_are_all_reported() {
        let error = RequestPayload::from_json(RequestKind::Claims, json!({ "linked_trf_id": "TSR-1" }))
            .expect_err("empty claim");
        assert_eq!(field_names(error), vec!["purpose".to_string(), "items".to_string()]);

        let error = RequestPayload::from_json(
            RequestKind::Transport,
            json!({
                "purpose": 42,
                "pickup_location": "Office",
                "pickup_at": "tomorrow",
                "passengers": -1
            }),
        )
        .expect_err("mistyped transport");
        assert_eq!(
            field_names(error),
            vec![
                "purpose".to_string(),
                "dropoff_location".to_string(),
                "pickup_at".to_string(),
                "passengers".to_string(),
            ]
        );
    }

    #[test]
    fn nested_item_fields_are_checked_by_index() {
        let error = RequestPayload::from_json(
            RequestKind::Claims,
            json!({
                "purpose": "Conference",
                "items": [
                    { "date": "2026-10-01", "category": "meals", "description": "Dinner", "amount": "45.50", "currency": "MYR" },
                    { "date": "01/10/2026", "category": "taxi", "amount": "lots", "currency": "MYR" },
                    "receipt"
                ]
            }),
        )
        .expect_err("bad items");

        assert_eq!(
            field_names(error),
            vec![
                "items[1].date".to_string(),
                "items[1].description".to_string(),
                "items[1].amount".to_string(),
                "items[2]".to_string(),
            ]
        );
    }
}
