//! Checkout form validation and payment request assembly.

use url::Url;

use crate::error::Error;
use crate::events::Event;
use crate::payments::{PaymentMethod, PaymentRequest};
use crate::selection::{SelectionError, TicketSelection};
use crate::validation::{FieldError, Validator, is_plausible_email};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buyer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Method-specific payment fields as typed into the form.
#[derive(Clone, PartialEq, Eq)]
pub enum PaymentDetails {
    Card {
        number: String,
        name: String,
        /// `MM/YY`
        expiry: String,
        cvv: String,
    },
    Mpesa {
        phone: String,
    },
    Paypal {
        email: String,
    },
}

impl std::fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card { number, .. } => {
                let digits = card_digits(number);
                let skip = digits.chars().count().saturating_sub(4);
                let last4: String = digits.chars().skip(skip).collect();
                write!(f, "Card(**** {last4})")
            }
            Self::Mpesa { phone } => f.debug_struct("Mpesa").field("phone", phone).finish(),
            Self::Paypal { email } => f.debug_struct("Paypal").field("email", email).finish(),
        }
    }
}

impl PaymentDetails {
    #[must_use]
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Card { .. } => PaymentMethod::Card,
            Self::Mpesa { .. } => PaymentMethod::Mpesa,
            Self::Paypal { .. } => PaymentMethod::Paypal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutForm {
    pub buyer: Buyer,
    pub details: PaymentDetails,
}

impl CheckoutForm {
    /// Check every field locally.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] listing every rejected field.
    pub fn validate(&self) -> Result<(), Error> {
        let mut v = Validator::new();
        v.require(&self.buyer.name, "name", "Name is required")
            .email(&self.buyer.email, "email");

        match &self.details {
            PaymentDetails::Card {
                number,
                name,
                expiry,
                cvv,
            } => {
                let digits = card_digits(number);
                v.check(
                    (13..=19).contains(&digits.len())
                        && digits.chars().all(|c| c.is_ascii_digit()),
                    "card_number",
                    "Enter a valid card number",
                )
                .require(name, "card_name", "Cardholder name is required")
                .check(is_valid_expiry(expiry), "expiry", "Expiry must be MM/YY")
                .check(
                    (3..=4).contains(&cvv.trim().len())
                        && cvv.trim().chars().all(|c| c.is_ascii_digit()),
                    "cvv",
                    "Enter a valid CVV",
                );
            }
            PaymentDetails::Mpesa { phone } => {
                v.check(
                    normalize_mpesa_phone(phone).is_some(),
                    "phone",
                    "Enter a valid M-Pesa number (07XXXXXXXX or 2547XXXXXXXX)",
                );
            }
            PaymentDetails::Paypal { email } => {
                v.check(
                    is_plausible_email(email.trim()),
                    "paypal_email",
                    "Enter a valid PayPal email",
                );
            }
        }
        v.finish()
    }
}

fn card_digits(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

fn is_valid_expiry(expiry: &str) -> bool {
    let Some((month, year)) = expiry.trim().split_once('/') else {
        return false;
    };
    let two_digits = |s: &str| s.len() == 2 && s.chars().all(|c| c.is_ascii_digit());
    two_digits(month)
        && two_digits(year)
        && month.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
}

/// Canonical `2547XXXXXXXX` / `2541XXXXXXXX` form of a Kenyan mobile number.
///
/// Accepts `07…`/`01…` (10 digits) and `2547…`/`2541…` (12 digits) with an
/// optional leading `+`; spaces are ignored.
#[must_use]
pub fn normalize_mpesa_phone(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let local = match digits.len() {
        10 => digits.strip_prefix('0')?,
        12 => digits.strip_prefix("254")?,
        _ => return None,
    };
    if local.starts_with('7') || local.starts_with('1') {
        Some(format!("254{local}"))
    } else {
        None
    }
}

/// A selection ready to be paid for.
#[derive(Debug, Clone)]
pub struct Checkout {
    event: Event,
    selection: TicketSelection,
}

impl Checkout {
    /// # Errors
    ///
    /// [`Error::Selection`] when nothing is selected or the selection was
    /// made for another event.
    pub fn new(event: Event, selection: TicketSelection) -> Result<Self, Error> {
        if selection.is_empty() {
            return Err(SelectionError::Empty.into());
        }
        if selection.event_id() != &event.id {
            return Err(SelectionError::WrongEvent.into());
        }
        Ok(Self { event, selection })
    }

    #[must_use]
    pub fn event(&self) -> &Event {
        &self.event
    }

    #[must_use]
    pub fn selection(&self) -> &TicketSelection {
        &self.selection
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.selection.total_price()
    }

    /// Validate `form` and build the `POST /payments` body.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the form is rejected.
    pub fn payment_request(&self, form: &CheckoutForm, callback_url: &Url) -> Result<PaymentRequest, Error> {
        form.validate()?;

        let phone = match &form.details {
            PaymentDetails::Mpesa { phone } => normalize_mpesa_phone(phone),
            _ => form
                .buyer
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        };
        let email = match &form.details {
            PaymentDetails::Paypal { email } => email.trim().to_string(),
            _ => form.buyer.email.trim().to_string(),
        };

        Ok(PaymentRequest {
            event_id: self.event.id.clone(),
            amount: self.total(),
            email,
            name: form.buyer.name.trim().to_string(),
            phone,
            callback_url: callback_url.to_string(),
            payment_method: form.details.method(),
            ticket_types: self.selection.line_items(),
        })
    }
}

/// Field names rejected by `err`, for highlighting inputs.
#[must_use]
pub fn rejected_fields(err: &Error) -> Vec<&'static str> {
    match err {
        Error::Validation(fields) => fields.iter().map(|f: &FieldError| f.field).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, TicketTypeId};

    fn buyer() -> Buyer {
        Buyer {
            name: "Ann Wanjiru".into(),
            email: "ann@example.com".into(),
            phone: None,
        }
    }

    fn card(number: &str, expiry: &str, cvv: &str) -> CheckoutForm {
        CheckoutForm {
            buyer: buyer(),
            details: PaymentDetails::Card {
                number: number.into(),
                name: "ANN WANJIRU".into(),
                expiry: expiry.into(),
                cvv: cvv.into(),
            },
        }
    }

    fn event() -> Event {
        serde_json::from_value(serde_json::json!({
            "id": "e1",
            "ticket_types": [{"name": "Regular", "price": 1500.0, "quantity": 10}]
        }))
        .unwrap()
    }

    #[test]
    fn valid_card_passes() {
        assert!(card("4242 4242 4242 4242", "12/27", "123").validate().is_ok());
        assert!(card("4242-4242-4242-4", "01/30", "1234").validate().is_ok());
    }

    #[test]
    fn card_errors_are_reported_together() {
        let err = card("4242", "13/27", "12").validate().unwrap_err();
        assert_eq!(rejected_fields(&err), ["card_number", "expiry", "cvv"]);
    }

    #[test]
    fn expiry_shapes() {
        assert!(is_valid_expiry("09/25"));
        assert!(!is_valid_expiry("9/25"));
        assert!(!is_valid_expiry("00/25"));
        assert!(!is_valid_expiry("0925"));
        assert!(!is_valid_expiry("09/2025"));
    }

    #[test]
    fn mpesa_numbers() {
        assert_eq!(normalize_mpesa_phone("0712345678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_mpesa_phone("0112 345 678").as_deref(), Some("254112345678"));
        assert_eq!(normalize_mpesa_phone("+254712345678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_mpesa_phone("254112345678").as_deref(), Some("254112345678"));
        assert_eq!(normalize_mpesa_phone("0812345678"), None);
        assert_eq!(normalize_mpesa_phone("071234567"), None);
        assert_eq!(normalize_mpesa_phone("+255712345678"), None);
        assert_eq!(normalize_mpesa_phone("07123456ab"), None);
    }

    #[test]
    fn missing_buyer_fields() {
        let form = CheckoutForm {
            buyer: Buyer::default(),
            details: PaymentDetails::Paypal {
                email: "ann@paypal".into(),
            },
        };
        let err = form.validate().unwrap_err();
        assert_eq!(rejected_fields(&err), ["name", "email", "paypal_email"]);
    }

    #[test]
    fn card_debug_masks_number() {
        let form = card("4242 4242 4242 4242", "12/27", "123");
        let debug = format!("{:?}", form.details);
        assert_eq!(debug, "Card(**** 4242)");
        assert!(!debug.contains("123"));
    }

    #[test]
    fn checkout_requires_selection_for_same_event() {
        let event = event();
        let empty = TicketSelection::for_event(&event);
        assert!(matches!(
            Checkout::new(event.clone(), empty),
            Err(Error::Selection(SelectionError::Empty))
        ));

        let mut other = event.clone();
        other.id = EventId("e2".into());
        let mut selection = TicketSelection::for_event(&other);
        selection.increment(&TicketTypeId::from("Regular")).unwrap();
        assert!(matches!(
            Checkout::new(event, selection),
            Err(Error::Selection(SelectionError::WrongEvent))
        ));
    }

    #[test]
    fn payment_request_for_mpesa() {
        let event = event();
        let mut selection = TicketSelection::for_event(&event);
        selection.increment(&TicketTypeId::from("Regular")).unwrap();
        selection.increment(&TicketTypeId::from("Regular")).unwrap();
        let checkout = Checkout::new(event, selection).unwrap();

        let form = CheckoutForm {
            buyer: buyer(),
            details: PaymentDetails::Mpesa {
                phone: "0712 345 678".into(),
            },
        };
        let callback: Url = "https://tickets.example.com/payment-pending".parse().unwrap();
        let request = checkout.payment_request(&form, &callback).unwrap();

        assert_eq!(request.payment_method, PaymentMethod::Mpesa);
        assert_eq!(request.phone.as_deref(), Some("254712345678"));
        assert!((request.amount - 3000.0).abs() < f64::EPSILON);
        assert_eq!(request.email, "ann@example.com");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["event_id"], "e1");
        assert_eq!(json["callback_url"], "https://tickets.example.com/payment-pending");
        assert_eq!(json["ticket_types"][0]["quantity"], 2);
    }

    #[test]
    fn invalid_form_builds_nothing() {
        let event = event();
        let mut selection = TicketSelection::for_event(&event);
        selection.increment(&TicketTypeId::from("Regular")).unwrap();
        let checkout = Checkout::new(event, selection).unwrap();
        let callback: Url = "https://tickets.example.com/cb".parse().unwrap();
        let err = checkout
            .payment_request(&card("1", "1/1", "1"), &callback)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
