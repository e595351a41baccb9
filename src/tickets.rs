//! Purchased tickets, enriched with their event.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;
use crate::events::{Event, EventService};
use crate::http::ApiClient;
use crate::payments::PaymentMethod;
use crate::types::{EventId, Page, TicketId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketStatus {
    #[default]
    Pending,
    Confirmed,
    Paid,
    Cancelled,
    Refunded,
}

impl TicketStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether the ticket admits its holder.
    #[must_use]
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Confirmed | Self::Paid)
    }
}

impl From<String> for TicketStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Self::Confirmed,
            "paid" => Self::Paid,
            "cancelled" | "canceled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            "pending" | "" => Self::Pending,
            other => {
                tracing::warn!(status = %other, "Unknown ticket status; treating as pending");
                Self::Pending
            }
        }
    }
}

impl From<TicketStatus> for String {
    fn from(status: TicketStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchased ticket.
///
/// `status` defaults to pending, `total_price` falls back to
/// `total_amount` then zero, and an empty `qr_code_url` becomes `None`.
/// `event` is only filled by [`TicketService`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireTicket")]
pub struct Ticket {
    pub id: TicketId,
    pub event_id: EventId,
    pub ticket_type_name: String,
    pub quantity: u32,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub status: TicketStatus,
    pub total_price: f64,
    pub qr_code_url: Option<String>,
    #[serde(with = "crate::types::timestamp")]
    pub created_at: Option<OffsetDateTime>,
    pub event: Option<Event>,
}

#[derive(Deserialize)]
struct WireTicket {
    #[serde(default, alias = "_id")]
    id: TicketId,
    #[serde(default)]
    event_id: EventId,
    #[serde(default, alias = "ticket_type")]
    ticket_type_name: String,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default)]
    buyer_name: String,
    #[serde(default)]
    buyer_email: String,
    #[serde(default)]
    buyer_phone: Option<String>,
    #[serde(default)]
    payment_method: Option<PaymentMethod>,
    #[serde(default)]
    status: Option<TicketStatus>,
    #[serde(default)]
    total_price: Option<f64>,
    #[serde(default)]
    total_amount: Option<f64>,
    #[serde(default)]
    qr_code_url: Option<String>,
    #[serde(default, with = "crate::types::timestamp")]
    created_at: Option<OffsetDateTime>,
    #[serde(default)]
    event: Option<Event>,
}

impl From<WireTicket> for Ticket {
    fn from(wire: WireTicket) -> Self {
        Self {
            id: wire.id,
            event_id: wire.event_id,
            ticket_type_name: wire.ticket_type_name,
            quantity: wire.quantity.unwrap_or(1),
            buyer_name: wire.buyer_name,
            buyer_email: wire.buyer_email,
            buyer_phone: wire.buyer_phone,
            payment_method: wire.payment_method,
            status: wire.status.unwrap_or_default(),
            total_price: wire
                .total_price
                .filter(|p| *p != 0.0)
                .or(wire.total_amount)
                .unwrap_or(0.0),
            qr_code_url: wire.qr_code_url.filter(|u| !u.trim().is_empty()),
            created_at: wire.created_at,
            event: wire.event,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicketService {
    api: ApiClient,
    events: EventService,
}

impl TicketService {
    #[must_use]
    pub fn new(api: ApiClient, events: EventService) -> Self {
        Self { api, events }
    }

    /// Tickets bought with `email`, each enriched with its event.
    ///
    /// Event lookups run concurrently; one that fails leaves that ticket's
    /// `event` empty instead of failing the listing.
    ///
    /// # Errors
    ///
    /// Propagates errors from the ticket listing itself.
    pub async fn buyer_tickets(&self, email: &str, page: u32, size: u32) -> Result<Page<Ticket>, Error> {
        let path = format!("/tickets/buyer/{}", urlencoding::encode(email.trim()));
        let listing: Page<Ticket> = self
            .api
            .get_json(
                "list buyer tickets",
                &path,
                &[("page", page.to_string()), ("size", size.to_string())],
            )
            .await?;

        let Page {
            items,
            total,
            page,
            size,
        } = listing;
        let items = join_all(items.into_iter().map(|ticket| self.enrich(ticket))).await;
        Ok(Page {
            items,
            total,
            page,
            size,
        })
    }

    /// # Errors
    ///
    /// [`Error::Api`] with status 404 when the ticket does not exist.
    pub async fn get(&self, id: &TicketId) -> Result<Ticket, Error> {
        let path = format!("/tickets/{}", urlencoding::encode(&id.0));
        let ticket: Ticket = self.api.get_json("get ticket", &path, &[]).await?;
        Ok(self.enrich(ticket).await)
    }

    async fn enrich(&self, mut ticket: Ticket) -> Ticket {
        if ticket.event.is_some() || ticket.event_id.0.is_empty() {
            return ticket;
        }
        match self.events.get(&ticket.event_id).await {
            Ok(event) => ticket.event = Some(event),
            Err(e) => {
                tracing::warn!(ticket_id = %ticket.id, event_id = %ticket.event_id, error = %e, "Failed to load event for ticket");
            }
        }
        ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_sparse_ticket() {
        let ticket: Ticket =
            serde_json::from_str(r#"{"id":"t1","event_id":"e1","total_amount":3000,"qr_code_url":""}"#)
                .unwrap();
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert!((ticket.total_price - 3000.0).abs() < f64::EPSILON);
        assert_eq!(ticket.qr_code_url, None);
        assert_eq!(ticket.quantity, 1);
        assert!(ticket.event.is_none());
    }

    #[test]
    fn total_price_wins_over_total_amount() {
        let ticket: Ticket =
            serde_json::from_str(r#"{"id":"t1","total_price":1500,"total_amount":3000}"#).unwrap();
        assert!((ticket.total_price - 1500.0).abs() < f64::EPSILON);

        let free: Ticket = serde_json::from_str(r#"{"id":"t2"}"#).unwrap();
        assert!(free.total_price.abs() < f64::EPSILON);
    }

    #[test]
    fn status_is_case_insensitive() {
        for (raw, expected) in [
            ("PAID", TicketStatus::Paid),
            ("Confirmed", TicketStatus::Confirmed),
            ("canceled", TicketStatus::Cancelled),
            ("refunded", TicketStatus::Refunded),
            ("on-hold", TicketStatus::Pending),
        ] {
            let ticket: Ticket =
                serde_json::from_value(serde_json::json!({"id": "t", "status": raw})).unwrap();
            assert_eq!(ticket.status, expected, "{raw}");
        }
        assert!(TicketStatus::Paid.is_valid());
        assert!(!TicketStatus::Refunded.is_valid());
    }

    #[test]
    fn ticket_serializes_back_to_wire_shape() {
        let ticket: Ticket = serde_json::from_str(
            r#"{"_id":"t1","event_id":"e1","ticket_type":"VIP","quantity":2,"status":"paid","payment_method":"mpesa","created_at":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["id"], "t1");
        assert_eq!(json["ticket_type_name"], "VIP");
        assert_eq!(json["status"], "paid");
        assert_eq!(json["payment_method"], "mpesa");
        assert_eq!(json["created_at"], "2024-03-01T10:00:00Z");

        let again: Ticket = serde_json::from_value(json).unwrap();
        assert_eq!(again, ticket);
    }
}
