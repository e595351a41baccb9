//! Ticket quantities chosen for one checkout attempt.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::events::Event;
use crate::types::{EventId, TicketTypeId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("Only {available} {ticket_type} tickets are available")]
    AtInventoryLimit {
        ticket_type: TicketTypeId,
        available: u32,
    },

    #[error("No {0} tickets selected")]
    AtZero(TicketTypeId),

    #[error("Unknown ticket type: {0}")]
    UnknownTicketType(TicketTypeId),

    #[error("Select at least one ticket")]
    Empty,

    #[error("Selection belongs to another event")]
    WrongEvent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Offer {
    unit_price: f64,
    remaining: u32,
}

/// One selected tier, as sent with a payment request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    #[serde(rename = "name")]
    pub ticket_type: TicketTypeId,
    pub quantity: u32,
    #[serde(rename = "price")]
    pub unit_price: f64,
}

impl LineItem {
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Transient `ticket type -> quantity` map, bounded by inventory.
///
/// Never persisted; build a fresh one each time the event page opens.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketSelection {
    event_id: EventId,
    offers: BTreeMap<TicketTypeId, Offer>,
    quantities: BTreeMap<TicketTypeId, u32>,
}

impl TicketSelection {
    /// Empty selection over the event's ticket types.
    #[must_use]
    pub fn for_event(event: &Event) -> Self {
        let offers = event
            .ticket_types
            .iter()
            .map(|t| {
                (
                    t.id(),
                    Offer {
                        unit_price: t.price,
                        remaining: t.remaining(),
                    },
                )
            })
            .collect();
        Self {
            event_id: event.id.clone(),
            offers,
            quantities: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Add one ticket of `ticket_type`.
    ///
    /// # Errors
    ///
    /// [`SelectionError::AtInventoryLimit`] when no more are on sale,
    /// [`SelectionError::UnknownTicketType`] for a tier the event lacks.
    pub fn increment(&mut self, ticket_type: &TicketTypeId) -> Result<u32, SelectionError> {
        let offer = self.offer(ticket_type)?;
        let current = self.quantity(ticket_type);
        if current >= offer.remaining {
            return Err(SelectionError::AtInventoryLimit {
                ticket_type: ticket_type.clone(),
                available: offer.remaining,
            });
        }
        let next = current + 1;
        self.quantities.insert(ticket_type.clone(), next);
        Ok(next)
    }

    /// Remove one ticket of `ticket_type`.
    ///
    /// # Errors
    ///
    /// [`SelectionError::AtZero`] when none are selected,
    /// [`SelectionError::UnknownTicketType`] for a tier the event lacks.
    pub fn decrement(&mut self, ticket_type: &TicketTypeId) -> Result<u32, SelectionError> {
        self.offer(ticket_type)?;
        let current = self.quantity(ticket_type);
        if current == 0 {
            return Err(SelectionError::AtZero(ticket_type.clone()));
        }
        let next = current - 1;
        if next == 0 {
            self.quantities.remove(ticket_type);
        } else {
            self.quantities.insert(ticket_type.clone(), next);
        }
        Ok(next)
    }

    fn offer(&self, ticket_type: &TicketTypeId) -> Result<Offer, SelectionError> {
        self.offers
            .get(ticket_type)
            .copied()
            .ok_or_else(|| SelectionError::UnknownTicketType(ticket_type.clone()))
    }

    #[must_use]
    pub fn quantity(&self, ticket_type: &TicketTypeId) -> u32 {
        self.quantities.get(ticket_type).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.quantities.values().sum()
    }

    #[must_use]
    pub fn total_price(&self) -> f64 {
        self.line_items().iter().map(LineItem::subtotal).sum()
    }

    /// Selected tiers in name order; unselected tiers are omitted.
    #[must_use]
    pub fn line_items(&self) -> Vec<LineItem> {
        self.quantities
            .iter()
            .filter_map(|(id, &quantity)| {
                self.offers.get(id).map(|offer| LineItem {
                    ticket_type: id.clone(),
                    quantity,
                    unit_price: offer.unit_price,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}
