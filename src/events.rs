//! Event listings, details and categories.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::error::Error;
use crate::http::ApiClient;
use crate::types::{EventId, Page, TicketTypeId};

/// Event category. Unknown values from the API map to [`EventCategory::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Concert,
    Conference,
    Workshop,
    Sports,
    Exhibition,
    Festival,
    #[default]
    #[serde(other)]
    Other,
}

impl EventCategory {
    pub const ALL: [Self; 7] = [
        Self::Concert,
        Self::Conference,
        Self::Workshop,
        Self::Sports,
        Self::Exhibition,
        Self::Festival,
        Self::Other,
    ];

    /// Wire name, as used in the `category` query parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Concert => "concert",
            Self::Conference => "conference",
            Self::Workshop => "workshop",
            Self::Sports => "sports",
            Self::Exhibition => "exhibition",
            Self::Festival => "festival",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchasable ticket tier of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_available: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "available")]
    pub is_available: bool,
}

fn available() -> bool {
    true
}

impl TicketType {
    #[must_use]
    pub fn id(&self) -> TicketTypeId {
        TicketTypeId(self.name.clone())
    }

    /// Tickets still on sale. Zero when the tier is switched off.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        if self.is_available {
            self.quantity_available.unwrap_or(self.quantity)
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, alias = "_id")]
    pub id: EventId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: EventCategory,
    #[serde(default)]
    pub venue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, with = "crate::types::timestamp")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "crate::types::timestamp")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer_email: Option<String>,
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<u32>,
    #[serde(default)]
    pub total_tickets_sold: u32,
    #[serde(default, alias = "is_featured")]
    pub featured: bool,
}

impl Event {
    #[must_use]
    pub fn ticket_type(&self, id: &TicketTypeId) -> Option<&TicketType> {
        self.ticket_types.iter().find(|t| t.name == id.0)
    }

    /// Cheapest tier still on sale, for "from KES ..." labels.
    #[must_use]
    pub fn min_price(&self) -> Option<f64> {
        self.ticket_types
            .iter()
            .filter(|t| t.remaining() > 0)
            .map(|t| t.price)
            .reduce(f64::min)
    }

    #[must_use]
    pub fn is_sold_out(&self) -> bool {
        self.ticket_types.iter().all(|t| t.remaining() == 0)
    }
}

/// Listing filters. Only fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl EventFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_category(mut self, category: EventCategory) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn with_dates(mut self, start: Option<Date>, end: Option<Date>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    #[must_use]
    pub fn with_price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: u32, size: u32) -> Self {
        self.page = Some(page);
        self.size = Some(size);
        self
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(category) = self.category {
            query.push(("category", category.as_str().to_string()));
        }
        if let Some(date) = self.start_date {
            query.push(("start_date", date.to_string()));
        }
        if let Some(date) = self.end_date {
            query.push(("end_date", date.to_string()));
        }
        if let Some(price) = self.min_price {
            query.push(("min_price", price.to_string()));
        }
        if let Some(price) = self.max_price {
            query.push(("max_price", price.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = self.size {
            query.push(("size", size.to_string()));
        }
        query
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Listing {
    Page(Page<Event>),
    Bare(Vec<Event>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Categories {
    Bare(Vec<EventCategory>),
    Wrapped { categories: Vec<EventCategory> },
}

/// Read-only access to the event catalogue.
#[derive(Debug, Clone)]
pub struct EventService {
    api: ApiClient,
    featured_page_size: u32,
}

impl EventService {
    #[must_use]
    pub fn new(api: ApiClient, featured_page_size: u32) -> Self {
        Self {
            api,
            featured_page_size,
        }
    }

    /// One page of events matching `filter`.
    ///
    /// # Errors
    ///
    /// Propagates transport, API and decode errors from [`ApiClient`].
    pub async fn list(&self, filter: &EventFilter) -> Result<Page<Event>, Error> {
        self.api
            .get_json("list events", "/events", &filter.query())
            .await
    }

    /// Every event matching `filter`, walking pages from `filter.page`
    /// (default 1) until the listing is exhausted or `max_pages` were read.
    ///
    /// # Errors
    ///
    /// Fails on the first page that fails.
    pub async fn list_all(&self, filter: &EventFilter, max_pages: u32) -> Result<Vec<Event>, Error> {
        let mut filter = filter.clone();
        let mut page_number = filter.page.unwrap_or(1);
        let mut events = Vec::new();

        for _ in 0..max_pages {
            filter.page = Some(page_number);
            let page = self.list(&filter).await?;
            let next = page.next_page();
            let fetched = page.items.len();
            events.extend(page.items);
            match next {
                Some(n) if fetched > 0 => page_number = n,
                _ => break,
            }
        }
        tracing::debug!(count = events.len(), "Fetched event listing");
        Ok(events)
    }

    /// Featured events for the home page. `size` defaults to the configured
    /// featured page size.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ApiClient`].
    pub async fn featured(&self, page: u32, size: Option<u32>) -> Result<Vec<Event>, Error> {
        let size = size.unwrap_or(self.featured_page_size);
        let listing: Listing = self
            .api
            .get_json(
                "list featured events",
                "/events/featured",
                &[("page", page.to_string()), ("size", size.to_string())],
            )
            .await?;
        Ok(match listing {
            Listing::Page(page) => page.items,
            Listing::Bare(events) => events,
        })
    }

    /// # Errors
    ///
    /// [`Error::Api`] with status 404 when the event does not exist.
    pub async fn get(&self, id: &EventId) -> Result<Event, Error> {
        let path = format!("/events/{}", urlencoding::encode(&id.0));
        self.api.get_json("get event", &path, &[]).await
    }

    /// # Errors
    ///
    /// Propagates errors from [`ApiClient`].
    pub async fn categories(&self) -> Result<Vec<EventCategory>, Error> {
        let categories: Categories = self
            .api
            .get_json("list categories", "/events/categories", &[])
            .await?;
        Ok(match categories {
            Categories::Bare(list) | Categories::Wrapped { categories: list } => list,
        })
    }
}
