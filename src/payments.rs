//! Payment creation, verification and status polling.
//!
//! After the gateway hand-off the payment-pending view calls
//! [`PaymentService::watch`], which re-checks the payment on a fixed period
//! until it settles, times out or the view goes away.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::MIN_POLL_INTERVAL;
use crate::error::Error;
use crate::http::ApiClient;
use crate::navigation::Navigation;
use crate::routes::Route;
use crate::selection::LineItem;
use crate::tickets::Ticket;
use crate::types::{EventId, PaymentReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Mpesa,
    Paypal,
}

impl PaymentMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Mpesa => "mpesa",
            Self::Paypal => "paypal",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /payments`. Built by [`Checkout`](crate::checkout::Checkout).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub event_id: EventId,
    pub amount: f64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub callback_url: String,
    pub payment_method: PaymentMethod,
    pub ticket_types: Vec<LineItem>,
}

/// A created payment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Payment {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub paystack_reference: Option<PaymentReference>,
    /// Gateway page to send the user to, when the method needs one.
    #[serde(default)]
    pub paystack_authorization_url: Option<String>,
}

impl Payment {
    /// Reference to verify with; falls back to the payment id.
    #[must_use]
    pub fn reference(&self) -> Option<PaymentReference> {
        self.paystack_reference.clone().or_else(|| {
            (!self.id.is_empty()).then(|| PaymentReference(self.id.clone()))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum VerificationStatus {
    Success,
    Failed,
    Pending,
}

impl From<String> for VerificationStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "paid" | "completed" => Self::Success,
            "failed" | "failure" | "cancelled" | "canceled" | "abandoned" | "reversed" => {
                Self::Failed
            }
            _ => Self::Pending,
        }
    }
}

/// Response of `POST /payments/verify/{reference}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentVerification {
    pub status: VerificationStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

/// Where a watched payment stands.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentProgress {
    /// Still waiting. `last_error` holds the most recent failed check, if the
    /// latest one failed.
    Pending {
        attempts: u32,
        last_error: Option<String>,
    },
    Succeeded {
        tickets: Vec<Ticket>,
    },
    Failed {
        message: String,
    },
    /// Gave up after the configured number of checks.
    TimedOut,
    /// The API rejected the session mid-poll.
    SignedOut,
    /// Polling stopped without an outcome: the watch was cancelled or the
    /// poll task ended unexpectedly.
    Cancelled,
}

impl PaymentProgress {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PaymentService {
    api: ApiClient,
    poll_interval: Duration,
    poll_attempts: u32,
}

#[derive(Serialize)]
struct VerifyRequest {
    payment_method: PaymentMethod,
}

impl PaymentService {
    /// A zero `poll_interval` is raised to [`MIN_POLL_INTERVAL`].
    #[must_use]
    pub fn new(api: ApiClient, poll_interval: Duration, poll_attempts: u32) -> Self {
        Self {
            api,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            poll_attempts,
        }
    }

    /// # Errors
    ///
    /// Propagates errors from [`ApiClient`].
    pub async fn create(&self, request: &PaymentRequest) -> Result<Payment, Error> {
        tracing::info!(
            event_id = %request.event_id,
            method = %request.payment_method,
            amount = request.amount,
            "Creating payment"
        );
        self.api.post_json("create payment", "/payments", request).await
    }

    /// Ask the API for the payment's current state.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ApiClient`].
    pub async fn verify(
        &self,
        reference: &PaymentReference,
        method: PaymentMethod,
    ) -> Result<PaymentVerification, Error> {
        let path = format!("/payments/verify/{}", urlencoding::encode(&reference.0));
        self.api
            .post_json(
                "verify payment",
                &path,
                &VerifyRequest {
                    payment_method: method,
                },
            )
            .await
    }

    /// Poll [`verify`](Self::verify) in the background until the payment
    /// settles.
    ///
    /// The first check happens one interval after the call. Success navigates
    /// to the payment-success view and failure to the payment-failed view.
    /// Dropping the returned [`PaymentWatch`] stops the loop.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn watch(&self, reference: PaymentReference, method: PaymentMethod) -> PaymentWatch {
        let (tx, rx) = watch::channel(PaymentProgress::Pending {
            attempts: 0,
            last_error: None,
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll(self.clone(), reference, method, tx, cancel.clone()));
        PaymentWatch {
            progress: rx,
            cancel,
            task,
        }
    }
}

async fn poll(
    service: PaymentService,
    reference: PaymentReference,
    method: PaymentMethod,
    tx: watch::Sender<PaymentProgress>,
    cancel: CancellationToken,
) {
    let period = service.poll_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut attempts = 0;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        attempts += 1;
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = service.verify(&reference, method) => result,
        };
        if cancel.is_cancelled() {
            break;
        }

        let last_error = match result {
            Ok(verification) => match verification.status {
                VerificationStatus::Success => {
                    tracing::info!(reference = %reference, attempts, "Payment succeeded");
                    tx.send_replace(PaymentProgress::Succeeded {
                        tickets: verification.tickets,
                    });
                    navigate(&service, Route::PaymentSuccess);
                    return;
                }
                VerificationStatus::Failed => {
                    tracing::warn!(reference = %reference, message = %verification.message, "Payment failed");
                    tx.send_replace(PaymentProgress::Failed {
                        message: verification.message,
                    });
                    navigate(&service, Route::PaymentFailed);
                    return;
                }
                VerificationStatus::Pending => None,
            },
            Err(Error::Unauthorized { .. }) => {
                tx.send_replace(PaymentProgress::SignedOut);
                return;
            }
            Err(e) => {
                tracing::warn!(reference = %reference, attempts, error = %e, "Payment check failed");
                Some(e.user_message())
            }
        };

        if attempts >= service.poll_attempts {
            tracing::warn!(reference = %reference, attempts, "Gave up waiting for payment");
            tx.send_replace(PaymentProgress::TimedOut);
            return;
        }
        tx.send_replace(PaymentProgress::Pending {
            attempts,
            last_error,
        });
    }

    tracing::debug!(reference = %reference, attempts, "Payment polling cancelled");
    tx.send_replace(PaymentProgress::Cancelled);
}

fn navigate(service: &PaymentService, route: Route) {
    service
        .api
        .navigator()
        .navigate(Navigation::to(route.path()).replace());
}

/// Handle on a background payment poll. Dropping it cancels the poll.
#[derive(Debug)]
pub struct PaymentWatch {
    progress: watch::Receiver<PaymentProgress>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PaymentWatch {
    /// Latest published progress.
    #[must_use]
    pub fn progress(&self) -> PaymentProgress {
        self.progress.borrow().clone()
    }

    /// A receiver for views that render every update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PaymentProgress> {
        self.progress.clone()
    }

    /// Stop polling. No check starts and nothing navigates afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the payment reaches a terminal state.
    ///
    /// If the poll task ends without publishing one, this returns
    /// [`PaymentProgress::Cancelled`].
    pub async fn settled(&mut self) -> PaymentProgress {
        loop {
            let progress = self.progress.borrow_and_update().clone();
            if progress.is_terminal() {
                return progress;
            }
            if self.progress.changed().await.is_err() {
                let last = self.progress.borrow().clone();
                if last.is_terminal() {
                    return last;
                }
                tracing::warn!("Payment poll ended without an outcome");
                return PaymentProgress::Cancelled;
            }
        }
    }
}

impl Drop for PaymentWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ClientConfig;
    use crate::navigation::Navigator;
    use crate::session::{MemorySessionStore, SessionContext};

    #[test]
    fn verification_status_is_lenient() {
        let v: PaymentVerification =
            serde_json::from_str(r#"{"status":"PAID","message":"ok"}"#).unwrap();
        assert_eq!(v.status, VerificationStatus::Success);
        assert!(v.tickets.is_empty());

        let v: PaymentVerification = serde_json::from_str(r#"{"status":"abandoned"}"#).unwrap();
        assert_eq!(v.status, VerificationStatus::Failed);

        let v: PaymentVerification = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(v.status, VerificationStatus::Pending);
    }

    #[test]
    fn payment_reference_falls_back_to_id() {
        let payment: Payment = serde_json::from_str(
            r#"{"id":"p1","status":"pending","paystack_reference":"ref_123","paystack_authorization_url":"https://checkout.paystack.com/x"}"#,
        )
        .unwrap();
        assert_eq!(payment.reference(), Some(PaymentReference("ref_123".into())));

        let bare: Payment = serde_json::from_str(r#"{"_id":"p2"}"#).unwrap();
        assert_eq!(bare.reference(), Some(PaymentReference("p2".into())));

        let empty: Payment = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.reference(), None);
    }

    #[test]
    fn method_wire_names() {
        assert_eq!(serde_json::to_value(PaymentMethod::Mpesa).unwrap(), "mpesa");
        assert_eq!(
            serde_json::from_str::<PaymentMethod>(r#""paypal""#).unwrap(),
            PaymentMethod::Paypal
        );
    }

    #[tokio::test]
    async fn settled_is_terminal_when_poll_task_vanishes() {
        let (tx, progress) = watch::channel(PaymentProgress::Pending {
            attempts: 2,
            last_error: None,
        });
        let mut watch = PaymentWatch {
            progress,
            cancel: CancellationToken::new(),
            task: tokio::spawn(async move { drop(tx) }),
        };
        assert_eq!(watch.settled().await, PaymentProgress::Cancelled);
    }

    #[tokio::test]
    async fn settled_keeps_outcome_published_before_close() {
        let (tx, progress) = watch::channel(PaymentProgress::Pending {
            attempts: 0,
            last_error: None,
        });
        let mut watch = PaymentWatch {
            progress,
            cancel: CancellationToken::new(),
            task: tokio::spawn(async move {
                tx.send_replace(PaymentProgress::TimedOut);
            }),
        };
        assert_eq!(watch.settled().await, PaymentProgress::TimedOut);
    }

    #[test]
    fn zero_poll_interval_is_raised() {
        let session = Arc::new(SessionContext::init(MemorySessionStore::new()));
        let navigator: Arc<dyn Navigator> = Arc::new(|_: Navigation| {});
        let api = ApiClient::new(&ClientConfig::default(), session, navigator).unwrap();
        let service = PaymentService::new(api, Duration::ZERO, 3);
        assert_eq!(service.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(
            !PaymentProgress::Pending {
                attempts: 1,
                last_error: None
            }
            .is_terminal()
        );
        assert!(PaymentProgress::TimedOut.is_terminal());
        assert!(PaymentProgress::Cancelled.is_terminal());
    }
}
