//! The conversation engine.
//!
//! One engine instance serves one transport. Dispatch is
//! load-state → handle → persist-state:
//!
//! 1. The current [`ConversationState`] is loaded from the state store
//!    (absent, unrecognized, or an explicit `/start` reset all mean
//!    [`Start`]).
//! 2. An exhaustive `match` on the state selects the handler; every state
//!    has exactly one.
//! 3. The handler runs its side effects against the commerce, location,
//!    and transport seams and returns the next state.
//! 4. The next state is persisted unconditionally, overwriting any
//!    concurrent write.
//!
//! A failing handler aborts the dispatch *before* step 4, so the
//! conversation stays parked where it was and the user's next message
//! retries from a consistent point. Handlers are idempotent under
//! redelivery: re-adding the same product, re-requesting the same page,
//! and re-sending the same invoice are all safe.
//!
//! [`Start`]: ConversationState::Start

mod handlers;
pub mod transport;
pub mod views;

pub use transport::{ChatTransport, TransportError};

use std::time::Duration;

use pronto_core::event::InboundEvent;
use pronto_core::pricing::TierTable;
use pronto_core::state::ConversationState;

use crate::commerce::Commerce;
use crate::error::EngineError;
use crate::geo::Locations;
use crate::store::StateStore;

/// Tunables that shape every conversation.
#[derive(Debug, Clone)]
pub struct EnginePolicy {
    /// Delivery pricing tiers.
    pub tiers: TierTable,
    /// Products per menu page.
    pub page_size: usize,
    /// Fixed invoice payload; prechecks carrying anything else are
    /// declined.
    pub order_payload: String,
    /// ISO 4217 currency for invoices and price labels.
    pub currency: String,
    /// Delay before the post-payment follow-up message.
    pub confirmation_delay: Duration,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            tiers: TierTable::default(),
            page_size: 8,
            order_payload: "pizza-order".to_owned(),
            currency: "RUB".to_owned(),
            confirmation_delay: Duration::from_secs(3_600),
        }
    }
}

/// The per-user conversation state machine.
///
/// Owns its collaborators outright; construct one per transport and share
/// the underlying clients by cloning them (they are `Arc`-backed handles).
pub struct Engine<C, L, S, T> {
    commerce: C,
    locations: L,
    store: S,
    transport: T,
    policy: EnginePolicy,
}

impl<C, L, S, T> Engine<C, L, S, T>
where
    C: Commerce,
    L: Locations,
    S: StateStore,
    T: ChatTransport + Clone + Send + Sync + 'static,
{
    pub const fn new(
        commerce: C,
        locations: L,
        store: S,
        transport: T,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            commerce,
            locations,
            store,
            transport,
            policy,
        }
    }

    /// Dispatch one inbound event for one user.
    ///
    /// Returns the state that was persisted.
    ///
    /// # Errors
    ///
    /// Any collaborator failure aborts the dispatch with the stored state
    /// unchanged; see [`EngineError::is_transient`] for retry semantics.
    pub async fn handle_event(
        &self,
        user_key: &str,
        event: InboundEvent,
    ) -> Result<ConversationState, EngineError> {
        let current = self.load_state(user_key, &event).await?;

        let next = match current {
            ConversationState::Start | ConversationState::Finish => {
                self.show_menu(user_key, 0, None).await?
            }
            ConversationState::Menu => self.handle_menu(user_key, event).await?,
            ConversationState::ProductDetail => {
                self.handle_product_detail(user_key, event).await?
            }
            ConversationState::Cart => self.handle_cart(user_key, event).await?,
            ConversationState::LocationRequest => {
                self.handle_location_request(user_key, event).await?
            }
            ConversationState::DeliveryOptions => {
                self.handle_delivery_options(user_key, event).await?
            }
            ConversationState::WaitingPayment => {
                self.handle_waiting_payment(user_key, event).await?
            }
        };

        self.store.set(user_key, next.as_str()).await?;
        tracing::info!(user = %user_key, from = %current, to = %next, "dispatched");
        Ok(next)
    }

    async fn load_state(
        &self,
        user_key: &str,
        event: &InboundEvent,
    ) -> Result<ConversationState, EngineError> {
        if let InboundEvent::TextMessage(text) = event
            && text.trim() == "/start"
        {
            return Ok(ConversationState::Start);
        }

        let state = match self.store.get(user_key).await? {
            None => ConversationState::Start,
            Some(label) => ConversationState::from_label(&label).unwrap_or_else(|| {
                tracing::warn!(user = %user_key, label = %label, "unknown stored state, resetting");
                ConversationState::Start
            }),
        };
        Ok(state)
    }
}
