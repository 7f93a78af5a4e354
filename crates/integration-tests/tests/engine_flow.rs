//! End-to-end conversation scenarios against in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use pronto_bot::engine::{Engine, EnginePolicy};
use pronto_bot::store::InMemoryStateStore;
use pronto_core::event::{CallbackPayload, InboundEvent};
use pronto_core::location::Coordinate;
use pronto_core::state::ConversationState;

use pronto_integration_tests::{FakeCommerce, FakeLocations, Outbound, RecordingTransport};

const USER: &str = "telegram:42";

/// A pizzeria at the Kremlin and a geocode table where "123 Main St" is
/// roughly 2 km north of it (0.018 degrees of latitude).
const SITE_LON: f64 = 37.62;
const SITE_LAT: f64 = 55.75;
const CUSTOMER_LON: f64 = 37.62;
const CUSTOMER_LAT: f64 = 55.768;

struct Harness {
    engine: Engine<FakeCommerce, FakeLocations, InMemoryStateStore, RecordingTransport>,
    commerce: FakeCommerce,
    locations: FakeLocations,
    store: InMemoryStateStore,
    transport: RecordingTransport,
}

fn harness() -> Harness {
    let commerce = FakeCommerce::with_products(vec![
        FakeCommerce::product("P1", "Margherita", 40_000),
        FakeCommerce::product("P2", "Pepperoni", 45_000),
    ]);
    let locations =
        FakeLocations::with_sites(vec![FakeLocations::site("pz-1", SITE_LON, SITE_LAT, "900")]);
    locations.add_geocode("123 Main St", Coordinate::new(CUSTOMER_LON, CUSTOMER_LAT));

    let store = InMemoryStateStore::new();
    let transport = RecordingTransport::new();

    let engine = Engine::new(
        commerce.clone(),
        locations.clone(),
        store.clone(),
        transport.clone(),
        EnginePolicy {
            confirmation_delay: Duration::from_millis(10),
            ..EnginePolicy::default()
        },
    );

    Harness {
        engine,
        commerce,
        locations,
        store,
        transport,
    }
}

fn text(body: &str) -> InboundEvent {
    InboundEvent::TextMessage(body.to_owned())
}

fn postback(payload: CallbackPayload) -> InboundEvent {
    InboundEvent::Postback(payload)
}

/// Drive a fresh conversation to the delivery-options screen.
async fn drive_to_delivery_options(h: &Harness) {
    h.engine.handle_event(USER, text("/start")).await.expect("start");
    h.engine
        .handle_event(USER, InboundEvent::MenuSelection("P1".to_owned()))
        .await
        .expect("select product");
    h.engine
        .handle_event(USER, postback(CallbackPayload::AddToCart("P1".to_owned())))
        .await
        .expect("add to cart");
    h.engine
        .handle_event(USER, postback(CallbackPayload::Cart))
        .await
        .expect("open cart");
    h.engine
        .handle_event(USER, postback(CallbackPayload::Checkout))
        .await
        .expect("checkout");
    h.engine
        .handle_event(USER, text("123 Main St"))
        .await
        .expect("address");
}

#[tokio::test]
async fn test_full_browsing_and_pickup_scenario() {
    let h = harness();

    // /start renders menu page 0 and lands in MENU.
    let state = h.engine.handle_event(USER, text("/start")).await.expect("start");
    assert_eq!(state, ConversationState::Menu);
    assert_eq!(h.store.peek(USER).as_deref(), Some("MENU"));
    assert!(matches!(
        h.transport.last(),
        Some(Outbound::Menu { page_start: 0, .. })
    ));

    // Selecting P1 renders its card and moves to PRODUCT_DETAIL.
    let state = h
        .engine
        .handle_event(USER, InboundEvent::MenuSelection("P1".to_owned()))
        .await
        .expect("select product");
    assert_eq!(state, ConversationState::ProductDetail);
    assert_eq!(
        h.transport.last(),
        Some(Outbound::ProductCard {
            to: USER.to_owned(),
            product_id: "P1".to_owned()
        })
    );

    // Add to cart: one line appears, state stays put, an ack goes out.
    let state = h
        .engine
        .handle_event(USER, postback(CallbackPayload::AddToCart("P1".to_owned())))
        .await
        .expect("add to cart");
    assert_eq!(state, ConversationState::ProductDetail);
    let lines = h.commerce.cart_lines(USER);
    assert_eq!(lines.len(), 1);
    let line = lines.first().expect("one line");
    assert_eq!(line.product_id.as_deref(), Some("P1"));
    assert!(matches!(h.transport.last(), Some(Outbound::Toast { .. })));

    // Open the cart: the text carries the product line and a total.
    let state = h
        .engine
        .handle_event(USER, postback(CallbackPayload::Cart))
        .await
        .expect("open cart");
    assert_eq!(state, ConversationState::Cart);
    let Some(Outbound::Cart { text: Some(cart_text), .. }) = h.transport.last() else {
        panic!("expected a rendered cart, got {:?}", h.transport.last());
    };
    assert!(cart_text.contains("Margherita"));
    assert!(cart_text.contains("Total due"));

    // Checkout asks for a location.
    let state = h
        .engine
        .handle_event(USER, postback(CallbackPayload::Checkout))
        .await
        .expect("checkout");
    assert_eq!(state, ConversationState::LocationRequest);

    // The address resolves 2 km out: middle tier, price 100.
    let state = h
        .engine
        .handle_event(USER, text("123 Main St"))
        .await
        .expect("address");
    assert_eq!(state, ConversationState::DeliveryOptions);
    assert_eq!(
        h.transport.last(),
        Some(Outbound::DeliveryOptions {
            to: USER.to_owned(),
            nearest_id: "pz-1".to_owned(),
            price_minor: Some(100),
        })
    );

    // Pickup finishes the conversation without touching the cart.
    let state = h
        .engine
        .handle_event(USER, postback(CallbackPayload::Pickup("pz-1".to_owned())))
        .await
        .expect("pickup");
    assert_eq!(state, ConversationState::Finish);
    assert!(
        h.commerce
            .cart_lines(USER)
            .iter()
            .all(|line| !line.is_delivery()),
        "pickup must not add a delivery line"
    );

    // Anything from FINISH restarts browsing.
    let state = h
        .engine
        .handle_event(USER, text("hi again"))
        .await
        .expect("restart");
    assert_eq!(state, ConversationState::Menu);
}

#[tokio::test]
async fn test_delivery_payment_and_courier_handoff() {
    let h = harness();
    drive_to_delivery_options(&h).await;

    let choose_delivery = postback(CallbackPayload::Delivery {
        price_minor: 100,
        longitude: CUSTOMER_LON,
        latitude: CUSTOMER_LAT,
    });

    // Choosing delivery records the location, adds the delivery line, and
    // prompts for payment.
    let state = h
        .engine
        .handle_event(USER, choose_delivery.clone())
        .await
        .expect("choose delivery");
    assert_eq!(state, ConversationState::WaitingPayment);
    assert_eq!(h.locations.records().len(), 1);
    let delivery_lines = h
        .commerce
        .cart_lines(USER)
        .iter()
        .filter(|line| line.is_delivery())
        .count();
    assert_eq!(delivery_lines, 1);
    assert!(matches!(
        h.transport.last(),
        Some(Outbound::PaymentPrompt { .. })
    ));

    // Redelivered button press: still exactly one delivery line.
    h.engine
        .handle_event(USER, choose_delivery)
        .await
        .expect("redelivered choice");
    let delivery_lines = h
        .commerce
        .cart_lines(USER)
        .iter()
        .filter(|line| line.is_delivery())
        .count();
    assert_eq!(delivery_lines, 1, "delivery line must not duplicate");

    // Pay renders an invoice with the product and delivery lines.
    h.engine
        .handle_event(USER, postback(CallbackPayload::Pay))
        .await
        .expect("request invoice");
    let Some(Outbound::Invoice { payload, lines, .. }) = h.transport.last() else {
        panic!("expected an invoice, got {:?}", h.transport.last());
    };
    assert_eq!(payload, "pizza-order");
    assert_eq!(
        lines,
        vec![
            ("Margherita, 1 pcs".to_owned(), 40_000),
            ("Delivery".to_owned(), 100),
        ]
    );

    // A matching precheck is approved and keeps the state.
    let state = h
        .engine
        .handle_event(
            USER,
            InboundEvent::PaymentPrecheck {
                query_id: "pq-1".to_owned(),
                payload: "pizza-order".to_owned(),
            },
        )
        .await
        .expect("valid precheck");
    assert_eq!(state, ConversationState::WaitingPayment);
    assert_eq!(
        h.transport.last(),
        Some(Outbound::PrecheckAnswer {
            query_id: "pq-1".to_owned(),
            approved: true
        })
    );

    // Payment completion notifies the courier with the cart and the
    // customer's coordinates, confirms to the user, and finishes.
    let state = h
        .engine
        .handle_event(USER, InboundEvent::PaymentCompleted)
        .await
        .expect("payment completed");
    assert_eq!(state, ConversationState::Finish);

    let outbound = h.transport.outbound();
    assert!(outbound.iter().any(|out| matches!(
        out,
        Outbound::Text { to, text } if to == "900" && text.contains("ORDER PAID")
    )));
    assert!(outbound.iter().any(|out| matches!(
        out,
        Outbound::MapPoint { to, .. } if to == "900"
    )));
    assert!(outbound.iter().any(|out| matches!(
        out,
        Outbound::Text { to, text } if to == USER && text.contains("received your payment")
    )));

    // The delayed follow-up fires after the configured delay.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.transport.outbound().iter().any(|out| matches!(
        out,
        Outbound::Text { to, text } if to == USER && text.contains("Enjoy your pizza")
    )));
}

#[tokio::test]
async fn test_precheck_payload_mismatch_declines_without_state_change() {
    let h = harness();
    drive_to_delivery_options(&h).await;
    h.engine
        .handle_event(
            USER,
            postback(CallbackPayload::Delivery {
                price_minor: 100,
                longitude: CUSTOMER_LON,
                latitude: CUSTOMER_LAT,
            }),
        )
        .await
        .expect("choose delivery");

    let result = h
        .engine
        .handle_event(
            USER,
            InboundEvent::PaymentPrecheck {
                query_id: "pq-9".to_owned(),
                payload: "some-other-order".to_owned(),
            },
        )
        .await;

    assert!(result.is_err(), "mismatched payload must be rejected");
    assert_eq!(
        h.transport.last(),
        Some(Outbound::PrecheckAnswer {
            query_id: "pq-9".to_owned(),
            approved: false
        })
    );
    assert_eq!(
        h.store.peek(USER).as_deref(),
        Some("WAITING_PAYMENT"),
        "a declined precheck must not move the conversation"
    );
}

#[tokio::test]
async fn test_unknown_stored_state_is_treated_as_start() {
    let h = harness();
    // A label left over from some previous incarnation of the bot.
    h.store.preload(USER, "HANDLE_MENU");

    let state = h.engine.handle_event(USER, text("hello")).await.expect("dispatch");
    assert_eq!(state, ConversationState::Menu);
    assert!(matches!(h.transport.last(), Some(Outbound::Menu { .. })));
}

#[tokio::test]
async fn test_failed_dispatch_leaves_state_unchanged() {
    let h = harness();
    h.engine.handle_event(USER, text("/start")).await.expect("start");
    assert_eq!(h.store.peek(USER).as_deref(), Some("MENU"));

    h.commerce.set_fail_cart_reads(true);
    let result = h
        .engine
        .handle_event(USER, postback(CallbackPayload::Cart))
        .await;
    assert!(result.is_err());
    assert_eq!(
        h.store.peek(USER).as_deref(),
        Some("MENU"),
        "a failed handler must not move the conversation"
    );

    // Once the outage clears, the same event succeeds from the same state.
    h.commerce.set_fail_cart_reads(false);
    let state = h
        .engine
        .handle_event(USER, postback(CallbackPayload::Cart))
        .await
        .expect("retry");
    assert_eq!(state, ConversationState::Cart);
}

#[tokio::test]
async fn test_unresolvable_address_reprompts_in_place() {
    let h = harness();
    drive_to_delivery_options(&h).await;

    // Back up: change address, then send something the geocoder rejects.
    h.engine
        .handle_event(USER, postback(CallbackPayload::ChangeAddress))
        .await
        .expect("change address");
    let state = h
        .engine
        .handle_event(USER, text("gibberish nowhere"))
        .await
        .expect("unresolvable address");
    assert_eq!(state, ConversationState::LocationRequest);
    assert!(matches!(
        h.transport.last(),
        Some(Outbound::Text { text, .. }) if text.contains("address")
    ));
}

#[tokio::test]
async fn test_shared_location_skips_the_geocoder() {
    let h = harness();
    drive_to_delivery_options(&h).await;
    h.engine
        .handle_event(USER, postback(CallbackPayload::ChangeAddress))
        .await
        .expect("change address");

    let state = h
        .engine
        .handle_event(
            USER,
            InboundEvent::LocationShared {
                longitude: SITE_LON,
                latitude: SITE_LAT,
            },
        )
        .await
        .expect("shared location");
    assert_eq!(state, ConversationState::DeliveryOptions);
    // Standing at the pizzeria door: free tier.
    assert!(matches!(
        h.transport.last(),
        Some(Outbound::DeliveryOptions { price_minor: Some(0), .. })
    ));
}

#[tokio::test]
async fn test_menu_pagination_windows() {
    let commerce = FakeCommerce::with_products(
        (0..12)
            .map(|i| FakeCommerce::product(&format!("P{i}"), &format!("Pizza {i}"), 40_000))
            .collect(),
    );
    let locations = FakeLocations::default();
    let store = InMemoryStateStore::new();
    let transport = RecordingTransport::new();
    let engine = Arc::new(Engine::new(
        commerce,
        locations,
        store,
        transport.clone(),
        EnginePolicy::default(),
    ));

    engine.handle_event(USER, text("/start")).await.expect("start");
    let Some(Outbound::Menu { product_ids, .. }) = transport.last() else {
        panic!("expected a menu");
    };
    assert_eq!(product_ids.len(), 8, "first page carries one window");

    engine
        .handle_event(USER, postback(CallbackPayload::Page { start: 8 }))
        .await
        .expect("page forward");
    let Some(Outbound::Menu { page_start, product_ids, .. }) = transport.last() else {
        panic!("expected a menu");
    };
    assert_eq!(page_start, 8);
    assert_eq!(product_ids.len(), 4, "last page carries the remainder");
}
