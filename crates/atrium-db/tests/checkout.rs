//! End-to-end checkout workflow tests.
//!
//! These exercise the engine the way the web layer drives it: seed a
//! catalog, fill carts, create orders, move them through the state
//! machine, and feed verified payment webhooks back in.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use atrium_core::{
    CartIdentity, CoreError, OrderStatus, PaymentMethod, Product, ProductVariant, ShippingInfo,
    SkuRef,
};
use atrium_db::{Database, DbConfig, NotifyError, OrderNotifier, StoreError};
use atrium_pay::{CardGateway, GatewayConfig, PaymentGateway};

// =============================================================================
// Fixtures
// =============================================================================

const SHIRT_PRICE: i64 = 1999;
const STICKER_PRICE: i64 = 549;

struct Fixture {
    db: Database,
    shirt_id: String,
    shirt_xl_id: String,
    sticker_id: String,
}

impl Fixture {
    fn shirt_sku(&self) -> SkuRef {
        SkuRef::Product(self.shirt_id.clone())
    }

    fn sticker_sku(&self) -> SkuRef {
        SkuRef::Product(self.sticker_id.clone())
    }
}

/// Catalog: a $19.99 shirt (with an XL variant at +$3.00) and a $5.49
/// sticker. Stock starts at shirt 20 / XL 10 / sticker 20.
async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::ephemeral()).await.unwrap();
    let now = Utc::now();

    let shirt = Product {
        id: "p-shirt".to_string(),
        sku: "TEE-LOGO".to_string(),
        name: "Logo Tee".to_string(),
        description: Some("Soft cotton tee".to_string()),
        price_cents: SHIRT_PRICE,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let sticker = Product {
        id: "p-sticker".to_string(),
        sku: "STICKER-DIE".to_string(),
        name: "Die-cut Sticker".to_string(),
        description: None,
        price_cents: STICKER_PRICE,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert_product(&shirt).await.unwrap();
    db.products().insert_product(&sticker).await.unwrap();

    let shirt_xl = ProductVariant {
        id: "v-shirt-xl".to_string(),
        product_id: shirt.id.clone(),
        name: "XL".to_string(),
        price_adjustment_cents: 300,
        is_available: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert_variant(&shirt_xl).await.unwrap();

    let stock = db.stock();
    stock
        .set_quantity(&SkuRef::Product(shirt.id.clone()), 20)
        .await
        .unwrap();
    stock
        .set_quantity(&SkuRef::Variant(shirt_xl.id.clone()), 10)
        .await
        .unwrap();
    stock
        .set_quantity(&SkuRef::Product(sticker.id.clone()), 20)
        .await
        .unwrap();

    Fixture {
        db,
        shirt_id: shirt.id,
        shirt_xl_id: shirt_xl.id,
        sticker_id: sticker.id,
    }
}

fn shipping_to(country: &str) -> ShippingInfo {
    ShippingInfo {
        name: "Grace Hopper".to_string(),
        address: "1 Compiler Way".to_string(),
        city: "Arlington".to_string(),
        postal_code: "22201".to_string(),
        country: country.to_string(),
        phone: Some("+1 555 0100".to_string()),
    }
}

/// Cart for `user` containing 2 shirts and 3 stickers.
async fn filled_cart(f: &Fixture, user: &str) -> String {
    let carts = f.db.carts();
    let cart = carts
        .get_or_create(&CartIdentity::User(user.to_string()))
        .await
        .unwrap();
    carts.add_line(&cart.id, &f.shirt_id, None, 2).await.unwrap();
    carts.add_line(&cart.id, &f.sticker_id, None, 3).await.unwrap();
    cart.id
}

fn domain(err: &StoreError) -> &CoreError {
    err.as_domain().expect("expected a domain error")
}

// =============================================================================
// Recording notifier
// =============================================================================

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, kind: &str, order_number: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{kind}:{order_number}"));
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn confirmation_sent(
        &self,
        order: &atrium_core::Order,
    ) -> Result<(), NotifyError> {
        self.push("confirmation", &order.order_number);
        Ok(())
    }

    async fn shipping_notification_sent(
        &self,
        order: &atrium_core::Order,
    ) -> Result<(), NotifyError> {
        self.push("shipping", &order.order_number);
        Ok(())
    }

    async fn delivery_confirmation_sent(
        &self,
        order: &atrium_core::Order,
    ) -> Result<(), NotifyError> {
        self.push("delivery", &order.order_number);
        Ok(())
    }
}

/// A notifier whose deliveries always fail.
struct BrokenNotifier;

#[async_trait]
impl OrderNotifier for BrokenNotifier {
    async fn confirmation_sent(&self, _: &atrium_core::Order) -> Result<(), NotifyError> {
        Err(NotifyError("smtp down".to_string()))
    }

    async fn shipping_notification_sent(&self, _: &atrium_core::Order) -> Result<(), NotifyError> {
        Err(NotifyError("smtp down".to_string()))
    }

    async fn delivery_confirmation_sent(&self, _: &atrium_core::Order) -> Result<(), NotifyError> {
        Err(NotifyError("smtp down".to_string()))
    }
}

// =============================================================================
// Order creation
// =============================================================================

#[tokio::test]
async fn create_produces_consistent_totals_and_snapshots() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;

    let order = f
        .db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    // Totals: subtotal 2×$19.99 + 3×$5.49 = $56.45; domestic shipping
    // $5.99; tax 8.25% of $56.45 = $4.657 → $4.66.
    assert_eq!(order.subtotal_cents, 2 * SHIRT_PRICE + 3 * STICKER_PRICE);
    assert_eq!(order.shipping_cents, 599);
    assert_eq!(order.tax_cents, 466);
    assert_eq!(
        order.total_cents,
        order.subtotal_cents + order.shipping_cents + order.tax_cents
    );
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.paid_at.is_none());

    // Stock was reserved.
    let stock = f.db.stock();
    assert_eq!(stock.quantity_on_hand(&f.shirt_sku()).await.unwrap(), 18);
    assert_eq!(stock.quantity_on_hand(&f.sticker_sku()).await.unwrap(), 17);

    // The cart was destroyed inside the same transaction.
    assert!(f.db.carts().get(&cart_id).await.unwrap().is_none());

    // Snapshot lines carry names and prices.
    let lines = f.db.orders().lines(&order.id).await.unwrap();
    assert_eq!(lines.len(), 2);
    let shirt_line = lines.iter().find(|l| l.product_id == f.shirt_id).unwrap();
    assert_eq!(shirt_line.product_name, "Logo Tee");
    assert_eq!(shirt_line.unit_price_cents, SHIRT_PRICE);
    assert_eq!(shirt_line.quantity, 2);
    assert_eq!(shirt_line.line_total_cents, 2 * SHIRT_PRICE);
}

#[tokio::test]
async fn order_total_holds_for_every_shipping_zone() {
    let f = fixture().await;

    for (user, country, expected_shipping) in [
        ("zone-us", "US", 599),
        ("zone-ca", "CA", 1499),
        ("zone-jp", "JP", 2999),
    ] {
        let cart_id = filled_cart(&f, user).await;
        let order = f
            .db
            .orders()
            .create(
                user,
                &cart_id,
                &shipping_to(country),
                PaymentMethod::Card,
                None,
            )
            .await
            .unwrap();

        assert_eq!(order.shipping_cents, expected_shipping);
        assert_eq!(
            order.total_cents,
            order.subtotal_cents + order.shipping_cents + order.tax_cents
        );
    }
}

#[tokio::test]
async fn snapshots_survive_catalog_edits() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;

    let order = f
        .db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    // The catalog changes after purchase...
    sqlx::query("UPDATE products SET name = 'Renamed Tee', price_cents = 9999 WHERE id = ?1")
        .bind(&f.shirt_id)
        .execute(f.db.pool())
        .await
        .unwrap();

    // ...but the order line still shows what was bought.
    let lines = f.db.orders().lines(&order.id).await.unwrap();
    let shirt_line = lines.iter().find(|l| l.product_id == f.shirt_id).unwrap();
    assert_eq!(shirt_line.product_name, "Logo Tee");
    assert_eq!(shirt_line.unit_price_cents, SHIRT_PRICE);
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let f = fixture().await;
    let cart = f
        .db
        .carts()
        .get_or_create(&CartIdentity::User("empty".to_string()))
        .await
        .unwrap();

    let err = f
        .db
        .orders()
        .create(
            "empty",
            &cart.id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(domain(&err), CoreError::EmptyCart));
}

#[tokio::test]
async fn missing_shipping_field_is_rejected_before_any_reservation() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;

    let mut shipping = shipping_to("US");
    shipping.postal_code = String::new();

    let err = f
        .db
        .orders()
        .create("grace", &cart_id, &shipping, PaymentMethod::Card, None)
        .await
        .unwrap_err();

    assert!(matches!(
        domain(&err),
        CoreError::InvalidShipping { field } if field == "postal_code"
    ));

    // Nothing moved.
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.shirt_sku()).await.unwrap(),
        20
    );
    assert_eq!(f.db.carts().lines(&cart_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_reservation_rolls_back_everything() {
    let f = fixture().await;

    // Shirt has stock, sticker has none: the sticker reservation fails
    // after the shirt reservation succeeded.
    f.db.stock().set_quantity(&f.shirt_sku(), 5).await.unwrap();
    f.db.stock().set_quantity(&f.sticker_sku(), 0).await.unwrap();

    let carts = f.db.carts();
    let cart = carts
        .get_or_create(&CartIdentity::User("rollback".to_string()))
        .await
        .unwrap();
    carts.add_line(&cart.id, &f.shirt_id, None, 2).await.unwrap();
    // The sticker line is inserted directly: add_line would already
    // refuse it, and the property under test is the creation rollback.
    sqlx::query(
        "INSERT INTO cart_lines (id, cart_id, product_id, variant_id, quantity, created_at, updated_at)
         VALUES ('l-sticker', ?1, ?2, NULL, 1, ?3, ?3)",
    )
    .bind(&cart.id)
    .bind(&f.sticker_id)
    .bind(Utc::now())
    .execute(f.db.pool())
    .await
    .unwrap();

    let err = f
        .db
        .orders()
        .create(
            "rollback",
            &cart.id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap_err();

    match domain(&err) {
        CoreError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(*available, 0);
            assert_eq!(*requested, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // The shirt reservation made earlier in the same attempt was undone.
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.shirt_sku()).await.unwrap(),
        5
    );
    // The cart is untouched.
    assert_eq!(carts.lines(&cart.id).await.unwrap().len(), 2);
    // No order row became visible.
    assert!(f.db.orders().get_for_user("rollback").await.unwrap().is_empty());
}

#[tokio::test]
async fn deactivated_product_fails_creation() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;

    // Deactivated between add-to-cart and checkout.
    f.db.products()
        .set_product_active(&f.shirt_id, false)
        .await
        .unwrap();

    let err = f
        .db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(domain(&err), CoreError::Unavailable { .. }));
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.sticker_sku()).await.unwrap(),
        20
    );
}

// =============================================================================
// Concurrency properties
// =============================================================================

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let f = fixture().await;
    f.db.stock().set_quantity(&f.shirt_sku(), 10).await.unwrap();

    // Four customers, each with 3 shirts in the cart: only three orders
    // fit into 10 units.
    let mut cart_ids = Vec::new();
    for i in 0..4 {
        let user = format!("buyer-{i}");
        let carts = f.db.carts();
        let cart = carts
            .get_or_create(&CartIdentity::User(user.clone()))
            .await
            .unwrap();
        carts.add_line(&cart.id, &f.shirt_id, None, 3).await.unwrap();
        cart_ids.push((user, cart.id));
    }

    let mut handles = Vec::new();
    for (user, cart_id) in cart_ids {
        let orders = f.db.orders();
        handles.push(tokio::spawn(async move {
            orders
                .create(
                    &user,
                    &cart_id,
                    &shipping_to("US"),
                    PaymentMethod::Card,
                    None,
                )
                .await
        }));
    }

    let mut successes = 0;
    let mut stock_failures = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(order) => {
                assert_eq!(
                    order.total_cents,
                    order.subtotal_cents + order.shipping_cents + order.tax_cents
                );
                successes += 1;
            }
            Err(err) => {
                assert!(matches!(domain(&err), CoreError::InsufficientStock { .. }));
                stock_failures += 1;
            }
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(stock_failures, 1);

    let remaining = f.db.stock().quantity_on_hand(&f.shirt_sku()).await.unwrap();
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn concurrent_order_numbers_are_distinct_and_well_formed() {
    let f = fixture().await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let user = format!("numbered-{i}");
        let cart_id = filled_cart(&f, &user).await;
        let orders = f.db.orders();
        handles.push(tokio::spawn(async move {
            orders
                .create(
                    &user,
                    &cart_id,
                    &shipping_to("US"),
                    PaymentMethod::Card,
                    None,
                )
                .await
                .unwrap()
                .order_number
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap());
    }

    let year = Utc::now().format("%Y").to_string();
    for number in &numbers {
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3, "bad format: {number}");
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], year);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    let mut deduped = numbers.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), numbers.len(), "duplicate order numbers: {numbers:?}");
}

// =============================================================================
// Status transitions
// =============================================================================

#[tokio::test]
async fn happy_path_transitions_with_tracking_and_notifications() {
    let f = fixture().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let db = f.db.clone().with_notifier(notifier.clone());

    let cart_id = filled_cart(&f, "grace").await;
    let order = db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let order = db
        .orders()
        .update_status(&order.id, OrderStatus::Processing, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert!(order.tracking_number.is_none());

    let order = db
        .orders()
        .update_status(&order.id, OrderStatus::Shipped, Some("TRACK-123"))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    assert_eq!(order.tracking_number.as_deref(), Some("TRACK-123"));

    let order = db
        .orders()
        .update_status(&order.id, OrderStatus::Delivered, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);

    let events = notifier.events();
    assert_eq!(
        events,
        vec![
            format!("confirmation:{}", order.order_number),
            format!("shipping:{}", order.order_number),
            format!("delivery:{}", order.order_number),
        ]
    );
}

#[tokio::test]
async fn tracking_number_ignored_outside_shipped_transition() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;
    let order = f
        .db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let order = f
        .db
        .orders()
        .update_status(&order.id, OrderStatus::Processing, Some("EARLY-TRACK"))
        .await
        .unwrap();
    assert!(order.tracking_number.is_none());
}

#[tokio::test]
async fn delivered_is_terminal_for_every_target() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;
    let orders = f.db.orders();

    let order = orders
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();
    orders
        .update_status(&order.id, OrderStatus::Processing, None)
        .await
        .unwrap();
    orders
        .update_status(&order.id, OrderStatus::Shipped, Some("T"))
        .await
        .unwrap();
    orders
        .update_status(&order.id, OrderStatus::Delivered, None)
        .await
        .unwrap();

    for target in [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ] {
        let err = orders
            .update_status(&order.id, target, None)
            .await
            .unwrap_err();
        assert!(matches!(
            domain(&err),
            CoreError::InvalidTransition {
                from: OrderStatus::Delivered,
                ..
            }
        ));
    }
}

#[tokio::test]
async fn skipping_states_is_rejected() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;
    let orders = f.db.orders();

    let order = orders
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let err = orders
        .update_status(&order.id, OrderStatus::Delivered, None)
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::InvalidTransition { .. }));
}

#[tokio::test]
async fn notification_failure_does_not_block_the_transition() {
    let f = fixture().await;
    let db = f.db.clone().with_notifier(Arc::new(BrokenNotifier));

    let cart_id = filled_cart(&f, "grace").await;
    let order = db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let order = db
        .orders()
        .update_status(&order.id, OrderStatus::Processing, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn cancel_restores_stock_exactly_once() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;
    let orders = f.db.orders();

    let order = orders
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.shirt_sku()).await.unwrap(),
        18
    );

    let cancelled = orders.cancel(&order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.shirt_sku()).await.unwrap(),
        20
    );
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.sticker_sku()).await.unwrap(),
        20
    );

    // Second cancel: rejected, and stock is NOT restored again.
    let err = orders.cancel(&order.id).await.unwrap_err();
    assert!(matches!(domain(&err), CoreError::AlreadyCancelled(_)));
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.shirt_sku()).await.unwrap(),
        20
    );
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;
    let orders = f.db.orders();

    let order = orders
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();
    orders
        .update_status(&order.id, OrderStatus::Processing, None)
        .await
        .unwrap();
    orders
        .update_status(&order.id, OrderStatus::Shipped, Some("T"))
        .await
        .unwrap();

    let err = orders.cancel(&order.id).await.unwrap_err();
    assert!(matches!(
        domain(&err),
        CoreError::AlreadyShippedOrDelivered(_)
    ));
    // Shipped goods stay sold.
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.shirt_sku()).await.unwrap(),
        18
    );
}

#[tokio::test]
async fn cancellation_window_expires() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;
    let orders = f.db.orders();

    let order = orders
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    // Age the order past the 24h window.
    let old = Utc::now() - Duration::hours(25);
    sqlx::query("UPDATE orders SET created_at = ?2 WHERE id = ?1")
        .bind(&order.id)
        .bind(old)
        .execute(f.db.pool())
        .await
        .unwrap();

    let err = orders.cancel(&order.id).await.unwrap_err();
    assert!(matches!(
        domain(&err),
        CoreError::CancellationWindowExpired { hours: 24, .. }
    ));
    assert_eq!(
        f.db.stock().quantity_on_hand(&f.shirt_sku()).await.unwrap(),
        18
    );
}

// =============================================================================
// Payment webhooks
// =============================================================================

#[tokio::test]
async fn mark_paid_advances_pending_and_is_idempotent() {
    let f = fixture().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let db = f.db.clone().with_notifier(notifier.clone());

    let cart_id = filled_cart(&f, "grace").await;
    let order = db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let paid = db.orders().mark_paid(&order.id, Some("pi_777")).await.unwrap();
    assert_eq!(paid.status, OrderStatus::Processing);
    assert_eq!(paid.payment_reference.as_deref(), Some("pi_777"));
    let first_paid_at = paid.paid_at.expect("paid_at set");

    // Providers redeliver; the replay changes nothing.
    let replay = db.orders().mark_paid(&order.id, Some("pi_777")).await.unwrap();
    assert_eq!(replay.status, OrderStatus::Processing);
    assert_eq!(replay.paid_at, Some(first_paid_at));

    assert_eq!(notifier.events().len(), 1);
}

#[tokio::test]
async fn verified_card_webhook_drives_the_order_to_processing() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;
    let order = f
        .db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let webhook_secret = "whsec_integration";
    let gateway = CardGateway::new(GatewayConfig::new(
        "https://cards.invalid",
        "sk_test",
        webhook_secret,
    ))
    .unwrap();

    // The provider reports settlement, echoing our order id back.
    let body = format!(
        r#"{{"type":"payment_intent.succeeded","data":{{"object":{{"id":"pi_900","metadata":{{"order_id":"{}"}}}}}}}}"#,
        order.id
    );
    let timestamp = Utc::now().timestamp();
    let mut message = timestamp.to_string().into_bytes();
    message.push(b'.');
    message.extend_from_slice(body.as_bytes());
    let signature = {
        use hmac::Mac;
        let mut mac =
            hmac::Hmac::<sha2::Sha256>::new_from_slice(webhook_secret.as_bytes()).unwrap();
        mac.update(&message);
        hex::encode(mac.finalize().into_bytes())
    };
    let header = format!("t={timestamp},v1={signature}");

    // verify → typed event → order mutation, exactly as the webhook
    // endpoint wires it.
    let event = gateway.verify_webhook(body.as_bytes(), &header).unwrap();
    assert!(event.kind.completes_payment());
    let order_id = event.order_id.clone().unwrap();

    let paid = f
        .db
        .orders()
        .mark_paid(&order_id, Some(&event.reference))
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Processing);
    assert!(paid.paid_at.is_some());
    assert_eq!(paid.payment_reference.as_deref(), Some("pi_900"));
}

#[tokio::test]
async fn forged_webhook_never_reaches_the_order() {
    let f = fixture().await;
    let cart_id = filled_cart(&f, "grace").await;
    let order = f
        .db
        .orders()
        .create(
            "grace",
            &cart_id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let gateway = CardGateway::new(GatewayConfig::new(
        "https://cards.invalid",
        "sk_test",
        "whsec_real",
    ))
    .unwrap();

    let body = format!(
        r#"{{"type":"payment_intent.succeeded","data":{{"object":{{"id":"pi_evil","metadata":{{"order_id":"{}"}}}}}}}}"#,
        order.id
    );
    // Signed with the WRONG secret.
    let forged = {
        use hmac::Mac;
        let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(b"attacker-secret").unwrap();
        mac.update(format!("1.{body}").as_bytes());
        format!("t=1,v1={}", hex::encode(mac.finalize().into_bytes()))
    };

    let err = gateway.verify_webhook(body.as_bytes(), &forged).unwrap_err();
    assert!(matches!(err, atrium_pay::PaymentError::InvalidSignature));

    // The order is untouched.
    let current = f.db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(current.status, OrderStatus::Pending);
    assert!(current.paid_at.is_none());
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn get_for_user_returns_own_orders_newest_first() {
    let f = fixture().await;
    let orders = f.db.orders();

    let first_cart = filled_cart(&f, "grace").await;
    let first = orders
        .create(
            "grace",
            &first_cart,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let second_cart = filled_cart(&f, "grace").await;
    let second = orders
        .create(
            "grace",
            &second_cart,
            &shipping_to("US"),
            PaymentMethod::BankTransfer,
            None,
        )
        .await
        .unwrap();

    let other_cart = filled_cart(&f, "ada").await;
    orders
        .create(
            "ada",
            &other_cart,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    let history = orders.get_for_user("grace").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(history[1].id, first.id);
    assert!(history.iter().all(|o| o.user_id == "grace"));
}

#[tokio::test]
async fn variant_lines_reserve_variant_stock_and_snapshot_variant_names() {
    let f = fixture().await;
    let carts = f.db.carts();
    let cart = carts
        .get_or_create(&CartIdentity::User("variant-buyer".to_string()))
        .await
        .unwrap();
    carts
        .add_line(&cart.id, &f.shirt_id, Some(&f.shirt_xl_id), 2)
        .await
        .unwrap();

    let order = f
        .db
        .orders()
        .create(
            "variant-buyer",
            &cart.id,
            &shipping_to("US"),
            PaymentMethod::Card,
            None,
        )
        .await
        .unwrap();

    // Variant stock decremented, base product stock untouched.
    let stock = f.db.stock();
    assert_eq!(
        stock
            .quantity_on_hand(&SkuRef::Variant(f.shirt_xl_id.clone()))
            .await
            .unwrap(),
        8
    );
    assert_eq!(stock.quantity_on_hand(&f.shirt_sku()).await.unwrap(), 20);

    let lines = f.db.orders().lines(&order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].variant_name.as_deref(), Some("XL"));
    // Unit price includes the variant adjustment.
    assert_eq!(lines[0].unit_price_cents, SHIRT_PRICE + 300);
    assert_eq!(order.subtotal_cents, 2 * (SHIRT_PRICE + 300));
}
