//! End-to-end lifecycle tests over the assembled core

use chrono::{Duration, Utc};
use procure_server::collaborators::{
    InMemoryFileStore, InProcessGateway, InlineQrRenderer, RecordingDispatcher,
};
use procure_server::orders::CreateOrder;
use procure_server::quotations::{AddSupplierQuote, CreateQuotation};
use procure_server::{Collaborators, Config, Core};
use shared::models::{
    DeliveredItem, DeliveryRecord, OrderItem, OrderStatus, Profile, ProfilePreferences,
    QuotationStatus, Subscription, SubscriptionStatus, SubscriptionUsage, Supplier,
    SupplierContact,
};
use std::sync::Arc;

struct Harness {
    core: Core,
    payments: Arc<InProcessGateway>,
    dispatcher: Arc<RecordingDispatcher>,
}

fn harness() -> Harness {
    let payments = Arc::new(InProcessGateway::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let core = Core::initialize(
        Config::default(),
        Collaborators {
            payments: payments.clone(),
            dispatcher: dispatcher.clone(),
            files: Arc::new(InMemoryFileStore::new()),
            qr: Arc::new(InlineQrRenderer),
        },
    )
    .unwrap();

    let now = Utc::now();
    for (id, require_payment) in [("buyer", false), ("partner", false), ("gated", true)] {
        core.store
            .profiles
            .insert(
                id,
                Profile {
                    id: id.into(),
                    company_name: format!("Company {id}"),
                    email: format!("{id}@example.com"),
                    is_admin: false,
                    preferences: ProfilePreferences { require_order_payment: require_payment },
                    subscription: Some(Subscription {
                        plan_id: "plan_pro".into(),
                        status: SubscriptionStatus::Active,
                        currency: "usd".into(),
                        subscription_fee: 99.0,
                        included_orders: 20,
                        included_quotations: 20,
                        price_per_extra_order: 5.0,
                        start_date: now,
                        end_date: None,
                    }),
                    subscription_usage: SubscriptionUsage::new_period(
                        now,
                        now + Duration::days(30),
                    ),
                    created_at: now,
                },
            )
            .unwrap();
    }
    for id in ["s1", "s2", "s3"] {
        core.store
            .suppliers
            .insert(
                id,
                Supplier {
                    id: id.into(),
                    company_name: format!("Supplier {id}"),
                    contact: SupplierContact {
                        name: "Sales".into(),
                        email: format!("sales@{id}.example"),
                        title: None,
                    },
                    active: true,
                    categories: vec!["building-materials".into()],
                    created_at: now,
                },
            )
            .unwrap();
    }

    Harness {
        core,
        payments,
        dispatcher,
    }
}

fn item(name: &str, quantity: i32) -> OrderItem {
    OrderItem::new(name, quantity, Some("unit".into()))
}

fn priced(name: &str, quantity: i32, unit_price: f64) -> OrderItem {
    let mut it = item(name, quantity);
    it.unit_price = unit_price;
    it
}

#[test]
fn bootstrap_seeds_exactly_one_admin() {
    let h = harness();
    let admins = h.core.store.profiles.filter(|p| p.is_admin);
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].email, h.core.config.default_admin_email);
}

#[tokio::test]
async fn order_flows_from_creation_to_delivery_via_bidding() {
    let h = harness();
    let site = h
        .core
        .job_sites
        .create_job_site("buyer", "Main Street Build", None)
        .unwrap();

    let order = h
        .core
        .orders
        .create(CreateOrder {
            buyer_profile_id: "buyer".into(),
            job_site_id: site.id.clone(),
            items: vec![item("Pipe", 10), item("Cement", 4)],
            required_delivery_date: Utc::now() + Duration::days(30),
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);

    h.core
        .orders
        .route_to_suppliers(&order.id, &["s1".to_string(), "s2".to_string()])
        .await
        .unwrap();

    let quotation = h
        .core
        .quotations
        .create(CreateQuotation {
            buyer_profile_id: "buyer".into(),
            job_site_id: site.id.clone(),
            items: vec![item("Pipe", 10), item("Cement", 4)],
            valid_until: Utc::now() + Duration::days(14),
            notes: None,
            order_id: Some(order.id.clone()),
            is_self_managed: true,
        })
        .unwrap();
    h.core
        .quotations
        .send_to_suppliers(&quotation.id, "buyer", &["s1".to_string(), "s2".to_string()])
        .await
        .unwrap();

    for (supplier, price) in [("s1", 3.0), ("s2", 2.5)] {
        h.core
            .quotations
            .add_supplier_quote(
                &quotation.id,
                AddSupplierQuote {
                    supplier_id: supplier.into(),
                    items: vec![priced("Pipe", 10, price), priced("Cement", 4, 8.0)],
                    delivery_date: Utc::now() + Duration::days(10),
                    notes: None,
                    file_url: None,
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(
        h.core.store.orders.get(&order.id).unwrap().status,
        OrderStatus::QuotationsReceived
    );

    // Cheaper bid wins; the linked order takes its prices
    let accepted = h
        .core
        .quotations
        .accept_supplier_quote(&quotation.id, "buyer", "s2")
        .await
        .unwrap();
    assert_eq!(accepted.status, QuotationStatus::Accepted);

    let order = h.core.store.orders.get(&order.id).unwrap();
    assert_eq!(order.status, OrderStatus::QuotationSelected);
    assert_eq!(order.subtotal, 57.0);
    assert_eq!(order.tax, 5.7);
    assert_eq!(order.total, 62.7);

    h.core
        .orders
        .update_status(&order.id, OrderStatus::Shipping, None)
        .await
        .unwrap();
    let partial = h
        .core
        .orders
        .record_delivery(
            &order.id,
            DeliveryRecord {
                date: Utc::now(),
                delivered_items: vec![DeliveredItem { item_index: 0, quantity: 10, notes: None }],
                notes: None,
                is_partial: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(partial.status, OrderStatus::PartiallyDelivered);

    let done = h
        .core
        .orders
        .record_delivery(
            &order.id,
            DeliveryRecord {
                date: Utc::now(),
                delivered_items: vec![DeliveredItem { item_index: 1, quantity: 4, notes: None }],
                notes: None,
                is_partial: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(done.status, OrderStatus::Delivered);
    assert!(done.is_fully_delivered());

    // History is append-only and ends in the terminal status
    let statuses: Vec<OrderStatus> = done.status_history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Pending,
            OrderStatus::PendingQuotations,
            OrderStatus::QuotationsReceived,
            OrderStatus::QuotationSelected,
            OrderStatus::Shipping,
            OrderStatus::PartiallyDelivered,
            OrderStatus::Delivered,
        ]
    );
    let usage = h.core.store.profiles.get("buyer").unwrap().subscription_usage;
    assert_eq!(usage.orders_used, 1);
    assert_eq!(usage.quotations_used, 1);
}

#[tokio::test]
async fn payment_gated_order_waits_for_the_gateway() {
    let h = harness();
    let site = h
        .core
        .job_sites
        .create_job_site("gated", "Depot", None)
        .unwrap();

    let order = h
        .core
        .orders
        .create(CreateOrder {
            buyer_profile_id: "gated".into(),
            job_site_id: site.id,
            items: vec![item("Gravel", 3)],
            required_delivery_date: Utc::now() + Duration::days(7),
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
    let intent_id = order.payment_intent_id.unwrap();

    // Routing is blocked until the payment clears
    let err = h
        .core
        .orders
        .route_to_suppliers(&order.id, &["s1".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        procure_server::orders::OrderError::InvalidTransition { .. }
    ));

    h.payments.settle(&intent_id, "pm_4242");
    let order = h.core.orders.handle_payment_success(&intent_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);

    h.core
        .orders
        .route_to_suppliers(&order.id, &["s1".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn rejecting_every_quote_rejects_the_quotation() {
    let h = harness();
    let site = h
        .core
        .job_sites
        .create_job_site("buyer", "Yard", None)
        .unwrap();
    let quotation = h
        .core
        .quotations
        .create(CreateQuotation {
            buyer_profile_id: "buyer".into(),
            job_site_id: site.id,
            items: vec![item("Rebar", 100)],
            valid_until: Utc::now() + Duration::days(14),
            notes: None,
            order_id: None,
            is_self_managed: true,
        })
        .unwrap();
    let suppliers: Vec<String> = ["s1", "s2", "s3"].iter().map(|s| s.to_string()).collect();
    h.core
        .quotations
        .send_to_suppliers(&quotation.id, "buyer", &suppliers)
        .await
        .unwrap();
    for supplier in &suppliers {
        h.core
            .quotations
            .add_supplier_quote(
                &quotation.id,
                AddSupplierQuote {
                    supplier_id: supplier.clone(),
                    items: vec![priced("Rebar", 100, 1.2)],
                    delivery_date: Utc::now() + Duration::days(5),
                    notes: None,
                    file_url: None,
                },
            )
            .await
            .unwrap();
    }

    for supplier in ["s1", "s2"] {
        let after = h
            .core
            .quotations
            .reject_supplier_quote(&quotation.id, "buyer", supplier, None)
            .await
            .unwrap();
        assert_eq!(after.status, QuotationStatus::ReceivedQuotes);
    }
    let after = h
        .core
        .quotations
        .reject_supplier_quote(&quotation.id, "buyer", "s3", None)
        .await
        .unwrap();
    assert_eq!(after.status, QuotationStatus::Rejected);

    // Every rejected supplier heard about it
    for supplier in ["s1", "s2", "s3"] {
        assert!(h
            .dispatcher
            .sent_to(supplier)
            .iter()
            .any(|n| n.title == "Quote rejected"));
    }
}

#[tokio::test]
async fn invitations_share_job_sites_once() {
    let h = harness();
    let site = h
        .core
        .job_sites
        .create_job_site("buyer", "Shared Site", None)
        .unwrap();
    let bundle = h
        .core
        .job_sites
        .create_invitation(&site.id, "buyer", Some(48))
        .await
        .unwrap();
    assert!(bundle.qr_code.starts_with("data:image/png;base64,"));

    let joined = h
        .core
        .job_sites
        .accept_invitation(&bundle.invitation.token, "partner")
        .await
        .unwrap();
    assert!(joined.has_buyer("partner"));

    // The partner can now order against the shared site
    h.core
        .orders
        .create(CreateOrder {
            buyer_profile_id: "partner".into(),
            job_site_id: site.id.clone(),
            items: vec![item("Sand", 2)],
            required_delivery_date: Utc::now() + Duration::days(7),
            notes: None,
        })
        .await
        .unwrap();

    // Single use: a second redemption fails
    let err = h
        .core
        .job_sites
        .accept_invitation(&bundle.invitation.token, "gated")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        procure_server::job_sites::JobSiteError::InvitationAlreadyAccepted
    ));

    // With live orders the partner cannot be removed
    let err = h
        .core
        .job_sites
        .remove_buyer(&site.id, "buyer", "partner")
        .unwrap_err();
    assert!(matches!(
        err,
        procure_server::job_sites::JobSiteError::BuyerHasOrders(_)
    ));
}
