//! End-to-end walk of the order lifecycle at the domain level: build a
//! cart, convert it at checkout, then drive the status machine the way the
//! kitchen does.

use std::collections::HashMap;

use chrono::Utc;
use smartserve_orderservice::domain::{
    cart::{Cart, CartIntent},
    checkout::{self, CheckoutLine},
    status::{self, OrderStatus},
    types::PaymentPath,
};
use smartserve_orderservice::models::MenuItemEntity;
use uuid::Uuid;

fn menu_item(id: Uuid, name: &str, price: f64, preparation_time: i32) -> MenuItemEntity {
    MenuItemEntity {
        id,
        category_id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        price,
        image_url: None,
        preparation_time,
        is_available: true,
        is_vegetarian: false,
        is_vegan: false,
        spice_level: None,
        display_order: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn cart_to_served_order_walkthrough() {
    let dosa = Uuid::new_v4();
    let chai = Uuid::new_v4();
    let menu = HashMap::from([
        (dosa, menu_item(dosa, "Masala Dosa", 80.0, 12)),
        (chai, menu_item(chai, "Masala Chai", 20.0, 5)),
    ]);

    // The diner taps the dosa twice and adds a chai.
    let mut cart = Cart::new();
    for _ in 0..2 {
        cart.apply(CartIntent::AddItem {
            menu_item_id: dosa,
            name: "Masala Dosa".to_string(),
            unit_price: 80.0,
            quantity: 1,
            special_instructions: None,
        })
        .unwrap()
        .confirm();
    }
    cart.apply(CartIntent::AddItem {
        menu_item_id: chai,
        name: "Masala Chai".to_string(),
        unit_price: 20.0,
        quantity: 1,
        special_instructions: None,
    })
    .unwrap()
    .confirm();
    assert_eq!(cart.len(), 2);
    assert_eq!(cart.subtotal(), 180.0);

    // Checkout re-prices the lines from the menu.
    let lines: Vec<CheckoutLine> = cart
        .lines()
        .iter()
        .map(|line| CheckoutLine {
            menu_item_id: line.menu_item_id,
            quantity: line.quantity,
            special_instructions: None,
        })
        .collect();
    let draft = checkout::build_order(
        Some(Uuid::new_v4()),
        "12",
        &lines,
        &menu,
        PaymentPath::Online,
        None,
        None,
    )
    .unwrap();

    assert_eq!(draft.header.subtotal, 180.0);
    assert_eq!(draft.header.tax_amount, 9.0);
    assert_eq!(draft.header.total_amount, 189.0);
    assert_eq!(
        draft.header.subtotal + draft.header.tax_amount,
        draft.header.total_amount
    );
    assert_eq!(draft.header.status, "pending");
    assert_eq!(draft.header.estimated_preparation_time, Some(15));

    // Kitchen starts preparation straight from pending.
    let mut order_status = OrderStatus::Pending;
    assert!(order_status.can_transition_to(OrderStatus::Preparing));
    order_status = OrderStatus::Preparing;

    // Two of three items ready: the order cannot be marked ready yet.
    let mut item_statuses = vec!["ready", "ready", "preparing"];
    assert!(!status::all_items_ready(item_statuses.iter().copied()));

    // The third item lands; now the gate opens.
    item_statuses[2] = "ready";
    assert!(status::all_items_ready(item_statuses.iter().copied()));
    assert!(order_status.can_transition_to(OrderStatus::Ready));
    order_status = OrderStatus::Ready;

    assert!(order_status.can_transition_to(OrderStatus::Served));
    order_status = OrderStatus::Served;

    // Served is terminal: no further moves, not even cancellation.
    assert!(order_status.is_terminal());
    assert!(!order_status.can_transition_to(OrderStatus::Cancelled));
}

#[test]
fn cancellation_is_available_until_the_order_is_served() {
    for state in [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
    ] {
        assert!(state.can_transition_to(OrderStatus::Cancelled));
    }
    assert!(!OrderStatus::Served.can_transition_to(OrderStatus::Cancelled));
}

#[test]
fn worked_example_from_the_menu_price() {
    let item = Uuid::new_v4();
    let menu = HashMap::from([(item, menu_item(item, "Thali", 80.0, 10))]);

    let draft = checkout::build_order(
        None,
        "1",
        &[CheckoutLine {
            menu_item_id: item,
            quantity: 2,
            special_instructions: None,
        }],
        &menu,
        PaymentPath::Split,
        None,
        None,
    )
    .unwrap();

    assert_eq!(draft.header.subtotal, 160.0);
    assert_eq!(draft.header.tax_amount, 8.0);
    assert_eq!(draft.header.total_amount, 168.0);
    assert_eq!(draft.header.payment_method.as_deref(), Some("split"));
    assert_eq!(draft.items.len(), 1);
    assert_eq!(draft.items[0].quantity, 2);
    assert_eq!(draft.items[0].total_price, 160.0);
}
