//! Conversion of a cart into an order aggregate draft at checkout time.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::models::{CreateOrderEntity, MenuItemEntity};

use super::{
    cart::{Cart, CartIntent},
    money,
    status::OrderStatus,
    types::PaymentPath,
};

/// Fallback estimate when menu items carry no slower preparation time.
const MIN_ESTIMATED_PREPARATION_MINUTES: i32 = 15;

#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub special_instructions: Option<String>,
}

#[derive(Debug)]
pub struct OrderItemDraft {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub special_instructions: Option<String>,
}

#[derive(Debug)]
pub struct OrderDraft {
    pub header: CreateOrderEntity,
    pub items: Vec<OrderItemDraft>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Menu item {0} is not available")]
    UnavailableItem(Uuid),
}

/// Builds the order aggregate draft from the submitted cart lines, pricing
/// every line from the current menu. Prices are captured into the draft so
/// later menu edits never alter order history.
pub fn build_order(
    user_id: Option<Uuid>,
    table_number: &str,
    lines: &[CheckoutLine],
    menu: &HashMap<Uuid, MenuItemEntity>,
    payment_path: PaymentPath,
    special_instructions: Option<String>,
    idempotency_key: Option<String>,
) -> Result<OrderDraft, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut cart = Cart::new();
    for line in lines {
        if line.quantity < 1 {
            return Err(CheckoutError::InvalidQuantity);
        }
        let menu_item = menu
            .get(&line.menu_item_id)
            .filter(|item| item.is_available)
            .ok_or(CheckoutError::UnavailableItem(line.menu_item_id))?;
        cart.apply(CartIntent::AddItem {
            menu_item_id: menu_item.id,
            name: menu_item.name.clone(),
            unit_price: menu_item.price,
            quantity: line.quantity,
            special_instructions: line.special_instructions.clone(),
        })
        .map_err(|_| CheckoutError::InvalidQuantity)?
        .confirm();
    }

    let subtotal = cart.subtotal();
    let tax_amount = money::tax_for(subtotal);
    let total_amount = money::round2(subtotal + tax_amount);

    let estimated_preparation_time = cart
        .lines()
        .iter()
        .filter_map(|line| menu.get(&line.menu_item_id))
        .map(|item| item.preparation_time)
        .max()
        .unwrap_or(MIN_ESTIMATED_PREPARATION_MINUTES)
        .max(MIN_ESTIMATED_PREPARATION_MINUTES);

    let items = cart
        .lines()
        .iter()
        .map(|line| OrderItemDraft {
            menu_item_id: line.menu_item_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            total_price: line.line_total(),
            special_instructions: line.special_instructions.clone(),
        })
        .collect();

    Ok(OrderDraft {
        header: CreateOrderEntity {
            user_id,
            table_number: table_number.to_string(),
            status: OrderStatus::Pending.as_str().to_string(),
            subtotal,
            tax_amount,
            total_amount,
            payment_method: Some(payment_path.method().as_str().to_string()),
            special_instructions,
            estimated_preparation_time: Some(estimated_preparation_time),
            idempotency_key,
        },
        items,
    })
}

/// Split metadata for an evenly divided bill, recorded on the payment row.
pub fn equal_split_info(total_amount: f64, participants: u32) -> Option<Value> {
    if participants < 2 {
        return None;
    }
    let share = money::round2(total_amount / participants as f64);
    Some(serde_json::json!({
        "kind": "equal",
        "participants": participants,
        "share_amount": share,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn menu_item(id: Uuid, price: f64, preparation_time: i32) -> MenuItemEntity {
        MenuItemEntity {
            id,
            category_id: Uuid::new_v4(),
            name: "Masala Dosa".to_string(),
            description: None,
            price,
            image_url: None,
            preparation_time,
            is_available: true,
            is_vegetarian: true,
            is_vegan: false,
            spice_level: Some(2),
            display_order: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(id: Uuid, quantity: i32) -> CheckoutLine {
        CheckoutLine {
            menu_item_id: id,
            quantity,
            special_instructions: None,
        }
    }

    #[test]
    fn totals_follow_the_five_percent_tax_rule() {
        let id = Uuid::new_v4();
        let menu = HashMap::from([(id, menu_item(id, 80.0, 10))]);

        let draft = build_order(
            None,
            "12",
            &[line(id, 2)],
            &menu,
            PaymentPath::Online,
            None,
            None,
        )
        .unwrap();

        assert_eq!(draft.header.subtotal, 160.0);
        assert_eq!(draft.header.tax_amount, 8.0);
        assert_eq!(draft.header.total_amount, 168.0);
        assert_eq!(draft.header.status, "pending");
        assert_eq!(draft.header.payment_method.as_deref(), Some("upi"));
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].total_price, 160.0);
    }

    #[test]
    fn duplicate_lines_merge_before_conversion() {
        let id = Uuid::new_v4();
        let menu = HashMap::from([(id, menu_item(id, 50.0, 5))]);

        let draft = build_order(
            None,
            "3",
            &[line(id, 1), line(id, 2)],
            &menu,
            PaymentPath::Cod,
            None,
            None,
        )
        .unwrap();

        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].quantity, 3);
        assert_eq!(draft.items[0].total_price, 150.0);
        assert_eq!(draft.header.payment_method.as_deref(), Some("cash"));
    }

    #[test]
    fn estimate_comes_from_the_slowest_item() {
        let fast = Uuid::new_v4();
        let slow = Uuid::new_v4();
        let menu = HashMap::from([
            (fast, menu_item(fast, 40.0, 5)),
            (slow, menu_item(slow, 90.0, 25)),
        ]);

        let draft = build_order(
            None,
            "7",
            &[line(fast, 1), line(slow, 1)],
            &menu,
            PaymentPath::Online,
            None,
            None,
        )
        .unwrap();

        assert_eq!(draft.header.estimated_preparation_time, Some(25));
    }

    #[test]
    fn unavailable_items_are_rejected() {
        let id = Uuid::new_v4();
        let mut item = menu_item(id, 80.0, 10);
        item.is_available = false;
        let menu = HashMap::from([(id, item)]);

        let err = build_order(
            None,
            "1",
            &[line(id, 1)],
            &menu,
            PaymentPath::Online,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, CheckoutError::UnavailableItem(id));
    }

    #[test]
    fn empty_cart_is_rejected() {
        let menu = HashMap::new();
        let err = build_order(None, "1", &[], &menu, PaymentPath::Online, None, None).unwrap_err();
        assert_eq!(err, CheckoutError::EmptyCart);
    }

    #[test]
    fn equal_split_requires_at_least_two_participants() {
        assert!(equal_split_info(168.0, 1).is_none());
        let info = equal_split_info(168.0, 4).unwrap();
        assert_eq!(info["share_amount"], 42.0);
        assert_eq!(info["participants"], 4);
    }
}
