//! The diner's cart, modelled as a value with speculative mutations.
//!
//! Every mutation goes through [`Cart::apply`], which returns a
//! [`CartTransaction`] holding the speculative state. The caller either
//! `confirm()`s it or `rollback()`s to the prior lines; dropping the
//! transaction without confirming rolls back.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::round2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub menu_item_id: Uuid,
    pub name: String,
    pub unit_price: f64,
    pub quantity: i32,
    pub special_instructions: Option<String>,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        round2(self.unit_price * self.quantity as f64)
    }
}

#[derive(Debug, Clone)]
pub enum CartIntent {
    AddItem {
        menu_item_id: Uuid,
        name: String,
        unit_price: f64,
        quantity: i32,
        special_instructions: Option<String>,
    },
    SetQuantity {
        menu_item_id: Uuid,
        quantity: i32,
    },
    RemoveItem {
        menu_item_id: Uuid,
    },
    Clear,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Item is not in the cart")]
    UnknownItem,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn subtotal(&self) -> f64 {
        round2(self.lines.iter().map(CartLine::line_total).sum())
    }

    /// Applies the intent speculatively. On success the returned
    /// transaction exposes the new state and must be confirmed to stick.
    pub fn apply(&mut self, intent: CartIntent) -> Result<CartTransaction<'_>, CartError> {
        let prior = self.lines.clone();
        if let Err(err) = self.mutate(intent) {
            self.lines = prior;
            return Err(err);
        }
        Ok(CartTransaction {
            cart: self,
            prior,
            settled: false,
        })
    }

    fn mutate(&mut self, intent: CartIntent) -> Result<(), CartError> {
        match intent {
            CartIntent::AddItem {
                menu_item_id,
                name,
                unit_price,
                quantity,
                special_instructions,
            } => {
                if quantity < 1 {
                    return Err(CartError::InvalidQuantity);
                }
                // Adding an item already in the cart bumps its quantity
                // instead of opening a second line.
                if let Some(line) = self.lines.iter_mut().find(|l| l.menu_item_id == menu_item_id)
                {
                    line.quantity += quantity;
                } else {
                    self.lines.push(CartLine {
                        menu_item_id,
                        name,
                        unit_price,
                        quantity,
                        special_instructions,
                    });
                }
                Ok(())
            }
            CartIntent::SetQuantity {
                menu_item_id,
                quantity,
            } => {
                if quantity < 0 {
                    return Err(CartError::InvalidQuantity);
                }
                let position = self
                    .lines
                    .iter()
                    .position(|l| l.menu_item_id == menu_item_id)
                    .ok_or(CartError::UnknownItem)?;
                if quantity == 0 {
                    self.lines.remove(position);
                } else {
                    self.lines[position].quantity = quantity;
                }
                Ok(())
            }
            CartIntent::RemoveItem { menu_item_id } => {
                let position = self
                    .lines
                    .iter()
                    .position(|l| l.menu_item_id == menu_item_id)
                    .ok_or(CartError::UnknownItem)?;
                self.lines.remove(position);
                Ok(())
            }
            CartIntent::Clear => {
                self.lines.clear();
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
pub struct CartTransaction<'a> {
    cart: &'a mut Cart,
    prior: Vec<CartLine>,
    settled: bool,
}

impl CartTransaction<'_> {
    /// The state as it will look if confirmed.
    pub fn speculative(&self) -> &Cart {
        self.cart
    }

    pub fn confirm(mut self) {
        self.settled = true;
    }

    pub fn rollback(mut self) {
        self.cart.lines = std::mem::take(&mut self.prior);
        self.settled = true;
    }
}

impl Drop for CartTransaction<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.cart.lines = std::mem::take(&mut self.prior);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(id: Uuid, quantity: i32) -> CartIntent {
        CartIntent::AddItem {
            menu_item_id: id,
            name: "Masala Dosa".to_string(),
            unit_price: 80.0,
            quantity,
            special_instructions: None,
        }
    }

    #[test]
    fn adding_the_same_item_twice_merges_into_one_line() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.apply(add(id, 1)).unwrap().confirm();
        cart.apply(add(id, 1)).unwrap().confirm();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.subtotal(), 160.0);
    }

    #[test]
    fn setting_quantity_to_zero_removes_the_line() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.apply(add(id, 2)).unwrap().confirm();
        cart.apply(CartIntent::SetQuantity {
            menu_item_id: id,
            quantity: 0,
        })
        .unwrap()
        .confirm();

        assert!(cart.is_empty());
    }

    #[test]
    fn rollback_restores_the_prior_lines() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.apply(add(id, 1)).unwrap().confirm();

        let tx = cart.apply(add(id, 4)).unwrap();
        assert_eq!(tx.speculative().lines()[0].quantity, 5);
        tx.rollback();

        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn dropping_an_unconfirmed_transaction_rolls_back() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.apply(add(id, 1)).unwrap().confirm();

        {
            let _tx = cart.apply(CartIntent::Clear).unwrap();
        }

        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn invalid_quantities_leave_the_cart_untouched() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.apply(add(id, 1)).unwrap().confirm();

        assert_eq!(cart.apply(add(id, 0)).unwrap_err(), CartError::InvalidQuantity);
        assert_eq!(
            cart.apply(CartIntent::SetQuantity {
                menu_item_id: id,
                quantity: -1,
            })
            .unwrap_err(),
            CartError::InvalidQuantity
        );
        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn removing_an_unknown_item_is_rejected() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.apply(CartIntent::RemoveItem {
                menu_item_id: Uuid::new_v4(),
            })
            .unwrap_err(),
            CartError::UnknownItem
        );
    }
}
