/// Flat tax rate applied to every order at checkout.
pub const TAX_RATE: f64 = 0.05;

/// Rounds a currency amount to two decimal places.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn tax_for(subtotal: f64) -> f64 {
    round2(subtotal * TAX_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_is_five_percent_rounded() {
        assert_eq!(tax_for(160.0), 8.0);
        assert_eq!(tax_for(250.0), 12.5);
        assert_eq!(tax_for(333.0), 16.65);
        assert_eq!(tax_for(0.0), 0.0);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(12.345), 12.35);
        assert_eq!(round2(168.0), 168.0);
    }
}
