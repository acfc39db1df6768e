//! Monetary arithmetic shared by the agent tools and anything that previews a document.
//!
//! Amounts are kept at full `Decimal` precision. Rounding to the currency's minor unit
//! (two places, midpoint away from zero) happens only in [`round_money`] / [`format_money`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::document::LineItem;
use crate::domain::money::Currency;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustments {
    pub discount_pct: Option<Decimal>,
    pub tax_pct: Option<Decimal>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

pub trait PricingEngine: Send + Sync {
    fn price(
        &self,
        items: &[LineItem],
        adjustments: Adjustments,
    ) -> Result<PricingBreakdown, DomainError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(
        &self,
        items: &[LineItem],
        adjustments: Adjustments,
    ) -> Result<PricingBreakdown, DomainError> {
        price_items(items, adjustments)
    }
}

/// Amounts past `Decimal::MAX` are rejected instead of wrapping or panicking.
pub fn too_large(what: &str) -> DomainError {
    DomainError::InvariantViolation(format!("{what} amount is too large"))
}

pub fn item_total(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, DomainError> {
    quantity.checked_mul(unit_price).ok_or_else(|| too_large("line item"))
}

/// Sums `quantity * unit_price` per item. Stored item totals are ignored.
pub fn subtotal(items: &[LineItem]) -> Result<Decimal, DomainError> {
    items.iter().try_fold(Decimal::ZERO, |sum, item| {
        let line = item_total(item.quantity, item.unit_price)?;
        sum.checked_add(line).ok_or_else(|| too_large("subtotal"))
    })
}

fn percent_of(amount: Decimal, pct: Option<Decimal>, what: &str) -> Result<Decimal, DomainError> {
    amount
        .checked_mul(pct.unwrap_or(Decimal::ZERO))
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| too_large(what))
}

pub fn discount_amount(
    subtotal: Decimal,
    discount_pct: Option<Decimal>,
) -> Result<Decimal, DomainError> {
    percent_of(subtotal, discount_pct, "discount")
}

/// Tax applies to the already-discounted amount.
pub fn tax_amount(taxable: Decimal, tax_pct: Option<Decimal>) -> Result<Decimal, DomainError> {
    percent_of(taxable, tax_pct, "tax")
}

pub fn price_items(
    items: &[LineItem],
    adjustments: Adjustments,
) -> Result<PricingBreakdown, DomainError> {
    let subtotal = subtotal(items)?;
    let discount = discount_amount(subtotal, adjustments.discount_pct)?;
    let taxable = subtotal.checked_sub(discount).ok_or_else(|| too_large("taxable"))?;
    let tax = tax_amount(taxable, adjustments.tax_pct)?;
    let total = taxable.checked_add(tax).ok_or_else(|| too_large("total"))?;

    Ok(PricingBreakdown { subtotal, discount, tax, total })
}

pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Renders `USD 125.00`.
pub fn format_money(amount: Decimal, currency: Currency) -> String {
    format!("{} {}", currency.code(), round_money(amount))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{
        discount_amount, format_money, item_total, price_items, round_money, subtotal,
        tax_amount, too_large, Adjustments, DeterministicPricingEngine, PricingEngine,
    };
    use crate::domain::document::LineItem;
    use crate::domain::money::Currency;

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::priced("Consulting", Decimal::from(2), Decimal::from(50)).expect("item"),
            LineItem::priced("Hosting", Decimal::ONE, Decimal::from(25)).expect("item"),
        ]
    }

    #[test]
    fn subtotal_sums_quantity_times_price() {
        assert_eq!(subtotal(&items()), Ok(Decimal::from(125)));
        assert_eq!(subtotal(&[]), Ok(Decimal::ZERO));
    }

    #[test]
    fn subtotal_ignores_a_tampered_item_total() {
        let mut tampered = items();
        tampered[0].total = Decimal::from(1);
        assert_eq!(subtotal(&tampered), Ok(Decimal::from(125)));
    }

    #[test]
    fn absent_percentages_count_as_zero() {
        assert_eq!(discount_amount(Decimal::from(200), None), Ok(Decimal::ZERO));
        assert_eq!(tax_amount(Decimal::from(200), None), Ok(Decimal::ZERO));
    }

    #[test]
    fn tax_is_applied_after_discount() {
        let breakdown = price_items(
            &items(),
            Adjustments { discount_pct: Some(Decimal::from(10)), tax_pct: Some(Decimal::from(20)) },
        )
        .expect("breakdown");

        assert_eq!(breakdown.subtotal, Decimal::from(125));
        assert_eq!(breakdown.discount, Decimal::new(125, 1));
        assert_eq!(breakdown.tax, Decimal::new(225, 1));
        assert_eq!(breakdown.total, Decimal::from(135));
    }

    #[test]
    fn engine_trait_matches_free_function() {
        let adjustments = Adjustments { discount_pct: None, tax_pct: Some(Decimal::from(5)) };
        assert_eq!(
            DeterministicPricingEngine.price(&items(), adjustments),
            price_items(&items(), adjustments)
        );
    }

    #[test]
    fn overflowing_amounts_are_rejected() {
        let huge = Decimal::from_str("100000000000000000000").expect("1e20");
        assert_eq!(item_total(huge, huge), Err(too_large("line item")));

        let mut lines = items();
        lines[0].quantity = Decimal::MAX;
        lines[0].unit_price = Decimal::ONE;
        lines[1].quantity = Decimal::ONE;
        lines[1].unit_price = Decimal::MAX;
        assert_eq!(subtotal(&lines), Err(too_large("subtotal")));

        assert_eq!(
            discount_amount(Decimal::MAX, Some(Decimal::from(50))),
            Err(too_large("discount"))
        );
        assert!(tax_amount(Decimal::MAX, Some(Decimal::from(5))).is_err());
    }

    #[test]
    fn rounding_happens_only_at_display_time() {
        let third = Decimal::from(10) / Decimal::from(3);
        assert_eq!(round_money(third).to_string(), "3.33");
        assert_eq!(round_money(Decimal::new(2345, 3)).to_string(), "2.35");
        assert_eq!(format_money(Decimal::from(125), Currency::Usd), "USD 125.00");
        assert_eq!(format_money(Decimal::new(45, 0), Currency::Eur), "EUR 45.00");
    }
}
