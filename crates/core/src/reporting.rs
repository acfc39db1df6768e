use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::document::{Invoice, InvoiceStatus};
use crate::domain::transaction::Transaction;
use crate::errors::DomainError;
use crate::pricing::too_large;

/// Tenant-wide totals. Revenue counts paid invoices only; expenses count expense transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_expenses: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_profit: Decimal,
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub unpaid_invoices: usize,
    pub total_transactions: usize,
}

impl FinancialSummary {
    pub fn compute(
        invoices: &[Invoice],
        transactions: &[Transaction],
    ) -> Result<Self, DomainError> {
        let paid: Vec<&Invoice> =
            invoices.iter().filter(|invoice| invoice.status == InvoiceStatus::Paid).collect();
        let total_revenue = checked_sum(paid.iter().map(|invoice| invoice.total_amount))
            .ok_or_else(|| too_large("revenue"))?;

        let total_expenses = checked_sum(
            transactions
                .iter()
                .filter(|transaction| transaction.kind.is_expense())
                .map(|transaction| transaction.amount),
        )
        .ok_or_else(|| too_large("expense"))?;

        let net_profit =
            total_revenue.checked_sub(total_expenses).ok_or_else(|| too_large("net profit"))?;

        Ok(Self {
            total_revenue,
            total_expenses,
            net_profit,
            total_invoices: invoices.len(),
            paid_invoices: paid.len(),
            unpaid_invoices: invoices.len() - paid.len(),
            total_transactions: transactions.len(),
        })
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    amounts.try_fold(Decimal::ZERO, |sum, amount| sum.checked_add(amount))
}
