use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use tally_core::domain::client::{Client, NewClient};
use tally_core::domain::document::{
    DocumentKind, DocumentPatch, InvoiceStatus, LineItem, NewInvoice, NewQuotation,
    QuotationStatus,
};
use tally_core::domain::money::Currency;
use tally_core::domain::tenant::TenantId;
use tally_core::domain::transaction::{NewTransaction, TransactionKind};

use crate::repositories::{FinanceStore, RepositoryError};

/// Deterministic demo ledgers for a single tenant.
///
/// Three clients, four invoices (one paid, one sent, one overdue, one draft), one quotation,
/// and a mix of income and expense transactions. Loading is only allowed into an empty tenant so
/// document numbers start at `INV-001` / `QUO-001`.
pub struct DemoDataset;

struct SeedClient {
    name: &'static str,
    contact_person: &'static str,
    email: &'static str,
    opportunity_worth: Option<i64>,
}

struct SeedDocument {
    client: usize,
    items: &'static [(&'static str, i64, i64)],
    issued: (i32, u32, u32),
    due: (i32, u32, u32),
}

struct SeedTransaction {
    income_source: Option<&'static str>,
    expense_category: Option<&'static str>,
    vendor: Option<&'static str>,
    amount_cents: i64,
    on: (i32, u32, u32),
    description: &'static str,
}

const SEED_CLIENTS: &[SeedClient] = &[
    SeedClient {
        name: "Acme Corp",
        contact_person: "Priya Shah",
        email: "priya@acme.test",
        opportunity_worth: Some(12_000),
    },
    SeedClient {
        name: "Globex Industries",
        contact_person: "Hank Scorpio",
        email: "hank@globex.test",
        opportunity_worth: None,
    },
    SeedClient {
        name: "Initech LLC",
        contact_person: "Bill Lumbergh",
        email: "bill@initech.test",
        opportunity_worth: Some(4_500),
    },
];

const SEED_INVOICES: &[(SeedDocument, InvoiceStatus)] = &[
    (
        SeedDocument {
            client: 0,
            items: &[("Website redesign", 1, 2_400), ("Hosting (months)", 12, 25)],
            issued: (2026, 1, 5),
            due: (2026, 2, 4),
        },
        InvoiceStatus::Paid,
    ),
    (
        SeedDocument {
            client: 1,
            items: &[("Data migration", 1, 1_800)],
            issued: (2026, 2, 1),
            due: (2026, 3, 3),
        },
        InvoiceStatus::Sent,
    ),
    (
        SeedDocument {
            client: 2,
            items: &[("Support retainer", 3, 350)],
            issued: (2025, 11, 15),
            due: (2025, 12, 15),
        },
        InvoiceStatus::Overdue,
    ),
    (
        SeedDocument {
            client: 0,
            items: &[("SEO audit", 1, 650)],
            issued: (2026, 3, 1),
            due: (2026, 3, 31),
        },
        InvoiceStatus::Draft,
    ),
];

const SEED_QUOTATIONS: &[(SeedDocument, QuotationStatus)] = &[(
    SeedDocument {
        client: 2,
        items: &[("Mobile app MVP", 1, 9_500), ("Design workshop (days)", 2, 600)],
        issued: (2026, 3, 10),
        due: (2026, 4, 10),
    },
    QuotationStatus::Sent,
)];

const SEED_TRANSACTIONS: &[SeedTransaction] = &[
    SeedTransaction {
        income_source: Some("Consulting"),
        expense_category: None,
        vendor: None,
        amount_cents: 150_000,
        on: (2026, 1, 20),
        description: "Strategy workshop",
    },
    SeedTransaction {
        income_source: None,
        expense_category: Some("software"),
        vendor: Some("Figma"),
        amount_cents: 4_500,
        on: (2026, 2, 2),
        description: "Design tool subscription",
    },
    SeedTransaction {
        income_source: None,
        expense_category: Some("travel"),
        vendor: None,
        amount_cents: 32_075,
        on: (2026, 2, 18),
        description: "Client visit train tickets",
    },
    SeedTransaction {
        income_source: None,
        expense_category: None,
        vendor: Some("Staples"),
        amount_cents: 2_999,
        on: (2026, 3, 3),
        description: "Office supplies",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub tenant_id: TenantId,
    pub clients: usize,
    pub invoices: usize,
    pub quotations: usize,
    pub transactions: usize,
}

impl DemoDataset {
    pub async fn load(
        store: &FinanceStore,
        tenant: &TenantId,
    ) -> Result<SeedResult, RepositoryError> {
        if !store.clients.list(tenant).await?.is_empty()
            || store.invoices.count(tenant).await? > 0
            || store.quotations.count(tenant).await? > 0
        {
            return Err(RepositoryError::Conflict {
                entity: "tenant",
                key: format!("{tenant} already has ledger data"),
            });
        }

        let mut clients: Vec<Client> = Vec::with_capacity(SEED_CLIENTS.len());
        for seed in SEED_CLIENTS {
            let client = store
                .clients
                .create(
                    tenant,
                    NewClient {
                        name: seed.name.to_string(),
                        contact_person: seed.contact_person.to_string(),
                        email: seed.email.to_string(),
                        phone: None,
                        tax_id: None,
                        opportunity_worth: seed.opportunity_worth.map(Decimal::from),
                    },
                )
                .await?;
            clients.push(client);
        }

        for (index, (seed, status)) in SEED_INVOICES.iter().enumerate() {
            let draft = NewInvoice::draft(
                DocumentKind::Invoice.format_number(index as u64 + 1),
                clients[seed.client].id.clone(),
                seed_items(seed.items)?,
                Currency::Usd,
                seed_date(seed.issued)?,
                seed_date(seed.due)?,
            )
            .map_err(invalid_fixture)?;
            let invoice = store.invoices.create(tenant, draft).await?;
            if *status != InvoiceStatus::Draft {
                store.invoices.update(tenant, &invoice.id, DocumentPatch::status(*status)).await?;
            }
        }

        for (index, (seed, status)) in SEED_QUOTATIONS.iter().enumerate() {
            let draft = NewQuotation::draft(
                DocumentKind::Quotation.format_number(index as u64 + 1),
                clients[seed.client].id.clone(),
                seed_items(seed.items)?,
                Currency::Usd,
                seed_date(seed.issued)?,
                seed_date(seed.due)?,
            )
            .map_err(invalid_fixture)?;
            let quotation = store.quotations.create(tenant, draft).await?;
            if *status != QuotationStatus::Draft {
                store
                    .quotations
                    .update(tenant, &quotation.id, DocumentPatch::status(*status))
                    .await?;
            }
        }

        for seed in SEED_TRANSACTIONS {
            let kind = match seed.income_source {
                Some(source) => {
                    TransactionKind::income(Some(source.to_string())).map_err(invalid_fixture)?
                }
                None => TransactionKind::expense(
                    seed.expense_category.map(str::to_string),
                    seed.vendor.map(str::to_string),
                ),
            };
            let transaction = NewTransaction::new(
                kind,
                Decimal::new(seed.amount_cents, 2),
                Currency::Usd,
                seed_date(seed.on)?,
                seed.description,
            )
            .map_err(invalid_fixture)?;
            store.transactions.create(tenant, transaction).await?;
        }

        tracing::info!(
            event_name = "db.fixtures.loaded",
            tenant_id = %tenant,
            clients = SEED_CLIENTS.len(),
            invoices = SEED_INVOICES.len(),
            quotations = SEED_QUOTATIONS.len(),
            transactions = SEED_TRANSACTIONS.len(),
            "demo dataset loaded"
        );

        Ok(SeedResult {
            tenant_id: tenant.clone(),
            clients: SEED_CLIENTS.len(),
            invoices: SEED_INVOICES.len(),
            quotations: SEED_QUOTATIONS.len(),
            transactions: SEED_TRANSACTIONS.len(),
        })
    }

    /// Revenue the dataset books: the paid invoice's total.
    pub fn expected_revenue() -> Decimal {
        SEED_INVOICES
            .iter()
            .filter(|(_, status)| *status == InvoiceStatus::Paid)
            .flat_map(|(seed, _)| seed.items.iter())
            .map(|(_, quantity, price)| Decimal::from(*quantity) * Decimal::from(*price))
            .sum()
    }

    pub fn expected_expenses() -> Decimal {
        SEED_TRANSACTIONS
            .iter()
            .filter(|seed| seed.income_source.is_none())
            .map(|seed| Decimal::new(seed.amount_cents, 2))
            .sum()
    }
}

fn seed_items(items: &[(&str, i64, i64)]) -> Result<Vec<LineItem>, RepositoryError> {
    items
        .iter()
        .map(|(description, quantity, price)| {
            LineItem::priced(*description, Decimal::from(*quantity), Decimal::from(*price))
                .map_err(invalid_fixture)
        })
        .collect()
}

fn seed_date((year, month, day): (i32, u32, u32)) -> Result<DateTime<Utc>, RepositoryError> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single().ok_or_else(|| {
        RepositoryError::Decode(format!("invalid fixture date {year}-{month:02}-{day:02}"))
    })
}

fn invalid_fixture(error: tally_core::DomainError) -> RepositoryError {
    RepositoryError::Decode(format!("invalid fixture: {error}"))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use tally_core::domain::document::{InvoiceStatus, QuotationStatus};
    use tally_core::domain::tenant::TenantId;

    use super::DemoDataset;
    use crate::repositories::{FinanceStore, RepositoryError};
    use crate::{connect_with_settings, migrations};

    #[test]
    fn expected_totals_follow_the_seed_rows() {
        assert_eq!(DemoDataset::expected_revenue(), Decimal::from(2_700));
        assert_eq!(DemoDataset::expected_expenses(), Decimal::new(39_574, 2));
    }

    #[tokio::test]
    async fn demo_dataset_loads_into_sqlite() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = FinanceStore::sqlite(pool);
        let tenant = TenantId("demo".to_string());

        let result = DemoDataset::load(&store, &tenant).await.expect("seed");
        assert_eq!(result.clients, 3);

        let invoices = store.invoices.list(&tenant, None).await.expect("invoices");
        let numbers: Vec<&str> = invoices.iter().map(|invoice| invoice.number.as_str()).collect();
        assert_eq!(numbers, vec!["INV-001", "INV-002", "INV-003", "INV-004"]);
        assert_eq!(invoices[0].status, InvoiceStatus::Paid);

        let quotations = store.quotations.list(&tenant, None).await.expect("quotations");
        assert_eq!(quotations.len(), 1);
        assert_eq!(quotations[0].status, QuotationStatus::Sent);
        assert_eq!(quotations[0].total_amount, Decimal::from(10_700));
    }

    #[tokio::test]
    async fn demo_dataset_refuses_a_populated_tenant() {
        let store = FinanceStore::in_memory();
        let tenant = TenantId("demo".to_string());
        DemoDataset::load(&store, &tenant).await.expect("first seed");

        let second = DemoDataset::load(&store, &tenant).await;
        assert!(matches!(second, Err(RepositoryError::Conflict { entity: "tenant", .. })));
    }
}
