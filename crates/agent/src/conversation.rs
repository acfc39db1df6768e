//! Deterministic planner that speaks the same tool-calling protocol as a hosted model.
//!
//! It recognises a bounded set of request shapes (record income or an expense, add a client,
//! create an invoice or quotation, list records, change a document status, summarise) and
//! declines anything outside the finance domain. Requests chained with "then" become several
//! calls, emitted in the order written so a client is created before it is invoiced. On the
//! follow-up step it turns the tool results into the final reply: confirmations verbatim,
//! records summarised in prose, failures explained.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use tally_core::domain::document::{DocumentStatus, InvoiceStatus, QuotationStatus};
use tally_core::domain::money::Currency;

use crate::llm::{
    ChatMessage, ChatResponse, LlmClient, LlmError, Role, ToolCall, ToolSpec, TOOL_ERROR_PREFIX,
};
use crate::prompt::prompt_instant;
use crate::tools;

pub const DECLINE_MESSAGE: &str = "Sorry, I can only help with your financial records: \
    transactions, clients, invoices, quotations and financial summaries.";

const UNAVAILABLE_MESSAGE: &str = "That action isn't available right now.";

/// Days until an invoice or quotation falls due when the request names no due date.
pub const DEFAULT_PAYMENT_TERMS_DAYS: i64 = 30;

const CLAUSE_SEPARATORS: &[&str] = &[" and then ", ", then ", " then ", "; ", ". "];
const CLIENT_PRONOUNS: &[&str] = &["them", "him", "her", "it", "they", "that client", "the client"];
const FINANCE_WORDS: &[&str] = &[
    "invoice", "quotation", "quote", "client", "customer", "expense", "income", "revenue",
    "profit", "transaction", "payment", "money", "spent", "paid", "budget",
];

#[derive(Clone, Debug, Default)]
pub struct RuleBasedPlanner;

impl RuleBasedPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Maps a question to the calls it implies plus any notes for clauses that could not be
    /// turned into a call. A question with neither is out of domain.
    pub fn plan(&self, question: &str, now: DateTime<Utc>) -> Plan {
        let mut plan = Plan::default();
        let mut last_client: Option<String> = None;
        let mut finance_related = false;

        for clause in split_clauses(question) {
            let lowered = clause.to_ascii_lowercase();
            finance_related |= FINANCE_WORDS.iter().any(|word| lowered.contains(word));

            match interpret(&clause, &lowered, now, &mut last_client) {
                Some(Step::Call(tool, arguments)) => {
                    plan.calls.push(PlannedCall { tool, arguments });
                }
                Some(Step::Note(note)) => plan.notes.push(note),
                None => {}
            }
        }

        if plan.calls.is_empty() && plan.notes.is_empty() {
            plan.notes.push(if finance_related {
                "I couldn't work out what to do with that. Try something like \"Add an expense \
                 of 45 for office supplies\", \"List my overdue invoices\" or \"Mark INV-001 as \
                 paid\"."
                    .to_string()
            } else {
                DECLINE_MESSAGE.to_string()
            });
        }
        plan
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    pub calls: Vec<PlannedCall>,
    pub notes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedCall {
    pub tool: &'static str,
    pub arguments: Value,
}

enum Step {
    Call(&'static str, Value),
    Note(String),
}

#[async_trait]
impl LlmClient for RuleBasedPlanner {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatResponse, LlmError> {
        let question_index = messages
            .iter()
            .rposition(|message| message.role == Role::User)
            .ok_or_else(|| LlmError::Api("conversation has no user message".to_string()))?;
        let question = messages[question_index].content.as_deref().unwrap_or_default();
        let turn = &messages[question_index + 1..];
        let now = messages
            .iter()
            .filter(|message| message.role == Role::System)
            .find_map(|message| message.content.as_deref().and_then(prompt_instant))
            .unwrap_or_else(Utc::now);
        let plan = self.plan(question, now);

        if turn.iter().any(|message| message.role == Role::Tool) {
            return Ok(ChatResponse::text(compose_reply(turn, &plan.notes)));
        }

        let available: HashSet<&str> = tools.iter().map(|tool| tool.name).collect();
        let planned = plan.calls.len();
        let calls: Vec<ToolCall> = plan
            .calls
            .into_iter()
            .filter(|call| available.contains(call.tool))
            .enumerate()
            .map(|(index, call)| ToolCall {
                id: format!("call_{}", index + 1),
                name: call.tool.to_string(),
                arguments: call.arguments,
            })
            .collect();

        if calls.is_empty() {
            if planned > 0 {
                return Ok(ChatResponse::text(UNAVAILABLE_MESSAGE));
            }
            return Ok(ChatResponse::text(compose_reply(&[], &plan.notes)));
        }
        Ok(ChatResponse::calls(calls))
    }
}

fn interpret(
    clause: &str,
    lowered: &str,
    now: DateTime<Utc>,
    last_client: &mut Option<String>,
) -> Option<Step> {
    if is_summary_request(lowered) {
        return Some(Step::Call(tools::GET_FINANCIAL_SUMMARY, json!({})));
    }
    if let Some(step) = status_update(clause) {
        return Some(step);
    }
    if let Some(step) = list_request(lowered) {
        return Some(step);
    }
    if mentions_any(lowered, &["client", "customer"])
        && mentions_any(lowered, &["add", "create", "new", "register", "onboard"])
        && !mentions_any(lowered, &["invoice", "quotation", "quote"])
    {
        return Some(add_client(clause, last_client));
    }
    if mentions_any(lowered, &["invoice", "quotation", "quote"]) {
        return Some(create_document(clause, lowered, now, last_client.as_deref()));
    }
    if mentions_any(lowered, &["expense", "spent", "spend", "bought", "purchase", "paid for"]) {
        return Some(add_transaction("expense", clause, lowered, now));
    }
    if mentions_any(lowered, &["income", "received", "earned", "got paid", "payment from"]) {
        return Some(add_transaction("income", clause, lowered, now));
    }
    None
}

fn is_summary_request(lowered: &str) -> bool {
    mentions_any(
        lowered,
        &[
            "summary",
            "profit",
            "revenue",
            "how am i doing",
            "how are my finances",
            "financial overview",
            "total expenses",
            "how much did i spend",
            "how much have i spent",
        ],
    )
}

fn status_update(clause: &str) -> Option<Step> {
    let number = clause.split_whitespace().map(clean_token).find_map(document_number)?;
    let lowered = clause.to_ascii_lowercase();

    if number.starts_with("INV-") {
        Some(match find_status::<InvoiceStatus>(&lowered) {
            Some(status) => Step::Call(
                tools::UPDATE_INVOICE_STATUS,
                json!({"invoiceNumber": number, "status": status.as_str()}),
            ),
            None => Step::Note(missing_status_note::<InvoiceStatus>(&number)),
        })
    } else {
        Some(match find_status::<QuotationStatus>(&lowered) {
            Some(status) => Step::Call(
                tools::UPDATE_QUOTATION_STATUS,
                json!({"quotationNumber": number, "status": status.as_str()}),
            ),
            None => Step::Note(missing_status_note::<QuotationStatus>(&number)),
        })
    }
}

fn missing_status_note<S: DocumentStatus>(number: &str) -> String {
    format!(
        "Which status should {number} have? Use one of: {}.",
        S::allowed_values().join(", ")
    )
}

fn document_number(token: &str) -> Option<String> {
    let upper = token.to_ascii_uppercase();
    let digits = upper.strip_prefix("INV-").or_else(|| upper.strip_prefix("QUO-"))?;
    (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then_some(upper)
}

fn list_request(lowered: &str) -> Option<Step> {
    const LIST_VERBS: &[&str] = &[
        "list", "show", "what are", "which", "display", "give me", "see my", "view", "who are",
        "how many", "any ",
    ];
    const OWNED_RECORDS: &[&str] =
        &["my clients", "my customers", "my invoices", "my quotations", "my quotes"];

    let asks_to_list = LIST_VERBS
        .iter()
        .any(|verb| lowered.starts_with(verb) || lowered.contains(&format!(" {verb}")))
        || mentions_any(lowered, OWNED_RECORDS);
    if !asks_to_list {
        return None;
    }

    if mentions_any(lowered, &["quotation", "quote"]) {
        let mut arguments = Map::new();
        if let Some(status) = find_status::<QuotationStatus>(lowered) {
            arguments.insert("status".to_string(), json!(status.as_str()));
        }
        return Some(Step::Call(tools::LIST_QUOTATIONS, Value::Object(arguments)));
    }
    if lowered.contains("invoice") {
        let mut arguments = Map::new();
        if let Some(status) = find_status::<InvoiceStatus>(lowered) {
            arguments.insert("status".to_string(), json!(status.as_str()));
        }
        return Some(Step::Call(tools::LIST_INVOICES, Value::Object(arguments)));
    }
    if mentions_any(lowered, &["client", "customer"]) {
        return Some(Step::Call(tools::LIST_CLIENTS, json!({})));
    }
    None
}

fn find_status<S: DocumentStatus>(lowered: &str) -> Option<S> {
    lowered.split_whitespace().map(clean_token).find_map(|word| S::parse(word).ok())
}

fn add_client(clause: &str, last_client: &mut Option<String>) -> Step {
    const NAME_END: &[&str] =
        &[",", " with ", " and ", " contact", " email", " whose", " phone", " ("];
    const CONTACT_END: &[&str] = &[",", " and ", " with ", " email", " at ", " phone", " ("];
    const PHONE_END: &[&str] = &[",", " and ", " with ", " email"];

    let name = field(clause, &["named ", "called "], NAME_END);
    let contact = field(
        clause,
        &["contact person is ", "contact person ", "contact is ", "contact "],
        CONTACT_END,
    );
    let email = clause
        .split_whitespace()
        .map(|token| clean_token(token).trim_start_matches('<').trim_end_matches('>'))
        .find(|token| token.contains('@'))
        .map(str::to_string);

    let (Some(name), Some(contact), Some(email)) = (name, contact, email) else {
        return Step::Note(
            "To add a client I need a name, a contact person and an email address, for example \
             \"Add a client named Acme Corp with contact Dana Reyes, email dana@acme.com\"."
                .to_string(),
        );
    };

    let mut arguments = Map::new();
    arguments.insert("name".to_string(), json!(name));
    arguments.insert("contactPerson".to_string(), json!(contact));
    arguments.insert("email".to_string(), json!(email));
    if let Some(phone) = field(clause, &["phone number ", "phone "], PHONE_END) {
        arguments.insert("phone".to_string(), json!(phone));
    }
    if let Some(worth) = after_marker(clause, &["worth "]).and_then(first_amount) {
        arguments.insert("opportunityWorth".to_string(), number_value(worth));
    }

    *last_client = Some(name);
    Step::Call(tools::ADD_CLIENT, Value::Object(arguments))
}

fn create_document(
    clause: &str,
    lowered: &str,
    now: DateTime<Utc>,
    last_client: Option<&str>,
) -> Step {
    const CLIENT_END: &[&str] = &[" for ", ":", " with ", " due", ",", " in "];
    const ITEMS_END: &[&str] =
        &[" due", " in usd", " in eur", " in gbp", " in inr", " in aed", " in cad"];

    let (tool, label, keyword) = if mentions_any(lowered, &["quotation", "quote"]) {
        let keyword = if lowered.contains("quotation") { "quotation" } else { "quote" };
        (tools::CREATE_QUOTATION, "quotation", keyword)
    } else {
        (tools::CREATE_INVOICE, "invoice", "invoice")
    };

    let Some(rest) = after_marker(clause, &[keyword]) else {
        return Step::Note(format!("Tell me which client the {label} is for."));
    };
    let rest = strip_prefix_ci(rest.trim_start_matches('s').trim(), &["for ", "to "]);
    let client_text = until_terminator(rest, CLIENT_END);
    let client = if CLIENT_PRONOUNS.contains(&client_text.to_ascii_lowercase().as_str()) {
        last_client.map(str::to_string)
    } else {
        Some(clean(client_text)).filter(|name| !name.is_empty())
    };
    let Some(client) = client else {
        return Step::Note(format!("Tell me which client the {label} is for."));
    };

    let after_client = &rest[client_text.len().min(rest.len())..];
    let items_text = strip_prefix_ci(after_client.trim_start(), &["for ", ":", "with ", ","]);
    let items_text = until_terminator(items_text, ITEMS_END);
    let items = match parse_items(items_text) {
        Ok(items) if !items.is_empty() => items,
        Ok(_) => {
            return Step::Note(format!(
                "To create the {label} I need at least one line item with a price, for example \
                 \"2 hours of consulting at 50\"."
            ))
        }
        Err(note) => return Step::Note(note),
    };

    let mut arguments = Map::new();
    arguments.insert("clientName".to_string(), json!(client));
    arguments.insert("items".to_string(), Value::Array(items));
    arguments.insert("dueDate".to_string(), json!(due_date(clause, now)));
    if let Some(currency) = find_currency(clause) {
        arguments.insert("currency".to_string(), json!(currency.code()));
    }
    Step::Call(tool, Value::Object(arguments))
}

fn parse_items(text: &str) -> Result<Vec<Value>, String> {
    let mut items = Vec::new();
    for part in split_ci(text, &[" and ", ", ", "; ", " plus "]) {
        let part = clean(part);
        if part.is_empty() {
            continue;
        }

        let lowered = part.to_ascii_lowercase();
        let price_marker = lowered
            .rfind(" at ")
            .map(|index| (index, 4))
            .or_else(|| lowered.rfind('@').map(|index| (index, 1)));
        let Some((at, width)) = price_marker else {
            return Err(format!(
                "I couldn't find a price for \"{part}\". Write items like \"2 hours of \
                 consulting at 50\"."
            ));
        };
        let Some(unit_price) = first_amount(&part[at + width..]) else {
            return Err(format!("I couldn't read the price in \"{part}\"."));
        };

        let tokens: Vec<&str> = part[..at].split_whitespace().collect();
        let (quantity, tokens) = match tokens.split_first() {
            Some((first, rest)) => match parse_quantity(first) {
                Some(quantity) => (quantity, rest),
                None => (Decimal::ONE, &tokens[..]),
            },
            None => (Decimal::ONE, &tokens[..]),
        };
        let description = tokens.join(" ");
        let description = strip_prefix_ci(
            &description,
            &["x ", "hours of ", "hour of ", "units of ", "unit of ", "days of ", "of "],
        );
        let description = if description.is_empty() { "Services" } else { description };

        items.push(json!({
            "description": description,
            "quantity": number_value(quantity),
            "unitPrice": number_value(unit_price),
        }));
    }
    Ok(items)
}

fn parse_quantity(token: &str) -> Option<Decimal> {
    let trimmed = token.trim_end_matches(|c: char| matches!(c, 'x' | 'X' | '×'));
    Decimal::from_str(trimmed).ok().filter(|quantity| *quantity > Decimal::ZERO)
}

fn add_transaction(kind: &'static str, clause: &str, lowered: &str, now: DateTime<Utc>) -> Step {
    const DESCRIPTION_END: &[&str] = &[
        " from ", " at ", " in category", " category ", " under ", " on 20", " yesterday", " today",
        ",",
    ];
    const PARTY_END: &[&str] = &[" for ", " on ", " in ", " category", " under ", ",", " as "];
    const CATEGORY_END: &[&str] = &[" from ", " at ", " for ", " on ", ","];

    let amount_text =
        after_marker(clause, &[" of ", "spent ", "received ", "earned "]).unwrap_or(clause);
    let Some(amount) = first_amount(amount_text).or_else(|| first_amount(clause)) else {
        return Step::Note(format!("How much was the {kind}? Please include an amount."));
    };

    let mut arguments = Map::new();
    arguments.insert("type".to_string(), json!(kind));
    arguments.insert("amount".to_string(), number_value(amount));

    let description = field(clause, &[" for "], DESCRIPTION_END).or_else(|| {
        if kind == "expense" {
            after_marker(clause, &[" on "])
                .filter(|rest| !rest.trim_start().starts_with("20"))
                .map(|rest| clean(until_terminator(rest, DESCRIPTION_END)))
                .filter(|text| !text.is_empty())
        } else {
            None
        }
    });

    if kind == "income" {
        let source = field(clause, &[" from "], PARTY_END);
        if let Some(source) = &source {
            arguments.insert("source".to_string(), json!(source));
        }
        let description = description
            .or_else(|| source.as_ref().map(|source| format!("Income from {source}")))
            .unwrap_or_else(|| "Income".to_string());
        arguments.insert("description".to_string(), json!(description));
    } else {
        let category = field(clause, &["category ", "under "], CATEGORY_END);
        let vendor = field(clause, &[" at ", " from "], PARTY_END);
        let description = description
            .or_else(|| category.clone())
            .unwrap_or_else(|| "Expense".to_string());
        arguments.insert("description".to_string(), json!(description));
        if let Some(category) = category {
            arguments.insert("category".to_string(), json!(category.to_ascii_lowercase()));
        }
        if let Some(vendor) = vendor {
            arguments.insert("vendor".to_string(), json!(vendor));
        }
    }

    if let Some(date) = find_date(clause, lowered, now) {
        arguments.insert("date".to_string(), json!(date));
    }
    if let Some(currency) = find_currency(clause) {
        arguments.insert("currency".to_string(), json!(currency.code()));
    }
    Step::Call(tools::ADD_TRANSACTION, Value::Object(arguments))
}

fn find_date(clause: &str, lowered: &str, now: DateTime<Utc>) -> Option<String> {
    if let Some(date) = clause.split_whitespace().map(clean_token).find_map(iso_date) {
        return Some(date.to_string());
    }
    if lowered.contains("yesterday") {
        return Some((now - Duration::days(1)).date_naive().to_string());
    }
    lowered.contains("today").then(|| now.date_naive().to_string())
}

fn due_date(clause: &str, now: DateTime<Utc>) -> String {
    if let Some(rest) = after_marker(clause, &[" due on ", " due by ", " due "]) {
        let tokens: Vec<&str> = rest.split_whitespace().map(clean_token).collect();
        if let Some(date) = tokens.first().copied().and_then(iso_date) {
            return date.to_string();
        }
        if let ["in", count, unit, ..] = tokens.as_slice() {
            if let Ok(count) = count.parse::<i64>() {
                let days = if unit.starts_with("week") { count * 7 } else { count };
                return (now + Duration::days(days)).date_naive().to_string();
            }
        }
        if tokens.starts_with(&["next", "month"]) {
            return (now + Duration::days(DEFAULT_PAYMENT_TERMS_DAYS)).date_naive().to_string();
        }
    }
    (now + Duration::days(DEFAULT_PAYMENT_TERMS_DAYS)).date_naive().to_string()
}

fn iso_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

fn find_currency(clause: &str) -> Option<Currency> {
    if clause.contains('€') {
        return Some(Currency::Eur);
    }
    if clause.contains('£') {
        return Some(Currency::Gbp);
    }
    clause.split_whitespace().map(clean_token).find_map(|token| {
        Currency::ALL.into_iter().find(|currency| token.eq_ignore_ascii_case(currency.code()))
    })
}

/// First token that reads as an amount: `45`, `$120.50`, `1,500`, `5k`.
fn first_amount(text: &str) -> Option<Decimal> {
    text.split_whitespace().find_map(parse_money_token)
}

fn parse_money_token(token: &str) -> Option<Decimal> {
    let trimmed = clean_token(token).trim_start_matches(|c: char| matches!(c, '$' | '€' | '£'));
    if trimmed.is_empty() {
        return None;
    }

    let (number_part, multiplier) = match trimmed.strip_suffix(|c: char| matches!(c, 'k' | 'K')) {
        Some(prefix) => (prefix, Decimal::from(1_000)),
        None => (trimmed, Decimal::ONE),
    };
    let digits: String = number_part.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&digits).ok().and_then(|amount| amount.checked_mul(multiplier))
}

/// Whole amounts go out as JSON integers, anything else as a float.
fn number_value(amount: Decimal) -> Value {
    if amount.fract().is_zero() {
        if let Some(whole) = amount.to_i64() {
            return json!(whole);
        }
    }
    amount.to_f64().map_or(Value::Null, |amount| json!(amount))
}

fn compose_reply(turn: &[ChatMessage], notes: &[String]) -> String {
    let calls: HashMap<&str, &ToolCall> = turn
        .iter()
        .flat_map(|message| message.tool_calls.iter())
        .map(|call| (call.id.as_str(), call))
        .collect();

    let mut paragraphs: Vec<String> = turn
        .iter()
        .filter(|message| message.role == Role::Tool)
        .map(|message| {
            let tool = message
                .tool_call_id
                .as_deref()
                .and_then(|id| calls.get(id))
                .map_or("", |call| call.name.as_str());
            describe_result(tool, message.content.as_deref().unwrap_or_default())
        })
        .collect();
    paragraphs.extend(notes.iter().cloned());

    if paragraphs.is_empty() {
        return "Done.".to_string();
    }
    paragraphs.join("\n")
}

fn describe_result(tool: &str, content: &str) -> String {
    if let Some(error) = content.strip_prefix(TOOL_ERROR_PREFIX) {
        return format!("I couldn't {}: {error}", action_phrase(tool));
    }

    let Ok(records) = serde_json::from_str::<Value>(content) else {
        return content.to_string();
    };
    match tool {
        tools::LIST_CLIENTS => describe_clients(&records),
        tools::LIST_INVOICES => describe_documents(&records, "invoice", "invoiceNumber"),
        tools::LIST_QUOTATIONS => describe_documents(&records, "quotation", "quotationNumber"),
        tools::GET_FINANCIAL_SUMMARY => describe_summary(&records),
        _ => content.to_string(),
    }
}

fn action_phrase(tool: &str) -> &'static str {
    match tool {
        tools::ADD_TRANSACTION => "record the transaction",
        tools::ADD_CLIENT => "add the client",
        tools::CREATE_INVOICE => "create the invoice",
        tools::CREATE_QUOTATION => "create the quotation",
        tools::UPDATE_INVOICE_STATUS => "update the invoice",
        tools::UPDATE_QUOTATION_STATUS => "update the quotation",
        tools::LIST_CLIENTS => "load your clients",
        tools::LIST_INVOICES => "load your invoices",
        tools::LIST_QUOTATIONS => "load your quotations",
        tools::GET_FINANCIAL_SUMMARY => "build your financial summary",
        _ => "complete that step",
    }
}

fn describe_clients(records: &Value) -> String {
    let clients = records.as_array().map(Vec::as_slice).unwrap_or_default();
    if clients.is_empty() {
        return "You don't have any clients yet.".to_string();
    }

    let entries: Vec<String> = clients
        .iter()
        .map(|client| {
            let name = client["name"].as_str().unwrap_or("Unnamed client");
            let status = client["status"].as_str().unwrap_or("lead");
            match client["opportunityWorth"].as_f64() {
                Some(worth) => format!("{name} ({status}, worth {worth:.2})"),
                None => format!("{name} ({status})"),
            }
        })
        .collect();
    format!("You have {}: {}.", plural(clients.len(), "client"), entries.join(", "))
}

fn describe_documents(records: &Value, label: &str, number_key: &str) -> String {
    let documents = records.as_array().map(Vec::as_slice).unwrap_or_default();
    if documents.is_empty() {
        return format!("You don't have any matching {label}s.");
    }

    let entries: Vec<String> = documents
        .iter()
        .map(|document| {
            format!(
                "{} for {} {:.2} ({}, due {})",
                document[number_key].as_str().unwrap_or("?"),
                document["currency"].as_str().unwrap_or("USD"),
                document["totalAmount"].as_f64().unwrap_or_default(),
                document["status"].as_str().unwrap_or("unknown"),
                document["dueDate"].as_str().unwrap_or("n/a"),
            )
        })
        .collect();
    format!("You have {}: {}.", plural(documents.len(), label), entries.join("; "))
}

fn describe_summary(summary: &Value) -> String {
    let amount = |key: &str| summary[key].as_f64().unwrap_or_default();
    let count = |key: &str| summary[key].as_u64().unwrap_or_default() as usize;

    format!(
        "Total revenue from paid invoices is {:.2} and total expenses are {:.2}, for a net \
         profit of {:.2}. You have {} ({} paid, {} unpaid) and {}.",
        amount("totalRevenue"),
        amount("totalExpenses"),
        amount("netProfit"),
        plural(count("totalInvoices"), "invoice"),
        count("paidInvoices"),
        count("unpaidInvoices"),
        plural(count("totalTransactions"), "transaction"),
    )
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn split_clauses(question: &str) -> Vec<String> {
    split_ci(question.trim(), CLAUSE_SEPARATORS)
        .into_iter()
        .map(|clause| strip_prefix_ci(clean(clause).as_str(), &["and ", "please "]).to_string())
        .filter(|clause| !clause.is_empty())
        .collect()
}

/// Splits on any of the lowercase `separators`, matching case-insensitively.
fn split_ci<'a>(text: &'a str, separators: &[&str]) -> Vec<&'a str> {
    let lowered = text.to_ascii_lowercase();
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some((index, width)) = separators
        .iter()
        .filter_map(|separator| {
            lowered[start..].find(separator).map(|index| (start + index, separator.len()))
        })
        .min_by_key(|(index, _)| *index)
    {
        parts.push(&text[start..index]);
        start = index + width;
    }
    parts.push(&text[start..]);
    parts
}

fn mentions_any(lowered: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| lowered.contains(needle))
}

/// Text following the earliest of `markers` (the longest one on a tie). ASCII lowercasing
/// keeps byte offsets aligned with the original.
fn after_marker<'a>(text: &'a str, markers: &[&str]) -> Option<&'a str> {
    let lowered = text.to_ascii_lowercase();
    markers
        .iter()
        .filter_map(|marker| lowered.find(marker).map(|index| (index, marker.len())))
        .min_by_key(|(index, width)| (*index, std::cmp::Reverse(*width)))
        .map(|(index, width)| &text[index + width..])
}

fn until_terminator<'a>(text: &'a str, terminators: &[&str]) -> &'a str {
    let lowered = text.to_ascii_lowercase();
    let end = terminators.iter().filter_map(|terminator| lowered.find(terminator)).min();
    text[..end.unwrap_or(text.len())].trim()
}

fn field(text: &str, markers: &[&str], terminators: &[&str]) -> Option<String> {
    after_marker(text, markers)
        .map(|rest| clean(until_terminator(rest, terminators)))
        .filter(|value| !value.is_empty())
}

fn strip_prefix_ci<'a>(text: &'a str, prefixes: &[&str]) -> &'a str {
    let lowered = text.to_ascii_lowercase();
    prefixes
        .iter()
        .find(|prefix| lowered.starts_with(*prefix))
        .map_or(text, |prefix| text[prefix.len()..].trim_start())
}

fn clean(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | '"' | '\''))
        .trim()
        .to_string()
}

fn clean_token(token: &str) -> &str {
    token
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '!' | '?' | '"' | '\'' | '(' | ')'))
        .trim_end_matches('.')
}
