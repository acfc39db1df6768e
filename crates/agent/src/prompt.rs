//! System policy handed to the model at the start of every turn.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::llm::ToolSpec;

const DATE_MARKER: &str = "Today's date is ";

const POLICY: &str = "You are Tally, a bookkeeping assistant for a small business owner.

Rules:
- Only answer questions about the user's own financial records: transactions, clients, \
invoices, quotations and financial summaries. Politely decline anything else and do not call \
any tool for it.
- Use the tools for every action and ground answers in tool results whenever possible. Never \
invent amounts, clients or document numbers.
- When a request needs several steps, call the tools in dependency order. A client must exist \
before an invoice or quotation names it.
- If an expense has no category, use \"other\".
- Confirm every action by naming the record it touched, for example \"Invoice INV-001 has been \
created for Acme Corp\". Repeat confirmation messages from tools as they are.
- Tool results that start with \"Error:\" describe a failure. Explain it plainly and carry on \
with the rest of the request.
- Summarise lists and totals in short prose instead of dumping raw data.";

/// Builds the system message for one turn. The date lets the model resolve words like "today".
pub fn system_prompt(now: DateTime<Utc>, tools: &[ToolSpec]) -> String {
    let names: Vec<&str> = tools.iter().map(|tool| tool.name).collect();
    format!(
        "{POLICY}\n\n{DATE_MARKER}{}. Available tools: {}.",
        now.date_naive(),
        if names.is_empty() { "none".to_string() } else { names.join(", ") }
    )
}

/// Reads back the turn's date from a prompt built by [`system_prompt`], as midnight UTC.
pub fn prompt_instant(prompt: &str) -> Option<DateTime<Utc>> {
    let start = prompt.find(DATE_MARKER)? + DATE_MARKER.len();
    let date = NaiveDate::parse_from_str(prompt.get(start..start + 10)?, "%Y-%m-%d").ok()?;
    Some(date.and_time(NaiveTime::MIN).and_utc())
}
