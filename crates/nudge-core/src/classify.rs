//! Keyword category classifier and bounded backfill
//!
//! `classify` never overrides a category a person already picked. The
//! backfill touches at most `limit` rows per run and its write is guarded on
//! the category still being empty, so concurrent edits always win.

use serde::Serialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::Result;
use crate::text::fold;

/// Fallback category when no keyword matches
pub const OTHER: &str = "Other";

/// Streaming and cloud-service terms
pub const SUBSCRIPTION_TERMS: &[&str] = &[
    "netflix",
    "spotify",
    "disney",
    "prime video",
    "hbo",
    "max.com",
    "youtube premium",
    "deezer",
    "globoplay",
    "paramount",
    "apple.com/bill",
    "icloud",
    "google one",
    "dropbox",
    "chatgpt",
    "assinatura",
];

/// Food delivery and food-service terms
pub const DELIVERY_TERMS: &[&str] = &[
    "ifood",
    "rappi",
    "uber eats",
    "ubereats",
    "delivery",
    "restaurante",
    "lanchonete",
    "pizzaria",
    "hamburgueria",
    "padaria",
    "mcdonalds",
    "burger king",
];

/// Ordered keyword table; the first category with a matching term wins
const RULES: &[(&str, &[&str])] = &[
    ("Card Payment", &["pagamento fatura", "pagto fatura", "card payment"]),
    ("Food", DELIVERY_TERMS),
    ("Subscriptions", SUBSCRIPTION_TERMS),
    (
        "Groceries",
        &["supermercado", "mercado", "carrefour", "assai", "atacadao", "hortifruti"],
    ),
    (
        "Transport",
        &[
            "uber", "99app", "99 pop", "cabify", "posto", "combustivel", "gasolina", "etanol",
            "estacionamento", "pedagio", "metro", "onibus",
        ],
    ),
    (
        "Investments",
        &[
            "corretora", "tesouro direto", "xp investimentos", "nuinvest", "rico", "cdb", "btg",
            "aplicacao",
        ],
    ),
    (
        "Housing",
        &["aluguel", "condominio", "energia", "enel", "sabesp", "agua", "luz", "gas", "iptu"],
    ),
    (
        "Health",
        &["farmacia", "drogaria", "drogasil", "hospital", "clinica", "laboratorio", "plano de saude"],
    ),
    ("Education", &["escola", "faculdade", "curso", "udemy", "alura", "livraria"]),
    (
        "Shopping",
        &["amazon", "mercado livre", "mercadolivre", "shopee", "magalu", "shein", "aliexpress"],
    ),
    ("Leisure", &["cinema", "ingresso", "show", "teatro", "viagem", "hotel", "airbnb"]),
];

/// Resolve a category for a ledger description
///
/// A non-empty `existing` category is returned unchanged.
pub fn classify(description: &str, existing: Option<&str>) -> String {
    if let Some(existing) = existing.map(str::trim).filter(|c| !c.is_empty()) {
        return existing.to_string();
    }

    let folded = fold(description);
    RULES
        .iter()
        .find(|(_, terms)| matches_any(&folded, terms))
        .map(|(category, _)| category.to_string())
        .unwrap_or_else(|| OTHER.to_string())
}

/// True if any term occurs in `folded` as a whole word or phrase
///
/// `folded` must already be folded; terms are lowercase ASCII.
pub fn matches_any(folded: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| contains_term(folded, term))
}

fn contains_term(haystack: &str, term: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric();

    haystack.match_indices(term).any(|(start, _)| {
        let end = start + term.len();
        let before_ok = haystack[..start].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        before_ok && after_ok
    })
}

/// Outcome of one backfill pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub updated: usize,
}

/// Categorize up to `limit` of the user's most recent uncategorized rows
///
/// Unmatched rows are written as "Other" so they leave the scan window.
pub fn backfill_categories(db: &Database, user_id: &str, limit: usize) -> Result<BackfillReport> {
    let entries = db.list_uncategorized_entries(user_id, limit)?;
    let mut report = BackfillReport {
        scanned: entries.len(),
        updated: 0,
    };

    for entry in &entries {
        let category = classify(&entry.description, None);
        if db.set_entry_category_if_missing(entry.id, &category)? {
            debug!(entry_id = entry.id, category = %category, "Backfilled category");
            report.updated += 1;
        }
    }

    if report.updated > 0 {
        info!(
            user_id = user_id,
            scanned = report.scanned,
            updated = report.updated,
            "Category backfill complete"
        );
    }

    Ok(report)
}
