use chrono::NaiveDateTime;
use engine_config::settings::FilterRules;
use model::{
    core::window::SyncWindow,
    execution::summary::{SkipCounts, SkipReason},
    records::sale::{RawSaleRecord, SaleRecord},
};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(SaleRecord),
    Skipped(SkipReason),
}

/// Accepted records in fetch order plus the tally of everything skipped.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub accepted: Vec<SaleRecord>,
    pub skipped: SkipCounts,
}

/// Validates raw records and applies the business predicate for one window.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    rules: FilterRules,
    window: SyncWindow,
}

impl RecordFilter {
    pub fn new(rules: FilterRules, window: SyncWindow) -> Self {
        RecordFilter { rules, window }
    }

    pub fn window(&self) -> &SyncWindow {
        &self.window
    }

    pub fn accept(&self, value: &Value) -> Verdict {
        let raw = match RawSaleRecord::from_json(value) {
            Ok(raw) => raw,
            Err(_) => return Verdict::Skipped(SkipReason::Malformed),
        };

        let Some(completed_at) = self.parse_timestamp(raw.completed_at.as_deref()) else {
            return Verdict::Skipped(SkipReason::InvalidDate);
        };

        if !self.matches(&raw, completed_at) {
            return Verdict::Skipped(SkipReason::FilteredOut);
        }

        let transaction_id = match raw.transaction_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => return Verdict::Skipped(SkipReason::Malformed),
        };

        // matches() guarantees the three codes are present
        Verdict::Accepted(SaleRecord {
            sale_id: raw.sale_id,
            transaction_id,
            product_id: raw.product_id,
            net_amount: raw.net_amount,
            completed_at,
            payment_type: raw.payment_type.unwrap_or_default(),
            status: raw.status.unwrap_or_default(),
            gateway: raw.gateway.unwrap_or_default(),
            student_id: raw.student_id,
            name: raw.name,
            email: raw.email,
        })
    }

    pub fn filter_all<'a, I>(&self, records: I) -> FilterOutcome
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut outcome = FilterOutcome::default();

        for value in records {
            match self.accept(value) {
                Verdict::Accepted(record) => outcome.accepted.push(record),
                Verdict::Skipped(reason) => {
                    debug!("Skipping record ({reason}): {}", describe(value));
                    outcome.skipped.record(reason);
                }
            }
        }

        outcome
    }

    fn parse_timestamp(&self, raw: Option<&str>) -> Option<NaiveDateTime> {
        let raw = raw?.trim();
        NaiveDateTime::parse_from_str(raw, &self.rules.timestamp_format).ok()
    }

    fn matches(&self, raw: &RawSaleRecord, completed_at: NaiveDateTime) -> bool {
        let rules = &self.rules;
        raw.payment_type
            .is_some_and(|p| rules.allowed_payment_types.contains(&p))
            && raw.status == Some(rules.approved_status)
            && raw.gateway == Some(rules.required_gateway)
            && self.window.contains(completed_at)
    }
}

fn describe(value: &Value) -> String {
    value
        .get("transacao_id")
        .map(|id| format!("transacao_id={id}"))
        .unwrap_or_else(|| "no transacao_id".to_string())
}
