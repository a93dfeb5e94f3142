//! Advisory cost estimate for a run's dispatched actions.
//!
//! Pure arithmetic over the action log and a static per-action token
//! table. Estimates never gate execution; they exist so a caller can see
//! what a run would roughly cost at each price tier.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::state::ActionRecord;

/// Model price bracket, USD per million input/output tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    Economy,
    #[default]
    Balanced,
    Premium,
}

impl CostTier {
    fn usd_per_million(&self) -> (f64, f64) {
        match self {
            CostTier::Economy => (0.15, 0.60),
            CostTier::Balanced => (2.50, 10.00),
            CostTier::Premium => (15.00, 75.00),
        }
    }
}

/// Token estimate for one dispatch of a named action. Unknown names get a
/// conservative default rather than failing the estimate.
fn action_tokens(name: &str) -> (u64, u64) {
    match name {
        "identify_gaps" => (800, 400),
        "fill_slot" => (600, 300),
        "parse_constraints" => (1200, 600),
        "select_content" => (1500, 500),
        "check_violations" => (1000, 400),
        "evaluate_quality" => (900, 350),
        _ => (1000, 500),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCost {
    pub calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub tier: CostTier,
    pub total_usd: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Per-action rows in first-seen order.
    pub per_action: IndexMap<String, ActionCost>,
}

/// Group the action log by name and price it at the given tier.
pub fn estimate_cost(actions: &[ActionRecord], tier: CostTier) -> CostBreakdown {
    let (price_in, price_out) = tier.usd_per_million();

    let mut per_action: IndexMap<String, ActionCost> = IndexMap::new();
    for record in actions {
        let (input, output) = action_tokens(&record.action);
        let row = per_action
            .entry(record.action.clone())
            .or_insert(ActionCost {
                calls: 0,
                input_tokens: 0,
                output_tokens: 0,
                usd: 0.0,
            });
        row.calls += 1;
        row.input_tokens += input;
        row.output_tokens += output;
    }

    let mut total_usd = 0.0;
    let mut total_input = 0u64;
    let mut total_output = 0u64;
    for row in per_action.values_mut() {
        row.usd = row.input_tokens as f64 / 1e6 * price_in
            + row.output_tokens as f64 / 1e6 * price_out;
        total_usd += row.usd;
        total_input += row.input_tokens;
        total_output += row.output_tokens;
    }

    CostBreakdown {
        tier,
        total_usd,
        total_input_tokens: total_input,
        total_output_tokens: total_output,
        per_action,
    }
}
