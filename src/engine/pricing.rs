//! Run pricing and the creator/platform split.

use serde::{Deserialize, Serialize};

use super::StepCostEntry;
use crate::workflow::Pricing;

/// What a run charges and who receives it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revenue {
    pub total_cost: f64,
    pub creator_revenue: f64,
    pub platform_revenue: f64,
}

impl Revenue {
    /// Split `total_cost`, giving `revenue_share` percent to the creator.
    pub fn split(total_cost: f64, revenue_share: f64) -> Self {
        let creator_revenue = total_cost * revenue_share / 100.0;
        Self {
            total_cost,
            creator_revenue,
            platform_revenue: total_cost - creator_revenue,
        }
    }

    /// Same amounts rounded to 6 decimals, for display.
    pub fn rounded(&self) -> Self {
        Self {
            total_cost: round6(self.total_cost),
            creator_revenue: round6(self.creator_revenue),
            platform_revenue: round6(self.platform_revenue),
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Sum of the ledger.
pub fn step_cost_total(ledger: &[StepCostEntry]) -> f64 {
    ledger.iter().map(|entry| entry.cost).sum()
}

/// Charge for a completed run: never below the base price, more when the
/// steps cost more.
pub fn calculate_revenue(pricing: &Pricing, revenue_share: f64, ledger: &[StepCostEntry]) -> Revenue {
    let total = step_cost_total(ledger).max(pricing.base_price);
    Revenue::split(total, revenue_share)
}

/// Charge for a failed run: only the work that was done.
pub fn partial_revenue(revenue_share: f64, ledger: &[StepCostEntry]) -> Revenue {
    Revenue::split(step_cost_total(ledger), revenue_share)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing(base_price: f64) -> Pricing {
        Pricing {
            base_price,
            currency: "USDC".to_string(),
            dynamic_pricing: false,
        }
    }

    fn entry(step_id: &str, cost: f64) -> StepCostEntry {
        StepCostEntry {
            step_id: step_id.to_string(),
            cost,
            tool: None,
        }
    }

    #[test]
    fn test_step_costs_above_base_price() {
        let revenue = calculate_revenue(&pricing(0.05), 70.0, &[entry("search", 0.08)]).rounded();
        assert_eq!(revenue.total_cost, 0.08);
        assert_eq!(revenue.creator_revenue, 0.056);
        assert_eq!(revenue.platform_revenue, 0.024);
    }

    #[test]
    fn test_base_price_is_floor() {
        let ledger = [entry("a", 0.01), entry("b", 0.005)];
        let revenue = calculate_revenue(&pricing(0.05), 70.0, &ledger);
        assert_eq!(revenue.total_cost, 0.05);

        let empty = calculate_revenue(&pricing(0.05), 70.0, &[]);
        assert_eq!(empty.total_cost, 0.05);
    }

    #[test]
    fn test_split_adds_up() {
        for share in [0.0, 33.3, 70.0, 100.0] {
            let revenue = calculate_revenue(&pricing(0.1), share, &[entry("a", 0.37)]);
            let sum = revenue.creator_revenue + revenue.platform_revenue;
            assert!((sum - revenue.total_cost).abs() < 1e-12);
        }
    }

    #[test]
    fn test_failed_run_has_no_floor() {
        let revenue = partial_revenue(70.0, &[entry("a", 0.01)]).rounded();
        assert_eq!(revenue.total_cost, 0.01);
        assert_eq!(revenue.creator_revenue, 0.007);

        assert_eq!(partial_revenue(70.0, &[]).total_cost, 0.0);
    }

    #[test]
    fn test_pure_and_repeatable() {
        let ledger = [entry("a", 0.02), entry("b", 0.04)];
        let first = calculate_revenue(&pricing(0.05), 70.0, &ledger);
        let second = calculate_revenue(&pricing(0.05), 70.0, &ledger);
        assert_eq!(first, second);
    }
}
