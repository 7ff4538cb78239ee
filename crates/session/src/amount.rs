//! Detects a change in the final tax amount after the filer has seen it.

use serde::Serialize;
use tracing::info;

use taxflow_core::{ConcretePath, FactGraph, FactValue, FlowResult};

use crate::interceptor::InterceptingFactGraph;

const FINAL_TAX_AMOUNT: &str = "/finalTaxAmount";
const HAS_SEEN_AMOUNT: &str = "/flowHasSeenAmount";
const HAS_AMOUNT_CHANGED: &str = "/flowHasAmountChanged";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AmountChange {
    Unchanged,
    /// The first complete amount this session saw.
    FirstRecorded,
    /// The filer had seen the amount and it differs from the last one
    /// recorded. The change flag was set and saved.
    Changed,
}

impl<G: FactGraph> InterceptingFactGraph<G> {
    /// Reads the final tax amount and compares it with the last amount
    /// recorded by this session. Call after reading the amount for display.
    pub fn check_and_record_amount_change(&mut self) -> FlowResult<AmountChange> {
        let amount = self.get(&ConcretePath::parse(FINAL_TAX_AMOUNT)?);
        let seen = self.get(&ConcretePath::parse(HAS_SEEN_AMOUNT)?);
        if !amount.complete {
            return Ok(AmountChange::Unchanged);
        }
        let current = amount.get().map(FactValue::to_string);

        let mut result = AmountChange::Unchanged;
        if self.previous_final_tax_amount.is_none() {
            self.previous_final_tax_amount = current.clone();
            result = AmountChange::FirstRecorded;
        }

        if seen.complete_bool() == Some(true) && current != self.previous_final_tax_amount {
            info!(
                previous = ?self.previous_final_tax_amount,
                current = ?current,
                "Final tax amount changed after it was shown"
            );
            self.set(&ConcretePath::parse(HAS_AMOUNT_CHANGED)?, FactValue::Boolean(true))?;
            self.previous_final_tax_amount = current;
            self.save()?;
            return Ok(AmountChange::Changed);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use taxflow_core::{Collection, Dollar};
    use taxflow_factgraph::demo::demo_dictionary;
    use taxflow_factgraph::MemoryFactGraph;
    use taxflow_flow::demo::{demo_flow, REVIEW_SCREEN_ROUTE};
    use taxflow_flow::FlowConfig;

    fn path(raw: &str) -> ConcretePath {
        ConcretePath::parse(raw).unwrap()
    }

    fn set_wages(g: &mut InterceptingFactGraph<MemoryFactGraph>, cents: i64) {
        g.set(&path("/formW2s/#x/wages"), FactValue::Dollar(Dollar::from_cents(cents)))
            .unwrap();
        g.save().unwrap();
    }

    #[test]
    fn changes_are_reported_once_the_amount_was_seen() {
        let flow = Arc::new(FlowConfig::compile(&demo_flow()).unwrap());
        let mut g = InterceptingFactGraph::new(MemoryFactGraph::new(demo_dictionary()), flow, REVIEW_SCREEN_ROUTE);
        g.set_current_route("/flow/your-taxes/payment/tax-amount");
        assert_eq!(g.check_and_record_amount_change().unwrap(), AmountChange::Unchanged);

        g.set(&path("/formW2s"), FactValue::Collection(Collection::new(["x"])))
            .unwrap();
        set_wages(&mut g, 1_000_000);
        assert_eq!(g.check_and_record_amount_change().unwrap(), AmountChange::FirstRecorded);

        // Not seen yet: a new amount is not a change.
        set_wages(&mut g, 2_000_000);
        assert_eq!(g.check_and_record_amount_change().unwrap(), AmountChange::Unchanged);

        g.set(&path("/flowHasSeenAmount"), FactValue::Boolean(true)).unwrap();
        set_wages(&mut g, 3_000_000);
        assert_eq!(g.check_and_record_amount_change().unwrap(), AmountChange::Changed);
        assert_eq!(g.get(&path("/flowHasAmountChanged")).complete_bool(), Some(true));
        assert_eq!(g.check_and_record_amount_change().unwrap(), AmountChange::Unchanged);
    }
}
