// Path: crates/policy/src/gas.rs

//! Gas metering for policy evaluation.
//!
//! Every evaluation runs under a hard cap so a hostile envelope cannot
//! turn the ingress gate into a denial-of-service vector. Costs are fixed
//! per operation class.

use thiserror::Error;

/// Cost of reading one envelope field.
pub const COST_FIELD_ACCESS: u64 = 1;
/// Cost of one comparison.
pub const COST_COMPARISON: u64 = 2;
/// Cost of one set-membership check.
pub const COST_SET_MEMBERSHIP: u64 = 5;
/// Cost per item iterated.
pub const COST_ITERATION_PER_ITEM: u64 = 10;
/// Cost of one rule-function invocation.
pub const COST_FUNCTION_CALL: u64 = 20;

/// Default evaluation cap.
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("gas limit exceeded: {used} > {limit}")]
pub struct GasExceeded {
    pub used: u64,
    pub limit: u64,
}

#[derive(Debug)]
pub struct GasMeter {
    limit: u64,
    used: u64,
    operations: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            operations: 0,
        }
    }

    /// Consume `amount` gas. Usage is tracked even past the cap so the
    /// reported total reflects what the evaluation tried to spend.
    pub fn consume(&mut self, amount: u64) -> Result<(), GasExceeded> {
        self.used = self.used.saturating_add(amount);
        self.operations += 1;
        if self.used > self.limit {
            return Err(GasExceeded {
                used: self.used,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub fn field_access(&mut self) -> Result<(), GasExceeded> {
        self.consume(COST_FIELD_ACCESS)
    }

    pub fn comparison(&mut self) -> Result<(), GasExceeded> {
        self.consume(COST_COMPARISON)
    }

    pub fn set_membership(&mut self) -> Result<(), GasExceeded> {
        self.consume(COST_SET_MEMBERSHIP)
    }

    pub fn iteration(&mut self, items: u64) -> Result<(), GasExceeded> {
        self.consume(COST_ITERATION_PER_ITEM.saturating_mul(items))
    }

    pub fn function_call(&mut self) -> Result<(), GasExceeded> {
        self.consume(COST_FUNCTION_CALL)
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn operations(&self) -> u64 {
        self.operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_tracks_and_caps() {
        let mut meter = GasMeter::new(10);
        meter.consume(4).unwrap();
        meter.consume(6).unwrap();
        assert_eq!(meter.used(), 10);
        assert_eq!(meter.remaining(), 0);

        let err = meter.consume(1).unwrap_err();
        assert_eq!(err, GasExceeded { used: 11, limit: 10 });
        // Usage keeps accumulating past the cap.
        assert_eq!(meter.used(), 11);
    }

    #[test]
    fn test_operation_costs() {
        let mut meter = GasMeter::new(1000);
        meter.field_access().unwrap();
        meter.comparison().unwrap();
        meter.set_membership().unwrap();
        meter.iteration(3).unwrap();
        meter.function_call().unwrap();
        assert_eq!(meter.used(), 1 + 2 + 5 + 30 + 20);
        assert_eq!(meter.operations(), 5);
    }
}
