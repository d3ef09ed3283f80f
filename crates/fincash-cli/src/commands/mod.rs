pub mod capital_budgeting;
pub mod derivatives;
pub mod engine;
pub mod fixed_income;
pub mod lending;
pub mod ratios;
pub mod valuation;
