pub mod validation;

pub use validation::{money, money_limit, ValidatedJson, MAX_MONEY};
