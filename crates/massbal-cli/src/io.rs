pub mod flowsheet;
pub mod history;
pub mod output;
