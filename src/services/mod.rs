pub mod catalog;
pub mod forecasting;
