pub mod health;
pub mod predictions;
