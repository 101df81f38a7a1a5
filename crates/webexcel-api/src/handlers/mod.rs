pub mod excel;
pub mod health;
