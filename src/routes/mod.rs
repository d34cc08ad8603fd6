pub mod health;
pub mod live;
pub mod monitor;
