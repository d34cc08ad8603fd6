pub mod alerts;
pub mod geocode;
pub mod monitor;
pub mod resolver;
pub mod sensor;
