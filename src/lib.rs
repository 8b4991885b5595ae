pub mod api;
pub mod client;
pub mod error;
pub mod hero;
pub mod orm;
pub mod router;
pub mod settings;

inventory::collect!(crate::orm::Migration);
