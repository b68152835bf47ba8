pub mod extract;
pub mod integrations;
pub mod invoicing;
pub mod notifications;
pub mod repository;
pub mod signing;
