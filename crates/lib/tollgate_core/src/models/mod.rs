//! Domain models shared by the service, store, and delivery layers.

pub mod auth;
