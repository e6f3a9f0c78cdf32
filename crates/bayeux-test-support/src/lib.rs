//! Shared test support for `bayeux-server` integration tests: a Bayeux
//! long-poll client that talks real HTTP against a running server instance.

pub mod bayeux_client;

pub use bayeux_client::BayeuxTestClient;
