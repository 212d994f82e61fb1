pub mod captaincy;
pub mod engine_api;
pub mod explosivity;
pub mod fixture_label;
pub mod fpl_api;
pub mod http_cache;
pub mod http_client;
pub mod price_watch;
pub mod projection;
pub mod provider;
pub mod snapshot;
pub mod squad;
pub mod state;
pub mod tracker;
