// Library root: re-exports all modules so integration tests and the server
// binary can access the crate's public API.

pub mod config;
pub mod db;
pub mod hub;
pub mod import;
pub mod ledger;
pub mod protocol;
pub mod session;
pub mod trade;
pub mod ws_server;
