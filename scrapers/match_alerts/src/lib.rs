pub mod commands;
pub mod config;
pub mod fetch;
pub mod html_table;
pub mod metrics;
pub mod notify;
pub mod outcome;
pub mod rankings;
pub mod repository;
pub mod results_page;
pub mod schedule;
pub mod server;
pub mod store;
pub mod subscriptions;
pub mod tracker;
pub mod types;
