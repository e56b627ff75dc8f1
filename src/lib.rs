//! Moderation bot for a music site: notifies moderators over Telegram about
//! new songs, playlist names and covers, and applies their decisions made in
//! the Web App panel against the Site API.

pub mod actions;
pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod keepalive;
pub mod model;
pub mod notify;
pub mod poller;
pub mod server;
pub mod site;
pub mod state;
pub mod texts;
