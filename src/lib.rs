pub mod config;
pub mod db;
pub mod group;
pub mod guide;
pub mod markdown;
pub mod middleware;
pub mod oauth;
pub mod orm;
pub mod permission;
pub mod stats;
pub mod user;
pub mod web;
pub mod webhook;
