pub mod app;
pub mod auth;
pub mod cache;
pub mod codegen;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod firewall;
pub mod generated;
pub mod handlers;
pub mod i18n;
pub mod jwt;
pub mod migrate;
pub mod models;
pub mod mq;
pub mod openapi;
pub mod pipeline;
pub mod scheduler;
pub mod service;
pub mod stomp;
pub mod store;
pub mod ws;
