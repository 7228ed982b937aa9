//! Product catalog service: a REST surface over a product store and an
//! image store, with generated placeholder images, detached catalog events
//! and a keyword-driven chat assistant.

pub mod catalog;
pub mod category;
pub mod chatbot;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod image_gen;
pub mod images;
pub mod intent;
pub mod inventory;
pub mod models;
pub mod routes;
pub mod store;
