pub mod catalog;
pub mod config;
pub mod dialogue;
pub mod llm;
pub mod locations;
pub mod models;
pub mod repos;
