//! Core functionality for the manual model, step editing, drafts and configuration

pub mod api;
pub mod config;
pub mod debounce;
pub mod document;
pub mod draft;
pub mod error;
pub mod events;
pub mod images;
pub mod service;
pub mod steps;
