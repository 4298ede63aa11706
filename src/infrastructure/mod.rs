//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - Database implementations (SQLite with sqlx)
//! - Agent-under-test HTTP client
//! - Language-model providers (API, CLI, fallback)
//! - Filesystem content patcher
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the
//! domain layer.

pub mod agent;
pub mod config;
pub mod content;
pub mod database;
pub mod llm;
pub mod logging;
