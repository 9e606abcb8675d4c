//! # Odin Library
//!
//! A terminal client for the Odin Library backend: a private document
//! library with contextual search and a streaming chat assistant that
//! answers questions about the uploaded documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────┐
//! │   CLI    │──▶│  ApiClient   │──▶│    Backend     │
//! │  (odin)  │   │ SseTransport │   │ REST + SSE     │
//! └────┬─────┘   └──────────────┘   └────────────────┘
//!      │
//!      ▼
//! ┌──────────────────────────────┐
//! │ Persisted stores             │
//! │ chat / session / display     │
//! │ (JSON files in storage.dir)  │
//! └──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! odin login alice
//! odin files upload ./paper.pdf
//! odin search "huginn and muninn"
//! odin chat ask "what do the ravens do?"
//! odin chat                       # interactive
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`storage`] | Key-value storage backends |
//! | [`persist`] | Write-through persisted state with hydration tracking |
//! | [`chat_store`] | Chat transcript and partial response |
//! | [`chat`] | Streaming exchange, SSE transport, chat view |
//! | [`chat_cmd`] | `odin chat` commands |
//! | [`auth`] | Sessions and sign-in |
//! | [`api`] | Backend REST client |
//! | [`models`] | Backend data types |
//! | [`files`] | File dashboard and details commands |
//! | [`search`] | Contextual search command |
//! | [`display`] | Details view preferences and text wrapping |
//! | [`output`] | Terminal output helpers |

pub mod api;
pub mod auth;
pub mod chat;
pub mod chat_cmd;
pub mod chat_store;
pub mod config;
pub mod display;
pub mod files;
pub mod models;
pub mod output;
pub mod persist;
pub mod search;
pub mod storage;
