//! # Bidsheet
//!
//! An auction catalog import and receipt-content preparation tool.
//!
//! Bidsheet ingests the spreadsheet export of an auction campaign, reconciles
//! it against a local SQLite store using content hashing, enriches item
//! descriptions through a cached external text-extraction service, and
//! prepares clean block-structured markup for downstream receipt rendering.
//! The export is re-delivered many times over a campaign; re-running on
//! unchanged input is free, and the extraction service is called at most once
//! per distinct description, ever.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │ CSV rows │──▶│ Reconciler                   │──▶│  SQLite  │
//! │ (export) │   │ enrich → normalize → markup  │   │ + cache  │
//! └──────────┘   └──────────────┬───────────────┘   └────┬─────┘
//!                               │                        │
//!                        ┌──────┴──────┐          ┌──────┴──────┐
//!                        │ Extraction  │          │  Fragments  │
//!                        │  service    │          │ (receipts)  │
//!                        └─────────────┘          └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bids init                       # create database
//! bids import catalog.csv         # reconcile an export
//! bids import catalog.csv         # second run: everything skipped
//! bids stats                      # what's stored
//! bids export                     # write receipt fragments
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types, hashing, slugs |
//! | [`rows`] | CSV row source and header mapping |
//! | [`normalize`] | Punctuation/spacing cleanup pipeline |
//! | [`markup`] | Plain text to block-structured markup |
//! | [`extraction`] | External text-extraction client |
//! | [`cache`] | Durable extraction-result cache |
//! | [`enrich`] | Cache-or-extract enrichment orchestration |
//! | [`reconcile`] | The import reconciliation algorithm |
//! | [`export`] | Receipt fragment output |
//! | [`stats`] | Database overview |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache;
pub mod config;
pub mod db;
pub mod enrich;
pub mod export;
pub mod extraction;
pub mod markup;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod rows;
pub mod stats;
