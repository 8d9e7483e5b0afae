//! # shopfront-db: Local Persistence for the Storefront
//!
//! Device-local SQLite storage for everything the storefront must remember
//! between sessions: the cart, cached exchange rates, the display currency,
//! the checkout attempt in flight and the reconciliation queue.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  shopfront-checkout (CartStore, RateCache, CheckoutOrchestrator)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 shopfront-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐   ┌────────────┐ │   │
//! │  │   │   Database    │    │    Repositories    │   │ Migrations │ │   │
//! │  │   │   (pool.rs)   │◄───│ carts, rates,      │   │ (embedded) │ │   │
//! │  │   │  SqlitePool   │    │ preferences,       │   │ 001_init   │ │   │
//! │  │   │               │    │ attempts, queue    │   │            │ │   │
//! │  │   └───────────────┘    └────────────────────┘   └────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  shopfront.db (per-user data directory)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopfront_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/shopfront.db")).await?;
//! let lines = db.carts().load_lines("default").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::attempt::CheckoutAttemptRepository;
pub use repository::cart::CartRepository;
pub use repository::preference::{PreferenceRepository, DISPLAY_CURRENCY_KEY};
pub use repository::rate::RateCacheRepository;
pub use repository::reconciliation::ReconciliationRepository;
