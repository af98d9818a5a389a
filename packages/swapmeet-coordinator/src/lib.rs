//! # Swapmeet Coordinator
//!
//! Coordinates peer-to-peer NFT swaps: an off-chain negotiation phase
//! (propose / counter / accept bundles of assets) followed by an on-chain
//! escrow phase where both parties deposit into a trade contract that
//! settles atomically. The reconciliation watcher is the single writer
//! that advances offers past acceptance, folding confirmed ledger events
//! back into the offer record.
//!
//! ## Quick Start
//! ```bash
//! cargo run --bin swapmeet-coordinator
//! ```
//!
//! ## Endpoints
//! - `POST /offers` - Create an offer
//! - `POST /offers/{id}/accept` - Accept as the current turn holder
//! - `POST /offers/{id}/trade` - Push an accepted offer into escrow
//! - `GET /health` - Health check with counters

pub mod config;
mod error;
pub mod escrow;
mod handlers;
pub mod ledger;
mod metrics;
mod middleware;
pub mod negotiation;
pub mod notify;
pub mod registry;
mod response;
mod router;
mod state;
pub mod store;
pub mod watcher;

pub use config::Config;
pub use error::Error;
pub use router::create as create_router;
pub use state::AppState;
