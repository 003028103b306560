//! # merge-chain-gateway
//!
//! On-chain state reconstruction engine and read-only gateway for a Sui
//! NFT collection: kiosk marketplace listings and NFT staking positions.
//!
//! No database is involved. Every pass reads the chain's event log, reduces
//! it to the latest event per entity, and confirms each candidate against
//! current object state before publishing a snapshot. Reward figures come
//! from the staking pool's own view functions when they are reachable.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── SnapshotStore + EventBus (domain/)
//!     ├── Scheduler (service/)
//!     │
//!     ├── ReconstructionEngine (service/)
//!     │     ├── EventIngestor → reduce → CrossReferencer
//!     │     └── PoolStateReader → rewards
//!     │
//!     └── EventSource / ObjectSource (chain/)
//!           ├── SuiRpcClient (JSON-RPC)
//!           └── MemoryChain (tests, offline)
//! ```

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
