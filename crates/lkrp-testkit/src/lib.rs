//! # LKRP Testkit
//!
//! Testing utilities for the Ledger Key-Ring Protocol.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Reference vectors**: real chains with expected hashes, paths, members
//!   and renderings
//! - **Generators**: Proptest strategies for commands, paths and streams
//! - **Fixtures**: Signed chains and trustchains built with real crypto
//!
//! ## Reference Vectors
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lkrp_crypto::NativeCryptoService;
//! use lkrp_testkit::vectors::verify_all_vectors;
//!
//! async fn check() {
//!     for (name, matches) in verify_all_vectors(Arc::new(NativeCryptoService)).await {
//!         println!("{}: {}", name, matches);
//!     }
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use lkrp_core::Command;
//! use lkrp_testkit::generators::command_data;
//!
//! proptest! {
//!     #[test]
//!     fn command_reparses(data in command_data()) {
//!         let command = Command::from_data(&data).unwrap();
//!         prop_assert_eq!(command.parse().unwrap(), &data);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use lkrp_testkit::fixtures::{multi_party_keypairs, KeyringFixture};
//!
//! async fn build() -> lkrp::Result<()> {
//!     let fixture = KeyringFixture::new();
//!     let members = multi_party_keypairs(2)?;
//!     let trustchain = fixture.trustchain("my-trustchain", 16, &members).await?;
//!     trustchain.validate().await
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{keypair, multi_party_keypairs, KeyringFixture};
pub use generators::{stream_from_params, StreamParams};
pub use vectors::{all_vectors, verify_all_vectors, StreamVector};
