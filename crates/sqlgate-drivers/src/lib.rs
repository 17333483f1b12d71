// SPDX-License-Identifier: Apache-2.0

//! Connection implementations for sqlgate.

pub mod duckdb;

pub use crate::duckdb::DuckDbConnection;
