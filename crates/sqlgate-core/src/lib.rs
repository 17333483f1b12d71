// SPDX-License-Identifier: Apache-2.0

//! sqlgate core: shared error taxonomy, tabular value types, and the
//! connection trait the gated executor runs against.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{EngineError, EngineResult, GateError, GateResult, TemplateError};
pub use traits::SqlConnection;
pub use types::*;
