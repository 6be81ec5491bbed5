//! Bridge to a yaml-language-server process.
//!
//! Templates are not valid yaml until rendered, so every document is sent
//! with its `{{ ... }}` actions blanked out ([`trim_template`]). The blanking
//! keeps every line and column where it was, which lets the diagnostics the
//! validator publishes be shown against the original text unchanged apart
//! from clamping and filtering (see [`crate::diagnostics`]).

mod codec;
mod connector;
mod trim;

pub use codec::{read_message, write_message};
pub use connector::{Connector, DiagnosticsUpdate, DIAGNOSTICS_QUEUE_CAPACITY};
pub use trim::{check_transform, trim_template};
