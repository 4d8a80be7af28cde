//! # Compliance Types Crate
//!
//! Domain entities and row helpers shared by every crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: record, template and tier shapes are defined
//!   here and nowhere else.
//! - **Rows at the edge**: the backend exchanges untyped JSON rows; typed
//!   entities are decoded as soon as rows enter the process.

pub mod entities;
pub mod errors;
pub mod rows;
pub mod status;

pub use entities::*;
pub use errors::*;
pub use status::{ConflictId, ConflictType, Resolution, SyncStatus};
pub use rows::{decode_row, decode_rows, encode_row, tables, ChangeKind, Row, RowChange};
