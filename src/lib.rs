//! Klassifikator portal
//!
//! Page controllers for the classification portal. Each page owns an
//! explicit state struct; view events go through a pure `reduce`, and
//! loads/saves go through the `portal-client` collaborator traits.
//!
//! ```text
//! ┌──────────────┐  rows   ┌──────────────┐  TreeNode  ┌──────────────┐
//! │ portal-client│ ──────► │  class-tree  │ ─────────► │   TreeView   │
//! │ ItemsApi ... │         │ TreeBuilder  │            │ open set     │
//! └──────────────┘         └──────────────┘            └──────┬───────┘
//!        ▲                                                     │ VisibleRow
//!        │ PATCH                                               ▼
//! ┌──────┴───────┐                                     ┌──────────────┐
//! │ EditSession  │ ◄──────────── pages ──────────────► │   present    │
//! └──────────────┘                                     │ text / html  │
//!                                                      └──────────────┘
//! ```
//!
//! The `klass` binary (feature `cli`) drives every page from the terminal.

pub mod config;
pub mod edit;
pub mod error;
pub mod pages;
pub mod present;
pub mod status;

pub use config::PortalConfig;
pub use edit::{Completion, Debounce, EditSession, EditState, SaveTicket};
pub use error::{PortalError, Result};
pub use status::{StatusKind, StatusLine};
