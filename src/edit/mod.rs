//! Per-row edit sessions and input debouncing.

mod debounce;
mod session;

pub use debounce::Debounce;
pub use session::{Completion, EditSession, EditState, SaveTicket};
