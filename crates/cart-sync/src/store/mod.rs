//! Local cart state.
//!
//! - [`local`]: [`LocalCartStore`], lines plus aggregates, selection and
//!   version-checked compensations.
//! - [`event`]: [`CartEvent`] change notifications.
//! - [`listeners`]: [`Listeners<T>`] subscriber registry.

pub mod event;
pub mod listeners;
pub mod local;

pub use event::CartEvent;
pub use listeners::{Listeners, Unsubscribe};
pub use local::{LineVersion, LocalCartStore};
