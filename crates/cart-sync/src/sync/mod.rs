pub mod mutator;
pub mod reconciler;
pub mod remote;
pub mod scheduler;

pub use mutator::{LastError, MutationErrorCallback, OptimisticMutator};
pub use reconciler::Reconciler;
pub use remote::{ProductLookup, RemoteCartService};
pub use scheduler::{DebounceScheduler, DebounceScope, PendingWrite, DEFAULT_DEBOUNCE_MS};
