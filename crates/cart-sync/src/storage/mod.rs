pub mod memory;
pub mod persister;
pub mod traits;

pub use memory::MemoryStorage;
pub use persister::{load_cart, CartPersister};
pub use traits::PersistenceAdapter;
