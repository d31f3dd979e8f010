pub mod app_data_store;
pub mod entity_store;

pub use app_data_store::{AppDataStore, BoardSummary, StoredEntity, TasksOverview};
pub use entity_store::EntityStore;

use std::cell::RefCell;
use std::rc::Rc;

/// The local view shared between the mutator, the merger and the runtime.
pub type SharedStore = Rc<RefCell<AppDataStore>>;
