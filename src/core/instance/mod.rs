mod manager;
mod model;

pub use manager::InstanceManager;
pub use model::{Instance, InstanceState, LoaderType};
