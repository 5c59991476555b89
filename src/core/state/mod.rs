pub mod app_state;
pub mod settings;

pub use app_state::AppState;
pub use settings::{data_dir_under, default_data_dir, LauncherPaths, LauncherSettings, NetworkSettings};
