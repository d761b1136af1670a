pub mod app_state;
pub mod view_bridge;
