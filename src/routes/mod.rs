pub mod events_ws;
pub mod info_routes;
pub mod session_routes;
