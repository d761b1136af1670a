pub mod constants;
pub mod device;
pub mod error;
pub mod filter;
pub mod live;
pub mod overlay;
pub mod poller;
pub mod ports;
pub mod replay;
pub mod session;
pub mod timer;
pub mod track;
