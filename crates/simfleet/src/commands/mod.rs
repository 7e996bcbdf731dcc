pub mod down;
pub mod reconnect;
pub mod status;
pub mod up;
pub mod watch;
