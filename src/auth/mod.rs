pub mod handlers;
pub mod session;

pub const SESSION_COOKIE: &str = "shutter_session";
