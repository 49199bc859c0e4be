//! Management console discovery.
//!
//! Provides the cookie-authenticated client for the console's AP list API.

mod client;
mod records;

pub use client::{extract_session_cookie, ConsoleClient, LoginResponse, SessionCookie};
pub use records::{parse_device_list, ConsoleRecord};
