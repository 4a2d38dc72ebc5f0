pub mod auth;
pub mod calendar;
pub mod drive;

pub use auth::{GoogleAuth, GoogleTokens};
pub use calendar::GoogleCalendar;
pub use drive::GoogleDrive;
