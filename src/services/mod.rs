pub mod crawler;
pub mod dispatcher;
pub mod droid;
pub mod google_auth;
pub mod navigator;
pub mod sheets_client;

pub use crawler::*;
pub use dispatcher::*;
pub use droid::*;
pub use google_auth::*;
pub use navigator::*;
pub use sheets_client::*;
