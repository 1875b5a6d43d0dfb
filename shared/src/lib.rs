pub mod auth;
pub mod booking_id;
pub mod errors;
pub mod http;
pub mod keys;
pub mod models;
pub mod naming;
pub mod pricing;
pub mod services;
pub mod tenant;
pub mod utils;

pub use auth::*;
pub use booking_id::*;
pub use errors::*;
pub use http::*;
pub use models::*;
pub use naming::*;
pub use pricing::*;
pub use services::*;
pub use tenant::*;
pub use utils::*;
