//! API gateway: the single outgoing-request chokepoint.
//! Keep the public surface thin and split implementation across sub-modules.

mod client;
mod navigation;
mod normalize;
mod request;

pub use client::{ApiClient, REQUEST_ID_HEADER};
pub use navigation::{login_redirect, origin_from_login_location, post_login_target, History, Navigator};
pub use normalize::{normalize, Failure};
pub use request::{ApiResponse, Credentials, RequestOptions};
pub use reqwest::Method;
