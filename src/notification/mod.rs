//! Delivery of alerts to WeCom.
//!
//! `dispatcher` drains the ingestion queue; for every alert it asks
//! `credentials` for a valid access token and hands the formatted message to
//! `delivery`, which talks to the platform through the `wecom::WeComApi`
//! trait.
pub mod credentials;
pub mod delivery;
pub mod dispatcher;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod wecom;

pub use credentials::{Credential, CredentialManager};
pub use delivery::{DeliveryClient, DeliveryOutcome};
pub use dispatcher::Dispatcher;
pub use wecom::{HttpWeComApi, WeComApi};
