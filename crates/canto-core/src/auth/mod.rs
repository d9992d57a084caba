//! `OAuth2` authorization state: persisted grants and the session
//! state machine that manages them.

mod model;
mod repository;
mod session;

pub use model::{AccountAuthorization, Authorization, GrantType, PendingAuthorization};
pub use repository::AuthorizationRepository;
pub use session::OAuthSession;
