//! # canto-oauth
//!
//! `OAuth2` client for the Canto digital asset management API.
//!
//! Canto's `OAuth2` server deviates from the RFC in two ways this crate
//! papers over:
//!
//! - the token endpoint responds with camelCase JSON (`accessToken`,
//!   `expiresIn`, `tokenType`, `refreshToken`) instead of snake_case;
//! - requests identify the application with `app_id`/`app_secret` instead
//!   of the generic `client_id`/`client_secret` parameter names.
//!
//! ## Quick Start
//!
//! ```ignore
//! use canto_oauth::{OAuthClient, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Provider::new("https://oauth.canto.global/oauth/api/oauth2")?;
//!     let client = OAuthClient::new("app_id", "app_secret", provider)
//!         .with_redirect_uri("https://example.net/canto/finish");
//!
//!     // Interactive flow: send the user here, exchange the returned code.
//!     let url = client.authorization_url(None, "random_state")?;
//!     println!("Visit: {url}");
//!     let token = client.exchange_code("code_from_redirect").await?;
//!
//!     // Service flow: no user involved.
//!     let token = client.client_credentials(None).await?;
//!
//!     println!("Access token: {}", token.access_token);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod provider;
pub mod token;

pub use error::{Error, Result};
pub use flow::{OAuthClient, generate_state};
pub use provider::Provider;
pub use token::Token;
