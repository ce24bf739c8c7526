pub mod credentials;
pub mod oauth;
pub mod store;
pub mod token;

pub use credentials::{CredentialError, SecureSecret};
pub use oauth::{AuthError, OAuthClient, AUTHORIZATION_TIMEOUT};
pub use store::TokenStore;
pub use token::Token;
