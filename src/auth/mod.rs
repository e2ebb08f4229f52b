//! OAuth 2.0 authorization server
//!
//! - **Server**: authorization-code and refresh flows, registration, metadata
//! - **Tokens**: signed token pairs with revocable shadow records
//! - **Middleware**: bearer-token gate for protected routes
//! - **Provider**: the upstream identity provider users sign in with

pub mod codes;
pub mod middleware;
pub mod provider;
pub mod registry;
pub mod server;
pub mod state;
pub mod tokens;

pub use codes::{AuthorizationCodeCache, AuthorizationGrant, RedeemError};
pub use middleware::{AuthState, AuthenticatedUser, auth_middleware};
pub use provider::{IdentityProvider, OidcProvider, SubjectFallback, normalize_identity};
pub use registry::{ClientRegistrationRequest, ClientRegistrationResponse, ClientRegistry};
pub use server::{OAuthServerState, create_oauth_routes};
pub use state::{AuthorizationState, StateSigner};
pub use tokens::{Claims, Introspection, TokenManager, TokenPair, TokenResponse};

/// Generate an unguessable token: 32 random bytes, base64url without padding
pub fn generate_secure_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; crate::constants::RANDOM_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}
