//! Bearer-token authentication and route access control.
//!
//! Stateless: a token is valid while its signature checks out, it has not
//! expired, and its subject still resolves to the same account. Every request
//! passes through `authenticate` (best effort, records an [`AuthOutcome`]) and
//! then `enforce_access` (rejects anonymous requests to protected routes).

mod authenticator;
mod bearer;
mod directory;
mod errors;
mod extractors;
mod ip;
mod policy;
mod types;

pub use authenticator::{Authenticator, authenticate};
pub use bearer::{BEARER_PREFIX, bearer_token};
pub use directory::{DEFAULT_LOOKUP_TIMEOUT, DirectoryError, UserDirectory, bounded};
pub use errors::{ApiAuthError, AuthError};
pub use extractors::Auth;
pub use ip::{ClientIdentity, FORWARDED_FOR_HEADER, UNKNOWN_CLIENT, client_identity};
pub use policy::{AccessPolicy, RouteAccess, enforce_access};
pub use types::{AuthOutcome, Principal};
