//! Session state, auth workflows and route guarding for the signed-in user.
//! Keep the public surface thin and split implementation across sub-modules.

mod auth;
mod guard;
mod principal;
mod session;

pub use auth::{
    credential_record_from, AuthService, LoginRequest, RegisterRequest, SocialLoginRequest, SocialProvider,
    FORGOT_PASSWORD_PATH, LOGIN_PATH, LOGOUT_PATH, REGISTER_PATH, RESET_PASSWORD_PATH, SOCIAL_LOGIN_PATH,
};
pub use guard::{GuardDecision, GuardState, ProtectedRoute, RoleRequirement, RouteGuard, RouteTable};
pub use principal::{CredentialRecord, UserSnapshot};
pub use session::{Session, SessionStore, WorkflowGuard};
