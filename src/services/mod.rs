//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories:
//! - the session guard and its signed client cookie
//! - account provisioning and administration
//! - the pet registry, its health history and the finder flow

pub mod account;
pub mod notification;
pub mod password;
pub mod pet;
pub mod qr;
pub mod session_cookie;
pub mod session_guard;
pub mod token;

pub use account::{AccountService, AccountServiceError, AccountSummary};
pub use notification::{
    Mailer, NotificationService, NotifyError, ReportStatus, SightingReport, SmtpMailer,
};
pub use password::{hash_password, verify_password};
pub use pet::{PetService, PetServiceError, PublicPetProfile};
pub use session_cookie::{PresentedSession, SessionCookieCodec};
pub use session_guard::{Decision, GuardError, Rejection, SessionGuard};
pub use token::generate_session_token;
