pub mod config;
pub mod error;
pub mod listener;
pub mod platform;
pub mod session;
pub mod shutdown;
pub mod transport;

pub use error::NotifyError;
pub use listener::{DisabledReason, ListenerStatus, MountedListener, NotificationListener};
pub use platform::NotificationPlatform;
pub use session::PermissionSession;
pub use transport::{NotificationTransport, Subscription, TransportEvent};
