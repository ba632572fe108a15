pub mod error;
pub mod notification;
pub mod permission;

pub use error::FlowstateError;
pub use notification::{NotificationKind, NotificationRequest, PublishReceipt};
pub use permission::PermissionState;
