mod http;
mod traits;

pub use http::{HttpService, NotificationByteStream};
pub use traits::{NotificationService, ServiceError};
