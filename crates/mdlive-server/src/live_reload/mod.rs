//! Live reload: change detection, client hub and event stream endpoint.

mod detector;
mod hub;
mod stream;

pub use detector::{CHANGE_MESSAGE, ChangeDetector, DEFAULT_DEBOUNCE, DetectorError};
pub use hub::{ClientId, ClientRegistration, Hub};
pub(crate) use stream::refresh_handler;
