pub mod common;
pub mod config;
pub mod dom;
pub mod identity;
pub mod instrument;
pub mod observer;
pub mod proxy;
pub mod ready;
pub mod scheduler;
pub mod utm;

pub use common::events::{ConversionEvent, EventClass, EventName};
pub use common::payload::Payload;
pub use config::ObserverSettings;
pub use observer::{HostEnvironment, LeoObserver};
pub use proxy::{ObserverProxy, SecondaryAnalytics, VisitorId};
