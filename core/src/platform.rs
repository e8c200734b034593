//! Delegates to the platform NFC stack and the host screen.
//!
//! The session never talks to a radio by itself. Everything that touches the hardware or
//! the host UI framework goes through these traits, implemented outside (or by [`crate::pcsc`]).

use crate::discovery::{DiscoveryConfig, Technology};
use crate::error::BoxError;

/// A connection to a tag, speaking ISO-DEP.
///
/// Calls are blocking. Implementations must transmit the command to the card through the
/// reader, then receive the response from them.
pub trait Link: Send {
    /// Determines whether the connection is open.
    fn is_connected(&self) -> bool;

    /// Opens the connection.
    fn connect(&mut self) -> Result<(), BoxError>;

    /// Transmits the request to the card, then waits for the response.
    fn transceive(&mut self, request: &[u8]) -> Result<Vec<u8>, BoxError>;

    /// Closes the connection.
    fn close(&mut self) -> Result<(), BoxError>;
}

/// A tag physically present on the reader, handed over by the platform.
pub trait Tag: Clone + Send + Sync + 'static {
    type Link: Link + 'static;

    /// Identifier (UID) of the tag.
    fn id(&self) -> Vec<u8>;

    /// Technologies the tag supports.
    fn tech_list(&self) -> Vec<Technology>;

    /// Derives a fresh ISO-DEP link, or `None` if the tag does not support ISO-DEP.
    fn link(&self) -> Option<Self::Link>;
}

/// The platform NFC adapter.
pub trait Adapter: Send + Sync {
    /// Determines whether the radio is turned on right now.
    fn is_enabled(&self) -> bool;

    /// Routes tags matching `config` to the host, re-entering it through `target`.
    fn enable_foreground_dispatch(
        &self,
        target: &ReentryTarget,
        config: &DiscoveryConfig,
    ) -> Result<(), BoxError>;

    /// Stops routing tags to the host named `component`.
    fn disable_foreground_dispatch(&self, component: &str) -> Result<(), BoxError>;
}

/// The screen owning the session.
pub trait Host: Send + Sync {
    type Adapter: Adapter;
    type Tag: Tag;

    /// Name of the component, used to re-enter the host on dispatch.
    fn component(&self) -> &str;

    /// Looks up the default adapter of the device.
    fn default_adapter(&self) -> Option<Self::Adapter>;

    /// The notification the host was last (re-)entered with.
    fn notification(&self) -> Option<Notification<Self::Tag>>;

    /// Replaces the stored notification.
    fn set_notification(&self, notification: Notification<Self::Tag>);
}

/// A notification delivered to the host, optionally carrying a discovered tag.
#[derive(Clone, Debug)]
pub struct Notification<T> {
    action: String,
    tag: Option<T>,
}

impl<T> Notification<T> {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            tag: None,
        }
    }

    pub fn with_tag(action: impl Into<String>, tag: T) -> Self {
        Self {
            action: action.into(),
            tag: Some(tag),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn tag(&self) -> Option<&T> {
        self.tag.as_ref()
    }
}

/// Where the platform delivers the dispatched notifications (a pending intent).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReentryTarget {
    component: String,
    single_top: bool,
}

impl ReentryTarget {
    /// Targets the running instance of `component` instead of launching a new one.
    pub fn single_top(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            single_top: true,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn is_single_top(&self) -> bool {
        self.single_top
    }
}
