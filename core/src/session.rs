//! The foreground NFC session bound to a host screen.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::discovery::DiscoveryConfig;
use crate::error::{BoxError, Error, Result};
use crate::platform::{Adapter, Host, Link, Notification, ReentryTarget, Tag};
use crate::status;

/// Time allowed for a whole exchange, from fetching the tag to closing the link.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Options of the session, fixed on attach.
#[derive(Clone, Debug)]
pub struct Options {
    discovery: DiscoveryConfig,
    timeout: Duration,
}

impl Options {
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// The link type derived from the tags of the host.
pub type LinkOf<H> = <<H as Host>::Tag as Tag>::Link;

/// Mediates between the lifecycle of the host, the tags dispatched to them,
/// and APDU exchanges with the tags.
///
/// The host must forward its lifecycle callbacks:
/// [`on_foreground_gained`](Self::on_foreground_gained) when resumed,
/// [`on_foreground_lost`](Self::on_foreground_lost) when paused, and
/// [`on_notification_redelivered`](Self::on_notification_redelivered) when re-entered.
///
/// Every async operation is lazy and reads the current state of the host afresh each time
/// it is awaited; nothing is memoized between calls.
pub struct NfcSession<H>
where
    H: Host,
{
    host: Arc<H>,
    adapter: Option<Arc<H::Adapter>>,
    target: ReentryTarget,
    options: Options,
    link_lock: Arc<Mutex<()>>,
}

impl<H> NfcSession<H>
where
    H: Host + 'static,
{
    /// Attaches a session to the host with the default options.
    pub fn attach(host: Arc<H>) -> Self {
        Self::attach_with(host, Options::default())
    }

    /// Attaches a session to the host.
    ///
    /// Never fails: without an adapter, or with the radio turned off, the session stays
    /// degraded and each operation reports the problem by itself.
    pub fn attach_with(host: Arc<H>, options: Options) -> Self {
        let adapter = host.default_adapter().map(Arc::new);
        match &adapter {
            None => {
                warn!("No NFC adapter found on this device");
            }
            Some(adapter) if !adapter.is_enabled() => {
                warn!("NFC adapter is turned off");
            }
            _ => {}
        }

        let target = ReentryTarget::single_top(host.component());

        Self {
            host,
            adapter,
            target,
            options,
            link_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn target(&self) -> &ReentryTarget {
        &self.target
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the adapter if it is present and turned on.
    pub fn acquire_adapter(&self) -> Result<Arc<H::Adapter>> {
        match &self.adapter {
            Some(adapter) if adapter.is_enabled() => Ok(Arc::clone(adapter)),
            _ => Err(Error::AdapterUnavailable),
        }
    }

    /// Determines whether the adapter is present and turned on, at this moment.
    pub fn is_adapter_enabled(&self) -> bool {
        self.adapter
            .as_ref()
            .map(|adapter| adapter.is_enabled())
            .unwrap_or(false)
    }

    /// Replaces the notification stored in the host.
    /// The platform does not do this by itself when re-entering a running host.
    pub fn on_notification_redelivered(&self, notification: Notification<H::Tag>) {
        debug!("Notification redelivered: {}", notification.action());

        self.host.set_notification(notification);
    }

    /// Enables the foreground dispatch to the host.
    ///
    /// Does nothing without an adapter. If the adapter refuses the registration,
    /// [`Error::DispatchRegistration`] is returned.
    pub fn on_foreground_gained(&self) -> Result<()> {
        let adapter = match &self.adapter {
            Some(adapter) => adapter,
            None => return Ok(()),
        };

        adapter
            .enable_foreground_dispatch(&self.target, &self.options.discovery)
            .map_err(Error::DispatchRegistration)?;

        debug!("Foreground dispatch enabled for {}", self.target.component());

        Ok(())
    }

    /// Disables the foreground dispatch to the host, with the same guard as
    /// [`on_foreground_gained`](Self::on_foreground_gained).
    pub fn on_foreground_lost(&self) -> Result<()> {
        let adapter = match &self.adapter {
            Some(adapter) => adapter,
            None => return Ok(()),
        };

        adapter
            .disable_foreground_dispatch(self.target.component())
            .map_err(Error::DispatchRegistration)?;

        debug!("Foreground dispatch disabled for {}", self.target.component());

        Ok(())
    }

    /// Fetches the tag carried by the current notification of the host.
    pub async fn fetch_tag(&self) -> Result<H::Tag> {
        let notification = self.host.notification();
        let tag = match notification.as_ref().and_then(Notification::tag) {
            Some(tag) if self.is_adapter_enabled() => tag.clone(),
            _ => return Err(Error::NoValidTag),
        };

        debug!("Id(hex): {}", hex::encode(tag.id()));
        debug!("TechList: {:?}", tag.tech_list());

        Ok(tag)
    }

    /// Fetches an ISO-DEP link to the current tag.
    pub async fn fetch_link(&self) -> Result<LinkOf<H>> {
        let tag = self.fetch_tag().await?;

        tag.link().ok_or_else(|| {
            warn!("The tag does not support ISO-DEP");
            Error::NoValidTag
        })
    }

    /// Transmits the request to the current tag, then receives the response.
    ///
    /// The link is opened for this exchange only, and closed afterwards whatever happened.
    /// Failures on closing are logged and never returned.
    ///
    /// The blocking I/O runs on a worker of the blocking pool. Dropping the future or hitting
    /// the timeout does not abort a transceive already in flight: the worker keeps holding
    /// the link until the call returns, then closes it, and the next exchange waits for that.
    pub async fn exchange(&self, request: impl Into<Vec<u8>>) -> Result<Vec<u8>> {
        let request = request.into();

        tokio::time::timeout(self.options.timeout, self.exchange_once(request))
            .await
            .unwrap_or_else(|_| {
                warn!("Exchange timed out after {:?}", self.options.timeout);
                Err(Error::Transport)
            })
    }

    /// Exchanges the requests one by one, in order.
    /// Stops at the first failure and returns it; no partial responses are kept.
    pub async fn exchange_all<I>(&self, requests: I) -> Result<Vec<Vec<u8>>>
    where
        I: IntoIterator,
        I::Item: Into<Vec<u8>>,
    {
        let mut responses = Vec::new();
        for request in requests {
            responses.push(self.exchange(request).await?);
        }

        Ok(responses)
    }

    /// Determines whether the response starts with the success status word (`90 00`).
    pub fn is_success_status(response: &[u8]) -> bool {
        status::is_success(response)
    }

    async fn exchange_once(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        let link = self.fetch_link().await?;
        let guard = Arc::clone(&self.link_lock).lock_owned().await;

        tokio::task::spawn_blocking(move || {
            let _guard = guard;

            transceive_once(link, &request)
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Link worker did not complete: {}", e);
            Err(Error::Transport)
        })
    }
}

/// Runs one open, transceive and close cycle on the link.
fn transceive_once<L>(mut link: L, request: &[u8]) -> Result<Vec<u8>>
where
    L: Link,
{
    let result = connect_and_transceive(&mut link, request);

    if let Err(e) = link.close() {
        warn!("Failed to close the link: {}", e);
    }

    result.map_err(|e| {
        warn!("Transport fault on the link: {}", e);
        Error::Transport
    })
}

fn connect_and_transceive<L>(link: &mut L, request: &[u8]) -> std::result::Result<Vec<u8>, BoxError>
where
    L: Link,
{
    if link.is_connected() {
        link.close()?;
    }

    link.connect()?;

    debug!("TX: {}", hex::encode(request));
    let response = link.transceive(request)?;
    debug!("RX: {}", hex::encode(&response));

    Ok(response)
}
