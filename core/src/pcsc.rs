//! PC/SC support for easynfc.
//! Can be enabled by turning `pcsc` feature on.
//!
//! PC/SC is the reader-independent smart card API shipped with Windows and macOS, and provided
//! by pcsc-lite on Linux. Contactless readers expose ISO-DEP cards through it, so a terminal
//! program can play the host role with [`PcscHost`], polling the reader in place of the
//! platform dispatch.
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use easynfc::pcsc::PcscHost;
//! use easynfc::NfcSession;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = NfcSession::attach(Arc::new(PcscHost::new("easynfc")));
//! session.on_foreground_gained()?;
//!
//! let adapter = session.acquire_adapter()?;
//! session.on_notification_redelivered(adapter.wait_for_notification()?);
//!
//! let response = session.exchange(vec![0x00, 0xA4, 0x04, 0x00]).await?;
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, CString};
use std::sync::{Mutex, PoisonError};
use std::thread::sleep;
use std::time::Duration;

use pcsc::{Card, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

use crate::discovery::{DiscoveryConfig, Technology, ACTION_TECH_DISCOVERED};
use crate::error::BoxError;
use crate::platform::{Adapter, Host, Link, Notification, ReentryTarget, Tag};

/// `GET DATA` pseudo-APDU of PC/SC part 3, reading the UID of a contactless card.
const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with PC/SC: {0}")]
    PcscError(#[from] pcsc::Error),

    #[error("Reader not found on PC/SC service")]
    ReaderNotFound,

    #[error("Foreground dispatch is not enabled")]
    DispatchDisabled,

    #[error("No discovery filter matches {0}")]
    NoMatchingFilter(&'static str),

    #[error("The card is not connected")]
    NotConnected,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// A terminal program playing the host role.
pub struct PcscHost {
    component: String,
    notification: Mutex<Option<Notification<PcscTag>>>,
}

impl PcscHost {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            notification: Mutex::new(None),
        }
    }
}

impl Host for PcscHost {
    type Adapter = PcscAdapter;
    type Tag = PcscTag;

    fn component(&self) -> &str {
        &self.component
    }

    fn default_adapter(&self) -> Option<Self::Adapter> {
        match PcscAdapter::try_new() {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                debug!("PC/SC service is not available: {}", e);
                None
            }
        }
    }

    fn notification(&self) -> Option<Notification<Self::Tag>> {
        self.notification
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_notification(&self, notification: Notification<Self::Tag>) {
        *self
            .notification
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(notification);
    }
}

/// PC/SC context bound to the first reader found.
/// The "radio" is on while the context is valid and a reader is attached.
pub struct PcscAdapter {
    ctx: pcsc::Context,
    reader: Option<CString>,
    dispatch: Mutex<Option<(ReentryTarget, DiscoveryConfig)>>,
}

impl PcscAdapter {
    /// Creates a PC/SC context in user scope, then finds a reader.
    pub fn try_new() -> Result<Self> {
        let ctx = pcsc::Context::establish(Scope::User).map_err(Error::PcscError)?;

        let mut buf = [0u8; 2048];
        let reader = match ctx.list_readers(&mut buf) {
            Ok(mut readers) => readers.next().map(CStr::to_owned),
            Err(pcsc::Error::NoReadersAvailable) => None,
            Err(e) => return Err(Error::PcscError(e)),
        };

        match &reader {
            Some(reader) => {
                debug!("Using device: {}", reader.to_str().unwrap_or_default());
            }
            None => {
                info!("No reader is attached");
            }
        }

        Ok(Self {
            ctx,
            reader,
            dispatch: Mutex::new(None),
        })
    }

    /// Waits for a card touching the reader, polling for each seconds,
    /// then delivers it the way the platform dispatch does.
    pub fn wait_for_notification(&self) -> Result<Notification<PcscTag>> {
        let config = match &*self.dispatch.lock().unwrap_or_else(PoisonError::into_inner) {
            Some((_, config)) => config.clone(),
            None => return Err(Error::DispatchDisabled),
        };
        check_filters(&config)?;

        let reader = self.reader.as_ref().ok_or(Error::ReaderNotFound)?;

        debug!("Waiting for a card");

        loop {
            match self.ctx.connect(reader, ShareMode::Shared, Protocols::ANY) {
                Ok(card) => {
                    let tag = PcscTag::discover(&self.ctx, reader, card);
                    if !config.dispatches(ACTION_TECH_DISCOVERED, &tag.techs) {
                        info!("Ignoring a card out of the discovery filters");
                        sleep(POLL_INTERVAL);

                        continue;
                    }

                    debug!("Connected to your card");

                    return Ok(Notification::with_tag(ACTION_TECH_DISCOVERED, tag));
                }
                Err(e) => match e {
                    pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => {
                        info!("Still waiting for your card...");
                        sleep(POLL_INTERVAL);

                        continue;
                    }
                    _ => return Err(Error::PcscError(e)),
                },
            }
        }
    }
}

impl Adapter for PcscAdapter {
    fn is_enabled(&self) -> bool {
        self.reader.is_some() && self.ctx.is_valid().is_ok()
    }

    fn enable_foreground_dispatch(
        &self,
        target: &ReentryTarget,
        config: &DiscoveryConfig,
    ) -> std::result::Result<(), BoxError> {
        if self.reader.is_none() {
            return Err(Error::ReaderNotFound.into());
        }

        *self.dispatch.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((target.clone(), config.clone()));

        Ok(())
    }

    fn disable_foreground_dispatch(&self, _component: &str) -> std::result::Result<(), BoxError> {
        *self.dispatch.lock().unwrap_or_else(PoisonError::into_inner) = None;

        Ok(())
    }
}

/// A card found on the reader.
#[derive(Clone)]
pub struct PcscTag {
    ctx: pcsc::Context,
    reader: CString,
    id: Vec<u8>,
    techs: Vec<Technology>,
}

impl PcscTag {
    fn discover(ctx: &pcsc::Context, reader: &CStr, card: Card) -> Self {
        let mut rx = [0u8; MAX_BUFFER_SIZE];
        let id = match card.transmit(&GET_UID, &mut rx) {
            Ok(rx) => uid_from_response(rx),
            Err(_) => vec![],
        };

        if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
            debug!("Failed to release the card: {}", e);
        }

        Self {
            ctx: ctx.clone(),
            reader: reader.to_owned(),
            id,
            // PC/SC readers only expose the cards they can talk APDUs with.
            techs: vec![Technology::IsoDep],
        }
    }
}

impl Tag for PcscTag {
    type Link = PcscLink;

    fn id(&self) -> Vec<u8> {
        self.id.clone()
    }

    fn tech_list(&self) -> Vec<Technology> {
        self.techs.clone()
    }

    fn link(&self) -> Option<Self::Link> {
        match self.techs.contains(&Technology::IsoDep) {
            true => Some(PcscLink::new(self.ctx.clone(), self.reader.clone())),
            _ => None,
        }
    }
}

/// A card to be communicated through PC/SC.
pub struct PcscLink {
    ctx: pcsc::Context,
    reader: CString,
    card: Option<Card>,
}

impl PcscLink {
    fn new(ctx: pcsc::Context, reader: CString) -> Self {
        Self {
            ctx,
            reader,
            card: None,
        }
    }

    /// Transmits an APDU command to the card, then receives a response from them.
    pub fn transmit(&self, tx: &[u8]) -> Result<Vec<u8>> {
        let card = self.card.as_ref().ok_or(Error::NotConnected)?;

        debug!("TX: {}", hex::encode(tx));

        let mut rx = [0u8; MAX_BUFFER_SIZE];
        let rx = card.transmit(tx, &mut rx).map_err(Error::PcscError)?;

        debug!("RX: {}", hex::encode(rx));

        Ok(Vec::from(rx))
    }
}

impl Link for PcscLink {
    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn connect(&mut self) -> std::result::Result<(), BoxError> {
        let card = self
            .ctx
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)
            .map_err(Error::PcscError)?;

        self.card = Some(card);

        Ok(())
    }

    fn transceive(&mut self, request: &[u8]) -> std::result::Result<Vec<u8>, BoxError> {
        Ok(self.transmit(request)?)
    }

    fn close(&mut self) -> std::result::Result<(), BoxError> {
        if let Some(card) = self.card.take() {
            card.disconnect(Disposition::LeaveCard)
                .map_err(|(_, e)| Error::PcscError(e))?;
        }

        Ok(())
    }
}

/// Cards are announced as `TECH_DISCOVERED`; a configuration filtering it out gets none.
fn check_filters(config: &DiscoveryConfig) -> Result<()> {
    match config.matches_action(ACTION_TECH_DISCOVERED) {
        true => Ok(()),
        _ => Err(Error::NoMatchingFilter(ACTION_TECH_DISCOVERED)),
    }
}

/// Strips the status word from a `GET DATA` response, leaving the UID.
/// Cards refusing the command have no UID.
fn uid_from_response(rx: &[u8]) -> Vec<u8> {
    match rx.len().checked_sub(2).map(|at| rx.split_at(at)) {
        Some((uid, [0x90, 0x00])) => uid.to_vec(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_filters() {
        use crate::discovery::IntentFilter;

        assert!(check_filters(&DiscoveryConfig::default()).is_ok());

        let ndef_only = DiscoveryConfig::new(
            vec![IntentFilter::new("android.nfc.action.NDEF_DISCOVERED", "*/*")],
            vec![vec![Technology::IsoDep]],
        );
        assert!(matches!(
            check_filters(&ndef_only),
            Err(Error::NoMatchingFilter(ACTION_TECH_DISCOVERED))
        ));
    }

    #[test]
    fn test_uid_from_response() {
        assert_eq!(
            vec![0x04, 0xA2, 0x3B, 0x11],
            uid_from_response(&[0x04, 0xA2, 0x3B, 0x11, 0x90, 0x00]),
        );
        assert!(uid_from_response(&[0x6A, 0x81]).is_empty());
        assert!(uid_from_response(&[0x90]).is_empty());
        assert!(uid_from_response(&[]).is_empty());
    }
}
