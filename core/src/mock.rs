//! In-memory platform for the tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

use crate::discovery::{DiscoveryConfig, Technology};
use crate::error::BoxError;
use crate::platform::{Adapter, Host, Link, Notification, ReentryTarget, Tag};

#[derive(Default)]
struct CardState {
    connects: usize,
    closes: usize,
    open_links: usize,
    overlapped: bool,
    requests: Vec<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
    fail_connect: bool,
    fail_transceive_at: Option<usize>,
    fail_close: bool,
    start_connected: bool,
    delay: Option<Duration>,
}

/// A card shared by every tag and link derived from it.
#[derive(Default)]
pub struct MockCard {
    state: Mutex<CardState>,
}

impl MockCard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<T>(&self, f: impl FnOnce(&mut CardState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    /// Queues a response; `90 00` is returned once the queue runs dry.
    pub fn respond(&self, response: Vec<u8>) {
        self.with(|s| s.responses.push_back(response));
    }

    pub fn fail_connect(&self) {
        self.with(|s| s.fail_connect = true);
    }

    /// Fails the `n`-th transceive, counting from zero.
    pub fn fail_transceive_at(&self, n: usize) {
        self.with(|s| s.fail_transceive_at = Some(n));
    }

    pub fn fail_close(&self) {
        self.with(|s| s.fail_close = true);
    }

    /// Hands out links that are already open.
    pub fn start_connected(&self) {
        self.with(|s| s.start_connected = true);
    }

    pub fn delay(&self, delay: Duration) {
        self.with(|s| s.delay = Some(delay));
    }

    pub fn connects(&self) -> usize {
        self.with(|s| s.connects)
    }

    pub fn closes(&self) -> usize {
        self.with(|s| s.closes)
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.with(|s| s.requests.clone())
    }

    pub fn is_open(&self) -> bool {
        self.with(|s| s.open_links > 0)
    }

    /// Whether two links were ever open at the same time.
    pub fn overlapped(&self) -> bool {
        self.with(|s| s.overlapped)
    }
}

pub struct MockLink {
    card: Arc<MockCard>,
    connected: bool,
}

impl MockLink {
    fn new(card: Arc<MockCard>) -> Self {
        let connected = card.with(|s| {
            if s.start_connected {
                s.open_links += 1;
            }
            s.start_connected
        });

        Self { card, connected }
    }
}

impl Link for MockLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), BoxError> {
        self.card.with(|s| -> Result<(), BoxError> {
            s.connects += 1;
            if s.fail_connect {
                return Err("simulated connect fault".into());
            }

            s.open_links += 1;
            if s.open_links > 1 {
                s.overlapped = true;
            }

            Ok(())
        })?;

        self.connected = true;

        Ok(())
    }

    fn transceive(&mut self, request: &[u8]) -> Result<Vec<u8>, BoxError> {
        if !self.connected {
            return Err("link is not connected".into());
        }

        if let Some(delay) = self.card.with(|s| s.delay) {
            sleep(delay);
        }

        self.card.with(|s| -> Result<Vec<u8>, BoxError> {
            let n = s.requests.len();
            s.requests.push(request.to_vec());

            match s.fail_transceive_at {
                Some(at) if at == n => Err("simulated transceive fault".into()),
                _ => Ok(s.responses.pop_front().unwrap_or_else(|| vec![0x90, 0x00])),
            }
        })
    }

    fn close(&mut self) -> Result<(), BoxError> {
        let connected = std::mem::replace(&mut self.connected, false);

        self.card.with(|s| -> Result<(), BoxError> {
            s.closes += 1;
            if connected {
                s.open_links -= 1;
            }

            match s.fail_close {
                true => Err("simulated close fault".into()),
                _ => Ok(()),
            }
        })
    }
}

#[derive(Clone)]
pub struct MockTag {
    id: Vec<u8>,
    techs: Vec<Technology>,
    card: Arc<MockCard>,
}

impl MockTag {
    pub fn new(id: Vec<u8>, techs: Vec<Technology>, card: &Arc<MockCard>) -> Self {
        Self {
            id,
            techs,
            card: Arc::clone(card),
        }
    }

    pub fn iso_dep(id: Vec<u8>, card: &Arc<MockCard>) -> Self {
        Self::new(id, vec![Technology::NfcA, Technology::IsoDep], card)
    }
}

impl Tag for MockTag {
    type Link = MockLink;

    fn id(&self) -> Vec<u8> {
        self.id.clone()
    }

    fn tech_list(&self) -> Vec<Technology> {
        self.techs.clone()
    }

    fn link(&self) -> Option<Self::Link> {
        match self.techs.contains(&Technology::IsoDep) {
            true => Some(MockLink::new(Arc::clone(&self.card))),
            _ => None,
        }
    }
}

#[derive(Default)]
struct AdapterState {
    radio: AtomicBool,
    fail_registration: AtomicBool,
    dispatch: Mutex<Option<(ReentryTarget, DiscoveryConfig)>>,
}

/// An adapter whose radio can be toggled from outside.
#[derive(Clone, Default)]
pub struct MockAdapter {
    state: Arc<AdapterState>,
}

impl MockAdapter {
    pub fn new(radio: bool) -> Self {
        let adapter = Self::default();
        adapter.set_radio(radio);
        adapter
    }

    pub fn set_radio(&self, on: bool) {
        self.state.radio.store(on, Ordering::SeqCst);
    }

    pub fn fail_registration(&self) {
        self.state.fail_registration.store(true, Ordering::SeqCst);
    }

    pub fn dispatch(&self) -> Option<(ReentryTarget, DiscoveryConfig)> {
        self.state.dispatch.lock().unwrap().clone()
    }
}

impl Adapter for MockAdapter {
    fn is_enabled(&self) -> bool {
        self.state.radio.load(Ordering::SeqCst)
    }

    fn enable_foreground_dispatch(
        &self,
        target: &ReentryTarget,
        config: &DiscoveryConfig,
    ) -> Result<(), BoxError> {
        if self.state.fail_registration.load(Ordering::SeqCst) {
            return Err("simulated registration fault".into());
        }

        *self.state.dispatch.lock().unwrap() = Some((target.clone(), config.clone()));

        Ok(())
    }

    fn disable_foreground_dispatch(&self, _component: &str) -> Result<(), BoxError> {
        if self.state.fail_registration.load(Ordering::SeqCst) {
            return Err("simulated registration fault".into());
        }

        *self.state.dispatch.lock().unwrap() = None;

        Ok(())
    }
}

pub struct MockHost {
    adapter: Option<MockAdapter>,
    notification: Mutex<Option<Notification<MockTag>>>,
}

impl MockHost {
    pub fn new(adapter: Option<MockAdapter>) -> Self {
        Self {
            adapter,
            notification: Mutex::new(None),
        }
    }
}

impl Host for MockHost {
    type Adapter = MockAdapter;
    type Tag = MockTag;

    fn component(&self) -> &str {
        "MockActivity"
    }

    fn default_adapter(&self) -> Option<Self::Adapter> {
        self.adapter.clone()
    }

    fn notification(&self) -> Option<Notification<Self::Tag>> {
        self.notification.lock().unwrap().clone()
    }

    fn set_notification(&self, notification: Notification<Self::Tag>) {
        *self.notification.lock().unwrap() = Some(notification);
    }
}
