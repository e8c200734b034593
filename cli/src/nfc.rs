use std::str::FromStr;
use std::sync::Arc;

use apdu::{command, Command};
use easynfc::pcsc::PcscHost;
use easynfc::{NfcSession, Options};
use tracing::info;

use crate::Result;

const COMPONENT: &str = "easynfc";

const SELECT_P1_DF: u8 = 0x04;
const SELECT_P2: u8 = 0x00;

pub type Session = NfcSession<PcscHost>;

/// Octets given in hex on the command line.
#[derive(Clone, Debug)]
pub struct Hex(pub Vec<u8>);

impl FromStr for Hex {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();

        hex::decode(digits).map(Self)
    }
}

/// Attaches a session to this program, then brings it to the foreground.
pub fn attach(options: Options) -> Result<Session> {
    let session = NfcSession::attach_with(Arc::new(PcscHost::new(COMPONENT)), options);
    session.on_foreground_gained()?;

    Ok(session)
}

/// Blocks until a card touches the reader, then hands it to the session.
pub async fn wait_for_tag(session: &Session) -> Result<()> {
    let adapter = session.acquire_adapter()?;

    info!("Touch your card to the reader");

    let notification = tokio::task::spawn_blocking(move || adapter.wait_for_notification()).await??;
    session.on_notification_redelivered(notification);

    Ok(())
}

/// Builds a `SELECT FILE` command selecting the DF by its name.
pub fn select_df(aid: &[u8]) -> Vec<u8> {
    let command: Command = command::select_file(SELECT_P1_DF, SELECT_P2, aid).into();

    Vec::from(command)
}
