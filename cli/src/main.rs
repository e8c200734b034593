mod logging;
mod nfc;

use std::time::Duration;

use clap::{Parser, Subcommand};
use easynfc::platform::Tag;
use easynfc::Options;
use serde_json::json;

use crate::nfc::{Hex, Session};

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Error occurred on the NFC session: {0}")]
    Nfc(#[from] easynfc::Error),

    #[error("Error occurred on communicating with PC/SC: {0}")]
    Pcsc(#[from] easynfc::pcsc::Error),

    #[error("Waiting for the card was interrupted: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Failed to serialize the output: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    action: Action,

    /// Time allowed for each exchange, in milliseconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Prints the results in JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increases the verbosity; repeat for more
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Action {
    /// Prints the identifier and technologies of the card
    Tag,

    /// Transmits the APDUs in order, then prints the responses
    Transceive {
        /// APDUs in hex
        #[arg(required = true)]
        apdus: Vec<Hex>,
    },

    /// Selects an application by its name (AID in hex)
    Select { aid: Hex },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.verbose);

    let mut options = Options::default();
    if let Some(timeout) = cli.timeout {
        options = options.with_timeout(Duration::from_millis(timeout));
    }

    let session = nfc::attach(options)?;
    let result = run(&session, cli.action, cli.json).await;

    session.on_foreground_lost()?;

    result
}

async fn run(session: &Session, action: Action, json: bool) -> Result<()> {
    nfc::wait_for_tag(session).await?;

    match action {
        Action::Tag => {
            let tag = session.fetch_tag().await?;
            let id = hex::encode_upper(tag.id());
            let techs = tag.tech_list();

            if json {
                println!("{}", json!({ "id": id, "techs": techs }));
            } else {
                let techs: Vec<String> = techs.iter().map(ToString::to_string).collect();
                println!("ID: {}", id);
                println!("Technologies: {}", techs.join(", "));
            }
        }
        Action::Transceive { apdus } => {
            let requests: Vec<Vec<u8>> = apdus.into_iter().map(|Hex(apdu)| apdu).collect();
            let responses = session.exchange_all(requests.clone()).await?;

            print_exchanges(&requests, &responses, json)?;
        }
        Action::Select { aid: Hex(aid) } => {
            let request = nfc::select_df(&aid);
            let response = session.exchange(request.clone()).await?;

            print_exchanges(&[request], &[response], json)?;
        }
    }

    Ok(())
}

fn print_exchanges(requests: &[Vec<u8>], responses: &[Vec<u8>], json: bool) -> Result<()> {
    let exchanges = requests.iter().zip(responses);

    if json {
        let exchanges: Vec<_> = exchanges
            .map(|(request, response)| {
                json!({
                    "request": hex::encode_upper(request),
                    "response": hex::encode_upper(response),
                    "success": Session::is_success_status(response),
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&exchanges)?);

        return Ok(());
    }

    for (request, response) in exchanges {
        println!(
            "{} -> {} [{}]",
            hex::encode_upper(request),
            hex::encode_upper(response),
            match Session::is_success_status(response) {
                true => "OK",
                _ => "NG",
            },
        );
    }

    Ok(())
}
