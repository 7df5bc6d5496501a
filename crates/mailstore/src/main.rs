//! `mailstore` - inspect a mailbox through the folder and message store.
//!
//! Connects to one IMAP account, runs a single command and logs out.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod settings;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use mailstore_core::{
    DefaultSlot, FolderStore, ImapStore, MessageData, MessageField, MessageStore, SortDirection,
    SortField,
};
use mailstore_imap::{Config, SearchCriteria, Timeouts};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::{SecurityMode, Settings};

/// Environment variable holding the IMAP password.
const PASSWORD_ENV: &str = "MAILSTORE_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "mailstore", version, about = "Inspect an IMAP mailbox")]
struct Cli {
    /// Settings file [default: <config dir>/mailstore/config.json]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// IMAP host
    #[arg(long, global = true)]
    host: Option<String>,

    /// IMAP port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Transport security
    #[arg(long, global = true, value_enum)]
    security: Option<SecurityMode>,

    /// Login name
    #[arg(long, short, global = true)]
    user: Option<String>,

    /// Treat default folder failures as warnings
    #[arg(long, global = true)]
    secondary: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the subfolders of a folder
    Folders {
        /// Parent fullname, top level when omitted
        #[arg(default_value = "")]
        parent: String,
        /// Only subscribed folders
        #[arg(long)]
        subscribed: bool,
    },
    /// Resolve and print the default folders
    Defaults,
    /// Show the quota governing a folder
    Quota {
        #[arg(default_value = "INBOX")]
        folder: String,
    },
    /// Show message counts of a folder
    Counts { folder: String },
    /// Search a folder
    Search {
        folder: String,
        /// Only unseen messages
        #[arg(long)]
        unseen: bool,
        /// From contains
        #[arg(long)]
        from: Option<String>,
        /// Subject contains
        #[arg(long)]
        subject: Option<String>,
        /// Sort on the server
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
    },
    /// Unseen messages, newest first
    Unread {
        #[arg(default_value = "INBOX")]
        folder: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Received,
    Sent,
    From,
    To,
    Cc,
    Subject,
    Size,
}

impl From<SortArg> for SortField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Received => Self::ReceivedDate,
            SortArg::Sent => Self::SentDate,
            SortArg::From => Self::From,
            SortArg::To => Self::To,
            SortArg::Cc => Self::Cc,
            SortArg::Subject => Self::Subject,
            SortArg::Size => Self::Size,
        }
    }
}

const LISTING_FIELDS: &[MessageField] = &[
    MessageField::Flags,
    MessageField::ReceivedDate,
    MessageField::Envelope,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailstore=info,mailstore_core=debug,mailstore_imap=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path).await?;

    let store = connect(&cli, settings).await?;
    let outcome = run(&store, cli.command).await;
    if let Err(e) = store.logout().await {
        tracing::warn!(?e, "logout failed");
    }
    outcome
}

async fn connect(cli: &Cli, settings: Settings) -> anyhow::Result<ImapStore> {
    let server = settings.server;
    let Some(host) = cli.host.clone().or(server.host) else {
        bail!("no IMAP host given (use --host or set server.host in the settings file)");
    };
    let Some(username) = cli.user.clone().or(server.username) else {
        bail!("no login given (use --user or set server.username in the settings file)");
    };
    let password = std::env::var(PASSWORD_ENV)
        .with_context(|| format!("{PASSWORD_ENV} is not set"))?;

    let security = cli.security.unwrap_or(server.security);
    let mut imap = Config::new(&host)
        .with_security(security.into())
        .with_timeouts(Timeouts {
            command: settings.store.command_timeout(),
            lock: settings.store.lock_timeout(),
            ..Timeouts::default()
        });
    if let Some(port) = cli.port.or(server.port) {
        imap = imap.with_port(port);
    }

    info!(host = %imap.host, port = imap.port(), user = %username, "connecting");
    let store = ImapStore::connect(&imap, &username, &password, settings.store)
        .await?
        .primary(!cli.secondary);
    Ok(store)
}

async fn run(store: &ImapStore, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Folders { parent, subscribed } => {
            for folder in store.list_subfolders(&parent, subscribed).await? {
                let mut marks = String::new();
                marks.push(if folder.subscribed { 'S' } else { '-' });
                marks.push(if folder.holds_messages { 'M' } else { '-' });
                marks.push(if folder.has_subfolders { '+' } else { '-' });
                match folder.default_slot {
                    Some(slot) => println!("{marks} {} ({slot})", folder.fullname),
                    None => println!("{marks} {}", folder.fullname),
                }
            }
        }
        Command::Defaults => {
            let defaults = store.default_folders().await?;
            for slot in DefaultSlot::ALL {
                if let Some(fullname) = defaults.get(&slot) {
                    let name = slot.to_string();
                    println!("{name:<16} {fullname}");
                }
            }
        }
        Command::Quota { folder } => {
            let quota = store.quota(&folder).await?;
            if quota.is_unlimited() {
                println!("{folder}: unlimited");
            }
            for resource in &quota.resources {
                println!(
                    "{} {}: {} / {}",
                    quota.root.as_deref().unwrap_or(&folder),
                    resource.resource,
                    resource.usage,
                    resource.limit
                );
            }
        }
        Command::Counts { folder } => {
            let counts = store.counts(&folder).await?;
            let show = |n: Option<u32>| n.map_or_else(|| "?".to_string(), |n| n.to_string());
            println!(
                "{folder}: {} messages, {} unseen, {} recent",
                show(counts.total),
                show(counts.unseen),
                show(counts.recent)
            );
        }
        Command::Search {
            folder,
            unseen,
            from,
            subject,
            sort,
            desc,
        } => {
            let mut criteria = Vec::new();
            if unseen {
                criteria.push(SearchCriteria::Unseen);
            }
            if let Some(from) = from {
                criteria.push(SearchCriteria::From(from));
            }
            if let Some(subject) = subject {
                criteria.push(SearchCriteria::Subject(subject));
            }
            let term = match criteria.len() {
                0 => None,
                1 => criteria.pop(),
                _ => Some(SearchCriteria::And(criteria)),
            };
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            let sort = sort.map(|field| (SortField::from(field), direction));
            let messages = store
                .search(&folder, term.as_ref(), sort, LISTING_FIELDS)
                .await?;
            print_messages(&messages);
        }
        Command::Unread { folder } => {
            let messages = store.unread_messages(&folder, LISTING_FIELDS).await?;
            print_messages(&messages);
        }
    }
    Ok(())
}

fn print_messages(messages: &[MessageData]) {
    for message in messages {
        let received = message
            .received
            .map_or_else(String::new, |d| d.format("%Y-%m-%d %H:%M").to_string());
        let from = message
            .from
            .first()
            .map_or_else(String::new, ToString::to_string);
        println!(
            "{:>8} {received:<16} {from:<32} {}",
            message.uid,
            message.subject.as_deref().unwrap_or("")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn search_flags_parse() {
        let cli = Cli::try_parse_from([
            "mailstore", "--host", "imap.example.com", "search", "INBOX", "--unseen", "--sort",
            "received", "--desc",
        ]);
        let Ok(Cli {
            command: Command::Search { folder, unseen, sort, desc, .. },
            host,
            ..
        }) = cli
        else {
            panic!("unexpected parse result");
        };
        assert_eq!(folder, "INBOX");
        assert_eq!(host.as_deref(), Some("imap.example.com"));
        assert!(unseen && desc);
        assert!(matches!(sort, Some(SortArg::Received)));
    }

    #[test]
    fn desc_requires_sort() {
        assert!(Cli::try_parse_from(["mailstore", "search", "INBOX", "--desc"]).is_err());
    }
}
