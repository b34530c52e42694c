use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use learned_core::model::PageId;
use services::{ContentChange, ContentEvent, ProgressSession, SessionConfig};
use storage::file::{FileHandle, FsPermissionGate, PermissionGate, PromptPolicy};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod page;
mod terminal;

use page::Page;
use terminal::TerminalStatus;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidPage { raw: String },
    InvalidPath { flag: &'static str },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPage { raw } => write!(f, "invalid --page value: {raw:?}"),
            ArgsError::InvalidPath { flag } => write!(f, "{flag} must not be empty"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn require_path(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<PathBuf, ArgsError> {
    let value = require_value(args, flag)?;
    if value.trim().is_empty() {
        return Err(ArgsError::InvalidPath { flag });
    }
    Ok(PathBuf::from(value))
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  learned [--db <path|sqlite-url>] [--page <id>] [--content <file>] [--export <file>] [--yes]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db learned.sqlite3");
    eprintln!("  --page default");
    eprintln!();
    eprintln!("Commands (stdin):");
    eprintln!("  list | toggle <n> | add <label>[;<label>...] | remove <n>");
    eprintln!("  hide on|off | bind <file> | unbind | export | import | status | quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARNED_DB, LEARNED_PAGE, LEARNED_CONTENT, LEARNED_EXPORT, RUST_LOG");
}

struct Args {
    db_path: PathBuf,
    page: PageId,
    content: Option<PathBuf>,
    export: Option<PathBuf>,
    prompt_policy: PromptPolicy,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_path = std::env::var("LEARNED_DB")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from("learned.sqlite3"), PathBuf::from);
        let mut page_raw = std::env::var("LEARNED_PAGE").unwrap_or_else(|_| "default".into());
        let mut content = std::env::var("LEARNED_CONTENT").ok().map(PathBuf::from);
        let mut export = std::env::var("LEARNED_EXPORT").ok().map(PathBuf::from);
        let mut prompt_policy = PromptPolicy::Decline;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => db_path = require_path(args, "--db")?,
                "--page" => page_raw = require_value(args, "--page")?,
                "--content" => content = Some(require_path(args, "--content")?),
                "--export" => export = Some(require_path(args, "--export")?),
                "--yes" | "-y" => prompt_policy = PromptPolicy::Accept,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let page = PageId::new(&page_raw).map_err(|_| ArgsError::InvalidPage { raw: page_raw })?;
        Ok(Self {
            db_path,
            page,
            content,
            export,
            prompt_policy,
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn prepare_db_dir(path: &std::path::Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = match args.db_path.to_str() {
        Some(url) if url.starts_with("sqlite:") => Storage::sqlite_url(url)?,
        _ => {
            prepare_db_dir(&args.db_path)?;
            Storage::sqlite(&args.db_path)
        }
    };
    let gate: Arc<dyn PermissionGate> = Arc::new(FsPermissionGate::new(args.prompt_policy));
    let status = Arc::new(TerminalStatus);

    let text = match &args.content {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => String::new(),
    };
    let (mut page, initial) = Page::from_text(&text);

    let config = SessionConfig::new(args.page.clone());
    let mut session = ProgressSession::init(config, storage, gate, status, &initial).await;

    if let Some(path) = args.export {
        // Failure is already reported on the status line.
        let _ = session.bind_file(FileHandle::new(path)).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("{}", page.render());

    // Each command is applied to the session before the next line is read.
    while let Some(line) = lines.next_line().await? {
        match execute(line.trim(), &mut page, &mut session).await {
            Flow::Continue => {}
            Flow::Quit => break,
        }
    }

    let doc = session.teardown();
    debug!(pages = doc.page_ids().count(), "shutting down");
    Ok(())
}

async fn execute(line: &str, page: &mut Page, session: &mut ProgressSession) -> Flow {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match cmd {
        "" => {}
        "list" | "ls" => print!("{}", page.render()),
        "toggle" | "t" => match rest.parse().ok().and_then(|n| page.get(n)) {
            Some(row) => {
                if let Some(key) = row.control_key() {
                    session.handle_event(ContentEvent::Activated(key)).await;
                }
            }
            None => println!("no such row: {rest}"),
        },
        "add" => {
            let labels: Vec<&str> = rest
                .split(';')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            if labels.is_empty() {
                println!("add needs at least one label");
            } else {
                let nodes = page.append(&labels);
                let change = ContentChange::added(nodes);
                session.handle_event(ContentEvent::Changed(change)).await;
            }
        }
        "remove" | "rm" => match rest.parse().ok().and_then(|n| page.remove(n)) {
            Some(row) => {
                let change = ContentChange::removed(vec![row.node]);
                session.handle_event(ContentEvent::Changed(change)).await;
            }
            None => println!("no such row: {rest}"),
        },
        "hide" => match rest {
            "on" => session.set_hide_learned(true).await,
            "off" => session.set_hide_learned(false).await,
            _ => println!("usage: hide on|off"),
        },
        "bind" if !rest.is_empty() => {
            let _ = session.bind_file(FileHandle::new(rest)).await;
        }
        "unbind" => {
            if let Err(err) = session.unbind_file().await {
                println!("unbind failed: {err}");
            }
        }
        "export" => {
            let _ = session.export().await;
        }
        "import" => {
            let _ = session.import().await;
        }
        "status" => println!("{}: {}", session.page(), session.summary()),
        "quit" | "exit" | "q" => return Flow::Quit,
        _ => println!("unknown command: {line} (try --help)"),
    }
    Flow::Continue
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
