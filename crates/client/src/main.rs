#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vil_client::{ClientConfig, ExistingParent, GitItemsClient, LinkClient};
use vil_core::{
    Collaborators, DELETE_FAILED_MESSAGE, DeleteOutcome, FixedUser, LinkGateway, LinkPayload,
    LinkStatus, ParentId, RowLifecycleController, RowViewModel, SAVE_FAILED_MESSAGE,
    SnapshotLoader, Telemetry, TracingTelemetry,
};

#[derive(Parser, Debug)]
#[command(name = "vil")]
#[command(version, about = "Links parent records to files in a Git repository", long_about = None)]
struct Cli {
    /// Path to the client configuration file
    #[arg(short, long, env = "VIL_CONFIG", default_value = "vil.yaml")]
    config: PathBuf,

    /// Log to file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile a parent's links against the repository and print the rows
    Table {
        parent: ParentId,
        /// Sort rows by path
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
    },
    /// Print a parent's stored links as JSON
    List { parent: ParentId },
    /// Link a repository file to a parent
    Link {
        parent: ParentId,
        path: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Remove the link between a parent and a file
    Unlink { parent: ParentId, path: String },
    /// Print the files of the configured repository branch
    Files,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Asc,
    Desc,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_env("VIL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

struct App {
    config: ClientConfig,
    telemetry: Arc<dyn Telemetry>,
    links: Arc<LinkClient>,
}

impl App {
    fn new(config: ClientConfig) -> Self {
        let telemetry: Arc<dyn Telemetry> =
            Arc::new(TracingTelemetry::new("vil", config.severity()));
        let links = Arc::new(LinkClient::from_config(&config, Arc::clone(&telemetry)));
        Self {
            config,
            telemetry,
            links,
        }
    }

    fn listing(&self) -> Arc<GitItemsClient> {
        Arc::new(GitItemsClient::from_config(
            &self.config,
            Arc::clone(&self.telemetry),
        ))
    }

    fn controller(&self, parent: ParentId) -> RowLifecycleController {
        RowLifecycleController::open(
            &self.config.repository_ref(),
            Collaborators {
                gateway: self.links.clone(),
                listing: self.listing(),
                parent: Arc::new(ExistingParent::new(parent)),
                user: Arc::new(FixedUser(self.config.user_name())),
                telemetry: Arc::clone(&self.telemetry),
            },
        )
    }
}

fn print_rows(rows: &[RowViewModel]) {
    for row in rows {
        println!("{:<7}{}", row.status.label(), row.path);
        if !row.comment.is_empty() {
            println!("       comment: {}", row.comment);
        }
        if let Some(error) = &row.error {
            println!("       error: {error}");
        }
        if !row.web_url.is_empty() {
            println!("       {}", row.web_url);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let app = App::new(config);

    match cli.command {
        Command::Table { parent, sort } => {
            let mut controller = app.controller(parent);
            let clicks = match sort {
                None => 0,
                Some(SortArg::Asc) => 1,
                Some(SortArg::Desc) => 2,
            };
            for _ in 0..clicks {
                controller.toggle_path_sort();
            }
            print_rows(&controller.visible_rows());
        }
        Command::List { parent } => {
            let links = app
                .links
                .fetch_links(parent)
                .with_context(|| format!("failed to fetch links of {parent}"))?;
            let payloads: Vec<LinkPayload> = links.iter().map(LinkPayload::from).collect();
            println!("{}", serde_json::to_string_pretty(&payloads)?);
        }
        Command::Link {
            parent,
            path,
            comment,
        } => {
            let mut controller = app.controller(parent);
            let row = controller.add()?;
            controller.select_path(row, &path)?;
            controller.set_comment(row, &comment)?;
            let status = controller.save(row)?;
            let error = controller.row(row).and_then(|row| row.error.clone());
            match (status, error) {
                (LinkStatus::Broken, Some(error)) if error == SAVE_FAILED_MESSAGE => {
                    bail!("{error}")
                }
                (_, Some(error)) => println!("linked {path} ({error})"),
                (_, None) => println!("linked {path}"),
            }
        }
        Command::Unlink { parent, path } => {
            let mut controller = app.controller(parent);
            let Some(row) = controller
                .rows()
                .iter()
                .find(|row| row.path == path)
                .map(|row| row.id)
            else {
                println!("{path} is not linked to {parent}");
                return Ok(());
            };
            match controller.delete(row)? {
                DeleteOutcome::Failed => bail!("{DELETE_FAILED_MESSAGE}"),
                DeleteOutcome::Removed | DeleteOutcome::RemovedLocally => {
                    println!("unlinked {path}")
                }
            }
        }
        Command::Files => {
            let repo = app.config.repository_ref();
            let files = SnapshotLoader::new(app.listing(), Arc::clone(&app.telemetry))
                .load(&repo.repository, &repo.project, &repo.branch)
                .context("failed to list repository files")?;
            for file in files {
                println!("{}", file.path);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;
    run(cli)
}
