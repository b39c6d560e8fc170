//! Command-line client for browsing and updating facility console lists.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use concierge_config::{ClientConfig, ConfigLoader, ConfigOverrides};
use concierge_list::{FilterSet, FilterValue};
use concierge_telemetry::{LoggingConfig, command_span, init_logging, record_exit_code};
use tokio::io::BufReader;
use tracing::{Instrument, info};
use uuid::Uuid;

use crate::client::{AppContext, CliResult};
use crate::commands::{tickets, users};

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let command_name = cli.command.label();
    let trace_id = Uuid::new_v4().to_string();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };
    if let Err(err) = init_logging(&LoggingConfig::from_settings(&config.logging)) {
        eprintln!("warning: {err:#}");
    }
    let span = command_span(command_name, &trace_id);
    let exit_code = execute(cli, &config, &trace_id).instrument(span.clone()).await;
    record_exit_code(&span, exit_code);
    exit_code
}

async fn execute(cli: Cli, config: &ClientConfig, trace_id: &str) -> i32 {
    let result = match AppContext::from_config(config, trace_id, cli.output) {
        Ok(ctx) => dispatch(cli.command, &ctx).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            info!("command completed");
            0
        }
        Err(err) => {
            let message = err.display_message();
            info!(error = %message, "command failed");
            eprintln!("error: {message}");
            err.exit_code()
        }
    }
}

fn load_config(cli: &Cli) -> CliResult<ClientConfig> {
    let mut loader = ConfigLoader::new().with_overrides(ConfigOverrides {
        base_url: cli.base_url.clone(),
        token: cli.token.clone(),
        request_timeout_secs: cli.timeout,
        ..ConfigOverrides::default()
    });
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    Ok(loader.load()?)
}

pub(crate) async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Users(users) => match users {
            UsersCommand::Ls(args) => users::handle_list(ctx, &args).await,
            UsersCommand::ToggleActive(args) => users::handle_toggle_active(ctx, &args).await,
            UsersCommand::Rm(args) => users::handle_remove(ctx, &args).await,
            UsersCommand::Browse(args) => {
                let stdin = BufReader::new(tokio::io::stdin());
                users::handle_browse(ctx, &args, stdin).await
            }
        },
        Command::Tickets(tickets) => match tickets {
            TicketsCommand::Ls(args) => tickets::handle_list(ctx, &args).await,
            TicketsCommand::Golden(args) => tickets::handle_golden(ctx, &args).await,
            TicketsCommand::Flag(args) => tickets::handle_flag(ctx, &args).await,
            TicketsCommand::Browse(args) => {
                let stdin = BufReader::new(tokio::io::stdin());
                tickets::handle_browse(ctx, &args, stdin).await
            }
        },
    }
}

#[derive(Parser)]
#[command(
    name = "concierge",
    about = "Page, filter and update facility console users and tickets"
)]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "CONCIERGE_BASE_URL")]
    pub(crate) base_url: Option<String>,
    #[arg(long, global = true, env = "CONCIERGE_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,
    #[arg(long, global = true, help = "JSON configuration file")]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Request timeout in seconds")]
    pub(crate) timeout: Option<u64>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// External (non-FTE) users.
    #[command(subcommand)]
    Users(UsersCommand),
    /// Helpdesk tickets.
    #[command(subcommand)]
    Tickets(TicketsCommand),
}

impl Command {
    const fn label(&self) -> &'static str {
        match self {
            Self::Users(UsersCommand::Ls(_)) => "users.ls",
            Self::Users(UsersCommand::ToggleActive(_)) => "users.toggle_active",
            Self::Users(UsersCommand::Rm(_)) => "users.rm",
            Self::Users(UsersCommand::Browse(_)) => "users.browse",
            Self::Tickets(TicketsCommand::Ls(_)) => "tickets.ls",
            Self::Tickets(TicketsCommand::Golden(_)) => "tickets.golden",
            Self::Tickets(TicketsCommand::Flag(_)) => "tickets.flag",
            Self::Tickets(TicketsCommand::Browse(_)) => "tickets.browse",
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum UsersCommand {
    /// List one page of users.
    Ls(UserListArgs),
    /// Flip a user's active flag (and approval status).
    ToggleActive(UserItemArgs),
    /// Delete a user.
    Rm(UserItemArgs),
    /// Interactive paging; reads commands from stdin.
    Browse(UserListArgs),
}

#[derive(Subcommand)]
pub(crate) enum TicketsCommand {
    /// List one page of tickets.
    Ls(TicketListArgs),
    /// Toggle the golden ticket marker.
    Golden(TicketItemArgs),
    /// Toggle the flag marker.
    Flag(TicketItemArgs),
    /// Interactive paging; reads commands from stdin.
    Browse(TicketListArgs),
}

/// Page and search shared by every list command.
#[derive(Args, Clone, Default)]
pub(crate) struct PageArgs {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) page: u32,
    #[arg(long, help = "Free-text search (ignored while any filter is set)")]
    pub(crate) search: Option<String>,
}

impl PageArgs {
    pub(crate) fn search(&self) -> &str {
        self.search.as_deref().unwrap_or_default()
    }
}

#[derive(Args, Clone, Default)]
pub(crate) struct UserListArgs {
    #[command(flatten)]
    pub(crate) page: PageArgs,
    #[arg(long)]
    pub(crate) firstname: Option<String>,
    #[arg(long)]
    pub(crate) lastname: Option<String>,
    #[arg(long)]
    pub(crate) email: Option<String>,
    #[arg(long)]
    pub(crate) mobile: Option<String>,
    #[arg(long, help = "Cluster name (partial match)")]
    pub(crate) cluster: Option<String>,
    #[arg(long, help = "Exact cluster id; wins over --cluster")]
    pub(crate) cluster_id: Option<i64>,
    #[arg(long)]
    pub(crate) circle: Option<String>,
    #[arg(long)]
    pub(crate) department: Option<String>,
    #[arg(long)]
    pub(crate) role: Option<String>,
    #[arg(long, help = "Manager email (partial match)")]
    pub(crate) report_to: Option<String>,
}

impl UserListArgs {
    pub(crate) fn filters(&self) -> FilterSet {
        let text = [
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("email", &self.email),
            ("mobile", &self.mobile),
            ("cluster", &self.cluster),
            ("circle", &self.circle),
            ("department", &self.department),
            ("role", &self.role),
            ("report_to_id", &self.report_to),
        ];
        let mut filters: FilterSet = text
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_deref()
                    .map(|value| (key.to_string(), FilterValue::from(value)))
            })
            .collect();
        if let Some(cluster_id) = self.cluster_id {
            filters.insert("cluster_id", cluster_id);
        }
        filters
    }
}

#[derive(Args, Clone)]
pub(crate) struct UserItemArgs {
    #[arg(help = "User identifier")]
    pub(crate) id: u64,
    #[command(flatten)]
    pub(crate) list: UserListArgs,
}

#[derive(Args, Clone, Default)]
pub(crate) struct TicketListArgs {
    #[command(flatten)]
    pub(crate) page: PageArgs,
    #[arg(
        long = "filter",
        value_parser = parse_filter,
        help = "Ransack predicate as key=value, e.g. issue_status_eq=Open"
    )]
    pub(crate) filters: Vec<(String, String)>,
}

impl TicketListArgs {
    pub(crate) fn filters(&self) -> FilterSet {
        self.filters
            .iter()
            .map(|(key, value)| (key.clone(), FilterValue::from(value.as_str())))
            .collect()
    }
}

#[derive(Args, Clone)]
pub(crate) struct TicketItemArgs {
    #[arg(help = "Ticket identifier")]
    pub(crate) id: u64,
    #[command(flatten)]
    pub(crate) list: TicketListArgs,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Parse a `key=value` filter argument.
pub(crate) fn parse_filter(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("filter '{input}' must be key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("filter '{input}' has an empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}
