//! Command handlers grouped by resource, plus the paging and browse loop they share.

pub(crate) mod tickets;
pub(crate) mod users;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use concierge_list::{
    FetchOutcome, FilterSet, FilterValue, ListController, ListResource, ListSnapshot, LogToasts,
    MutationError, ToastLog, ToastSink,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::cli::{OutputFormat, PageArgs, parse_filter};
use crate::client::{AppContext, CliError, CliResult, fetch_error, mutation_error};
use crate::output::render_toasts;

const SETTLE_POLL: Duration = Duration::from_millis(10);

const BROWSE_HELP: &str = "commands: search <text> | filter <key>=<value> | clear | page <n> | \
next | prev | refresh | show | <action> <id> | help | quit";

/// A resource the CLI can page through and act on.
pub(crate) trait Browsable: ListResource + Sized {
    /// Single-row action.
    type Action: Copy + Send + Sync;

    /// Singular noun for error messages.
    const NOUN: &'static str;

    /// Action words accepted by `browse`, for help output.
    const ACTIONS: &'static [&'static str];

    fn action(word: &str) -> Option<Self::Action>;

    fn apply(
        controller: &ListController<Self>,
        action: Self::Action,
        item_id: u64,
    ) -> impl Future<Output = Result<(), MutationError>> + Send;

    fn render(snapshot: &ListSnapshot<Self::Item>, format: OutputFormat) -> CliResult<()>;
}

/// Fetch one page and print it.
pub(crate) async fn list_once<R: Browsable>(
    ctx: &AppContext,
    resource: R,
    page: &PageArgs,
    filters: FilterSet,
) -> CliResult<()> {
    let controller = ctx.controller(resource, Arc::new(LogToasts));
    load(&controller, page, filters).await?;
    R::render(&controller.snapshot(), ctx.output)
}

/// Load the page holding `item_id`, run `action` on it and print the result.
pub(crate) async fn act_once<R: Browsable>(
    ctx: &AppContext,
    resource: R,
    page: &PageArgs,
    filters: FilterSet,
    action: R::Action,
    item_id: u64,
) -> CliResult<()> {
    let toasts = Arc::new(ToastLog::new());
    let controller = ctx.controller(resource, Arc::clone(&toasts) as Arc<dyn ToastSink>);
    load(&controller, page, filters).await?;

    let result = R::apply(&controller, action, item_id).await;
    render_toasts(&toasts.drain(), ctx.output)?;
    result.map_err(|err| mutation_error(err, R::NOUN))?;
    R::render(&controller.snapshot(), ctx.output)
}

async fn load<R: Browsable>(
    controller: &ListController<R>,
    page: &PageArgs,
    filters: FilterSet,
) -> CliResult<()> {
    let outcome = controller.open(page.search(), filters, page.page).await;
    match outcome {
        FetchOutcome::Committed { .. } => Ok(()),
        FetchOutcome::Failed(err) => Err(fetch_error(err, controller.resource().name())),
        FetchOutcome::Superseded | FetchOutcome::Skipped => Err(CliError::failure(anyhow!(
            "loading {} was interrupted",
            controller.resource().name()
        ))),
    }
}

/// One line of `browse` input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BrowseCommand<A> {
    Search(String),
    Filter(String, String),
    Clear,
    Page(u32),
    Next,
    Previous,
    Refresh,
    Show,
    Act(A, u64),
    Help,
    Quit,
}

pub(crate) fn parse_command<R: Browsable>(line: &str) -> Result<BrowseCommand<R::Action>, String> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));
    let command = match word {
        "search" => BrowseCommand::Search(rest.to_string()),
        "filter" => {
            let (key, value) = parse_filter(rest)?;
            BrowseCommand::Filter(key, value)
        }
        "clear" => BrowseCommand::Clear,
        "page" => BrowseCommand::Page(
            rest.parse()
                .ok()
                .filter(|page| *page > 0)
                .ok_or_else(|| format!("'{rest}' is not a page number"))?,
        ),
        "next" | "n" => BrowseCommand::Next,
        "prev" | "p" => BrowseCommand::Previous,
        "refresh" => BrowseCommand::Refresh,
        "show" | "ls" => BrowseCommand::Show,
        "help" | "?" => BrowseCommand::Help,
        "quit" | "exit" | "q" => BrowseCommand::Quit,
        other => {
            let action = R::action(other).ok_or_else(|| format!("unknown command '{other}'"))?;
            let item_id = rest
                .parse()
                .map_err(|_| format!("{other} needs a {} id", R::NOUN))?;
            BrowseCommand::Act(action, item_id)
        }
    };
    Ok(command)
}

/// Interactive paging driven by line commands from `reader`.
///
/// `search` only records the text; the query picks it up after the debounce
/// window, so a burst of searches costs one request.
pub(crate) async fn browse<R, B>(
    ctx: &AppContext,
    resource: R,
    page: &PageArgs,
    mut filters: FilterSet,
    reader: B,
) -> CliResult<()>
where
    R: Browsable,
    B: AsyncBufRead + Unpin + Send,
{
    let toasts = Arc::new(ToastLog::new());
    let controller = ctx.controller(resource, Arc::clone(&toasts) as Arc<dyn ToastSink>);
    load(&controller, page, filters.clone()).await?;
    R::render(&controller.snapshot(), ctx.output)?;

    let mut search_pending = false;
    let mut lines = reader.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| CliError::failure(anyhow!(err).context("failed to read command")))?
    {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command::<R>(&line) {
            Ok(BrowseCommand::Search(text)) => {
                controller.set_search_term(text);
                search_pending = true;
                continue;
            }
            Ok(command) => command,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };
        if search_pending {
            settle(&controller).await;
            search_pending = false;
        }

        let outcome = match command {
            BrowseCommand::Quit => break,
            BrowseCommand::Help => {
                println!("{BROWSE_HELP}");
                println!("actions: {}", R::ACTIONS.join(", "));
                continue;
            }
            BrowseCommand::Show => FetchOutcome::Skipped,
            BrowseCommand::Filter(key, value) => {
                filters.insert(key, FilterValue::from(value.as_str()));
                controller.set_filters(filters.clone()).await
            }
            BrowseCommand::Clear => {
                filters = FilterSet::new();
                controller.clear_filters().await
            }
            BrowseCommand::Page(page) => controller.set_page(page).await,
            BrowseCommand::Next => controller.next_page().await,
            BrowseCommand::Previous => controller.previous_page().await,
            BrowseCommand::Refresh => controller.refresh().await,
            BrowseCommand::Act(action, item_id) => {
                let result = R::apply(&controller, action, item_id).await;
                render_toasts(&toasts.drain(), ctx.output)?;
                if let Err(err) = result {
                    eprintln!("error: {}", mutation_error(err, R::NOUN).display_message());
                }
                FetchOutcome::Skipped
            }
            BrowseCommand::Search(_) => continue,
        };
        if let FetchOutcome::Failed(err) = outcome {
            eprintln!(
                "error: {}",
                fetch_error(err, controller.resource().name()).display_message()
            );
        }
        R::render(&controller.snapshot(), ctx.output)?;
    }

    controller.shutdown();
    Ok(())
}

/// Wait for a pending debounced search to be applied and its fetch to land.
async fn settle<R: ListResource>(controller: &ListController<R>) {
    let settings = *controller.settings();
    let deadline = Instant::now() + settings.debounce + settings.request_timeout;
    sleep(settings.debounce + SETTLE_POLL).await;
    while controller.snapshot().loading {
        if Instant::now() >= deadline {
            debug!(resource = controller.resource().name(), "search still loading");
            return;
        }
        sleep(SETTLE_POLL).await;
    }
}
