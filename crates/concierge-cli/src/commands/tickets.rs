use concierge_api_models::Ticket;
use concierge_list::{ListController, ListSnapshot, MutationError, TicketFlag, TicketsResource};
use tokio::io::AsyncBufRead;

use crate::cli::{OutputFormat, TicketItemArgs, TicketListArgs};
use crate::client::{AppContext, CliResult};
use crate::commands::{Browsable, act_once, browse, list_once};
use crate::output::render_tickets;

impl Browsable for TicketsResource {
    type Action = TicketFlag;

    const NOUN: &'static str = "ticket";
    const ACTIONS: &'static [&'static str] = &["golden <id>", "flag <id>"];

    fn action(word: &str) -> Option<TicketFlag> {
        match word {
            "golden" => Some(TicketFlag::Golden),
            "flag" => Some(TicketFlag::Flagged),
            _ => None,
        }
    }

    async fn apply(
        controller: &ListController<Self>,
        action: TicketFlag,
        item_id: u64,
    ) -> Result<(), MutationError> {
        controller.toggle(item_id, &action).await
    }

    fn render(snapshot: &ListSnapshot<Ticket>, format: OutputFormat) -> CliResult<()> {
        render_tickets(snapshot, format)
    }
}

pub(crate) async fn handle_list(ctx: &AppContext, args: &TicketListArgs) -> CliResult<()> {
    list_once(ctx, TicketsResource, &args.page, args.filters()).await
}

pub(crate) async fn handle_golden(ctx: &AppContext, args: &TicketItemArgs) -> CliResult<()> {
    toggle(ctx, args, TicketFlag::Golden).await
}

pub(crate) async fn handle_flag(ctx: &AppContext, args: &TicketItemArgs) -> CliResult<()> {
    toggle(ctx, args, TicketFlag::Flagged).await
}

async fn toggle(ctx: &AppContext, args: &TicketItemArgs, flag: TicketFlag) -> CliResult<()> {
    act_once(
        ctx,
        TicketsResource,
        &args.list.page,
        args.list.filters(),
        flag,
        args.id,
    )
    .await
}

pub(crate) async fn handle_browse<B>(
    ctx: &AppContext,
    args: &TicketListArgs,
    reader: B,
) -> CliResult<()>
where
    B: AsyncBufRead + Unpin + Send,
{
    browse(ctx, TicketsResource, &args.page, args.filters(), reader).await
}
