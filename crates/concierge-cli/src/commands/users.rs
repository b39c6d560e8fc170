use concierge_api_models::ExternalUser;
use concierge_list::{
    ActiveToggle, ExternalUsersResource, ListController, ListSnapshot, MutationError,
};
use tokio::io::AsyncBufRead;

use crate::cli::{OutputFormat, UserItemArgs, UserListArgs};
use crate::client::{AppContext, CliResult};
use crate::commands::{Browsable, act_once, browse, list_once};
use crate::output::render_users;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UserAction {
    ToggleActive,
    Remove,
}

impl Browsable for ExternalUsersResource {
    type Action = UserAction;

    const NOUN: &'static str = "user";
    const ACTIONS: &'static [&'static str] = &["toggle <id>", "rm <id>"];

    fn action(word: &str) -> Option<UserAction> {
        match word {
            "toggle" | "toggle-active" => Some(UserAction::ToggleActive),
            "rm" | "delete" => Some(UserAction::Remove),
            _ => None,
        }
    }

    async fn apply(
        controller: &ListController<Self>,
        action: UserAction,
        item_id: u64,
    ) -> Result<(), MutationError> {
        match action {
            UserAction::ToggleActive => controller.toggle(item_id, &ActiveToggle).await,
            UserAction::Remove => controller.remove(item_id).await,
        }
    }

    fn render(snapshot: &ListSnapshot<ExternalUser>, format: OutputFormat) -> CliResult<()> {
        render_users(snapshot, format)
    }
}

pub(crate) async fn handle_list(ctx: &AppContext, args: &UserListArgs) -> CliResult<()> {
    list_once(ctx, ExternalUsersResource, &args.page, args.filters()).await
}

pub(crate) async fn handle_toggle_active(ctx: &AppContext, args: &UserItemArgs) -> CliResult<()> {
    act_once(
        ctx,
        ExternalUsersResource,
        &args.list.page,
        args.list.filters(),
        UserAction::ToggleActive,
        args.id,
    )
    .await
}

pub(crate) async fn handle_remove(ctx: &AppContext, args: &UserItemArgs) -> CliResult<()> {
    act_once(
        ctx,
        ExternalUsersResource,
        &args.list.page,
        args.list.filters(),
        UserAction::Remove,
        args.id,
    )
    .await
}

pub(crate) async fn handle_browse<B>(
    ctx: &AppContext,
    args: &UserListArgs,
    reader: B,
) -> CliResult<()>
where
    B: AsyncBufRead + Unpin + Send,
{
    browse(ctx, ExternalUsersResource, &args.page, args.filters(), reader).await
}
