//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use concierge_api_models::{ExternalUser, PermissionStatus, Ticket};
use concierge_list::{
    ListSnapshot, PageInfo, PageSlot, PagerControls, StatusTally, Toast, ToastKind, TotalPages,
    page_window, summary_label,
};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

#[derive(Serialize)]
struct ListView<'a, T: Serialize> {
    rows: &'a [T],
    page: u32,
    page_info: PageInfo,
    pager: PagerControls,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tally: Option<StatusTally>,
}

pub(crate) fn render_users(
    snapshot: &ListSnapshot<ExternalUser>,
    format: OutputFormat,
) -> CliResult<()> {
    let tally = StatusTally::count(&snapshot.rows);
    let text = match format {
        OutputFormat::Json => json(&ListView {
            rows: &snapshot.rows,
            page: snapshot.page,
            page_info: snapshot.page_info,
            pager: snapshot.pager,
            summary: summary_label(snapshot.page, &snapshot.page_info),
            tally: Some(tally),
        })?,
        OutputFormat::Table => {
            let mut text = users_table(&snapshot.rows);
            let _ = writeln!(
                text,
                "approved: {}  pending: {}  rejected: {}",
                tally.approved, tally.pending, tally.rejected
            );
            text.push_str(&pager_footer(snapshot));
            text
        }
    };
    println!("{text}");
    Ok(())
}

pub(crate) fn render_tickets(
    snapshot: &ListSnapshot<Ticket>,
    format: OutputFormat,
) -> CliResult<()> {
    let text = match format {
        OutputFormat::Json => json(&ListView {
            rows: &snapshot.rows,
            page: snapshot.page,
            page_info: snapshot.page_info,
            pager: snapshot.pager,
            summary: summary_label(snapshot.page, &snapshot.page_info),
            tally: None,
        })?,
        OutputFormat::Table => {
            let mut text = tickets_table(&snapshot.rows);
            text.push_str(&pager_footer(snapshot));
            text
        }
    };
    println!("{text}");
    Ok(())
}

pub(crate) fn render_toasts(toasts: &[Toast], format: OutputFormat) -> CliResult<()> {
    if toasts.is_empty() {
        return Ok(());
    }
    match format {
        OutputFormat::Json => println!("{}", json(&toasts)?),
        OutputFormat::Table => {
            for toast in toasts {
                println!("{}", format_toast(toast));
            }
        }
    }
    Ok(())
}

fn json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

#[must_use]
pub(crate) fn format_toast(toast: &Toast) -> String {
    let kind = match toast.kind {
        ToastKind::Success => "ok",
        ToastKind::Error => "error",
    };
    format!("[{kind}] {}", toast.message)
}

#[must_use]
pub(crate) fn users_table(rows: &[ExternalUser]) -> String {
    let mut text = format!(
        "{:>6} {:<28} {:<32} {:<9} {:<6}\n",
        "ID", "NAME", "EMAIL", "STATUS", "ACTIVE"
    );
    for user in rows {
        let status = user
            .effective_status()
            .map_or("-", PermissionStatus::as_str);
        let _ = writeln!(
            text,
            "{:>6} {:<28} {:<32} {:<9} {:<6}",
            user.id,
            truncate(&user.name, 28),
            truncate(user.email.as_deref().unwrap_or("-"), 32),
            status,
            if user.is_active() { "yes" } else { "no" }
        );
    }
    text
}

#[must_use]
pub(crate) fn tickets_table(rows: &[Ticket]) -> String {
    let mut text = format!(
        "{:>6} {:<10} {:<12} {:<4} {:<6} {:<4} HEADING\n",
        "ID", "NUMBER", "STATUS", "PRI", "GOLDEN", "FLAG"
    );
    for ticket in rows {
        let _ = writeln!(
            text,
            "{:>6} {:<10} {:<12} {:<4} {:<6} {:<4} {}",
            ticket.id,
            ticket.ticket_number.as_deref().unwrap_or("-"),
            truncate(ticket.issue_status.as_deref().unwrap_or("-"), 12),
            ticket.priority.as_deref().unwrap_or("-"),
            if ticket.is_golden_ticket { "yes" } else { "no" },
            if ticket.is_flagged { "yes" } else { "no" },
            ticket.heading.as_deref().unwrap_or_default()
        );
    }
    text
}

/// Summary line plus the numbered pager, e.g. `Page 5 of 10 | Total 240` and
/// `< 1 … 4 [5] 6 … 10 >`.
#[must_use]
pub(crate) fn pager_footer<T>(snapshot: &ListSnapshot<T>) -> String {
    let mut text = summary_label(snapshot.page, &snapshot.page_info);
    if snapshot.pager.next_is_heuristic && snapshot.pager.next {
        text.push_str(" | more results may follow");
    }

    let mut pager = vec![if snapshot.pager.previous { "<" } else { " " }.to_string()];
    let slots = match snapshot.page_info.total_pages {
        TotalPages::Known(_) => page_window(snapshot.page, snapshot.page_info.total_pages),
        TotalPages::Unknown => vec![PageSlot::Page(snapshot.page)],
    };
    pager.extend(slots.into_iter().map(|slot| match slot {
        PageSlot::Page(page) if page == snapshot.page => format!("[{page}]"),
        PageSlot::Page(page) => page.to_string(),
        PageSlot::Ellipsis => "…".to_string(),
    }));
    pager.push(if snapshot.pager.next { ">" } else { " " }.to_string());
    let pager = pager.join(" ");
    if !pager.trim().is_empty() {
        text.push('\n');
        text.push_str(pager.trim_end());
    }
    text
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
