use std::sync::Arc;

use backoffice::api::ApiClient;
use backoffice::approvals::{ApprovalService, Decision, NewApprovalStep, TimelineOrder, progress, timeline};
use backoffice::config::{ConfigError, ConsoleConfig};
use backoffice::error::ApiError;
use backoffice::models::{ApprovalStatus, Entity, Id, Resource};
use backoffice::notify::{Notifier, Toast};
use backoffice::store::{FetchOutcome, ListQuery, Slice, Store};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("unknown resource `{0}`; expected one of: {known}", known = resource_names())]
    UnknownResource(String),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "backoffice-cli", about = "Back-office console API CLI")]
struct Cli {
    #[arg(long, env = "BACKOFFICE_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "BACKOFFICE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one page of a resource.
    List(ListArgs),
    /// Print one record as JSON.
    Show { resource: String, id: String },
    /// Delete one record.
    Delete { resource: String, id: String },
    Approvals(ApprovalsCommand),
    Notifications(NotificationsCommand),
}

#[derive(Args, Debug)]
struct ListArgs {
    resource: String,

    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long)]
    limit: Option<u32>,

    #[arg(long, default_value = "")]
    search: String,
}

#[derive(Args, Debug)]
struct ApprovalsCommand {
    #[command(subcommand)]
    command: ApprovalsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApprovalsSubcommand {
    /// Ordered approval history of a request.
    Timeline {
        request_id: String,
        #[arg(long, value_enum, default_value_t = TimelineBy::Sequence)]
        by: TimelineBy,
    },
    /// Approvals waiting on the current user.
    Pending {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Add an approval step to a request.
    Create {
        request_id: String,
        #[arg(long)]
        step_no: i64,
        #[arg(long)]
        step_name: String,
        #[arg(long)]
        sequence: Option<i64>,
        #[arg(long, default_value = "Pending")]
        status: ApprovalStatus,
        #[arg(long, default_value = "")]
        remarks: String,
    },
    /// Approve or reject a pending approval.
    Decide {
        approval_id: String,
        decision: Decision,
        #[arg(long, default_value = "")]
        remarks: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimelineBy {
    Sequence,
    Created,
}

#[derive(Args, Debug)]
struct NotificationsCommand {
    #[command(subcommand)]
    command: NotificationsSubcommand,
}

#[derive(Subcommand, Debug)]
enum NotificationsSubcommand {
    /// Mark a notification read.
    Read { id: String },
    /// Mark every notification read.
    ReadAll,
    /// Print the unread count.
    Unread,
}

/// Prints toasts to stderr so stdout stays parseable.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, toast: Toast) {
        eprintln!("[{}] {}", toast.level.as_str(), toast.message);
    }
}

struct CliContext {
    api: ApiClient,
    store: Store,
    page_size: u32,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ConsoleConfig::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_url(url)?;
    }
    if let Some(token) = cli.token.filter(|t| !t.trim().is_empty()) {
        config.token = Some(token);
    }
    tracing::debug!(api_url = %config.api_url, has_token = config.token.is_some(), "cli configured");

    let ctx = CliContext {
        api: ApiClient::from_config(&config, Arc::new(StderrNotifier))?,
        store: Store::new(),
        page_size: config.page_size,
    };

    match cli.command {
        Command::List(args) => run_list(&ctx, args).await,
        Command::Show { resource, id } => run_show(&ctx, &resource, &Id::from(id)).await,
        Command::Delete { resource, id } => run_delete(&ctx, &resource, &Id::from(id)).await,
        Command::Approvals(cmd) => run_approvals(&ctx, cmd).await,
        Command::Notifications(cmd) => run_notifications(&ctx, cmd).await,
    }
}

// =============================================================================
// RESOURCES
// =============================================================================

/// Bind `$slice` to the store slice serving `$resource` and evaluate `$body`.
macro_rules! with_slice {
    ($store:expr, $resource:expr, |$slice:ident| $body:expr) => {
        match $resource.path {
            "clients" => { let $slice = &$store.clients; $body }
            "contractors" => { let $slice = &$store.contractors; $body }
            "contractor-payments" => { let $slice = &$store.contractor_payments; $body }
            "projects" => { let $slice = &$store.projects; $body }
            "tasks" => { let $slice = &$store.tasks; $body }
            "financials" => { let $slice = &$store.financials; $body }
            "banks" => { let $slice = &$store.banks; $body }
            "invoices" => { let $slice = &$store.invoices; $body }
            "forms" => { let $slice = &$store.forms; $body }
            "attachments" => { let $slice = &$store.attachments; $body }
            "notifications" => { let $slice = &$store.notifications; $body }
            "requests" => { let $slice = &$store.requests; $body }
            // "approvals", the only path left in `Resource::ALL`
            _ => { let $slice = &$store.approvals; $body }
        }
    };
}

fn resolve(resource: &str) -> Result<Resource, CliError> {
    Resource::from_path(resource.trim()).ok_or_else(|| CliError::UnknownResource(resource.to_owned()))
}

fn resource_names() -> String {
    Resource::ALL.iter().map(|r| r.path).collect::<Vec<_>>().join(", ")
}

async fn run_list(ctx: &CliContext, args: ListArgs) -> Result<(), CliError> {
    let resource = resolve(&args.resource)?;
    let query = ListQuery::new(args.limit.unwrap_or(ctx.page_size))
        .with_search(args.search)
        .with_page(args.page);
    with_slice!(ctx.store, resource, |slice| list_page(&ctx.api, slice, query).await)
}

async fn list_page<T: Entity>(api: &ApiClient, slice: &Slice<T>, query: ListQuery) -> Result<(), CliError> {
    if let FetchOutcome::Failed(e) = slice.fetch(api, query).await {
        return Err(e.into());
    }
    let state = slice.snapshot();
    let rows = state
        .items
        .iter()
        .map(|item| vec![item.id().to_string(), item.title()])
        .collect::<Vec<_>>();
    print_table(&["ID", T::RESOURCE.label], &rows);
    let p = state.pagination;
    println!("page {} of {} ({} total)", p.page, p.pages.max(1), p.total);
    Ok(())
}

async fn run_show(ctx: &CliContext, resource: &str, id: &Id) -> Result<(), CliError> {
    let resource = resolve(resource)?;
    with_slice!(ctx.store, resource, |slice| {
        let record = slice.fetch_one(&ctx.api, id).await?;
        print_json(&serde_json::to_value(&record)?)
    })
}

async fn run_delete(ctx: &CliContext, resource: &str, id: &Id) -> Result<(), CliError> {
    let resource = resolve(resource)?;
    with_slice!(ctx.store, resource, |slice| slice.remove(&ctx.api, id).await.map_err(CliError::from))
}

// =============================================================================
// APPROVALS
// =============================================================================

async fn run_approvals(ctx: &CliContext, cmd: ApprovalsCommand) -> Result<(), CliError> {
    let service = ApprovalService::new(ctx.api.clone());
    match cmd.command {
        ApprovalsSubcommand::Timeline { request_id, by } => {
            let approvals = service.list_for_request(&Id::from(request_id)).await?;
            let order = match by {
                TimelineBy::Sequence => TimelineOrder::Sequence,
                TimelineBy::Created => TimelineOrder::CreatedAt,
            };
            let rows = timeline(&approvals, order)
                .into_iter()
                .map(|entry| {
                    let a = entry.approval;
                    vec![
                        a.sequence.to_string(),
                        a.title(),
                        format!("{} ({})", a.status, entry.tone.color()),
                        a.created_name,
                        a.remarks,
                        a.created_at,
                    ]
                })
                .collect::<Vec<_>>();
            print_table(&["SEQ", "STEP", "STATUS", "BY", "REMARKS", "CREATED"], &rows);
            let p = progress(&approvals);
            println!("overall: {} ({} approved, {} pending, {} rejected)", p.outcome, p.approved, p.pending, p.rejected);
            Ok(())
        }
        ApprovalsSubcommand::Pending { page, limit } => {
            let query = ListQuery::new(limit.unwrap_or(ctx.page_size)).with_page(page);
            let page = service.pending(&query).await?;
            let rows = page
                .items
                .iter()
                .map(|a| vec![a.id.to_string(), a.request_id.to_string(), a.title(), a.status.to_string()])
                .collect::<Vec<_>>();
            print_table(&["ID", "REQUEST", "STEP", "STATUS"], &rows);
            println!("page {} of {} ({} total)", page.pagination.page, page.pagination.pages.max(1), page.pagination.total);
            Ok(())
        }
        ApprovalsSubcommand::Create { request_id, step_no, step_name, sequence, status, remarks } => {
            let mut step = NewApprovalStep::new(step_no, step_name).with_status(status).with_remarks(remarks);
            if let Some(sequence) = sequence {
                step = step.with_sequence(sequence);
            }
            let created = service.create_step(&Id::from(request_id), &step).await?;
            print_json(&created.data)
        }
        ApprovalsSubcommand::Decide { approval_id, decision, remarks } => {
            service.decide(&Id::from(approval_id), decision, &remarks).await?;
            Ok(())
        }
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

async fn run_notifications(ctx: &CliContext, cmd: NotificationsCommand) -> Result<(), CliError> {
    let notifications = &ctx.store.notifications;
    match cmd.command {
        NotificationsSubcommand::Read { id } => notifications.mark_read(&ctx.api, &Id::from(id)).await?,
        NotificationsSubcommand::ReadAll => notifications.mark_all_read(&ctx.api).await?,
        NotificationsSubcommand::Unread => println!("{}", notifications.unread_count(&ctx.api).await?),
    }
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Left-aligned columns separated by two spaces.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        let padded = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    if rows.is_empty() {
        out.push_str("(no records)\n");
    }
    out
}
