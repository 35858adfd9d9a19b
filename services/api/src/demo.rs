use crate::infra::{parse_scope, parse_stage, InMemoryCollaborator, StdoutNotices, DEMO_JOB};
use crate::server;
use chrono::Local;
use clap::Args;
use placement_pipeline::config::AppConfig;
use placement_pipeline::error::AppError;
use placement_pipeline::telemetry;
use placement_pipeline::workflows::pipeline::{
    write_selected_csv, ApiScope, Application, ApplicationId, BoardSnapshot, CommitOutcome,
    CommitRequest, DragPhase, DropOutcome, DropTarget, HttpPipelineClient, JobId, PipelineApi,
    PipelineBoard, PipelineHandle, PipelineRuntime, RefreshOutcome, RefreshPolicy, Stage,
    StageColumn,
};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const SETTLE_ATTEMPTS: usize = 40;
const SETTLE_STEP: Duration = Duration::from_millis(50);

type CliBoard = PipelineBoard<HttpPipelineClient, StdoutNotices>;

#[derive(Args, Debug, Default)]
pub(crate) struct RemoteArgs {
    /// Collaborator base URL (defaults to PIPELINE_API_BASE_URL)
    #[arg(long)]
    pub(crate) base_url: Option<String>,
    /// Route scope: company, officer or admin
    #[arg(long, value_parser = parse_scope)]
    pub(crate) scope: Option<ApiScope>,
}

#[derive(Args, Debug)]
pub(crate) struct BoardArgs {
    /// Job whose applications are shown
    #[arg(long)]
    pub(crate) job: u64,
    /// Print the columns as JSON instead of a listing
    #[arg(long)]
    pub(crate) json: bool,
    #[command(flatten)]
    pub(crate) remote: RemoteArgs,
}

#[derive(Args, Debug)]
pub(crate) struct MoveArgs {
    /// Job the application belongs to
    #[arg(long)]
    pub(crate) job: u64,
    /// Application to move
    #[arg(long)]
    pub(crate) application: u64,
    /// Target stage id, e.g. INTERVIEW
    #[arg(long, value_parser = parse_stage)]
    pub(crate) to: Stage,
    /// Offered package (LPA); required when moving to SELECTED
    #[arg(long)]
    pub(crate) package: Option<String>,
    #[command(flatten)]
    pub(crate) remote: RemoteArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Job whose selected candidates are exported
    #[arg(long)]
    pub(crate) job: u64,
    /// Write to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    #[command(flatten)]
    pub(crate) remote: RemoteArgs,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Poll interval for the demo board, in seconds
    #[arg(long, default_value_t = 2)]
    pub(crate) poll_secs: u64,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self { poll_secs: 2 }
    }
}

fn remote_config(remote: RemoteArgs) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load()?;
    if let Some(base_url) = remote.base_url {
        config.pipeline.api_base_url = base_url;
    }
    if let Some(scope) = remote.scope {
        config.pipeline.scope = scope;
    }
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

async fn load_board(remote: RemoteArgs, job: u64) -> Result<CliBoard, AppError> {
    let config = remote_config(remote)?;
    let client = HttpPipelineClient::from_config(&config.pipeline)?;
    let mut board = PipelineBoard::new(
        Arc::new(client),
        Arc::new(StdoutNotices::default()),
        config.pipeline.refresh_policy,
    );
    if let RefreshOutcome::Failed(err) = board.load(JobId(job)).await {
        return Err(err.into());
    }
    Ok(board)
}

pub(crate) async fn run_board(args: BoardArgs) -> Result<(), AppError> {
    let board = load_board(args.remote, args.job).await?;
    let columns = board.group_by_stage();

    if args.json {
        let payload = serde_json::to_string_pretty(&columns).map_err(io::Error::from)?;
        println!("{payload}");
    } else {
        println!("Job {} pipeline", args.job);
        render_columns(&columns);
    }
    Ok(())
}

pub(crate) async fn run_move(args: MoveArgs) -> Result<(), AppError> {
    let MoveArgs {
        job,
        application,
        to,
        package,
        remote,
    } = args;
    let mut board = load_board(remote, job).await?;
    let id = ApplicationId(application);

    board.pick_up(id)?;
    let request = match board.drop_on(DropTarget::Column(to))? {
        DropOutcome::Cancelled => {
            println!("Application {id} is already in {}", to.label());
            return Ok(());
        }
        DropOutcome::Commit(request) => {
            if package.is_some() {
                warn!(stage = %to, "--package is only used when moving to SELECTED");
            }
            request
        }
        DropOutcome::AwaitingCapture(dialog) => {
            println!("{}", dialog.prompt());
            match board.submit_capture(package.as_deref().unwrap_or_default()) {
                Ok(request) => request,
                Err(err) => {
                    board.cancel_capture()?;
                    return Err(err.into());
                }
            }
        }
    };

    let result = commit_now(&mut board, request).await;
    render_columns(&board.group_by_stage());
    result
}

/// Commits and hands the remote error back to the caller instead of only raising a notice.
async fn commit_now(board: &mut CliBoard, request: CommitRequest) -> Result<(), AppError> {
    let pending = board.begin_commit(request)?;
    let result = board
        .api()
        .update_status(pending.mutation.application_id, &pending.mutation.patch)
        .await;

    if board.complete_commit(pending, result.clone()) == CommitOutcome::Confirmed {
        if let Some(application) = board.application(request.application_id) {
            println!("{}", card_line(application));
        }
    }
    result.map_err(AppError::from)
}

pub(crate) async fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let board = load_board(args.remote, args.job).await?;
    let applications = board.store().applications();

    let rows = match args.output {
        Some(path) => write_selected_csv(File::create(&path)?, applications)?,
        None => write_selected_csv(io::stdout().lock(), applications)?,
    };
    eprintln!("exported {rows} selected candidate(s) for job {}", args.job);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let collaborator = InMemoryCollaborator::seeded();
    let (addr, server_task) = server::spawn_ephemeral(collaborator.clone()).await?;

    let client = HttpPipelineClient::new(
        format!("http://{addr}/api"),
        ApiScope::Company,
        Duration::from_secs(5),
    )?;
    let notices = StdoutNotices::default();
    let board = PipelineBoard::new(
        Arc::new(client),
        Arc::new(notices.clone()),
        RefreshPolicy::PreserveInFlight,
    );
    let (handle, runtime_task) =
        PipelineRuntime::spawn(board, Duration::from_secs(args.poll_secs.max(1)));

    println!(
        "Placement pipeline demo ({})",
        Local::now().format("%Y-%m-%d %H:%M")
    );
    handle.switch_job(DEMO_JOB).await?;
    let snapshot = wait_for(&handle, |snapshot| snapshot_len(snapshot) > 0).await?;
    println!("\nJob {DEMO_JOB} as loaded");
    render_columns(&snapshot.columns);

    println!("\n1. Drag Asha Rao (#42) onto Interview");
    handle.pick_up(ApplicationId(42)).await?;
    handle.drop_on(DropTarget::Column(Stage::Interview)).await?;
    let snapshot = wait_for(&handle, settled).await?;
    report_stage(&snapshot, ApplicationId(42));

    println!("\n2. Drag Dev Patel (#7) onto Selected");
    handle.pick_up(ApplicationId(7)).await?;
    if let DropOutcome::AwaitingCapture(dialog) =
        handle.drop_on(DropTarget::Column(Stage::Selected)).await?
    {
        println!("   {}", dialog.prompt());
    }
    if let Err(err) = handle.submit_capture("twelve").await {
        println!("   input 'twelve' refused: {err}");
    }
    handle.submit_capture("12.5").await?;
    let snapshot = wait_for(&handle, settled).await?;
    report_stage(&snapshot, ApplicationId(7));

    println!("\n3. Drop Noor Khan (#15) back on Shortlisted");
    handle.pick_up(ApplicationId(15)).await?;
    let outcome = handle
        .drop_on(DropTarget::Column(Stage::Shortlisted))
        .await?;
    println!("   outcome: {outcome:?}");

    println!("\n4. Drag Kiran Das (#8) onto Rejected while the server refuses updates");
    collaborator.reject_next_update();
    handle.pick_up(ApplicationId(8)).await?;
    handle.drop_on(DropTarget::Column(Stage::Rejected)).await?;
    let snapshot = wait_for(&handle, settled).await?;
    report_stage(&snapshot, ApplicationId(8));

    println!("\n5. Drag Meera Iyer (#9) onto Selected, then dismiss the dialog");
    handle.pick_up(ApplicationId(9)).await?;
    handle.drop_on(DropTarget::Column(Stage::Selected)).await?;
    handle.cancel_capture().await?;
    let snapshot = wait_for(&handle, settled).await?;
    report_stage(&snapshot, ApplicationId(9));

    handle.refresh_now().await?;
    let snapshot = wait_for(&handle, settled).await?;
    println!("\nJob {DEMO_JOB} after the session");
    render_columns(&snapshot.columns);

    println!("\nSelected candidates");
    let applications: Vec<Application> = snapshot
        .columns
        .iter()
        .flat_map(|column| column.applications.iter().cloned())
        .collect();
    write_selected_csv(io::stdout().lock(), &applications)?;
    io::stdout().flush()?;

    println!("\nNotices raised: {}", notices.events().len());

    handle.shutdown().await?;
    if let Err(err) = runtime_task.await {
        warn!(error = %err, "pipeline runtime task failed");
    }
    server_task.abort();
    Ok(())
}

async fn wait_for(
    handle: &PipelineHandle,
    ready: impl Fn(&BoardSnapshot) -> bool,
) -> Result<BoardSnapshot, AppError> {
    let mut snapshot = handle.snapshot().await?;
    for _ in 0..SETTLE_ATTEMPTS {
        if ready(&snapshot) {
            break;
        }
        tokio::time::sleep(SETTLE_STEP).await;
        snapshot = handle.snapshot().await?;
    }
    Ok(snapshot)
}

fn settled(snapshot: &BoardSnapshot) -> bool {
    snapshot.in_flight == 0 && snapshot.drag == DragPhase::Idle
}

fn snapshot_len(snapshot: &BoardSnapshot) -> usize {
    snapshot
        .columns
        .iter()
        .map(|column| column.applications.len())
        .sum()
}

fn report_stage(snapshot: &BoardSnapshot, id: ApplicationId) {
    match snapshot.stage_of(id) {
        Some(stage) => println!("   #{id} now in {}", stage.label()),
        None => println!("   #{id} is no longer on the board"),
    }
}

pub(crate) fn render_columns(columns: &[StageColumn]) {
    for column in columns {
        println!("{} ({})", column.label, column.applications.len());
        for application in &column.applications {
            println!("  - {}", card_line(application));
        }
    }
}

pub(crate) fn card_line(application: &Application) -> String {
    let mut line = format!(
        "#{} {} <{}>",
        application.id, application.student_name, application.student_email
    );
    if let Some(package) = application.package_offered {
        line.push_str(&format!(" | {package} LPA"));
    }
    if let Some(applied_at) = application.applied_at {
        line.push_str(&format!(" | applied {}", applied_at.format("%Y-%m-%d")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_line_includes_package_for_selected_candidates() {
        let application = Application::new(ApplicationId(8), "Kiran Das", "kiran@example.edu")
            .with_status(Stage::Selected)
            .with_package(9.5);
        assert_eq!(
            card_line(&application),
            "#8 Kiran Das <kiran@example.edu> | 9.5 LPA"
        );
    }

    #[tokio::test]
    async fn demo_session_runs_against_local_collaborator() {
        run_demo(DemoArgs { poll_secs: 30 })
            .await
            .expect("demo completes");
    }
}
