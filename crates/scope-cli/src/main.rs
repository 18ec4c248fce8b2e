use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use scope_engine::{
    AnalyzePrdRequest, CheckTaskScopeRequest, FsDocumentLoader, ScopeConfig, ScopeEngine, ScopeService,
    ScopeStores, TransitionRequest,
};
use scope_model::{ChangeRequestFilter, ProjectId, TaskDraft, TaskOperation, TransitionAction};
use scope_store::JsonFileStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn project_arg() -> Arg {
    Arg::new("project")
        .long("project")
        .short('p')
        .required(true)
        .help("Project id")
}

fn cli() -> Command {
    Command::new("scope-gov")
        .version(env!("CARGO_PKG_VERSION"))
        .about("PRD scope governance: requirement baselines, scope checks and change requests")
        .arg_required_else_help(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .default_value(".scope-data")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding per-project JSON documents"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs on stderr as JSON lines"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Extract the requirements baseline from a PRD")
                .arg(
                    Arg::new("prd")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("PRD markdown file"),
                )
                .arg(project_arg())
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Re-extract even if the PRD content is unchanged"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Check a task draft against the baseline")
                .arg(project_arg())
                .arg(Arg::new("title").long("title").required(true).help("Task title"))
                .arg(
                    Arg::new("description")
                        .long("description")
                        .default_value("")
                        .help("Task description"),
                )
                .arg(
                    Arg::new("operation")
                        .long("operation")
                        .default_value("add")
                        .value_parser(value_parser!(TaskOperation))
                        .help("add or update"),
                ),
        )
        .subcommand(
            Command::new("hook")
                .about("Run the task-mutation hook for a stored task")
                .arg(project_arg())
                .arg(Arg::new("task").long("task").required(true).help("Task id"))
                .arg(
                    Arg::new("operation")
                        .long("operation")
                        .default_value("update")
                        .value_parser(value_parser!(TaskOperation))
                        .help("add or update"),
                ),
        )
        .subcommand(
            Command::new("associate")
                .about("Link unassociated tasks to requirements")
                .arg(project_arg()),
        )
        .subcommand(
            Command::new("baseline")
                .about("Print the requirements baseline")
                .arg(project_arg()),
        )
        .subcommand(
            Command::new("report")
                .about("Print the task scope report")
                .arg(project_arg()),
        )
        .subcommand(
            Command::new("health")
                .about("Print project scope health")
                .arg(project_arg()),
        )
        .subcommand(
            Command::new("change-requests")
                .about("List change requests")
                .arg(project_arg())
                .arg(Arg::new("status").long("status").help("pending, approved, rejected or implemented"))
                .arg(Arg::new("type").long("type").help("scope_expansion, requirement_change or task_modification"))
                .arg(
                    Arg::new("stats")
                        .long("stats")
                        .action(ArgAction::SetTrue)
                        .help("Print counts instead of records"),
                ),
        )
        .subcommand(
            Command::new("transition")
                .about("Approve, reject or implement a change request")
                .arg(project_arg())
                .arg(Arg::new("id").long("id").required(true).help("Change request id"))
                .arg(
                    Arg::new("action")
                        .long("action")
                        .required(true)
                        .value_parser(value_parser!(TransitionAction))
                        .help("approve, reject or implement"),
                )
                .arg(
                    Arg::new("actor")
                        .long("actor")
                        .default_value("cli")
                        .help("Identity recorded in the history"),
                )
                .arg(Arg::new("note").long("note").help("Note recorded in the history")),
        )
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing --{name}"))
}

fn load_config(matches: &ArgMatches) -> Result<ScopeConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => ScopeConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(ScopeConfig::default()),
    }
}

/// Split a PRD path into the loader root and the file name under it
fn document_root(prd: &Path) -> Result<(PathBuf, String)> {
    let Some(name) = prd.file_name() else {
        bail!("{} does not name a file", prd.display());
    };
    let root = match prd.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((root, name.to_string_lossy().into_owned()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = load_config(&matches)?;
    let data_dir = matches
        .get_one::<PathBuf>("data-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(".scope-data"));
    let store = Arc::new(JsonFileStore::new(&data_dir));
    let engine = Arc::new(ScopeEngine::new(config, ScopeStores::shared(store.clone()))?);

    let Some((command, args)) = matches.subcommand() else {
        bail!("no command given");
    };
    let project = required(args, "project")?;

    match command {
        "analyze" => {
            let prd = args.get_one::<PathBuf>("prd").context("missing PRD path")?;
            let (root, file) = document_root(prd)?;
            store
                .ensure_project(&ProjectId::new(project)?)
                .await
                .with_context(|| format!("creating project directory under {}", data_dir.display()))?;
            let service = ScopeService::new(engine, Arc::new(FsDocumentLoader::new(root)));
            let request = AnalyzePrdRequest {
                prd_file_path: file,
                force: args.get_flag("force"),
            };
            print_json(&service.analyze_prd(project, request).await?)
        }
        other => {
            let service = ScopeService::new(engine, Arc::new(FsDocumentLoader::new(".")));
            run(&service, other, project, args).await
        }
    }
}

async fn run(service: &ScopeService, command: &str, project: &str, args: &ArgMatches) -> Result<()> {
    match command {
        "check" => {
            let request = CheckTaskScopeRequest {
                task: TaskDraft::new(required(args, "title")?, required(args, "description")?),
                operation: args
                    .get_one::<TaskOperation>("operation")
                    .copied()
                    .unwrap_or(TaskOperation::Add),
            };
            print_json(&service.check_task_scope(project, request).await?)
        }
        "hook" => {
            let task = required(args, "task")?;
            let outcome = match args.get_one::<TaskOperation>("operation").copied() {
                Some(TaskOperation::Add) => service.on_task_created(project, task).await,
                _ => service.on_task_updated(project, task).await,
            };
            print_json(&outcome)
        }
        "associate" => print_json(&service.auto_associate_tasks(project).await?),
        "baseline" => print_json(&service.get_requirements_baseline(project).await?),
        "report" => print_json(&service.task_scope_report(project).await?),
        "health" => print_json(&service.scope_health(project).await?),
        "change-requests" => {
            if args.get_flag("stats") {
                return print_json(&service.change_request_stats(project).await?);
            }
            let filter = ChangeRequestFilter {
                status: args.get_one::<String>("status").map(|s| s.parse()).transpose()?,
                kind: args.get_one::<String>("type").map(|s| s.parse()).transpose()?,
            };
            print_json(&service.list_change_requests(project, filter).await?)
        }
        "transition" => {
            let request = TransitionRequest {
                action: *args
                    .get_one::<TransitionAction>("action")
                    .context("missing --action")?,
                actor: required(args, "actor")?.to_string(),
                note: args.get_one::<String>("note").cloned(),
            };
            print_json(
                &service
                    .transition_change_request(project, required(args, "id")?, request)
                    .await?,
            )
        }
        other => bail!("unknown command {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn parses_transition_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "scope-gov", "transition", "--project", "demo", "--id", "CR-1", "--action", "approve",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "transition");
        assert_eq!(args.get_one::<TransitionAction>("action"), Some(&TransitionAction::Approve));
        assert_eq!(required(args, "actor").unwrap(), "cli");
    }

    #[test]
    fn document_root_defaults_to_current_dir() {
        let (root, name) = document_root(Path::new("prd.md")).unwrap();
        assert_eq!(root, PathBuf::from("."));
        assert_eq!(name, "prd.md");

        let (root, _) = document_root(Path::new("docs/v2/prd.md")).unwrap();
        assert_eq!(root, PathBuf::from("docs/v2"));
    }
}
