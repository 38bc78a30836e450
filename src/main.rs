use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use clientdesk_lib::{
    config::AppConfig,
    identity::{Identity, StaticIdentity},
    migrate,
    model::{Client, ClientDraft, ClientId, Employee, Role},
    roster::Roster,
    search::filter_employees,
    store::SqliteStore,
    time::to_rfc3339,
    AppError, ClientListScreen, ClientView,
};

#[derive(Debug, Parser)]
#[command(
    name = "clientdesk",
    about = "Client list maintenance",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CLIENTDESK_GIT_HASH"), ")")
)]
struct Cli {
    /// SQLite database path; overrides CLIENTDESK_DB.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending schema migrations.
    Migrate,
    #[command(subcommand)]
    Clients(ClientsCommand),
    #[command(subcommand)]
    Employees(EmployeesCommand),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ViewArg {
    All,
    Finance,
}

impl From<ViewArg> for ClientView {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::All => ClientView::All,
            ViewArg::Finance => ClientView::Finance,
        }
    }
}

#[derive(Debug, Subcommand)]
enum ClientsCommand {
    /// List the clients visible to a role, optionally narrowed by a search query.
    List {
        #[arg(long, value_enum, default_value = "all")]
        view: ViewArg,
        #[arg(long)]
        role: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Create an `ongoing` client, log it and notify the creator.
    Create {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "employee")]
        role: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        json: bool,
    },
    /// Overwrite a client's name, company and address.
    Edit {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "employee")]
        role: String,
        #[arg(long)]
        id: ClientId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        json: bool,
    },
    /// Assign one or more employees to a client.
    Assign {
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: String,
        #[arg(long, value_enum, default_value = "all")]
        view: ViewArg,
        #[arg(long)]
        id: ClientId,
        #[arg(long = "employee", required = true)]
        employees: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum EmployeesCommand {
    /// Insert or replace an employee record.
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        inactive: bool,
    },
    /// Show the roster a role can assign from in a view.
    List {
        #[arg(long, value_enum, default_value = "all")]
        view: ViewArg,
        #[arg(long)]
        role: String,
        #[arg(long)]
        query: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = match AppConfig::from_env() {
        Ok(config) => config.with_db_override(cli.db.clone()),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    };
    let _guard = clientdesk_lib::init_logging(&config.log_filter, config.log_dir.as_deref());

    match handle_cli(cli.command, &config) {
        Ok(code) => process::exit(code),
        Err(err) => {
            match err.downcast_ref::<AppError>() {
                Some(app) => eprintln!("Error: [{}] {}", app.code(), app.message()),
                None => eprintln!("Error: {err:#}"),
            }
            process::exit(1);
        }
    }
}

fn handle_cli(command: Commands, config: &AppConfig) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;

    runtime.block_on(async {
        let store = Arc::new(
            SqliteStore::open(&config.db_path)
                .await
                .with_context(|| format!("open database {}", config.db_path.display()))?,
        );
        let result = match command {
            Commands::Migrate => {
                let versions: Vec<&str> = migrate::known_versions().collect();
                println!("Schema up to date ({} migrations).", versions.len());
                Ok(0)
            }
            Commands::Clients(cmd) => handle_clients(store.clone(), cmd).await,
            Commands::Employees(cmd) => handle_employees(store.clone(), cmd).await,
        };
        store.pool().close().await;
        result
    })
}

fn screen_for(
    store: Arc<SqliteStore>,
    view: ClientView,
    user: String,
    role: String,
) -> ClientListScreen<SqliteStore, SqliteStore> {
    let identity = Arc::new(StaticIdentity(Identity::new(user, Role::from(role))));
    ClientListScreen::new(store.clone(), store, identity, view)
}

async fn mounted(screen: &ClientListScreen<SqliteStore, SqliteStore>) -> Result<()> {
    let report = screen
        .mount()
        .await
        .context("no identity available for the screen")?;
    if let Some(err) = report.errors.into_iter().next() {
        return Err(err.into());
    }
    Ok(())
}

fn print_client(client: &Client, emit_json: bool) -> Result<()> {
    if emit_json {
        let serialized = serde_json::to_string_pretty(client).context("serialize client")?;
        println!("{serialized}");
    } else {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            client.id,
            client.name,
            client.company,
            client.address,
            client.status,
            to_rfc3339(client.created_at),
            client.assignments.join(",")
        );
    }
    Ok(())
}

fn print_warnings(warnings: &[AppError]) {
    for warning in warnings {
        eprintln!("Warning: [{}] {}", warning.code(), warning.message());
    }
}

async fn handle_clients(store: Arc<SqliteStore>, command: ClientsCommand) -> Result<i32> {
    match command {
        ClientsCommand::List {
            view,
            role,
            user,
            query,
            json,
        } => {
            let screen = screen_for(store, view.into(), user, role);
            mounted(&screen).await?;
            if let Some(query) = query {
                screen.set_query(query);
            }
            let rows = screen.displayed();
            if json {
                let payload = json!({ "clients": rows.as_ref(), "total": screen.snapshot().len() });
                let serialized =
                    serde_json::to_string_pretty(&payload).context("serialize client list")?;
                println!("{serialized}");
            } else {
                for client in rows.iter() {
                    print_client(client, false)?;
                }
            }
            Ok(0)
        }
        ClientsCommand::Create {
            user,
            role,
            name,
            company,
            address,
            json,
        } => {
            let screen = screen_for(store, ClientView::All, user, role);
            screen.mutations().open_create();
            screen
                .mutations()
                .set_create_draft(ClientDraft::new(name, company, address));
            let outcome = screen.submit_create().await?;
            print_warnings(&outcome.warnings);
            print_client(&outcome.client, json)?;
            Ok(0)
        }
        ClientsCommand::Edit {
            user,
            role,
            id,
            name,
            company,
            address,
            json,
        } => {
            let screen = screen_for(store, ClientView::All, user, role);
            mounted(&screen).await?;
            screen.open_edit(id)?;
            screen
                .mutations()
                .set_edit_draft(ClientDraft::new(name, company, address));
            match screen.submit_edit().await? {
                Some(outcome) => {
                    print_warnings(&outcome.warnings);
                    print_client(&outcome.client, json)?;
                }
                None => println!("No client selected."),
            }
            Ok(0)
        }
        ClientsCommand::Assign {
            user,
            role,
            view,
            id,
            employees,
        } => {
            let screen = screen_for(store, view.into(), user, role);
            mounted(&screen).await?;
            screen.open_assign(id)?;
            screen.mutations().select_employees(employees);
            match screen.submit_assign().await? {
                Some(outcome) => {
                    print_warnings(&outcome.warnings);
                    println!(
                        "Assigned {} employee(s) to client {}.",
                        outcome.assigned, outcome.client_id
                    );
                }
                None => println!("Nothing to assign."),
            }
            Ok(0)
        }
    }
}

async fn handle_employees(store: Arc<SqliteStore>, command: EmployeesCommand) -> Result<i32> {
    match command {
        EmployeesCommand::Add {
            id,
            name,
            role,
            inactive,
        } => {
            let employee = Employee {
                id,
                full_name: name,
                role: Role::from(role),
                is_active: !inactive,
            };
            store.upsert_employee(&employee).await?;
            println!("Saved employee {}.", employee.id);
            Ok(0)
        }
        EmployeesCommand::List { view, role, query } => {
            let roster = Roster::new(store, view.into());
            if roster.load(&Role::from(role)).await?.is_none() {
                println!("No roster for this role.");
                return Ok(0);
            }
            let rows = filter_employees(&roster.employees(), query.as_deref().unwrap_or(""));
            for employee in rows {
                println!(
                    "{}\t{}\t{}\t{}",
                    employee.id,
                    employee.full_name,
                    employee.role,
                    if employee.is_active { "active" } else { "inactive" }
                );
            }
            Ok(0)
        }
    }
}
