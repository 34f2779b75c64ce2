use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crowdforge_config::ForgeDef;
use crowdforge_flow::candidate_ratings;
use crowdforge_model::{Resolved, resolve};
use crowdforge_store::{SqliteStore, Store};

mod simulate;

/// CrowdForge - map-reduce over crowd workers
#[derive(Parser)]
#[command(name = "crowdforge")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.crowdforge)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Database URL (default: sqlite://<data-dir>/crowdforge.db)
  #[arg(long, global = true, env = "CROWDFORGE_DATABASE_URL")]
  database_url: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Load templates and problems from a definitions file
  Load {
    /// Path to the definitions file (JSON)
    defs_file: PathBuf,
  },

  /// List problems and their stages
  Problems,

  /// Show candidate ratings for a problem
  Ratings {
    /// The problem ID
    problem_id: String,
  },

  /// Run a scenario end to end against a simulated marketplace
  Simulate {
    /// Path to the scenario file (JSON)
    scenario_file: PathBuf,

    /// Give up after this many ticks
    #[arg(long, default_value_t = 50)]
    max_ticks: u32,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing()?;

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".crowdforge"),
  };
  let database_url = cli
    .database_url
    .unwrap_or_else(|| format!("sqlite://{}", data_dir.join("crowdforge.db").display()));

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Load { defs_file }) => {
      rt.block_on(load(&defs_file, &data_dir, &database_url))?;
    }
    Some(Commands::Problems) => {
      rt.block_on(list_problems(&data_dir, &database_url))?;
    }
    Some(Commands::Ratings { problem_id }) => {
      rt.block_on(show_ratings(&problem_id, &data_dir, &database_url))?;
    }
    Some(Commands::Simulate {
      scenario_file,
      max_ticks,
    }) => {
      rt.block_on(simulate::run(&scenario_file, max_ticks))?;
    }
    None => {
      println!("crowdforge - use --help to see available commands");
    }
  }

  Ok(())
}

fn init_tracing() -> Result<()> {
  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crowdforge=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init()
    .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

async fn open_store(data_dir: &Path, database_url: &str) -> Result<SqliteStore> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let options = SqliteConnectOptions::from_str(database_url)
    .with_context(|| format!("invalid database url: {}", database_url))?
    .create_if_missing(true);
  let pool = SqlitePoolOptions::new()
    .connect_with(options)
    .await
    .with_context(|| format!("failed to open database: {}", database_url))?;

  let store = SqliteStore::new(pool);
  store.migrate().await.context("failed to run migrations")?;
  Ok(store)
}

pub(crate) async fn read_defs(path: &Path) -> Result<String> {
  tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read file: {}", path.display()))
}

/// Persist resolved definitions.
pub(crate) async fn save_definitions<S: Store + ?Sized>(
  store: &S,
  resolved: &Resolved,
) -> Result<()> {
  for template in &resolved.templates {
    store
      .create_template(template)
      .await
      .with_context(|| format!("failed to save template {}", template.name))?;
  }
  for problem in &resolved.problems {
    store
      .create_problem(problem)
      .await
      .with_context(|| format!("failed to save problem {}", problem.name))?;
  }
  Ok(())
}

async fn load(defs_file: &Path, data_dir: &Path, database_url: &str) -> Result<()> {
  let content = read_defs(defs_file).await?;
  let defs = ForgeDef::from_json(&content)
    .with_context(|| format!("invalid definitions file: {}", defs_file.display()))?;
  let resolved = resolve(&defs).context("failed to resolve definitions")?;

  let store = open_store(data_dir, database_url).await?;
  save_definitions(&store, &resolved).await?;

  eprintln!(
    "Loaded {} templates and {} problems",
    resolved.templates.len(),
    resolved.problems.len()
  );
  for problem in &resolved.problems {
    println!("{}\t{}\t{}", problem.problem_id, problem.name, problem.flow);
  }
  Ok(())
}

async fn list_problems(data_dir: &Path, database_url: &str) -> Result<()> {
  let store = open_store(data_dir, database_url).await?;
  let problems = store.list_problems().await.context("failed to list problems")?;
  println!("{}", serde_json::to_string_pretty(&problems)?);
  Ok(())
}

async fn show_ratings(problem_id: &str, data_dir: &Path, database_url: &str) -> Result<()> {
  let store = open_store(data_dir, database_url).await?;
  let problem = store
    .get_problem(problem_id)
    .await
    .with_context(|| format!("failed to load problem {}", problem_id))?;
  let history = store.problem_history(problem_id).await?;

  let ratings = candidate_ratings(&problem, &history)?;
  println!("{}", serde_json::to_string_pretty(&ratings)?);
  Ok(())
}
