use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use uuid::Uuid;

mod settings;

#[derive(Parser, Debug)]
#[command(name = "billfold", about = "Recurring expense tracker maintenance")]
struct Cli {
    /// Settings file, without extension.
    #[arg(long, env = "BILLFOLD_CONFIG", default_value = "config/billfold")]
    config: String,

    /// SQLite file to use instead of the configured database.
    #[arg(long)]
    database: Option<String>,

    /// Log level override.
    #[arg(long)]
    level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations and exit.
    Migrate,
    /// List expenses with unsettled past occurrences.
    Late(UserArgs),
    /// Pay every overdue occurrence of expenses marked as automatic.
    AutoPay(UserArgs),
    /// Compare cached card balances with the ledger.
    Reconcile(ReconcileArgs),
}

#[derive(Args, Debug)]
struct UserArgs {
    #[arg(long, env = "BILLFOLD_USER")]
    user: String,

    /// Reference day, defaults to today (UTC).
    #[arg(long)]
    today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct ReconcileArgs {
    #[arg(long, env = "BILLFOLD_USER")]
    user: String,

    /// Single card to check; all cards of the user otherwise.
    #[arg(long)]
    card: Option<Uuid>,

    /// Overwrite the cached balance with the derived one.
    #[arg(long)]
    repair: bool,
}

impl UserArgs {
    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let mut settings = settings::Settings::new(&cli.config)?;
    if let Some(path) = cli.database {
        settings.database = settings::Database::Sqlite(path);
    }
    if let Some(level) = cli.level {
        settings.app.level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "billfold={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    if let Command::Migrate = cli.command {
        let applied = Migrator::get_applied_migrations(&db).await?;
        println!("{} migrations applied", applied.len());
        return Ok(());
    }

    let engine = engine::Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Migrate => {}
        Command::Late(args) => {
            let late = engine.late_expenses(&args.user, args.today()).await?;
            if late.is_empty() {
                println!("nothing is late");
            }
            for item in late {
                let dates: Vec<String> = item.late_dates.iter().map(|d| d.to_string()).collect();
                println!("{} ({}): {}", item.name, item.cost, dates.join(", "));
            }
        }
        Command::AutoPay(args) => {
            let paid = engine
                .run_automatic_payments(&args.user, args.today())
                .await?;
            for item in paid {
                println!("{}: paid {} occurrences", item.expense_name, item.paid.len());
            }
        }
        Command::Reconcile(args) => {
            let cards = match args.card {
                Some(card) => vec![card],
                None => engine
                    .list_credit_cards(&args.user)
                    .await?
                    .into_iter()
                    .map(|card| card.id)
                    .collect(),
            };
            for card in cards {
                let report = engine
                    .reconcile_credit_card(&args.user, card, args.repair)
                    .await?;
                println!(
                    "{card}: cached {} derived {} drift {}{}",
                    report.cached,
                    report.derived,
                    report.drift(),
                    if report.repaired { " (repaired)" } else { "" }
                );
            }
        }
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    tracing::debug!("connecting to {}", config.url());
    let database = sea_orm::Database::connect(config.url()).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
