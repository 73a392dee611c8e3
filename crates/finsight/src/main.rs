//! FinSight
//!
//! Bookkeeping, contractor billing, profit sharing and cash-flow reporting
//! for a small services company, backed by a local document store.

mod actions;
mod book;
mod config;
mod constants;
mod forecast_client;
mod import;
mod live;
mod reports;
mod store;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use finsight_core::cashflow::{build_series, build_statement};
use finsight_core::contractors::{contractor_metrics, expiring_contracts, project_future_revenue};
use finsight_core::distribution::DistributionStatus;
use finsight_core::ledger::{AggregateFilter, aggregate};
use finsight_core::pipeline::{attention_items, funnel_metrics, pipeline_metrics};
use finsight_core::subscriptions::subscription_metrics;
use finsight_core::{BookContext, Month, Period};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use book::Book;
use config::{Config, FileConfig};
use forecast_client::ForecastClient;
use import::ImportKind;
use live::LiveBook;
use store::Store;

#[derive(Parser, Debug)]
#[command(name = "finsight")]
#[command(about = "Financial aggregation and cash-flow reconciliation")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = constants::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Data directory for the document store
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Reference day for aging and windows (default: today)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Profit & loss for a period
    Summary {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Cash-flow statement with aging, burn and runway
    CashFlow {
        #[command(flatten)]
        period: PeriodArgs,

        /// Also show the trailing N months as a chained series
        #[arg(long)]
        months: Option<u32>,
    },

    /// Contractor margins, projection and expiring contracts
    Contractors {
        /// Restrict to one month (YYYY-MM)
        #[arg(long)]
        month: Option<Month>,

        /// Months to project ahead
        #[arg(long, default_value_t = 3)]
        ahead: u32,
    },

    /// Subscription costs and upcoming bills
    Subscriptions,

    /// Profit distribution waterfall
    Distribute {
        #[command(flatten)]
        period: PeriodArgs,

        /// Record the distribution instead of previewing it
        #[arg(long)]
        record: bool,

        /// Record as pending rather than completed
        #[arg(long, requires = "record")]
        pending: bool,
    },

    /// Recruitment funnel, sales pipeline and attention list
    Pipeline,

    /// Revenue and expense forecast
    Forecast {
        /// Months to forecast (default from config)
        #[arg(long)]
        months: Option<u32>,
    },

    /// Import records from a CSV file
    Import {
        #[arg(value_enum)]
        kind: ImportKind,

        /// Path to CSV file
        file: PathBuf,
    },

    /// Manage contractor timesheets
    Timesheets {
        #[command(subcommand)]
        action: TimesheetsCommand,
    },

    /// Record a payment
    MarkPaid {
        #[command(subcommand)]
        target: MarkPaidCommand,
    },

    /// Delete a record
    Delete {
        /// Collection name (see `stats`)
        collection: String,

        id: String,
    },

    /// Follow the store and print a status line on every change
    Watch,

    /// Show store statistics
    Stats,
}

#[derive(Subcommand, Debug)]
enum TimesheetsCommand {
    /// Create standard-days timesheets for every active assignment
    Generate {
        /// Month (YYYY-MM)
        #[arg(long)]
        month: Month,
    },
}

#[derive(Subcommand, Debug)]
enum MarkPaidCommand {
    /// Ledger transaction
    Transaction {
        id: String,

        /// Payment date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Amount paid, if less than the full amount
        #[arg(long)]
        amount: Option<f64>,
    },

    /// Customer invoice for a timesheet
    Invoice {
        id: String,

        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Contractor payout for a timesheet
    Contractor {
        id: String,

        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(ClapArgs, Debug)]
struct PeriodArgs {
    /// Reporting period
    #[arg(long, value_enum, default_value_t = PeriodPreset::ThisMonth)]
    preset: PeriodPreset,

    /// Custom start (YYYY-MM-DD); requires --to
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Custom end (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PeriodPreset {
    ThisMonth,
    LastMonth,
    ThisQuarter,
    LastQuarter,
    YearToDate,
}

impl PeriodArgs {
    fn resolve(&self, today: NaiveDate) -> Result<Period> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            return Ok(Period::new(from, to)?);
        }
        Ok(match self.preset {
            PeriodPreset::ThisMonth => Period::this_month(today),
            PeriodPreset::LastMonth => Period::last_month(today),
            PeriodPreset::ThisQuarter => Period::this_quarter(today),
            PeriodPreset::LastQuarter => Period::last_quarter(today),
            PeriodPreset::YearToDate => Period::year_to_date(today),
        })
    }
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(path: &Path) -> Result<Config> {
    let file_config = if path.exists() {
        FileConfig::load(path)?
    } else {
        println!(
            "Config file '{}' not found; using defaults.\n\
            Create it with an [organization] section to set the bank balance and retention.\n",
            path.display()
        );
        FileConfig::default()
    };
    Config::from_file(&file_config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = load_config(&args.config)?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let mut ctx = BookContext::new(config.organization.clone(), today);
    ctx.rates = config.rates.clone();
    ctx.settings = config.settings;

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("Failed to create {}", args.data_dir.display()))?;
    let store = Store::open(&args.data_dir.join(constants::STORE_FILENAME)).await?;
    debug!(data_dir = %args.data_dir.display(), %today, "store opened");

    let result = handle_command(args.command, &store, &config, &ctx).await;
    if store.is_degraded() {
        eprintln!("⚠️  Some activity log writes failed; see the log output for details.");
    }
    result
}

async fn handle_command(
    command: Command,
    store: &Store,
    config: &Config,
    ctx: &BookContext,
) -> Result<()> {
    let today = ctx.today;
    match command {
        Command::Summary { period } => {
            let period = period.resolve(today)?;
            let book = Book::load(store).await?;
            let pnl = aggregate(&book.transactions, &AggregateFilter::period(&period));
            reports::print_summary(&pnl, &period);
            reports::print_skipped(&book.skipped);
            Ok(())
        }

        Command::CashFlow { period, months } => {
            let period = period.resolve(today)?;
            let book = Book::load(store).await?;
            let inputs = book.cash_flow_inputs();

            if let Some(months) = months.filter(|m| *m > 1) {
                let last = Month::of(period.end);
                let periods: Vec<Period> = (0..months as i32)
                    .rev()
                    .map(|back| Period::month(last.offset(-back)))
                    .collect();
                let series = build_series(&inputs, ctx, &periods);
                reports::print_cash_flow_series(&series);
                if let Some(latest) = series.last() {
                    reports::print_cash_flow(latest);
                }
            } else {
                reports::print_cash_flow(&build_statement(&inputs, ctx, &period));
            }
            reports::print_skipped(&book.skipped);
            Ok(())
        }

        Command::Contractors { month, ahead } => {
            let book = Book::load(store).await?;
            let metrics = contractor_metrics(&book.assignments, &book.timesheets, month);
            let projection = project_future_revenue(&book.assignments, ahead, today, &ctx.rates);
            let expiring = expiring_contracts(
                &book.assignments,
                today,
                ctx.settings.expiring_contract_days,
            );
            reports::print_contractors(&metrics, &projection, &expiring);
            reports::print_skipped(&book.skipped);
            Ok(())
        }

        Command::Subscriptions => {
            let book = Book::load(store).await?;
            let metrics =
                subscription_metrics(&book.subscriptions, today, ctx.settings.upcoming_bill_days);
            reports::print_subscriptions(&metrics);
            Ok(())
        }

        Command::Distribute {
            period,
            record,
            pending,
        } => {
            let period = period.resolve(today)?;
            if record {
                let status = if pending {
                    DistributionStatus::Pending
                } else {
                    DistributionStatus::Completed
                };
                let (plan, created) =
                    actions::record_distribution(store, ctx, &period, status, Utc::now()).await?;
                reports::print_distribution(&plan, &created);
            } else {
                let book = Book::load(store).await?;
                let plan = actions::distribution_plan(&book, ctx, &period)?;
                reports::print_distribution(&plan, &[]);
                if plan.is_distributable() {
                    println!("\nPreview only. Use --record to record the distribution.");
                }
            }
            Ok(())
        }

        Command::Pipeline => {
            let book = Book::load(store).await?;
            let funnel = funnel_metrics(&book.submissions);
            let pipeline = pipeline_metrics(&book.deals);
            let attention = attention_items(
                &book.tasks,
                &book.submissions,
                &book.roles,
                today,
                ctx.settings.review_stale_days,
            );
            reports::print_pipeline(&funnel, &pipeline, &attention);
            Ok(())
        }

        Command::Forecast { months } => {
            let book = Book::load(store).await?;
            let client = ForecastClient::new(
                config.forecast_service.clone(),
                Duration::from_secs(constants::FORECAST_BACKOFF_SECS),
            )?;
            let months = months.unwrap_or(config.forecast_months);
            let forecast = client.forecast(&book.transactions, months, today).await;
            reports::print_forecast(&forecast);
            Ok(())
        }

        Command::Import { kind, file } => {
            println!("Importing {} from {}...", kind.collection(), file.display());
            let outcome = import::import_file(store, kind, &file, &ctx.rates, today).await?;
            println!("Imported {} record(s).", outcome.created.len());
            if !outcome.errors.is_empty() {
                println!("\n{} row(s) rejected:", outcome.errors.len());
                for error in &outcome.errors {
                    println!("  {:<10} {}", error.key, error.error);
                }
            }
            Ok(())
        }

        Command::Timesheets {
            action: TimesheetsCommand::Generate { month },
        } => {
            let outcome = actions::generate_timesheets(store, month, &ctx.rates).await?;
            if outcome.created.is_empty() && outcome.errors.is_empty() {
                println!("Every active assignment already has a timesheet for {}.", month);
            }
            for timesheet in &outcome.created {
                println!(
                    "Created {:<24} {:>6.1} days  revenue ${:>10.2}  cost ${:>10.2}",
                    timesheet.id,
                    timesheet.figures.total_days_worked,
                    timesheet.figures.external_revenue,
                    timesheet.figures.internal_cost_usd
                );
            }
            for error in &outcome.errors {
                println!("Failed  {:<24} {}", error.key, error.error);
            }
            Ok(())
        }

        Command::MarkPaid { target } => match target {
            MarkPaidCommand::Transaction { id, date, amount } => {
                let transaction =
                    actions::mark_transaction_paid(store, &id, date.unwrap_or(today), amount)
                        .await?;
                println!(
                    "Transaction {} is now {:?} (outstanding ${:.2})",
                    transaction.id,
                    transaction.payment_status,
                    transaction.outstanding()
                );
                Ok(())
            }
            MarkPaidCommand::Invoice { id, date } => {
                let timesheet = actions::mark_invoice_paid(store, &id, date.unwrap_or(today)).await?;
                println!(
                    "Invoice for {} marked paid (${:.2})",
                    timesheet.id, timesheet.figures.external_revenue
                );
                Ok(())
            }
            MarkPaidCommand::Contractor { id, date } => {
                let timesheet =
                    actions::mark_contractor_paid(store, &id, date.unwrap_or(today)).await?;
                println!(
                    "Contractor payout for {} marked paid (${:.2})",
                    timesheet.id, timesheet.figures.internal_cost_usd
                );
                Ok(())
            }
        },

        Command::Delete { collection, id } => {
            if actions::delete_record(store, &collection, &id).await? {
                println!("Deleted {}/{}", collection, id);
            } else {
                println!("No record {}/{}", collection, id);
            }
            Ok(())
        }

        Command::Watch => watch(store, ctx).await,

        Command::Stats => {
            let stats = store.stats().await?;
            reports::print_stats(&stats);
            Ok(())
        }
    }
}

/// Follow every collection and print a status line per change until Ctrl-C
async fn watch(store: &Store, ctx: &BookContext) -> Result<()> {
    let period = Period::this_month(ctx.today);
    let print = |changed: &[&str], book: &Book| {
        let statement = build_statement(&book.cash_flow_inputs(), ctx, &period);
        let pnl = aggregate(&book.transactions, &AggregateFilter::period(&period));
        reports::print_watch_line(changed, &statement, &pnl);
    };

    let mut live = LiveBook::follow(store);
    let book = live.wait_ready().await?;
    info!("watching {} collections", constants::COLLECTIONS.len());
    println!("Watching for changes (Ctrl-C to stop)...");
    print(&["ready"], &book);

    loop {
        tokio::select! {
            change = live.next_change() => {
                let change = change?;
                print(&change.collections, &change.book);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopped.");
                return Ok(());
            }
        }
    }
}
