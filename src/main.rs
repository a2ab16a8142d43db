use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cashback_ledger::{
    config::{DistributionConfig, Settings},
    engine::{Destinations, DistributionPlan, Referrer},
    ledger::{Address, BURN_SINK},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "cashback", version, about = "Cashback distribution ledger tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scenario file and print one JSON line per step.
    Simulate {
        scenario: PathBuf,
        /// Write the final state snapshot to this file.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Preview how a purchase would be split.
    Quote {
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value_t = 1)]
        base: u8,
        #[arg(long, default_value_t = 70)]
        user_share: u8,
        #[arg(long, default_value_t = 20)]
        reserve_share: u8,
        #[arg(long, default_value_t = 10)]
        burn_share: u8,
        #[arg(long, default_value_t = 0)]
        bonus: u8,
        /// Assume the buyer has an active referrer.
        #[arg(long)]
        referred: bool,
    },
    /// Write a settings template with fresh identities where none are given.
    InitSettings {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        owner: Option<Address>,
        #[arg(long)]
        engine_account: Option<Address>,
        #[arg(long)]
        reserve_wallet: Option<Address>,
    },
    /// Validate a settings file.
    CheckSettings { path: PathBuf },
    /// Print random addresses.
    NewAddress {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

fn init_tracing(fallback: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    process::exit(2)
}

fn print_json<T: Serialize>(value: &T) {
    let line = serde_json::to_string(value).unwrap_or_else(|err| fail(err));
    let mut out = io::stdout().lock();
    if let Err(err) = writeln!(out, "{line}") {
        fail(err);
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    let bytes = serde_json::to_vec_pretty(value).unwrap_or_else(|err| fail(err));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    if let Err(err) = fs::write(path, bytes) {
        fail(format!("cannot write {}: {err}", path.display()));
    }
}

fn simulate_cmd(scenario: &Path, snapshot: Option<&Path>) {
    let scenario = Scenario::load(scenario).unwrap_or_else(|err| fail(err));
    init_tracing(&scenario.settings.log_filter);
    info!(steps = scenario.steps.len(), "running scenario");

    let report = scenario.run().unwrap_or_else(|err| fail(err));
    for step in &report.steps {
        print_json(step);
    }
    let rejected = report
        .steps
        .iter()
        .filter(|s| !s.outcome.is_accepted())
        .count();
    info!(
        accepted = report.steps.len() - rejected,
        rejected,
        pool = report.snapshot.pool_balance,
        "scenario finished"
    );
    if let Some(path) = snapshot {
        write_json(path, &report.snapshot);
        eprintln!("snapshot → {}", path.display());
    }
}

#[allow(clippy::too_many_arguments)]
fn quote_cmd(
    amount: u64,
    base: u8,
    user_share: u8,
    reserve_share: u8,
    burn_share: u8,
    bonus: u8,
    referred: bool,
) {
    let config = DistributionConfig {
        cashback_base_percent: base,
        user_share,
        reserve_share,
        burn_share,
        referrer_bonus_percent: bonus,
    };
    if let Err(err) = config.validate() {
        fail(err);
    }
    let referrer = referred.then_some(Referrer {
        id: 1,
        wallet: Address::from_low_u8(2),
    });
    let plan = DistributionPlan::compute(&config, amount, referrer);
    let transfers = plan.transfers(&Destinations {
        user: Address::from_low_u8(1),
        reserve: Address::from_low_u8(3),
        burn_sink: BURN_SINK,
    });

    #[derive(Serialize)]
    struct Quote<'a> {
        #[serde(flatten)]
        plan: &'a DistributionPlan,
        rounding_remainder: u64,
        legs: Vec<cashback_ledger::engine::Leg>,
    }
    print_json(&Quote {
        plan: &plan,
        rounding_remainder: plan.rounding_remainder(),
        legs: transfers.iter().map(|t| t.leg).collect(),
    });
}

fn init_settings_cmd(
    out: &Path,
    owner: Option<Address>,
    engine_account: Option<Address>,
    reserve_wallet: Option<Address>,
) {
    let mut rng = OsRng;
    let mut pick = |given: Option<Address>| given.unwrap_or_else(|| Address::random(&mut rng));
    let settings = Settings::template(pick(owner), pick(engine_account), pick(reserve_wallet));
    if let Err(err) = settings.validate() {
        fail(err);
    }
    write_json(out, &settings);
    println!("settings written → {}", out.display());
}

fn check_settings_cmd(path: &Path) {
    match Settings::load(path) {
        Ok(settings) => print_json(&settings),
        Err(err) => fail(err),
    }
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Simulate { scenario, snapshot } => simulate_cmd(&scenario, snapshot.as_deref()),
        Command::Quote {
            amount,
            base,
            user_share,
            reserve_share,
            burn_share,
            bonus,
            referred,
        } => {
            init_tracing(cashback_ledger::config::DEFAULT_LOG_FILTER);
            quote_cmd(amount, base, user_share, reserve_share, burn_share, bonus, referred)
        }
        Command::InitSettings {
            out,
            owner,
            engine_account,
            reserve_wallet,
        } => init_settings_cmd(&out, owner, engine_account, reserve_wallet),
        Command::CheckSettings { path } => check_settings_cmd(&path),
        Command::NewAddress { count } => {
            let mut rng = OsRng;
            for _ in 0..count {
                println!("{}", Address::random(&mut rng));
            }
        }
    }
}
