//! CLI host for the MAPFM solver: load a problem file, solve it under an
//! optional wall-clock timeout, print the plan.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mapfm_core::Problem;
use mapfm_epea::{Algorithm, CancelToken, SolveError, Solver, SolverConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Optimal MAPFM solver", long_about = None)]
struct Config {
    /// Problem file to solve
    problem: PathBuf,

    #[arg(long, value_enum, default_value = "exhaustive-sorting-id")]
    algorithm: AlgorithmArg,

    /// Disable independence detection inside the MAPF layer
    #[arg(long)]
    no_independence_detection: bool,

    /// Bound for the sorted-matching queue (default: unbounded)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum AlgorithmArg {
    Exhaustive,
    ExhaustiveSorting,
    ExhaustiveSortingId,
    Heuristic,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Algorithm {
        match arg {
            AlgorithmArg::Exhaustive => Algorithm::ExhaustiveMatching,
            AlgorithmArg::ExhaustiveSorting => Algorithm::ExhaustiveMatchingSorting,
            AlgorithmArg::ExhaustiveSortingId => Algorithm::ExhaustiveMatchingSortingId,
            AlgorithmArg::Heuristic => Algorithm::HeuristicMatching,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mapfm_runner=info,mapfm_epea=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    let input = fs::read_to_string(&config.problem)
        .with_context(|| format!("reading {}", config.problem.display()))?;
    let problem = Problem::parse(&input)
        .with_context(|| format!("parsing {}", config.problem.display()))?;

    let solver_config = SolverConfig {
        algorithm: config.algorithm.into(),
        independence_detection: !config.no_independence_detection,
        queue_capacity: config.queue_capacity,
    };
    tracing::info!(
        agents = problem.agent_count(),
        algorithm = %solver_config.describe(),
        "loaded problem"
    );

    let cancel = CancelToken::new();
    let _watchdog = config.timeout_secs.map(|secs| {
        // The watchdog trips the token unless the solve finishes first and
        // drops its end of the channel.
        let token = cancel.clone();
        let (done, deadline) = mpsc::channel::<()>();
        thread::spawn(move || {
            if deadline.recv_timeout(Duration::from_secs(secs)).is_err() {
                tracing::warn!(secs, "timeout reached, cancelling solve");
                token.cancel();
            }
        });
        done
    });

    let started = Instant::now();
    let result = Solver::new(&problem, solver_config).solve(&cancel);
    let elapsed = started.elapsed();

    match result {
        Ok(Some(solution)) => {
            tracing::info!(?elapsed, stats = %solution.stats, "solved");
            println!("cost {}", solution.cost);
            for path in &solution.paths {
                let cells: Vec<String> = path
                    .steps()
                    .iter()
                    .map(|step| format!("({},{})", step.x, step.y))
                    .collect();
                println!("agent {}: {}", path.identifier, cells.join(" "));
            }
            Ok(())
        }
        Ok(None) => {
            tracing::info!(?elapsed, "finished without a solution");
            println!("no solution");
            Ok(())
        }
        Err(SolveError::Cancelled) => {
            println!("no solution (timeout)");
            Ok(())
        }
        Err(error) => Err(error).context("solver failed"),
    }
}
