//! Verify a bounded counter loop.
//!
//! ```text
//! init --[x := 0]--> head
//! head --[assume x < N]--> body --[x := x + 1]--> head
//! head --[assume x >= N]--> exit --[assume x != N]--> error
//! ```
//!
//! With `--buggy` the exit guard becomes `assume x == N`, which is reachable.
//!
//! Run with:
//! ```bash
//! cargo run --example counter -- 4 --strategy dfs --dot arg.dot
//! ```

use clap::{Parser, ValueEnum};
use log::info;

use cegar_rs::cfa::{Cfa, CfaBuilder, Stmt};
use cegar_rs::checker::{CegarChecker, CegarConfig, SafetyChecker, SafetyResult, SearchStrategy};
use cegar_rs::expr::Expr;
use cegar_rs::solver::SolverConfig;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Strategy {
    Bfs,
    Dfs,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Loop bound.
    #[arg(value_name = "INT", default_value = "4")]
    bound: i64,

    /// Exploration order.
    #[clap(long, value_enum, default_value = "bfs")]
    strategy: Strategy,

    /// BDD node budget of each solver.
    #[clap(long, value_name = "INT", default_value = "4194304")]
    max_nodes: usize,

    /// Give up after this many refinements.
    #[clap(long, value_name = "INT")]
    max_refinements: Option<usize>,

    /// Make the error location reachable.
    #[clap(long)]
    buggy: bool,

    /// Write the final ARG in DOT format to this file.
    #[clap(long, value_name = "FILE")]
    dot: Option<std::path::PathBuf>,
}

fn counter(bound: i64, buggy: bool) -> Cfa {
    let x = || Expr::var("x");
    let n = || Expr::int(bound);

    let mut builder = CfaBuilder::new();
    let init = builder.create_loc("init");
    let head = builder.create_loc("head");
    let body = builder.create_loc("body");
    let exit = builder.create_loc("exit");
    let error = builder.create_loc("error");

    builder.create_edge(init, head, Stmt::assign("x", Expr::int(0)));
    builder.create_edge(head, body, Stmt::assume(Expr::lt(x(), n())));
    builder.create_edge(body, head, Stmt::assign("x", Expr::add(x(), Expr::int(1))));
    builder.create_edge(head, exit, Stmt::assume(Expr::ge(x(), n())));
    let guard = if buggy { Expr::eq(x(), n()) } else { Expr::ne(x(), n()) };
    builder.create_edge(exit, error, Stmt::assume(guard));

    builder.set_init_loc(init);
    builder.set_error_loc(error);
    builder.build()
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let cfa = counter(args.bound, args.buggy);
    print!("{}", cfa);

    let config = CegarConfig {
        strategy: match args.strategy {
            Strategy::Bfs => SearchStrategy::BreadthFirst,
            Strategy::Dfs => SearchStrategy::DepthFirst,
        },
        solver: SolverConfig {
            max_nodes: args.max_nodes,
        },
        max_refinements: args.max_refinements,
        ..CegarConfig::default()
    };
    let result = CegarChecker::new(&cfa, config).check()?;

    match &result {
        SafetyResult::Safe { arg, precision } => {
            println!("SAFE: {} ARG nodes, {} predicates", arg.len(), precision.len());
            println!("precision = {}", precision);
        }
        SafetyResult::Unsafe { arg, error_node } => {
            println!("UNSAFE: counterexample");
            let trace = arg.trace_to(*error_node);
            for (node, edge) in trace.nodes().iter().zip(trace.edges()) {
                println!("  {}: {}", cfa.loc(arg.node(*node).loc()).name(), cfa.edge(*edge).stmt());
            }
            println!("  {}", cfa.loc(arg.node(*error_node).loc()).name());
        }
    }

    if let Some(path) = &args.dot {
        std::fs::write(path, result.arg().to_dot(&cfa)?)?;
        info!("ARG written to {}", path.display());
    }

    println!("All done in {:.2}s", time_total.elapsed().as_secs_f64());
    Ok(())
}
