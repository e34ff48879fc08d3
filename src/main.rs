use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use sampling_lab::config::load_params;
use sampling_lab::experiments::{run_sampling, sample_with, SamplingParams};
use sampling_lab::inventory::{optimize_inventory_policy, replicate_policy, run_inventory, InventoryParams};
use sampling_lab::machine_repair::{run_machine_repair, sweep_machine_count, MachineRepairParams};
use sampling_lab::models::Report;
use sampling_lab::reporting::{display_diagnostics, display_report, rows_to_csv, to_json};
use sampling_lab::rng::PlatformUniform;
use sampling_lab::truck_queue::{run_truck_queue, search_team_size, TruckQueueParams};
use sampling_lab::unloading_team::{run_unloading_team, sweep_team_size, UnloadingTeamParams};
use sampling_lab::Diagnostics;

const USAGE: &str = "\
usage: sampling-lab <engine> [--seed N] [--params FILE] [--json | --csv] [--platform]

engines:
  sample               sampler validation run (histogram, ECDF, KS, moments)
  truck-queue          one night shift of the truck unloading queue
  truck-search         team sizes compared over many shifts
  machine-repair       one machine–mechanic run
  machine-sweep        cost per machine-hour for each number of machines
  unloading-team       one unloading-team queue run
  unloading-sweep      unloading-team sizes compared
  inventory            one (q, R) inventory run
  inventory-replicate  replicated (q, R) inventory runs
  inventory-optimize   Hooke–Jeeves search over (q, R)

--platform draws the sampler run from the thread RNG instead of the seeded LCG.";

#[derive(Clone, Copy, PartialEq)]
enum OutputMode {
    Console,
    Json,
    Csv,
}

struct Cli {
    seed: Option<u32>,
    params: Option<PathBuf>,
    mode: OutputMode,
    platform: bool,
}

impl Cli {
    fn load<T: serde::de::DeserializeOwned + Default>(&self) -> Result<T> {
        let path = self.params.as_deref();
        load_params(path).with_context(|| match path {
            Some(p) => format!("loading parameters from {}", p.display()),
            None => "building default parameters".to_string(),
        })
    }

    fn emit<T: Serialize, R: Serialize>(
        &self,
        title: &str,
        full: &T,
        report: &Report<R>,
        diagnostics: Option<&Diagnostics>,
    ) -> Result<()> {
        match self.mode {
            OutputMode::Json => println!("{}", to_json(full)?),
            OutputMode::Csv => print!("{}", rows_to_csv(&report.preview_rows)?),
            OutputMode::Console => {
                display_report(title, report)?;
                if let Some(diag) = diagnostics {
                    display_diagnostics(diag);
                }
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(engine) = args.get(1).filter(|a| !a.starts_with("--")) else {
        println!("{USAGE}");
        return Ok(());
    };
    let json = args.iter().any(|a| a == "--json");
    let csv = args.iter().any(|a| a == "--csv");
    if json && csv {
        bail!("--json and --csv cannot be combined");
    }
    let cli = Cli {
        seed: parse_arg(&args, "--seed")?,
        params: args
            .windows(2)
            .find(|w| w[0] == "--params")
            .map(|w| PathBuf::from(&w[1])),
        mode: if json {
            OutputMode::Json
        } else if csv {
            OutputMode::Csv
        } else {
            OutputMode::Console
        },
        platform: args.iter().any(|a| a == "--platform"),
    };

    match engine.as_str() {
        "sample" => {
            let mut params: SamplingParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = if cli.platform {
                sample_with(&params, &mut PlatformUniform::new())?
            } else {
                run_sampling(&params)?
            };
            let title = format!("SAMPLER: {}", result.sampler.to_uppercase());
            cli.emit(&title, &result, &result.report, Some(&result.diagnostics))?;
        }
        "truck-queue" => {
            let mut params: TruckQueueParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = run_truck_queue(&params)?;
            cli.emit(
                "TRUCK UNLOADING SHIFT",
                &result,
                &result.report,
                Some(&result.outcome.diagnostics),
            )?;
        }
        "truck-search" => {
            let mut params: TruckQueueParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = search_team_size(&params)?;
            cli.emit("TRUCK QUEUE - TEAM SIZE SEARCH", &result, &result.report, None)?;
        }
        "machine-repair" => {
            let mut params: MachineRepairParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = run_machine_repair(&params)?;
            cli.emit(
                "MACHINE-MECHANIC ASSIGNMENT",
                &result,
                &result.report,
                Some(&result.outcome.diagnostics),
            )?;
        }
        "machine-sweep" => {
            let mut params: MachineRepairParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = sweep_machine_count(&params)?;
            cli.emit("MACHINES PER MECHANIC - SWEEP", &result, &result.report, None)?;
        }
        "unloading-team" => {
            let mut params: UnloadingTeamParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = run_unloading_team(&params)?;
            cli.emit(
                "UNLOADING TEAM QUEUE",
                &result,
                &result.report,
                Some(&result.outcome.diagnostics),
            )?;
        }
        "unloading-sweep" => {
            let mut params: UnloadingTeamParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = sweep_team_size(&params)?;
            cli.emit("UNLOADING TEAM - SIZE SWEEP", &result, &result.report, None)?;
        }
        "inventory" => {
            let mut params: InventoryParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = run_inventory(&params)?;
            cli.emit(
                "INVENTORY (q, R)",
                &result,
                &result.report,
                Some(&result.outcome.diagnostics),
            )?;
        }
        "inventory-replicate" => {
            let mut params: InventoryParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = replicate_policy(&params)?;
            cli.emit(
                "INVENTORY (q, R) - REPLICATIONS",
                &result,
                &result.report,
                Some(&result.diagnostics),
            )?;
        }
        "inventory-optimize" => {
            let mut params: InventoryParams = cli.load()?;
            params.seed = cli.seed.or(params.seed);
            let result = optimize_inventory_policy(&params)?;
            cli.emit("INVENTORY (q, R) - HOOKE-JEEVES", &result, &result.report, None)?;
        }
        other => {
            eprintln!("{USAGE}");
            bail!("unknown engine '{other}'");
        }
    }

    Ok(())
}

fn parse_arg<T>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match args.windows(2).find(|w| w[0] == flag) {
        Some(w) => {
            let value = w[1]
                .parse()
                .with_context(|| format!("{flag} expects a number, got '{}'", w[1]))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
