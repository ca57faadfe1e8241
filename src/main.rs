use std::process;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Local;
use tracing::{debug, error, info};

use cwl_stats::accumulate::{accumulate_clan_players, ClanCareerStats, PlayerLedger};
use cwl_stats::cache::CacheStore;
use cwl_stats::enrich::EnrichmentPipeline;
use cwl_stats::extract::extract_wars;
use cwl_stats::family::{FAMILY_CLANS, START_YEAR};
use cwl_stats::fetch::{FetchContext, FetchOptions, SeasonData};
use cwl_stats::output::OutputWriter;
use cwl_stats::scoring::score_player;
use cwl_stats::seasons;

/// Pause after every unit of work that reached the network, to stay under the
/// upstream's implicit rate limit. Pure cache hits skip it.
const REQUEST_PAUSE_MS: u64 = 700;

#[derive(Debug, Default)]
struct CliArgs {
    opts: FetchOptions,
    start: Option<String>,
    verbose: bool,
    help: bool,
}

fn main() {
    let _ = dotenvy::from_filename(".env");
    let args = parse_args();
    if args.help {
        print_usage();
        return;
    }
    init_tracing(args.verbose);
    if let Err(err) = run(&args) {
        error!(%err, "run failed");
        process::exit(1);
    }
}

fn run(args: &CliArgs) -> Result<()> {
    let today = Local::now().date_naive();
    let all_seasons = seasons::enumerate_seasons(START_YEAR, today);
    let season_list = seasons::truncate_from(all_seasons, args.start.as_deref());
    let current = seasons::current_season(today);

    let cache_dir = CacheStore::default_dir().ok_or_else(|| anyhow!("unable to resolve cache dir"))?;
    let cache = CacheStore::new(cache_dir);
    let mut ctx = FetchContext::new(&cache, args.opts, current);

    let mut ledger = PlayerLedger::default();
    let mut clans: Vec<ClanCareerStats> = FAMILY_CLANS
        .iter()
        .map(|clan| ClanCareerStats::new(clan.name, clan.tag))
        .collect();

    info!(
        seasons = season_list.len(),
        clans = FAMILY_CLANS.len(),
        offline = args.opts.offline,
        "starting accumulation"
    );

    for season in &season_list {
        for (idx, clan) in FAMILY_CLANS.iter().enumerate() {
            let outcome = ctx.fetch_season(clan.tag, season)?;
            match outcome.data {
                SeasonData::Payload(payload) => {
                    let extracted = extract_wars(&payload);
                    debug!(
                        clan = clan.name,
                        season,
                        wars = extracted.all.len(),
                        with_attacks = extracted.with_attacks.len(),
                        "extracted wars"
                    );
                    clans[idx].record_season(season, &extracted);
                    for stats in
                        accumulate_clan_players(&extracted.with_attacks, clan.tag, season)
                    {
                        ledger.merge_season(stats);
                    }
                }
                SeasonData::NoData => {
                    debug!(clan = clan.name, season, "no data for season");
                }
            }
            if outcome.touched_network {
                std::thread::sleep(Duration::from_millis(REQUEST_PAUSE_MS));
            }
        }
    }

    let pipeline = EnrichmentPipeline::new(EnrichmentPipeline::default_dir());
    pipeline.enrich(&mut ledger, &mut clans);

    let scorecards: Vec<_> = ledger.players().map(score_player).collect();
    let writer = OutputWriter::new(OutputWriter::default_dir());
    writer.write_all(&scorecards, &clans)?;

    info!(
        players = scorecards.len(),
        seasons = season_list.len(),
        "career statistics complete"
    );
    Ok(())
}

fn parse_args() -> CliArgs {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let mut args = CliArgs::default();
    let mut idx = 0;
    while idx < raw.len() {
        match raw[idx].as_str() {
            "--refresh" => args.opts.refresh = true,
            "--refresh-current" => args.opts.refresh_current = true,
            "--offline" => args.opts.offline = true,
            "--verbose" | "-v" => args.verbose = true,
            "--help" | "-h" => args.help = true,
            "--start" => {
                if let Some(next) = raw.get(idx + 1) {
                    args.start = Some(next.clone());
                    idx += 1;
                }
            }
            other => {
                if let Some(value) = other.strip_prefix("--start=") {
                    args.start = Some(value.to_string());
                } else {
                    eprintln!("ignoring unknown argument: {other}");
                }
            }
        }
        idx += 1;
    }
    args
}

fn print_usage() {
    println!("cwl_stats - family career statistics from clan war league history");
    println!();
    println!("Usage: cwl_stats [options]");
    println!();
    println!("Options:");
    println!("  --refresh           Ignore all cached season payloads");
    println!("  --refresh-current   Refresh only the current season");
    println!("  --offline           Never touch the network; cache only");
    println!("  --start=YYYY-MM     Start processing at the given season");
    println!("  -v, --verbose       Detailed logging");
    println!("  -h, --help          Show this help");
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose {
        "cwl_stats=debug,info"
    } else {
        "cwl_stats=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
