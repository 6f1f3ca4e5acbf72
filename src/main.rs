// masterytrack - main.rs
// Thin command surface over the review service.

use std::env;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use masterytrack::{
    format_interval, Config, ReviewLogger, ReviewService, SqliteCardStore, StaticCatalog,
    SystemClock,
};

type Service = ReviewService<SqliteCardStore, SystemClock, StaticCatalog>;

const USAGE: &str = "[--config <path>] <command>

Commands:
  enroll <problem_id>
  review <problem_id> <rating 1-10> [elapsed_seconds]
  due [limit]
  stats
  phases
  risk
  card <problem_id>
  preview <problem_id>
  remove <problem_id>";

pub fn main() -> Result<(), String> {
    env_logger::init();

    // --- Get the config path and command from command-line arguments ---
    let mut args: Vec<String> = env::args().collect();
    let program = if args.is_empty() {
        "masterytrack".to_string()
    } else {
        args.remove(0)
    };

    let config = if args.first().map(String::as_str) == Some("--config") {
        let path = args.get(1).ok_or_else(|| usage(&program))?.clone();
        args = args.split_off(2);
        Config::load(Path::new(&path)).map_err(|e| format!("Failed to load config: {}", e))?
    } else {
        Config::new()
    };

    if args.is_empty() {
        return Err(usage(&program));
    }

    let service = open_service(config)?;
    run(&service, &program, &args)
}

fn usage(program: &str) -> String {
    let msg = format!("Usage: {} {}", program, USAGE);
    eprintln!("{}", msg);
    msg
}

fn open_service(config: Config) -> Result<Service, String> {
    let store = SqliteCardStore::open(&config.database_path)
        .map_err(|e| format!("Failed to open card database: {}", e))?;

    let catalog = if config.catalog_path.exists() {
        StaticCatalog::load(&config.catalog_path)
            .map_err(|e| format!("Failed to load catalog: {}", e))?
    } else {
        info!("No catalog at {:?}, phases and errors are empty", config.catalog_path);
        StaticCatalog::new()
    };

    let review_log = ReviewLogger::new(&config.review_log_path);
    let mut service = ReviewService::new(config, store, SystemClock, catalog);
    match review_log {
        Ok(logger) => service = service.with_review_log(logger),
        Err(e) => warn!("Review log disabled: {}", e),
    }
    Ok(service)
}

fn run(service: &Service, program: &str, args: &[String]) -> Result<(), String> {
    let arg = |i: usize| args.get(i).map(String::as_str);
    let err = |e: masterytrack::Error| e.to_string();

    match (arg(0), arg(1)) {
        (Some("enroll"), Some(id)) => print(&service.enroll(id).map_err(err)?),
        (Some("review"), Some(id)) => {
            let rating: i32 = parse(arg(2).ok_or_else(|| usage(program))?, "rating")?;
            let elapsed: u64 = match arg(3) {
                Some(s) => parse(s, "elapsed_seconds")?,
                None => 0,
            };
            let card = service.process_review(id, rating, elapsed).map_err(err)?;
            let next = format_interval(card.scheduled_days);
            print(&json!({ "card": card, "next_review_in": next }))
        }
        (Some("due"), limit) => {
            let limit: usize = match limit {
                Some(s) => parse(s, "limit")?,
                None => usize::MAX,
            };
            print(&service.get_due_cards(limit).map_err(err)?)
        }
        (Some("stats"), None) => print(&service.get_stats().map_err(err)?),
        (Some("phases"), None) => {
            let queue = service.get_phase_queue().map_err(err)?;
            print(&json!({
                "counts": queue.by_number(),
                "recommended_focus": queue.recommended_focus.map(|p| p.number()),
            }))
        }
        (Some("risk"), None) => print(&service.high_risk_problems().map_err(err)?),
        (Some("card"), Some(id)) => {
            let stats = service.card_stats(id).map_err(err)?;
            let next = format_interval(stats.card.scheduled_days);
            print(&json!({ "stats": stats, "next_review_in": next }))
        }
        (Some("preview"), Some(id)) => {
            let preview = service.preview(id).map_err(err)?;
            let rows: Vec<_> = preview
                .iter()
                .map(|p| json!({ "preview": p, "label": format_interval(p.scheduled_days) }))
                .collect();
            print(&rows)
        }
        (Some("remove"), Some(id)) => {
            service.remove(id).map_err(err)?;
            print(&json!({ "removed": id }))
        }
        _ => Err(usage(program)),
    }
}

fn parse<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid {}: '{}'", what, value))
}

fn print<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", out);
    Ok(())
}
