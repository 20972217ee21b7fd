//! Cadence CLI
//!
//! Usage:
//!   cadence --input session.json                 # Evaluate a session file
//!   cadence --input session.json --surface ANALYZER
//!   cadence --input session.json --json          # JSON output
//!   cadence --serve                              # HTTP API server

use clap::Parser;
use colored::Colorize;

use cadence::core::{run_server, JsonFileStore, RotationEngine};
use cadence::types::{MoodTimelinePayload, RotationPack, SessionSnapshot, Surface};
use cadence::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    version = VERSION,
    about = "Cadence - deterministic insight rotation and session analytics",
    long_about = "Cadence turns finalized conversation sessions into mood timelines,\n\
                  trait-synergy maps and rotating insight cards.\n\n\
                  Modes:\n  \
                  --input FILE   Evaluate one session snapshot (JSON)\n  \
                  --serve        HTTP API server mode\n\n\
                  Surfaces:\n  \
                  MISSION_END    Mixed card pack (default)\n  \
                  ANALYZER       Trait strength/growth paragraphs\n  \
                  SYNERGY_MAP    Trait correlation insights\n  \
                  MOOD_TIMELINE  Mood arc insights"
)]
struct Args {
    /// Session snapshot JSON file to evaluate
    #[arg(short, long)]
    input: Option<String>,

    /// Surface to build the rotation pack for
    #[arg(long, default_value = "MISSION_END")]
    surface: String,

    /// Viewer user id (defaults to the session's user)
    #[arg(long)]
    user: Option<String>,

    /// Treat the viewer as a premium user
    #[arg(long)]
    premium: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Directory for persisted documents (default: ./cadence-data)
    #[arg(long, default_value = "./cadence-data")]
    store_dir: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    if args.serve {
        run_serve(&args).await;
    } else if let Some(ref input) = args.input {
        run_evaluate(input, &args);
    } else {
        eprintln!("Nothing to do: pass --input FILE or --serve (see --help)");
        std::process::exit(2);
    }
}

/// Evaluate one session snapshot file end to end
fn run_evaluate(input: &str, args: &Args) {
    let session = match load_session_file(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input, e);
            std::process::exit(1);
        }
    };

    let engine = RotationEngine::new(JsonFileStore::new(&args.store_dir));
    let user = args.user.clone().unwrap_or_else(|| session.user_id.clone());
    let session_id = session.session_id.clone();
    let surface = Surface::from(args.surface.clone());

    if let Err(e) = engine.ingest_session(&session) {
        eprintln!("Ingest failed: {}", e);
        std::process::exit(1);
    }
    if args.premium {
        if let Err(e) = engine.store().set_premium(&user, true) {
            eprintln!("Premium flag failed: {}", e);
            std::process::exit(1);
        }
    }

    let pack = match engine.rotation_pack(&user, &session_id, &surface) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Evaluation failed: {}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        let mood = engine.mood_timeline(&session_id).ok();
        let out = serde_json::json!({ "pack": pack, "mood": mood });
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Serialization failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    print_header(&session_id, &surface);
    if let Ok(mood) = engine.mood_timeline(&session_id) {
        print_timeline(&mood);
    }
    print_pack(&pack);
}

fn load_session_file(path: &str) -> Result<SessionSnapshot, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

fn print_header(session_id: &str, surface: &Surface) {
    println!("{}", "========================================".bold());
    println!(
        "{}",
        format!("  Cadence v{} - {} / {}", VERSION, session_id, surface).bold()
    );
    println!("{}", "========================================".bold());
    println!();
}

/// One line per timeline point, colored by mood state
fn print_timeline(mood: &MoodTimelinePayload) {
    println!("{}", "Mood timeline".bold());
    for snap in &mood.snapshots {
        let line = format!(
            "  {:>3}  {} {:<7}  raw={:>3.0}  smoothed={:>3.0}  tension={:>3.0}  warmth={:>3.0}  flow={:>3.0}",
            snap.turn_index,
            snap.mood_state.emoji(),
            snap.mood_state.to_string(),
            snap.raw_score,
            snap.smoothed_mood_score,
            snap.tension,
            snap.warmth,
            snap.flow,
        );
        println!("{}", line.color(snap.mood_state.color()));
    }
    for arc in &mood.arcs {
        println!(
            "  {} {} (turns {}-{}, {:+.0} pts)",
            "arc:".dimmed(),
            arc.kind.label(),
            arc.start_index,
            arc.end_index,
            arc.magnitude
        );
    }
    println!();
}

fn print_pack(pack: &RotationPack) {
    println!("{}", "Selected insights".bold());
    if pack.selected_insights.is_empty() && pack.selected_paragraphs.is_empty() {
        println!("  (none for this surface)");
    }
    for card in &pack.selected_insights {
        let tag = format!("[{}]", card.source.label());
        println!("  {} {}", tag.dimmed(), card.title.bold());
        println!("      {}", card.body);
    }
    for card in &pack.selected_paragraphs {
        println!("  {} {}", "[analyzer]".dimmed(), card.title.bold());
        println!("      {}", card.body);
    }
    if !pack.meta.premium_insight_ids.is_empty() {
        println!();
        println!(
            "  {} {} premium insight(s) hidden - upgrade to see them",
            "*".yellow(),
            pack.meta.premium_insight_ids.len()
        );
    }
    println!();
    println!(
        "{}",
        format!(
            "  seed={}  available={}  picked={}  excluded_by_cooldown={}",
            pack.meta.seed,
            pack.meta.total_available,
            pack.meta.picked_ids.len(),
            pack.meta.excluded_ids.len()
        )
        .dimmed()
    );
}

/// Run HTTP API server
async fn run_serve(args: &Args) {
    println!();
    println!("  Cadence API Server");
    println!("  Version: {}", VERSION);
    println!();

    let engine = RotationEngine::new(JsonFileStore::new(&args.store_dir));
    if let Err(e) = run_server(&args.addr, engine).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
