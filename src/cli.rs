use crate::config;
use crate::ledger::service::ActionLedger;
use crate::ledger::store::{SqlitePointSink, SqliteStore};
use crate::ledger::{EventFilter, EventUpdate, LogParams, ScoredEvent};
use crate::notify::{ChangeNotifier, NdjsonNotifier, NullNotifier};
use crate::points::ScoringContext;
use crate::taxonomy::{
    ActionType, CompetencyCategory, DealSizeRange, ImpactLevel, StakeholderLevel,
};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tally", version)]
#[command(
    about = "Action tracking and competency scoring ledger",
    long_about = "tally converts logged sales actions into weighted competency points, keeps them in a local ledger, and rolls them up into per-category and per-type analytics."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  tally log --subject u1 --action deal_closure --impact critical --description \"closed Q3 renewal\"
  tally preview --action customer_meeting --duration 20
  tally verify --event <EVENT_ID> --by mgr-1
  tally analytics --subject u1
  tally completion zsh > ~/.zsh/completions/_tally
  tally man > tally.1")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Score and record a sales action",
        long_about = "Score a sales action from its type, impact level, and optional deal context, persist it, and award the resulting competency points."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  tally log --subject u1 --action customer_meeting --description \"discovery call\" --duration 25
  tally log --subject u1 --action deal_closure --impact critical --deal-size 250k-plus --stakeholder executive --description \"closed Q3 renewal\"")]
    Log {
        #[arg(long, value_name = "SUBJECT_ID", help = "Subject being scored")]
        subject: Option<String>,
        #[arg(long, value_name = "TYPE", help = "Action type (e.g. deal_closure)")]
        action: ActionType,
        #[arg(long, value_name = "TEXT", help = "What happened")]
        description: String,
        #[arg(long, value_name = "LEVEL", help = "Impact level (default: medium)")]
        impact: Option<ImpactLevel>,
        #[arg(
            long,
            value_name = "CATEGORY",
            help = "Competency category override (default: the type's category)"
        )]
        category: Option<CompetencyCategory>,
        #[arg(long, value_name = "TEXT", help = "Free-form subcategory")]
        subcategory: Option<String>,
        #[arg(long, value_name = "RANGE", help = "Deal size band (e.g. 250k-plus)")]
        deal_size: Option<DealSizeRange>,
        #[arg(long, value_name = "LEVEL", help = "Stakeholder seniority (e.g. executive)")]
        stakeholder: Option<StakeholderLevel>,
        #[arg(long, value_name = "MIN", help = "Duration in minutes")]
        duration: Option<i64>,
        #[arg(long, value_name = "TEXT", help = "Industry context")]
        industry: Option<String>,
        #[arg(long, value_name = "URL", help = "Evidence link")]
        evidence_link: Option<String>,
        #[arg(long, value_name = "TYPE", help = "Evidence type (recording, doc, ...)")]
        evidence_type: Option<String>,
        #[arg(long, value_name = "SKILL", help = "Skill demonstrated (repeatable)")]
        skill: Vec<String>,
        #[arg(
            long,
            value_name = "RFC3339",
            help = "When the action happened (default: now)"
        )]
        action_date: Option<String>,
        #[arg(long, value_name = "PATH", help = "Path to ledger DB")]
        db: Option<PathBuf>,
        #[arg(long, value_name = "PATH", help = "Write NDJSON change mirror to file")]
        mirror: Option<PathBuf>,
    },
    #[command(about = "Show the projected score for an action without recording it")]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Example:
  tally preview --action proposal_creation --impact high --duration 90")]
    Preview {
        #[arg(long, value_name = "TYPE", help = "Action type")]
        action: ActionType,
        #[arg(long, value_name = "LEVEL", help = "Impact level (default: medium)")]
        impact: Option<ImpactLevel>,
        #[arg(long, value_name = "RANGE", help = "Deal size band")]
        deal_size: Option<DealSizeRange>,
        #[arg(long, value_name = "LEVEL", help = "Stakeholder seniority")]
        stakeholder: Option<StakeholderLevel>,
        #[arg(long, value_name = "MIN", help = "Duration in minutes")]
        duration: Option<i64>,
    },
    #[command(about = "Mark a recorded action as verified by a third party")]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Example:
  tally verify --event <EVENT_ID> --by mgr-1")]
    Verify {
        #[arg(long, value_name = "EVENT_ID", help = "Event to verify")]
        event: String,
        #[arg(long = "by", value_name = "VERIFIER_ID", help = "Who verified it")]
        verifier: String,
        #[arg(long, value_name = "PATH", help = "Path to ledger DB")]
        db: Option<PathBuf>,
        #[arg(long, value_name = "PATH", help = "Write NDJSON change mirror to file")]
        mirror: Option<PathBuf>,
    },
    #[command(
        about = "Amend non-scoring fields of a recorded action",
        long_about = "Amend descriptive and outcome fields of a recorded action. Scoring fields and the competency category are write-once and cannot be changed here."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Example:
  tally update --event <EVENT_ID> --outcome-achieved --outcome \"signed next week\"")]
    Update {
        #[arg(long, value_name = "EVENT_ID", help = "Event to amend")]
        event: String,
        #[arg(long, value_name = "TEXT", help = "Replace the description")]
        description: Option<String>,
        #[arg(long, value_name = "TEXT", help = "Replace the subcategory")]
        subcategory: Option<String>,
        #[arg(long, help = "Mark the tracked outcome as achieved")]
        outcome_achieved: bool,
        #[arg(long, value_name = "TEXT", help = "Outcome description")]
        outcome: Option<String>,
        #[arg(long, value_name = "RFC3339", help = "Schedule a follow-up")]
        follow_up: Option<String>,
        #[arg(long, value_name = "TEXT", help = "Lesson learned")]
        lesson: Option<String>,
        #[arg(long, value_name = "PATH", help = "Path to ledger DB")]
        db: Option<PathBuf>,
        #[arg(long, value_name = "PATH", help = "Write NDJSON change mirror to file")]
        mirror: Option<PathBuf>,
    },
    #[command(about = "List recorded actions for a subject")]
    #[command(after_long_help = "Examples:
  tally list --subject u1 --limit 10
  tally list --subject u1 --action customer_meeting --verified true --json")]
    List {
        #[arg(long, value_name = "SUBJECT_ID", help = "Subject to list")]
        subject: Option<String>,
        #[arg(long, value_name = "TYPE", help = "Filter by action type")]
        action: Option<ActionType>,
        #[arg(long, value_name = "CATEGORY", help = "Filter by competency category")]
        category: Option<CompetencyCategory>,
        #[arg(long, value_name = "LEVEL", help = "Filter by impact level")]
        impact: Option<ImpactLevel>,
        #[arg(
            long,
            value_name = "BOOL",
            help = "Filter by verification state (true or false)"
        )]
        verified: Option<bool>,
        #[arg(long, value_name = "RFC3339", help = "Only actions on or after this date")]
        since: Option<String>,
        #[arg(long, value_name = "RFC3339", help = "Only actions on or before this date")]
        until: Option<String>,
        #[arg(long, value_name = "N", help = "Page size")]
        limit: Option<usize>,
        #[arg(long, value_name = "N", help = "Page offset")]
        offset: Option<usize>,
        #[arg(long, help = "Emit JSON instead of text")]
        json: bool,
        #[arg(long, value_name = "PATH", help = "Path to ledger DB")]
        db: Option<PathBuf>,
    },
    #[command(about = "Roll up a subject's history into competency analytics")]
    #[command(after_long_help = "Example:
  tally analytics --subject u1 --json")]
    Analytics {
        #[arg(long, value_name = "SUBJECT_ID", help = "Subject to aggregate")]
        subject: Option<String>,
        #[arg(long, help = "Emit JSON instead of text")]
        json: bool,
        #[arg(long, value_name = "PATH", help = "Path to ledger DB")]
        db: Option<PathBuf>,
    },
    #[command(
        about = "Generate shell completion script",
        long_about = "Generate shell completion script for your shell. Redirect output to your shell completion directory."
    )]
    #[command(arg_required_else_help = true)]
    Completion {
        #[arg(value_enum, value_name = "SHELL", help = "Target shell")]
        shell: Shell,
    },
    #[command(about = "Generate a man page")]
    Man {
        #[arg(
            long,
            value_name = "PATH",
            help = "Write man page to file (stdout when omitted)"
        )]
        output: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Log {
            subject,
            action,
            description,
            impact,
            category,
            subcategory,
            deal_size,
            stakeholder,
            duration,
            industry,
            evidence_link,
            evidence_type,
            skill,
            action_date,
            db,
            mirror,
        } => {
            let cfg = load_cfg()?;
            let ledger = open_ledger(&cfg, db, mirror)?;
            let mut params = LogParams::new(&resolve_subject(subject, &cfg)?, action, &description);
            params.impact_level = impact.unwrap_or_default();
            params.category = category.unwrap_or_else(|| action.default_category());
            params.subcategory = subcategory;
            params.context.deal_size = deal_size;
            params.context.stakeholder_level = stakeholder;
            params.context.duration_minutes = duration;
            params.context.industry = industry;
            params.evidence_link = evidence_link;
            params.evidence_type = evidence_type;
            params.action_date = action_date.as_deref().map(parse_date).transpose()?;
            if !skill.is_empty() {
                params.metadata.insert(
                    "skills_demonstrated".to_string(),
                    Value::Array(skill.into_iter().map(Value::String).collect()),
                );
            }
            let event = ledger.log(params)?;
            println!("recorded {}", event.id);
            print_event(&event);
            Ok(())
        }
        Commands::Preview {
            action,
            impact,
            deal_size,
            stakeholder,
            duration,
        } => {
            let ctx = ScoringContext {
                deal_size,
                stakeholder_level: stakeholder,
                duration_minutes: duration,
            };
            let got = crate::points::compute(action, impact.unwrap_or_default(), &ctx);
            println!("action: {action} ({})", action.default_category());
            println!("base_points: {}", got.base_points);
            println!("multiplier: {}", got.multiplier);
            println!("total_points: {}", got.total_points);
            Ok(())
        }
        Commands::Verify {
            event,
            verifier,
            db,
            mirror,
        } => {
            let cfg = load_cfg()?;
            let ledger = open_ledger(&cfg, db, mirror)?;
            let updated = ledger.verify(&event, &verifier)?;
            println!(
                "verified {} by {} at {}",
                updated.id,
                verifier,
                updated
                    .evidence
                    .verified_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default()
            );
            Ok(())
        }
        Commands::Update {
            event,
            description,
            subcategory,
            outcome_achieved,
            outcome,
            follow_up,
            lesson,
            db,
            mirror,
        } => {
            let cfg = load_cfg()?;
            let ledger = open_ledger(&cfg, db, mirror)?;
            let follow_up_date = follow_up.as_deref().map(parse_date).transpose()?;
            let update = EventUpdate {
                description,
                subcategory,
                outcome_achieved: outcome_achieved.then_some(true),
                outcome_description: outcome,
                follow_up_required: follow_up_date.map(|_| true),
                follow_up_date,
                metadata: lesson.map(|text| {
                    let mut m = Map::new();
                    m.insert("lessons_learned".to_string(), Value::String(text));
                    m
                }),
                ..EventUpdate::default()
            };
            let updated = ledger.update(&event, update)?;
            println!("updated {}", updated.id);
            print_event(&updated);
            Ok(())
        }
        Commands::List {
            subject,
            action,
            category,
            impact,
            verified,
            since,
            until,
            limit,
            offset,
            json,
            db,
        } => {
            let cfg = load_cfg()?;
            let ledger = open_ledger(&cfg, db, None)?;
            let filter = EventFilter {
                action_type: action,
                category,
                impact_level: impact,
                verified,
                since: since.as_deref().map(parse_date).transpose()?,
                until: until.as_deref().map(parse_date).transpose()?,
                limit,
                offset,
            };
            let events = ledger.query(&resolve_subject(subject, &cfg)?, &filter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
                return Ok(());
            }
            if events.is_empty() {
                println!("no recorded actions");
                return Ok(());
            }
            for ev in &events {
                println!(
                    "{}  {}  {:>5} pts  {}  {}{}",
                    ev.action_date.format("%Y-%m-%d"),
                    ev.action_type,
                    ev.total_points,
                    ev.category,
                    ev.description,
                    if ev.evidence.verified {
                        "  [verified]"
                    } else {
                        ""
                    }
                );
            }
            Ok(())
        }
        Commands::Analytics { subject, json, db } => {
            let cfg = load_cfg()?;
            let ledger = open_ledger(&cfg, db, None)?;
            let analytics = ledger.compute_analytics(&resolve_subject(subject, &cfg)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
                return Ok(());
            }
            println!(
                "actions: {} ({} verified)",
                analytics.total_actions, analytics.verified_actions
            );
            println!("total_points: {}", analytics.total_points);
            println!("average_action_value: {}", analytics.average_action_value);
            println!(
                "learning_velocity: {} actions/week",
                analytics.learning_velocity
            );
            println!(
                "top_action_type: {}",
                analytics
                    .top_action_type
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
            println!("by_category:");
            for c in &analytics.by_category {
                println!(
                    "  {}: count={} points={} avg={}",
                    c.category, c.count, c.points, c.avg_points
                );
            }
            if !analytics.by_type.is_empty() {
                println!("by_type:");
                for t in &analytics.by_type {
                    println!(
                        "  {}: count={} points={} avg={}",
                        t.action_type, t.count, t.points, t.avg_points
                    );
                }
            }
            Ok(())
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Man { output } => {
            let man = clap_mangen::Man::new(Cli::command());
            match output {
                Some(path) => {
                    let mut bytes = Vec::new();
                    man.render(&mut bytes)?;
                    fs::write(path, bytes)?;
                }
                None => {
                    man.render(&mut io::stdout())?;
                }
            }
            Ok(())
        }
    }
}

fn load_cfg() -> Result<config::RepoConfig> {
    let cwd = std::env::current_dir().context("resolve working directory")?;
    Ok(config::load_config(&cwd)?.unwrap_or_default())
}

fn resolve_subject(flag: Option<String>, cfg: &config::RepoConfig) -> Result<String> {
    flag.or_else(|| cfg.default_subject.clone()).ok_or_else(|| {
        anyhow!("no subject given; pass --subject or set `[defaults].subject` in .tally/config.toml")
    })
}

type CliLedger = ActionLedger<SqliteStore, SqlitePointSink, Box<dyn ChangeNotifier>>;

fn open_ledger(
    cfg: &config::RepoConfig,
    db: Option<PathBuf>,
    mirror: Option<PathBuf>,
) -> Result<CliLedger> {
    let db_path = db
        .or_else(|| cfg.storage_path.clone())
        .unwrap_or_else(config::default_db_path);
    let store = SqliteStore::open(&db_path)?;
    let sink = SqlitePointSink::open(&db_path)?;
    let notifier: Box<dyn ChangeNotifier> = match mirror.or_else(|| cfg.mirror_path.clone()) {
        Some(path) => Box::new(NdjsonNotifier::new(path)),
        None => Box::new(NullNotifier),
    };
    Ok(ActionLedger::new(store, sink, notifier))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("parse date {raw} (expected RFC 3339)"))
}


fn print_event(ev: &ScoredEvent) {
    println!("  subject: {}", ev.subject_id);
    println!("  action: {} ({})", ev.action_type, ev.category);
    println!("  impact: {}", ev.impact_level);
    println!(
        "  score: {} base x {} = {} pts",
        ev.base_points, ev.multiplier, ev.total_points
    );
    println!("  action_date: {}", ev.action_date.to_rfc3339());
    if let Some(deal) = ev.context.deal_size {
        println!("  deal_size: {deal}");
    }
    if let Some(level) = ev.context.stakeholder_level {
        println!("  stakeholder: {level}");
    }
    if ev.outcome.achieved {
        let detail = ev.outcome.description.as_deref().unwrap_or("achieved");
        println!("  outcome: {detail}");
    }
    if !ev.metadata.is_empty()
        && let Ok(meta) = serde_json::to_string(&ev.metadata)
    {
        println!("  metadata: {meta}");
    }
}
