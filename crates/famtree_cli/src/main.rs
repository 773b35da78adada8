//! `famtree` command-line front end.
//!
//! Translates arguments into `famtree_core` calls and prints JSON results.

mod args;

use args::{AddPersonArgs, Cli, Commands, IdSchemeArg, UpcomingArgs};
use chrono::NaiveDateTime;
use clap::Parser;
use famtree_core::db::shared_connection;
use famtree_core::{
    init_logging, CoreConfig, HebrewDate, IdGenerator, NumericIdGenerator, PersonPatch,
    PersonService, ProximityContext, RelationshipIntent, SelectedRelationships,
    SqlitePersonRepository, UuidIdGenerator,
};
use log::error;
use serde::Serialize;
use std::error::Error;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = resolve_config(&cli)?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(config.log_level, log_dir)?;
    }

    let shared = shared_connection(&config.db_path)?;
    shared.with_connection(|conn| -> CliResult<()> {
        let repo = SqlitePersonRepository::try_new(conn)?;
        let ids: &dyn IdGenerator = match cli.id_scheme {
            IdSchemeArg::Numeric => &NumericIdGenerator,
            IdSchemeArg::Uuid => &UuidIdGenerator,
        };
        let service = PersonService::new(repo, ids);

        match &cli.command {
            Commands::Add(args) => {
                let intent = build_intent(args)?;
                let person = service.create_person(args.to_new_person(), intent.as_ref())?;
                print_json(&person)
            }
            Commands::List => print_json(&service.list_with_relations()?),
            Commands::Show(args) => print_json(&service.get_with_relations(&args.id)?),
            Commands::Update(args) => {
                let patch: PersonPatch = serde_json::from_str(&args.patch)?;
                print_json(&service.update_person(&args.id, &patch)?)
            }
            Commands::Delete(args) => {
                service.delete_person(&args.id)?;
                print_json(&serde_json::json!({ "deleted": args.id }))
            }
            Commands::Upcoming(args) => {
                print_json(&service.upcoming_dates(&proximity_context(args)?)?)
            }
            Commands::Search(args) => print_json(&service.search(&args.term)?),
            Commands::Clear(args) => {
                if !args.yes {
                    return Err("refusing to delete everyone without --yes".into());
                }
                let removed = service.delete_all()?;
                print_json(&serde_json::json!({ "deleted": removed }))
            }
        }
    })
}

fn resolve_config(cli: &Cli) -> CliResult<CoreConfig> {
    let mut config = CoreConfig::from_env()?;
    if let Some(db) = &cli.db {
        config = config.with_db_path(db)?;
    }
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level)?;
    }
    if let Some(dir) = &cli.log_dir {
        config = config.with_log_dir(dir)?;
    }
    Ok(config)
}

fn build_intent(args: &AddPersonArgs) -> CliResult<Option<RelationshipIntent>> {
    let (Some(relation), Some(related_id)) = (args.relation, &args.related_id) else {
        return Ok(None);
    };
    let mut intent = RelationshipIntent::new(relation.into(), related_id.as_str());
    if let Some(parent_type) = args.parent_type {
        intent = intent.with_parent_type(parent_type.into());
    }
    if let Some(selection) = &args.selection {
        let selected: SelectedRelationships = serde_json::from_str(selection)?;
        intent = intent.with_selection(selected);
    }
    Ok(Some(intent))
}

fn proximity_context(args: &UpcomingArgs) -> CliResult<ProximityContext> {
    let mut ctx = match &args.now {
        Some(raw) => ProximityContext::new(NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")?),
        None => ProximityContext::local_now(),
    };
    if let Some(raw) = &args.hebrew_today {
        ctx = ctx.with_hebrew_today(HebrewDate::parse(raw)?);
    }
    Ok(ctx)
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
