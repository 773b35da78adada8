//! Command argument structures.

use clap::{Args, Parser, Subcommand, ValueEnum};
use famtree_core::{DateFormat, NewPerson, ParentType, RelationshipType};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "famtree")]
#[command(about = "Family tree store with relationship linking and date reminders", long_about = None)]
#[command(version)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "FAMTREE_DB_PATH")]
    pub db: Option<PathBuf>,

    /// Absolute directory for rotated log files
    #[arg(long, global = true, env = "FAMTREE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "FAMTREE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Identifier scheme for new people
    #[arg(long, global = true, value_enum, env = "FAMTREE_ID_SCHEME", default_value = "numeric")]
    pub id_scheme: IdSchemeArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a person, optionally linked to an existing one
    Add(AddPersonArgs),

    /// List everyone with derived relations
    List,

    /// Show one person with derived relations
    Show(PersonIdArgs),

    /// Patch fields of a person from a JSON object
    Update(UpdatePersonArgs),

    /// Delete a person; references to them are left in place
    Delete(PersonIdArgs),

    /// Upcoming birthdays and anniversaries
    Upcoming(UpcomingArgs),

    /// Find visible people by name, email or phone
    Search(SearchArgs),

    /// Delete every person in the store
    Clear(ClearArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum IdSchemeArg {
    /// Random nine-digit numbers
    Numeric,
    /// Random UUIDv4 strings
    Uuid,
}

#[derive(Args)]
pub struct PersonIdArgs {
    /// Person ID
    pub id: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Gregorian,
    Hebrew,
    Both,
}

impl From<FormatArg> for DateFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Gregorian => Self::Gregorian,
            FormatArg::Hebrew => Self::Hebrew,
            FormatArg::Both => Self::Both,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RelationArg {
    Spouse,
    Child,
    Sibling,
    Parent,
}

impl From<RelationArg> for RelationshipType {
    fn from(value: RelationArg) -> Self {
        match value {
            RelationArg::Spouse => Self::Spouse,
            RelationArg::Child => Self::Child,
            RelationArg::Sibling => Self::Sibling,
            RelationArg::Parent => Self::Parent,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ParentArg {
    Father,
    Mother,
}

impl From<ParentArg> for ParentType {
    fn from(value: ParentArg) -> Self {
        match value {
            ParentArg::Father => Self::Father,
            ParentArg::Mother => Self::Mother,
        }
    }
}

#[derive(Args)]
pub struct AddPersonArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    /// Gregorian birth date (dd/mm/yyyy or yyyy-mm-dd)
    #[arg(long)]
    pub birth_date: Option<String>,

    /// Hebrew birth date, e.g. "15 Nisan 5750"
    #[arg(long)]
    pub hebrew_birth_date: Option<String>,

    /// Gregorian marriage date (dd/mm/yyyy or yyyy-mm-dd)
    #[arg(long)]
    pub marriage_date: Option<String>,

    #[arg(long)]
    pub hebrew_marriage_date: Option<String>,

    /// Gregorian death date (dd/mm/yyyy or yyyy-mm-dd)
    #[arg(long)]
    pub death_date: Option<String>,

    #[arg(long)]
    pub hebrew_death_date: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    /// Calendar used for reminders
    #[arg(long, value_enum, default_value = "gregorian")]
    pub date_format: FormatArg,

    #[arg(long)]
    pub notify_birthday: bool,

    #[arg(long)]
    pub notify_anniversary: bool,

    /// How the new person relates to `--related-id`
    #[arg(long, value_enum, requires = "related_id")]
    pub relation: Option<RelationArg>,

    /// Existing person to link with
    #[arg(long, requires = "relation")]
    pub related_id: Option<String>,

    /// Parent slot for `--relation parent`
    #[arg(long, value_enum)]
    pub parent_type: Option<ParentArg>,

    /// selectedRelationships as JSON, e.g. '{"sharedChildren":{"42":true}}'
    #[arg(long)]
    pub selection: Option<String>,
}

impl AddPersonArgs {
    pub fn to_new_person(&self) -> NewPerson {
        NewPerson {
            birth_date_gregorian: self.birth_date.clone(),
            birth_date_hebrew: self.hebrew_birth_date.clone(),
            death_date_gregorian: self.death_date.clone(),
            death_date_hebrew: self.hebrew_death_date.clone(),
            marriage_date: self.marriage_date.clone(),
            marriage_date_hebrew: self.hebrew_marriage_date.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            primary_date_format: self.date_format.into(),
            notify_on_birthday: self.notify_birthday,
            notify_on_anniversary: self.notify_anniversary,
            ..NewPerson::named(self.first_name.as_str(), self.last_name.as_str())
        }
    }
}

#[derive(Args)]
pub struct UpdatePersonArgs {
    /// Person ID
    pub id: String,

    /// Field patch as JSON; `null` clears a field
    #[arg(long)]
    pub patch: String,
}

#[derive(Args)]
pub struct UpcomingArgs {
    /// Reference time (YYYY-MM-DDTHH:MM:SS); defaults to local now
    #[arg(long)]
    pub now: Option<String>,

    /// Today's Hebrew date, e.g. "10 Nisan 5785"
    #[arg(long)]
    pub hebrew_today: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Case-insensitive text; phone numbers match as typed
    pub term: String,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Confirm deleting everyone
    #[arg(long)]
    pub yes: bool,
}
