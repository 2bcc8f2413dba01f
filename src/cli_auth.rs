use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

mod cli_style;

use cli_style::get_styles;
use genre_detector_server::user::{SqliteUserStore, UserManager};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to the user db, looked up from the current directory if omitted.
    #[clap(value_parser = parse_path)]
    pub path: Option<PathBuf>,
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Creates a user with the given handle.
    AddUser { user_handle: String },

    /// Creates a password authentication for the given user.
    /// Fails if the user already has a password set.
    AddLogin {
        user_handle: String,
        password: String,
    },

    /// Change the password of a user, fails if no password was set.
    UpdateLogin {
        user_handle: String,
        password: String,
    },

    /// Deletes the password authentication for a given user.
    DeleteLogin { user_handle: String },

    /// Shows authentication information of a given user.
    Show { user_handle: String },

    /// Verifies the password of a given user without creating any token.
    CheckPassword {
        user_handle: String,
        password: String,
    },

    /// Shows the genre statistics of a given user.
    Stats { user_handle: String },

    /// Shows all user handles.
    UserHandles,

    /// Shows the path of the current user db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

const PROMPT: &str = ">> ";

fn user_id_of(user_manager: &UserManager, user_handle: &str) -> Result<usize> {
    user_manager
        .get_user_credentials(user_handle)?
        .map(|credentials| credentials.user_id)
        .with_context(|| format!("User {} not found.", user_handle))
}

fn run_command(command: InnerCommand, user_manager: &UserManager, db_path: &str) -> Result<bool> {
    match command {
        InnerCommand::AddUser { user_handle } => {
            let user_id = user_manager.add_user(&user_handle)?;
            println!("Created user {} with id {}", user_handle, user_id);
        }
        InnerCommand::AddLogin {
            user_handle,
            password,
        } => user_manager.create_password_credentials(&user_handle, &password)?,
        InnerCommand::UpdateLogin {
            user_handle,
            password,
        } => user_manager.update_password_credentials(&user_handle, &password)?,
        InnerCommand::DeleteLogin { user_handle } => {
            user_manager.delete_password_credentials(&user_handle)?
        }
        InnerCommand::Show { user_handle } => {
            let user_credentials = user_manager.get_user_credentials(&user_handle)?;
            let user_tokens = user_manager.get_user_tokens(&user_handle)?;

            println!("User Credentials:");
            println!("{:#?}", user_credentials);

            println!("\nAuth Tokens:");
            for token in user_tokens.iter() {
                println!("{:#?}", token);
            }
        }
        InnerCommand::CheckPassword {
            user_handle,
            password,
        } => {
            let msg = match user_manager.authenticate(&user_handle, &password)? {
                Some(_) => "The password provided is correct!",
                None => "Wrong password, or the user has no password set.",
            };
            println!("{}", msg);
        }
        InnerCommand::Stats { user_handle } => {
            let user_id = user_id_of(user_manager, &user_handle)?;
            let stats = user_manager.get_user_stats(user_id)?;
            if stats.is_empty() {
                println!("No genres logged for {}", user_handle);
            }
            for genre in stats {
                println!("{:<12} {:>5} {:>8}", genre.name, genre.amount, genre.percentage);
            }
        }
        InnerCommand::UserHandles => {
            println!("{:#?}", user_manager.get_all_user_handles()?);
        }
        InnerCommand::Where => {
            println!("{}", db_path);
        }
        InnerCommand::Exit => return Ok(false),
    }
    Ok(true)
}

fn execute_command(line: String, user_manager: &UserManager, db_path: &str) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => {
            println!("{} {}", PROMPT, &line);
            match run_command(cli.command, user_manager, db_path) {
                Ok(true) => CommandExecutionResult::Ok,
                Ok(false) => CommandExecutionResult::Exit,
                Err(err) => CommandExecutionResult::Error(format!("{:#}", err)),
            }
        }
        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
            CommandExecutionResult::Ok
        }
    }
}

#[derive(rustyline_derive::Hinter)]
struct CommandsHelper {
    commands_names: Vec<String>,
}

impl CommandsHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        CommandsHelper { commands_names }
    }
}

impl Completer for CommandsHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for CommandsHelper {}
impl Validator for CommandsHelper {}
impl Helper for CommandsHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let user_db_path = match cli_args.path {
        Some(path) => path,
        None => SqliteUserStore::infer_path()
            .context("Could not infer the user db path, please specify it explicitly.")?,
    };
    let user_store = SqliteUserStore::new(&user_db_path)?;
    let user_manager = UserManager::new(Arc::new(user_store));
    let db_path = user_db_path.display().to_string();

    InnerCli::command().print_long_help()?;

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<CommandsHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(CommandsHelper::new()));

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &user_manager, &db_path) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => eprintln!("Error: {}", err),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}
