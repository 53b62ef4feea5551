use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use avatar_picker::storage::{load_session_user, store_session_user};
use avatar_picker::{
    AvatarFetcher, Config, FileStorage, HttpAvatarApi, Mount, Navigator,
    Notifier, Route, SessionUser, SetAvatarPage, Submission, ToastOptions,
};
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser, Debug)]
#[clap(name = "set-avatar")]
#[clap(about = "Pick a generated avatar for the chat app user", long_about = None)]
struct Cli {
    /// Config file, defaults to the platform config directory
    #[clap(long)]
    config: Option<PathBuf>,

    /// Session file, takes precedence over the config
    #[clap(long)]
    session: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a session user the way the login page does
    Login {
        #[clap(long)]
        user_id: String,
        #[clap(long)]
        username: Option<String>,
    },
    /// Print the stored session user
    Whoami,
    /// Fetch candidates, choose one and store it as profile picture
    Pick {
        /// Where the candidates are written, the current directory by default
        #[clap(long)]
        out: Option<PathBuf>,
        /// Index of the candidate, asked on stdin when missing
        #[clap(long)]
        choose: Option<usize>,
        /// How many candidates to offer
        #[clap(long)]
        count: Option<usize>,
    },
}

struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&mut self, route: Route) {
        log::debug!("navigating to {}", route);
        match route {
            Route::Login => println!("Nobody is logged in, run `set-avatar login` first."),
            Route::Home => println!("All set, back to the chat."),
        }
    }
}

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn error(&mut self, message: &str, _options: &ToastOptions) {
        eprintln!("error: {}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Cli::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Couldn't load {}", config_path.display()))?;
    if let Some(session) = &args.session {
        config.session_file = Some(session.clone());
    }

    let session_path = config.session_path()?;
    let storage = FileStorage::new("session".to_owned(), &session_path);

    match args.command {
        Command::Login { user_id, username } => {
            let mut storage = storage;
            let mut user = SessionUser::new(user_id);
            if let Some(username) = username {
                user.extra
                    .insert("username".to_owned(), Value::String(username));
            }
            store_session_user(&mut storage, &user)?;
            println!("Session stored at {}", session_path.display());
        }
        Command::Whoami => match load_session_user(&storage)? {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => println!("Nobody is logged in."),
        },
        Command::Pick { out, choose, count } => {
            let count = count.unwrap_or(config.candidate_count);
            let out = match out {
                Some(out) => out,
                None => env::current_dir()?,
            };
            pick(&config, storage, out, choose, count).await?;
        }
    }

    Ok(())
}

async fn pick(
    config: &Config,
    storage: FileStorage,
    out: PathBuf,
    choose: Option<usize>,
    count: usize,
) -> Result<()> {
    let mut page = SetAvatarPage::new(
        Box::new(storage),
        Box::new(AvatarFetcher::from_config(config)?),
        Box::new(HttpAvatarApi::from_config(config)),
        Box::new(TerminalNavigator),
        Box::new(TerminalNotifier),
    )
    .with_candidate_count(count);

    println!("Fetching {} avatars...", count);
    if page.mount().await == Mount::Redirected {
        return Ok(());
    }
    if page.avatars().is_empty() {
        return Err(anyhow!("No avatars to choose from"));
    }

    fs::create_dir_all(&out)?;
    for (i, avatar) in page.avatars().iter().enumerate() {
        let path = out.join(format!("avatar-{}.svg", i));
        fs::write(&path, avatar.decode()?)?;
        println!("\t[{}] {}", i, path.display());
    }

    let interactive = choose.is_none();
    let mut choose = choose;
    loop {
        let index = match choose.take() {
            Some(index) => index,
            None => prompt(page.avatars().len())?,
        };
        if let Err(e) = page.select(index) {
            if !interactive {
                return Err(e.into());
            }
            eprintln!("error: {}", e);
            continue;
        }

        println!("Setting...");
        match page.submit().await {
            Submission::Saved(user) => {
                log::info!("avatar stored for user {}", user.id);
                return Ok(());
            }
            Submission::Ignored => return Ok(()),
            Submission::Failed(e) if !interactive => return Err(e.into()),
            Submission::Rejected if !interactive => {
                return Err(anyhow!("The backend refused the avatar"))
            }
            _ => continue,
        }
    }
}

fn prompt(count: usize) -> Result<usize> {
    print!("Pick an avatar as your profile picture [0-{}]: ", count - 1);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(anyhow!("Aborted"));
    }
    line.trim()
        .parse()
        .with_context(|| format!("Not a number: {}", line.trim()))
}
