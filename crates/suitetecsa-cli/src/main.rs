use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use suitetecsa::connect::types::ConnectSession;
use suitetecsa::user::types::{AccountProfile, Totals};
use suitetecsa::utils::seconds_to_time;
use suitetecsa::{ActionKind, ConnectPortal, PortalConfig, UserPortal};

#[derive(Parser)]
#[command(name = "suitetecsa")]
#[command(about = "Nauta user portal and captive portal client", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text",
        global = true,
        help = "Output format"
    )]
    format: OutputFormat,

    #[arg(
        long,
        env = "NAUTA_USER_BASE_URL",
        global = true,
        help = "Override the user portal base URL"
    )]
    user_base_url: Option<String>,

    #[arg(
        long,
        env = "NAUTA_CONNECT_BASE_URL",
        global = true,
        help = "Override the captive portal base URL"
    )]
    connect_base_url: Option<String>,

    #[arg(
        long,
        env = "NAUTA_TIMEOUT",
        global = true,
        help = "Per-request timeout in seconds"
    )]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
struct Credentials {
    #[arg(short = 'u', long, env = "NAUTA_USERNAME", help = "Nauta account")]
    username: String,

    #[arg(
        short = 'p',
        long,
        env = "NAUTA_PASSWORD",
        hide_env_values = true,
        help = "Account password"
    )]
    password: String,
}

#[derive(Debug, Args)]
struct SessionFile {
    #[arg(
        long = "session-file",
        default_value = "nauta-session.json",
        help = "Where the open internet session is kept"
    )]
    path: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an internet session through the captive portal
    Connect {
        #[command(flatten)]
        credentials: Credentials,

        #[command(flatten)]
        session_file: SessionFile,
    },
    /// Close the internet session saved by `connect`
    Disconnect {
        #[command(flatten)]
        session_file: SessionFile,
    },
    /// Show the time left on the open internet session
    RemainingTime {
        #[command(flatten)]
        session_file: SessionFile,
    },
    /// Show account status and recent connections from the captive portal
    ConnectInfo {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Log into the user portal and run an account operation
    User {
        #[command(flatten)]
        credentials: Credentials,

        #[arg(
            long,
            default_value = "captcha.png",
            help = "Where to save the login captcha image"
        )]
        captcha_file: PathBuf,

        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Show the account profile
    Info,
    /// Show the history summary of one month
    Summary {
        #[arg(value_parser = parse_action, help = "connections, recharges, transfers or quotes-paid")]
        action: ActionKind,

        #[command(flatten)]
        month: MonthArgs,
    },
    /// List the history records of one month
    Records {
        #[arg(value_parser = parse_action, help = "connections, recharges, transfers or quotes-paid")]
        action: ActionKind,

        #[command(flatten)]
        month: MonthArgs,

        #[arg(long, default_value_t = 0, help = "Maximum records to fetch, 0 for all")]
        large: u32,

        #[arg(long, help = "Start from the most recent records")]
        reversed: bool,
    },
    /// List the most recent records across months
    Lasts {
        #[arg(value_parser = parse_action, help = "connections, recharges, transfers or quotes-paid")]
        action: ActionKind,

        #[arg(short = 'n', long, default_value_t = 5, help = "How many records")]
        large: u32,
    },
    /// Recharge the account with a prepaid code
    Recharge {
        #[arg(help = "Recharge code")]
        code: String,
    },
    /// Transfer credit to another Nauta account
    Transfer {
        #[arg(help = "Amount in CUP")]
        amount: f64,

        #[arg(help = "Destination account")]
        destination: String,
    },
    /// Pay the Nauta Hogar quote from the account credit
    PayHome {
        #[arg(help = "Amount in CUP")]
        amount: f64,
    },
    /// Change the account password
    ChangePassword {
        #[arg(long, env = "NAUTA_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    /// Change the password of the associated mail account
    ChangeEmailPassword {
        #[arg(long, hide_env_values = true, env = "NAUTA_MAIL_PASSWORD")]
        old_password: String,

        #[arg(long, env = "NAUTA_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}

#[derive(Debug, Args)]
struct MonthArgs {
    #[arg(long, help = "Year, defaults to the current one")]
    year: Option<i32>,

    #[arg(
        long,
        value_parser = clap::value_parser!(u32).range(1..=12),
        help = "Month (1-12), defaults to the current one"
    )]
    month: Option<u32>,
}

impl MonthArgs {
    fn resolve(&self) -> (i32, u32) {
        let now = Local::now();
        (
            self.year.unwrap_or(now.year()),
            self.month.unwrap_or(now.month()),
        )
    }
}

fn parse_action(s: &str) -> Result<ActionKind, String> {
    ActionKind::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn fail<T, E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> T + '_ {
    move |e| {
        log::error!("{}: {}", context, e);
        process::exit(1);
    }
}

fn load_session(path: &Path) -> ConnectSession {
    let json = fs::read_to_string(path)
        .unwrap_or_else(fail(&format!("Error reading {}", path.display())));
    serde_json::from_str(&json).unwrap_or_else(fail("Error parsing session file"))
}

fn save_session(path: &Path, session: &ConnectSession) {
    let json = serde_json::to_string_pretty(session)
        .unwrap_or_else(fail("Error serializing session"));
    fs::write(path, json).unwrap_or_else(fail(&format!("Error writing {}", path.display())));
}

fn read_captcha(path: &Path) -> String {
    print!("Captcha saved to {}, type its code: ", path.display());
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .unwrap_or_else(fail("Error reading captcha code"));
    line.trim().to_string()
}

fn print_message(message: Option<String>, fallback: &str, format: &OutputFormat) {
    let message = message.unwrap_or_else(|| fallback.to_string());
    match format {
        OutputFormat::Json => serialize_json(&serde_json::json!({ "message": message })),
        OutputFormat::Text => println!("{}", message),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let mut config = PortalConfig::default();
    if let Some(url) = cli.user_base_url {
        config.user_base_url = format!("{}/", url.trim_end_matches('/'));
    }
    if let Some(url) = cli.connect_base_url {
        config.connect_base_url = format!("{}/", url.trim_end_matches('/'));
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    let format = cli.format;

    match cli.command {
        Commands::Connect {
            credentials,
            session_file,
        } => {
            let mut portal =
                ConnectPortal::with_config(config).unwrap_or_else(fail("Error creating client"));
            if !portal.check_portal_access().await {
                log::error!("The captive portal is not reachable from this network");
                process::exit(1);
            }
            portal
                .connect(&credentials.username, &credentials.password)
                .await
                .unwrap_or_else(fail("Error connecting"));

            if let Some(session) = portal.session() {
                save_session(&session_file.path, session);
                log::info!("Session saved to {}", session_file.path.display());
            }
            print_message(None, "Connected", &format);
        }

        Commands::Disconnect { session_file } => {
            let mut portal =
                ConnectPortal::with_config(config).unwrap_or_else(fail("Error creating client"));
            portal.restore(load_session(&session_file.path));
            portal
                .disconnect()
                .await
                .unwrap_or_else(fail("Error disconnecting"));

            if let Err(e) = fs::remove_file(&session_file.path) {
                log::warn!("Could not remove {}: {}", session_file.path.display(), e);
            }
            print_message(None, "Disconnected", &format);
        }

        Commands::RemainingTime { session_file } => {
            let mut portal =
                ConnectPortal::with_config(config).unwrap_or_else(fail("Error creating client"));
            portal.restore(load_session(&session_file.path));
            let seconds = portal
                .remaining_time()
                .await
                .unwrap_or_else(fail("Error fetching remaining time"));

            match format {
                OutputFormat::Json => serialize_json(&serde_json::json!({ "seconds": seconds })),
                OutputFormat::Text => println!("{}", seconds_to_time(seconds)),
            }
        }

        Commands::ConnectInfo { credentials } => {
            let mut portal =
                ConnectPortal::with_config(config).unwrap_or_else(fail("Error creating client"));
            let info = portal
                .connect_information(&credentials.username, &credentials.password)
                .await
                .unwrap_or_else(fail("Error fetching connect information"));

            match format {
                OutputFormat::Json => serialize_json(&info),
                OutputFormat::Text => print!("{}", info),
            }
        }

        Commands::User {
            credentials,
            captcha_file,
            command,
        } => {
            let mut portal =
                UserPortal::with_config(config).unwrap_or_else(fail("Error creating client"));

            let captcha = portal
                .captcha_image()
                .await
                .unwrap_or_else(fail("Error fetching captcha"));
            fs::write(&captcha_file, captcha)
                .unwrap_or_else(fail(&format!("Error writing {}", captcha_file.display())));
            let code = read_captcha(&captcha_file);

            let profile = portal
                .login(&credentials.username, &credentials.password, &code)
                .await
                .unwrap_or_else(fail("Error logging in"));

            run_user_command(&mut portal, command, &credentials, profile, &format).await;
        }
    }
}

async fn run_user_command(
    portal: &mut UserPortal,
    command: UserCommands,
    credentials: &Credentials,
    profile: AccountProfile,
    format: &OutputFormat,
) {
    match command {
        UserCommands::Info => match format {
            OutputFormat::Json => serialize_json(&profile),
            OutputFormat::Text => print!("{}", profile),
        },

        UserCommands::Summary { action, month } => {
            let (year, month) = month.resolve();
            let summary = portal
                .get_summary(action, year, month)
                .await
                .unwrap_or_else(fail("Error fetching summary"));

            match format {
                OutputFormat::Json => serialize_json(&summary),
                OutputFormat::Text => println!("{}", summary),
            }
        }

        UserCommands::Records {
            action,
            month,
            large,
            reversed,
        } => {
            let (year, month) = month.resolve();
            let records = portal
                .get_records(action, year, month, None, large, reversed)
                .await
                .unwrap_or_else(fail("Error fetching records"));

            match format {
                OutputFormat::Json => serialize_json(&records),
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("No entries to display.");
                    } else {
                        for (i, record) in records.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, record);
                        }
                        println!("{}", Totals::from_records(action, &records));
                    }
                }
            }
        }

        UserCommands::Lasts { action, large } => {
            let lasts = portal
                .get_lasts(action, large)
                .await
                .unwrap_or_else(fail("Error fetching latest records"));

            match format {
                OutputFormat::Json => serialize_json(&lasts),
                OutputFormat::Text => print!("{}", lasts),
            }
        }

        UserCommands::Recharge { code } => {
            let message = portal
                .recharge(&code)
                .await
                .unwrap_or_else(fail("Error recharging"));
            print_message(message, "Recharge submitted", format);
        }

        UserCommands::Transfer {
            amount,
            destination,
        } => {
            let message = portal
                .transfer(amount, &credentials.password, &destination)
                .await
                .unwrap_or_else(fail("Error transferring"));
            print_message(message, "Transfer submitted", format);
        }

        UserCommands::PayHome { amount } => {
            let message = portal
                .pay_nauta_home(amount, &credentials.password)
                .await
                .unwrap_or_else(fail("Error paying Nauta Hogar quote"));
            print_message(message, "Payment submitted", format);
        }

        UserCommands::ChangePassword { new_password } => {
            let message = portal
                .change_password(&credentials.password, &new_password)
                .await
                .unwrap_or_else(fail("Error changing password"));
            print_message(message, "Password changed", format);
        }

        UserCommands::ChangeEmailPassword {
            old_password,
            new_password,
        } => {
            let message = portal
                .change_email_password(&old_password, &new_password)
                .await
                .unwrap_or_else(fail("Error changing mail password"));
            print_message(message, "Mail password changed", format);
        }
    }

    if let Err(e) = portal.logout().await {
        log::warn!("Error logging out: {}", e);
    }
}
