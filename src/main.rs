//! CLI entry point for `maildig`.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use maildig::config::{self, Config};
use maildig::engine::MailEngine;
use maildig::error::MailError;
use maildig::model::attachment::{Attachment, AttachmentHit};
use maildig::model::mailbox::Mailbox;
use maildig::model::message::Message;
use maildig::store::{MailboxRef, SearchFilter};

#[derive(Parser)]
#[command(name = "maildig", version, about = "Read-only explorer for the macOS Mail store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List all mailboxes with their account
    Mailboxes,
    /// Search messages by subject, sender, mailbox and date
    Search {
        /// Subject contains
        #[arg(long)]
        subject: Option<String>,
        /// Sender address contains
        #[arg(long)]
        from: Option<String>,
        /// Mailbox reference contains
        #[arg(long)]
        mailbox: Option<String>,
        /// Received on or after (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date_arg)]
        after: Option<DateTime<Utc>>,
        /// Received before (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date_arg)]
        before: Option<DateTime<Utc>>,
        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List messages of one mailbox (id, URL or name)
    List {
        mailbox: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one message with body and attachments
    Show { id: i64 },
    /// List the attachments of a message
    Attachments { id: i64 },
    /// Print the extracted text of an attachment
    Extract { id: i64, filename: String },
    /// Search the text of attachments
    GrepAttachments {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show the effective configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Problems with the config file itself are logged to stderr at the
    // default level; the configured subscriber needs the loaded file.
    let defaults = Config::default();
    let startup = startup_subscriber(log_level(cli.verbose, &defaults));
    let config = tracing::subscriber::with_default(startup, config::load_config);
    setup_logging(log_level(cli.verbose, &config), &config);

    let json = cli.json;
    match cli.command {
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
        Commands::Config { init } => cmd_config(&config, init),
        command => {
            let engine = MailEngine::open(&config).map_err(with_hint)?;
            run(&engine, command, json)
        }
    }
}

fn run(engine: &MailEngine, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Mailboxes => {
            let mailboxes = engine.list_mailboxes().map_err(with_hint)?;
            if json {
                print_json(&mailboxes)
            } else {
                print_mailboxes_table(&mailboxes);
                Ok(())
            }
        }
        Commands::Search {
            subject,
            from,
            mailbox,
            after,
            before,
            limit,
        } => {
            let filter = SearchFilter {
                subject,
                sender: from,
                mailbox,
                received_after: after,
                received_before: before,
                limit: engine.search_config().clamp_limit(limit),
            };
            let messages = engine.search_messages(&filter).map_err(with_hint)?;
            print_messages(&messages, json)
        }
        Commands::List {
            mailbox,
            limit,
            offset,
        } => {
            let messages = engine
                .list_messages(&MailboxRef::parse(&mailbox), limit, offset)
                .map_err(with_hint)?;
            print_messages(&messages, json)
        }
        Commands::Show { id } => {
            let message = engine.get_message(id).map_err(with_hint)?;
            if json {
                print_json(&message)
            } else {
                print_message(&message);
                Ok(())
            }
        }
        Commands::Attachments { id } => {
            let attachments = engine.list_attachments(id).map_err(with_hint)?;
            if json {
                print_json(&attachments)
            } else {
                print_attachments_table(&attachments);
                Ok(())
            }
        }
        Commands::Extract { id, filename } => {
            let text = engine
                .attachment_content(id, &filename)
                .map_err(with_hint)?;
            if json {
                print_json(&serde_json::json!({
                    "message_id": id,
                    "filename": filename,
                    "text": text,
                }))
            } else {
                println!("{text}");
                Ok(())
            }
        }
        Commands::GrepAttachments { query, limit } => cmd_grep_attachments(engine, &query, limit, json),
        Commands::Config { .. } | Commands::Completions { .. } | Commands::Manpage => Ok(()),
    }
}

/// `-v` flags override the configured level.
fn log_level(verbose: u8, config: &Config) -> &str {
    match verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn env_filter(level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
}

/// Stderr-only subscriber used while the config file is read.
fn startup_subscriber(level: &str) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .finish()
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = env_filter(level);

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "maildig.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Attach the remediation hint, if any, to a library error.
fn with_hint(e: MailError) -> anyhow::Error {
    match e.remediation() {
        Some(hint) => anyhow::anyhow!("{e}\n  hint: {hint}"),
        None => anyhow::Error::new(e),
    }
}

fn parse_date_arg(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid date '{s}', expected YYYY-MM-DD or RFC 3339"))
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "maildig", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn cmd_config(config: &Config, init: bool) -> anyhow::Result<()> {
    if init {
        let path = config::save_config(config)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    if let Some(path) = config::config_file_path() {
        println!("# config: {}", path.display());
    }
    println!("# log:    {}", config::log_file_path(config).display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn cmd_grep_attachments(
    engine: &MailEngine,
    query: &str,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} Scanning [{bar:40.cyan/blue}] {pos}/{len} messages")?
        .progress_chars("#>-");
    let pb = ProgressBar::new(0);
    pb.set_style(style);

    let hits = engine
        .search_attachments(
            query,
            limit,
            Some(&|current: usize, total: usize| {
                pb.set_length(total as u64);
                pb.set_position(current as u64);
            }),
        )
        .map_err(with_hint)?;
    pb.finish_and_clear();

    if json {
        print_json(&serde_json::json!({
            "result_count": hits.len(),
            "results": hits,
        }))
    } else {
        print_hits(&hits);
        Ok(())
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_mailboxes_table(mailboxes: &[Mailbox]) {
    println!();
    println!("  {:<6} {:<30} {:<30}", "ID", "Mailbox", "Account");
    println!("  {}", "-".repeat(68));
    for mailbox in mailboxes {
        let name: String = mailbox.name.chars().take(29).collect();
        let account: String = mailbox
            .account
            .as_deref()
            .unwrap_or("-")
            .chars()
            .take(29)
            .collect();
        println!("  {:<6} {:<30} {:<30}", mailbox.id, name, account);
    }
    println!();
}

fn print_messages(messages: &[Message], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "result_count": messages.len(),
            "results": messages,
        }));
    }

    println!();
    println!("  {} result(s)", messages.len());
    println!();
    if messages.is_empty() {
        return Ok(());
    }

    println!(
        "  {:<8} {:<17} {:<25} {:<40} {:<12}",
        "ID", "Received", "From", "Subject", "Mailbox"
    );
    println!("  {}", "-".repeat(104));
    for message in messages {
        let date = message
            .date_received
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let from = message
            .sender
            .display_name
            .as_deref()
            .unwrap_or(&message.sender.address);
        let from_trunc: String = from.chars().take(24).collect();
        let subj_trunc: String = message.subject.chars().take(39).collect();
        let mailbox: String = message.mailbox_name.chars().take(12).collect();
        println!(
            "  {:<8} {:<17} {:<25} {:<40} {:<12}",
            message.id, date, from_trunc, subj_trunc, mailbox
        );
    }
    println!();
    Ok(())
}

fn print_message(message: &Message) {
    let date = |d: Option<DateTime<Utc>>| {
        d.map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("  {:<12} {}", "Subject:", message.subject);
    println!("  {:<12} {}", "From:", message.sender);
    for recipient in &message.recipients {
        let label = format!("{:?}:", recipient.kind);
        println!("  {:<12} {}", label, recipient.address);
    }
    println!("  {:<12} {}", "Sent:", date(message.date_sent));
    println!("  {:<12} {}", "Received:", date(message.date_received));
    println!("  {:<12} {} ({})", "Mailbox:", message.mailbox_name, message.mailbox_id);
    if let Some(id) = &message.message_id {
        println!("  {:<12} {}", "Message-ID:", id);
    }
    if let Some(attachments) = message.attachments.as_deref().filter(|a| !a.is_empty()) {
        println!("  {:<12} {}", "Attachments:", attachments.len());
        print_attachments_table(attachments);
    }
    println!();
    match &message.body {
        Some(body) => println!("{body}"),
        None => println!("  (body unavailable)"),
    }
}

fn print_attachments_table(attachments: &[Attachment]) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<4} {:<40} {:<28} {:>10}  {}", "#", "Filename", "Type", "Size", "On disk");
    println!("  {}", "-".repeat(94));
    for (i, att) in attachments.iter().enumerate() {
        let name: String = att.filename.chars().take(39).collect();
        let mime: String = att.mime_type.chars().take(27).collect();
        let on_disk = if att.path.is_some() { "yes" } else { "no" };
        println!(
            "  {:<4} {:<40} {:<28} {:>10}  {}",
            i + 1,
            name,
            mime,
            format_size(att.size, BINARY),
            on_disk
        );
    }
    println!();
}

fn print_hits(hits: &[AttachmentHit]) {
    println!();
    println!("  {} result(s)", hits.len());
    println!();
    for hit in hits {
        println!("  [{}] {} :: {}", hit.message_id, hit.subject, hit.filename);
        println!("      {}", hit.snippet);
    }
    if !hits.is_empty() {
        println!();
    }
}
