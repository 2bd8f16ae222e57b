//! CLI entry point for `letterbox`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use serde::Serialize;

use letterbox::config::{self, Config};
use letterbox::model::address::EmailAddress;
use letterbox::model::file::FileType;
use letterbox::parser::Parser as MailParser;
use letterbox::{Email, ProcessingMode};

#[derive(Parser)]
#[command(
    name = "letterbox",
    version,
    about = "Decompose MIME email messages into headers, text and files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a message and summarize it
    Parse {
        /// Message file (.eml, or a single mbox-style message)
        file: PathBuf,
        /// Only read the headers
        #[arg(long, conflicts_with = "no_attachments")]
        headers_only: bool,
        /// Decode text but skip every file part
        #[arg(long)]
        no_attachments: bool,
        /// Ignore parts of this content type (repeatable)
        #[arg(long, value_name = "TYPE")]
        skip: Vec<String>,
        /// Write extracted files into this directory
        #[arg(long, value_name = "DIR")]
        save_dir: Option<PathBuf>,
        /// Maximum nested multipart levels
        #[arg(long, value_name = "N")]
        max_depth: Option<usize>,
        /// Print the plain text body after the summary
        #[arg(long)]
        body: bool,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Print the headers of a message
    Headers {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Also save it to the config file
        #[arg(long)]
        write: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// CLI overrides for the `[parser]` and `[output]` config sections.
#[derive(Default)]
struct ParseOptions {
    mode: Option<ProcessingMode>,
    skip: Vec<String>,
    save_dir: Option<PathBuf>,
    max_depth: Option<usize>,
    body: bool,
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Parse {
            file,
            headers_only,
            no_attachments,
            skip,
            save_dir,
            max_depth,
            body,
            json,
        } => {
            let mode = if headers_only {
                Some(ProcessingMode::HeadersOnly)
            } else if no_attachments {
                Some(ProcessingMode::NoAttachments)
            } else {
                None
            };
            let options = ParseOptions {
                mode,
                skip,
                save_dir,
                max_depth,
                body,
                json,
            };
            cmd_parse(&file, &options, &config, cli.verbose > 0)
        }
        Commands::Headers { file, json } => {
            let options = ParseOptions {
                mode: Some(ProcessingMode::HeadersOnly),
                json,
                ..ParseOptions::default()
            };
            cmd_parse(&file, &options, &config, cli.verbose > 0)
        }
        Commands::Config { write } => cmd_config(&config, write),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "letterbox.log");
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

/// Build the parser from config, with command-line flags taking precedence.
fn build_parser(options: &ParseOptions, config: &Config, verbose: bool) -> MailParser {
    let mut parser_config = config.parser.clone();
    if let Some(mode) = options.mode {
        parser_config.mode = mode;
    }
    parser_config
        .skip_content_types
        .extend(options.skip.iter().cloned());
    if let Some(depth) = options.max_depth {
        parser_config.max_depth = depth;
    }
    parser_config.verbose |= verbose;

    let parser = MailParser::from_config(&parser_config);
    match options.save_dir.as_ref().or(config.output.save_dir.as_ref()) {
        Some(dir) => parser.with_save_files_to_directory(dir),
        None => parser,
    }
}

fn cmd_parse(
    path: &Path,
    options: &ParseOptions,
    config: &Config,
    verbose: bool,
) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let file_size = std::fs::metadata(path)?.len();
    let parser = build_parser(options, config, verbose);

    let reader = std::fs::File::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let email = parser
        .parse(std::io::BufReader::new(reader))
        .with_context(|| format!("cannot parse {}", path.display()))?;

    if options.json || config.output.json {
        print_json(path, file_size, &email)?;
    } else {
        print_summary(path, file_size, &email, parser.mode());
        if options.body && !email.text.is_empty() {
            println!();
            println!("{}", email.text);
        }
    }
    Ok(())
}

fn cmd_config(config: &Config, write: bool) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if write {
        let path = config::save_config(config)?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "letterbox", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

#[derive(Serialize)]
struct Report<'a> {
    file: &'a Path,
    size: u64,
    #[serde(flatten)]
    email: &'a Email,
    file_sizes: Vec<usize>,
}

fn print_json(path: &Path, size: u64, email: &Email) -> anyhow::Result<()> {
    let report = Report {
        file: path,
        size,
        email,
        file_sizes: email.files.iter().map(|f| f.data.len()).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_summary(path: &Path, size: u64, email: &Email, mode: ProcessingMode) {
    let headers = &email.headers;

    println!();
    println!("  {:<14} {} ({})", "File", path.display(), format_size(size, BINARY));
    if let Some(date) = headers.date {
        println!("  {:<14} {}", "Date", date.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    print_addresses("From", &headers.from);
    print_addresses("To", &headers.to);
    print_addresses("Cc", &headers.cc);
    if !headers.subject.is_empty() {
        println!("  {:<14} {}", "Subject", headers.subject);
    }
    if !headers.message_id.is_empty() {
        println!("  {:<14} {}", "Message-ID", headers.message_id);
    }
    println!("  {:<14} {}", "Content-Type", headers.content_info.content_type);
    if !headers.extra_headers.is_empty() {
        println!("  {:<14} {}", "Other headers", headers.extra_headers.len());
    }

    if mode == ProcessingMode::HeadersOnly {
        return;
    }

    println!();
    for (label, text) in [
        ("Text", &email.text),
        ("Enriched", &email.enriched_text),
        ("HTML", &email.html),
    ] {
        if !text.is_empty() {
            println!("  {:<14} {} chars", label, text.chars().count());
        }
    }

    println!("  {:<14} {}", "Files", email.files.len());
    for file in &email.files {
        let name = if file.name.is_empty() {
            "(unnamed)"
        } else {
            file.name.as_str()
        };
        let kind = match file.file_type {
            FileType::Inline => "inline",
            FileType::Attachment => "attachment",
        };
        if file.data.is_empty() {
            println!("    - {name} ({}, {kind})", file.content_type());
        } else {
            println!(
                "    - {name} ({}, {kind}, {})",
                file.content_type(),
                format_size(file.data.len(), BINARY)
            );
        }
    }
}

fn print_addresses(label: &str, addresses: &[EmailAddress]) {
    if addresses.is_empty() {
        return;
    }
    let joined: Vec<String> = addresses.iter().map(EmailAddress::display).collect();
    println!("  {:<14} {}", label, joined.join(", "));
}
