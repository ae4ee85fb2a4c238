use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};

use mail_triage::auth::{Authenticator, Session, SessionOutcome, client_secret, token_store};
use mail_triage::config::{Config, load_config};
use mail_triage::llm::ChatClient;
use mail_triage::mail::GmailImap;
use mail_triage::mail::decoders::normalize_snippet;
use mail_triage::terminal::run_tui;
use mail_triage::triage::model::Batch;
use mail_triage::triage::pipeline::{Pacing, Pipeline};
use mail_triage::triage::query::{SearchSettings, TimeRange};

type GmailPipeline = Pipeline<GmailImap<Session>, ChatClient>;

#[derive(Parser)]
#[command(name = "mail_triage")]
#[command(about = "Triage unread Gmail with an LLM and draft replies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive triage view (default)
    Tui,

    /// Process one batch and print it
    Process {
        #[command(flatten)]
        search: SearchArgs,

        /// Print the batch as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process a batch and draft a reply to one of its emails
    Draft {
        /// 1-based position in the processed batch
        #[arg(long)]
        index: usize,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Grant mailbox access in the browser
    Auth,

    /// Forget all stored tokens
    Logout,

    /// Copy a client secret JSON from the Google console into the config dir
    ImportCredentials { path: PathBuf },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Recency window: 1d, 2d, 3d or 7d
    #[arg(long, value_parser = parse_range)]
    range: Option<TimeRange>,

    /// Number of emails to process (5-50)
    #[arg(long)]
    max: Option<u32>,

    /// Extra Gmail search terms, e.g. "category:primary"
    #[arg(long)]
    filter: Option<String>,
}

impl SearchArgs {
    fn apply(&self, base: SearchSettings) -> SearchSettings {
        SearchSettings::new(
            self.range.unwrap_or(base.time_range),
            self.max.unwrap_or(base.max_results),
            self.filter.as_deref().unwrap_or(&base.filter),
        )
    }
}

fn parse_range(s: &str) -> std::result::Result<TimeRange, String> {
    TimeRange::parse(s).ok_or_else(|| format!("unknown range `{s}` (use 1d, 2d, 3d or 7d)"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cmd = cli.cmd.unwrap_or(Command::Tui);

    if matches!(cmd, Command::Tui) {
        // log output would corrupt the alternate screen
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
    } else {
        env_logger::init();
    }

    match cmd {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            if secret.is_empty() {
                bail!("no client secret given");
            }
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {client_id}");
            Ok(())
        }

        Command::ImportCredentials { path } => {
            let creds = client_secret::import(&path)?;
            println!(
                "Imported credentials for client_id {} into {}",
                creds.client_id,
                client_secret::secret_file_path()?.display()
            );
            Ok(())
        }

        Command::Auth => {
            let cfg = configuration()?;
            let session = session(&cfg, true)?;
            println!("Authenticated {}", session.user_email());
            Ok(())
        }

        Command::Logout => {
            let cfg = configuration()?;
            Authenticator::from_config(&cfg)?.logout()?;
            println!("Stored tokens removed");
            Ok(())
        }

        Command::Tui => {
            let cfg = configuration()?;
            let pipeline = pipeline(&cfg)?;
            run_tui(&pipeline, cfg.triage.search_settings()).map_err(|e| anyhow!("{e:?}"))
        }

        Command::Process { search, json } => {
            let cfg = configuration()?;
            let settings = search.apply(cfg.triage.search_settings());
            let batch = pipeline(&cfg)?.process(&settings.query(), settings.max_results);
            if json {
                println!("{}", serde_json::to_string_pretty(batch.emails())?);
            } else {
                print_batch(&batch);
            }
            print_failures(&batch);
            match batch.fetch_error {
                Some(e) => Err(anyhow!("Error fetching emails: {e}")),
                None => Ok(()),
            }
        }

        Command::Draft { index, search } => {
            let cfg = configuration()?;
            let settings = search.apply(cfg.triage.search_settings());
            let pipeline = pipeline(&cfg)?;
            let batch = pipeline.process(&settings.query(), settings.max_results);
            print_failures(&batch);

            let email = index
                .checked_sub(1)
                .and_then(|i| batch.emails().get(i))
                .ok_or_else(|| {
                    anyhow!(
                        "no email #{index}; the batch has {} email(s)",
                        batch.emails().len()
                    )
                })?;
            let outcome = pipeline.draft_reply(email);
            if outcome.is_success() {
                println!("{} (reply to \"{}\")", outcome.message(), email.subject);
                Ok(())
            } else {
                Err(anyhow!("{}", outcome.message()))
            }
        }
    }
}

fn configuration() -> Result<Config> {
    load_config().map_err(|e| anyhow!("Configuration error: {e}"))
}

fn session(cfg: &Config, interactive: bool) -> Result<Session> {
    match Authenticator::from_config(cfg)?.obtain_session(interactive)? {
        SessionOutcome::Ready(session) => Ok(session),
        SessionOutcome::NeedsUserAction(action) => Err(anyhow!("{}", action.remediation())),
    }
}

fn pipeline(cfg: &Config) -> Result<GmailPipeline> {
    // fail on a missing API key before touching the mailbox
    let model = ChatClient::from_env(&cfg.llm)?;
    let session = session(cfg, false)?;
    let mailbox = GmailImap::new(
        cfg.imap_server(),
        session.user_email().to_string(),
        cfg.drafts_mailbox(),
        session,
    );
    let pacing = Pacing::new(Duration::from_millis(cfg.triage.pacing_ms));
    Ok(Pipeline::new(mailbox, model).with_pacing(pacing))
}

fn print_batch(batch: &Batch) {
    if batch.is_empty() {
        println!("No emails processed.");
        return;
    }
    for (i, e) in batch.emails().iter().enumerate() {
        println!(
            "{:>3}. [{:<11}] [{}] {}",
            i + 1,
            e.category.as_str(),
            e.urgency,
            e.subject
        );
        println!("     From: {}", e.sender);
        println!("     {}", normalize_snippet(&e.summary, 160));
    }
}

fn print_failures(batch: &Batch) {
    for f in &batch.failures {
        eprintln!("skipped #{} \"{}\": {}", f.position + 1, f.subject, f.error);
    }
}
