mod export;
mod login;
mod media;
mod records;

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::info;

use tgc_core::{
    batch::{run_batch, split_identifiers},
    config::Config,
    domain::{IdentifierKind, PhotoRef, ResolutionOutcome},
    ports::BatchProgress,
    resolver::Resolver,
    session::Authenticator,
    throttle::ThrottledTransport,
};
use tgc_mtproto::MtprotoTransport;

use crate::{login::Prompter, media::FileMediaStore};

pub(crate) type Auth = Authenticator<ThrottledTransport<MtprotoTransport>>;

#[derive(Parser)]
#[command(name = "tgc")]
#[command(about = "Check whether phone numbers or usernames have Telegram accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save API credentials and sign in
    Login {
        #[arg(long)]
        api_id: Option<i32>,
        #[arg(long)]
        api_hash: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Resolve a list of phone numbers or usernames
    #[command(group(ArgGroup::new("kind").required(true).args(["phones", "usernames"])))]
    Check {
        #[arg(long)]
        phones: bool,
        #[arg(long)]
        usernames: bool,
        /// Comma or newline separated identifiers
        ids: Vec<String>,
        /// Read identifiers from a file as well
        #[arg(long)]
        file: Option<PathBuf>,
        /// Skip downloading profile photos
        #[arg(long)]
        no_photos: bool,
    },
    /// Write a saved result file as an .xlsx spreadsheet
    Export {
        /// Result file to export; defaults to the newest one in the results dir
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Delete stored credentials and the session file
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load()?;
    tgc_core::logging::init("tgc", cfg.log_file.as_deref())?;

    match cli.command {
        Commands::Login {
            api_id,
            api_hash,
            phone,
        } => run_login(&cfg, api_id, api_hash, phone).await,
        Commands::Check {
            phones,
            ids,
            file,
            no_photos,
            ..
        } => {
            let kind = if phones {
                IdentifierKind::Phone
            } else {
                IdentifierKind::Username
            };
            run_check(&cfg, kind, &ids, file.as_deref(), !no_photos).await
        }
        Commands::Export { input, output } => run_export(&cfg, input, &output),
        Commands::Reset => run_reset(&cfg),
    }
}

fn authenticator(cfg: &Config) -> Auth {
    Authenticator::new(ThrottledTransport::new(
        MtprotoTransport::new(cfg.session_file.clone()),
        cfg.request_interval,
    ))
}

async fn run_login(
    cfg: &Config,
    api_id: Option<i32>,
    api_hash: Option<String>,
    phone: Option<String>,
) -> anyhow::Result<()> {
    let mut stored = cfg.stored_credentials()?;
    if api_id.is_some() {
        stored.api_id = api_id;
    }
    if api_hash.is_some() {
        stored.api_hash = api_hash;
    }
    if phone.is_some() {
        stored.phone = phone;
    }

    let mut prompter = Prompter::new();
    login::complete_credentials(&mut stored, &mut prompter).await?;
    cfg.credential_store().save(&stored)?;
    let creds = stored.credentials()?;

    let mut auth = authenticator(cfg);
    auth.connect(&creds).await?;
    let result = if auth.check_authorized().await? {
        println!("Already signed in.");
        Ok(())
    } else {
        login::sign_in(&mut auth, &creds.phone, &mut prompter).await
    };
    if result.is_ok() {
        println!("Signed in. Session saved to {}", cfg.session_file.display());
    }

    auth.disconnect().await;
    result
}

async fn run_check(
    cfg: &Config,
    kind: IdentifierKind,
    args: &[String],
    file: Option<&std::path::Path>,
    download_photos: bool,
) -> anyhow::Result<()> {
    let mut ids: Vec<String> = args.iter().flat_map(|a| split_identifiers(a)).collect();
    if let Some(path) = file {
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        ids.extend(split_identifiers(&txt));
    }
    if ids.is_empty() {
        bail!("nothing to check; pass identifiers or --file");
    }

    let creds = cfg.stored_credentials()?.credentials()?;
    let mut auth = authenticator(cfg);
    auth.connect(&creds).await?;
    if !auth.check_authorized().await? {
        auth.disconnect().await;
        bail!("not authorized, run `tgc login`");
    }

    let outcome = check_authorized(cfg, &auth, kind, &ids, download_photos).await;
    auth.disconnect().await;
    outcome
}

async fn check_authorized(
    cfg: &Config,
    auth: &Auth,
    kind: IdentifierKind,
    ids: &[String],
    download_photos: bool,
) -> anyhow::Result<()> {
    let resolver = Resolver::new(auth);
    let progress = |p: &BatchProgress| eprintln!("[{}/{}] {}", p.index, p.total, p.identifier);

    info!(kind = %kind, count = ids.len(), "checking identifiers");
    let mut results = run_batch(&resolver, ids, kind, &progress).await?;

    if download_photos && cfg.download_photos {
        let store = FileMediaStore::new(cfg.photos_dir.clone());
        for (_, outcome) in results.iter_mut() {
            if let ResolutionOutcome::Found(profile) = outcome {
                if profile.profile_photo_refs.is_empty() {
                    continue;
                }
                let stored = resolver.download_photos(profile, &store).await?;
                profile.profile_photo_refs = stored.into_iter().map(PhotoRef).collect();
            }
        }
    }

    let path = records::write_results(
        &cfg.results_dir,
        ids,
        &results,
        Local::now().naive_local(),
    )?;

    println!("\nResults saved to {}\n", path.display());
    for line in records::summary_lines(&results) {
        println!("{line}");
    }
    println!(
        "\n{} of {} found.",
        results.found_count(),
        results.len()
    );
    Ok(())
}

fn run_export(
    cfg: &Config,
    input: Option<PathBuf>,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    let input = match input {
        Some(path) => path,
        None => export::latest_results_file(&cfg.results_dir)?,
    };
    let results = export::load_results(&input)?;
    export::write_workbook(&results, output)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        rows = results.len(),
        "exported results"
    );
    println!(
        "Exported {} entries from {} to {}",
        results.len(),
        input.display(),
        output.display()
    );
    Ok(())
}

fn run_reset(cfg: &Config) -> anyhow::Result<()> {
    let removed_store = cfg.credential_store().clear()?;
    let removed_session = match std::fs::remove_file(&cfg.session_file) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e).context("removing session file"),
    };

    if removed_store || removed_session {
        println!("Credentials and session cleared.");
    } else {
        println!("Nothing to clear.");
    }
    Ok(())
}
