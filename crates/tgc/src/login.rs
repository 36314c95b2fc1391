use std::io::Write;

use anyhow::{bail, Context};
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use tgc_core::{config::StoredCredentials, errors::Error};

use crate::Auth;

const RESEND: &str = "resend";

/// Line-oriented stdin prompts.
pub struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(stdin()).lines(),
        }
    }

    pub async fn ask(&mut self, label: &str) -> anyhow::Result<String> {
        print!("{label}: ");
        std::io::stdout().flush()?;
        match self.lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => bail!("input closed while waiting for {label}"),
        }
    }

    /// Ask until a non-empty answer is given.
    pub async fn require(&mut self, label: &str) -> anyhow::Result<String> {
        loop {
            let answer = self.ask(label).await?;
            if !answer.is_empty() {
                return Ok(answer);
            }
        }
    }
}

/// Fill in whatever the store and flags left blank.
pub async fn complete_credentials(
    stored: &mut StoredCredentials,
    prompter: &mut Prompter,
) -> anyhow::Result<()> {
    while stored.api_id.map_or(true, |id| id == 0) {
        let raw = prompter.require("API ID").await?;
        match raw.parse::<i32>() {
            Ok(id) => stored.api_id = Some(id),
            Err(_) => eprintln!("API ID must be a number"),
        }
    }
    if stored.api_hash.as_deref().map_or(true, |h| h.trim().is_empty()) {
        stored.api_hash = Some(prompter.require("API hash").await?);
    }
    if stored.phone.as_deref().map_or(true, |p| p.trim().is_empty()) {
        stored.phone = Some(prompter.require("Phone number").await?);
    }
    Ok(())
}

/// Code -> (password) handshake on a connected, unauthorized session.
pub async fn sign_in(auth: &mut Auth, phone: &str, prompter: &mut Prompter) -> anyhow::Result<()> {
    auth.request_code(phone).await?;
    println!("A verification code was sent to {phone}.");

    loop {
        let code = prompter
            .require(&format!("Code (or '{RESEND}')"))
            .await?;
        if code.eq_ignore_ascii_case(RESEND) {
            auth.request_code(phone).await?;
            println!("A new code was sent.");
            continue;
        }

        match auth.submit_code(phone, &code).await {
            Ok(()) => return Ok(()),
            Err(Error::InvalidCode) => eprintln!("Invalid code, try again."),
            Err(Error::TwoFactorRequired) => return submit_password(auth, prompter).await,
            Err(e) => return Err(e).context("sign-in failed"),
        }
    }
}

async fn submit_password(auth: &mut Auth, prompter: &mut Prompter) -> anyhow::Result<()> {
    if let Some(hint) = auth.pending_challenge().and_then(|c| c.hint()) {
        println!("Password hint: {hint}");
    }

    loop {
        let password = prompter.require("Two-factor password").await?;
        match auth.submit_password(&password).await {
            Ok(()) => return Ok(()),
            Err(Error::InvalidPassword) => {
                eprintln!("Wrong password.");
                info!("two-factor password rejected");
            }
            Err(Error::InvalidState(_)) => {
                bail!("the password challenge expired; run `tgc login` again")
            }
            Err(e) => return Err(e).context("password check failed"),
        }
    }
}
