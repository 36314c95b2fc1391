use tracing::{debug, info, warn};

use crate::{
    domain::Credentials,
    errors::Error,
    ports::{DirectoryTransport, SignIn},
    validation::validate_phone,
    Result,
};

/// Observable authorization state (no handshake payloads).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connected,
    /// A code was sent; `awaiting_password` once the second factor was demanded.
    CodeRequested { awaiting_password: bool },
    Authorized,
}

enum SessionState<C, P> {
    Disconnected,
    Connected,
    CodeRequested {
        phone: String,
        token: C,
        challenge: Option<P>,
    },
    Authorized,
}

impl<C, P> SessionState<C, P> {
    fn status(&self) -> SessionStatus {
        match self {
            SessionState::Disconnected => SessionStatus::Disconnected,
            SessionState::Connected => SessionStatus::Connected,
            SessionState::CodeRequested { challenge, .. } => SessionStatus::CodeRequested {
                awaiting_password: challenge.is_some(),
            },
            SessionState::Authorized => SessionStatus::Authorized,
        }
    }
}

/// Owns the transport connection and drives the
/// credential -> code -> (password) handshake.
///
/// There is exactly one of these per process; the resolver and batch driver
/// borrow it instead of reaching for global state.
pub struct Authenticator<T: DirectoryTransport> {
    transport: T,
    state: SessionState<T::CodeToken, T::PasswordChallenge>,
}

impl<T: DirectoryTransport> Authenticator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    /// The second-factor challenge, while one is pending.
    pub fn pending_challenge(&self) -> Option<&T::PasswordChallenge> {
        match &self.state {
            SessionState::CodeRequested { challenge, .. } => challenge.as_ref(),
            _ => None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self.state, SessionState::Authorized)
    }

    pub fn ensure_authorized(&self) -> Result<()> {
        if self.is_authorized() {
            return Ok(());
        }
        Err(Error::NotAuthorized(format!(
            "session is {:?}, sign in first",
            self.status()
        )))
    }

    /// Disconnected -> Connected. No-op in any other state.
    pub async fn connect(&mut self, credentials: &Credentials) -> Result<()> {
        if !matches!(self.state, SessionState::Disconnected) {
            debug!("connect: already connected");
            return Ok(());
        }
        if credentials.api_id == 0 || credentials.api_hash.trim().is_empty() {
            return Err(Error::NotConfigured(
                "api_id and api_hash are required".to_string(),
            ));
        }

        self.transport.connect(credentials).await?;
        self.state = SessionState::Connected;
        info!(api_id = credentials.api_id, "connected");
        Ok(())
    }

    /// Ask the directory whether the stored session is already valid.
    ///
    /// Moves to Authorized when it is; otherwise the state is unchanged.
    pub async fn check_authorized(&mut self) -> Result<bool> {
        match self.state {
            SessionState::Disconnected => {
                return Err(Error::InvalidState("not connected".to_string()));
            }
            SessionState::Authorized => return Ok(true),
            _ => {}
        }

        let authorized = self.transport.is_authorized().await?;
        if authorized {
            self.state = SessionState::Authorized;
            info!("existing session is authorized");
        }
        Ok(authorized)
    }

    /// Connected | CodeRequested -> CodeRequested.
    ///
    /// Each call replaces the previous handshake token.
    pub async fn request_code(&mut self, phone: &str) -> Result<()> {
        match self.state {
            SessionState::Disconnected => {
                return Err(Error::InvalidState("not connected".to_string()));
            }
            SessionState::Authorized => {
                return Err(Error::InvalidState("already authorized".to_string()));
            }
            _ => {}
        }

        let phone = validate_phone(phone)?;
        let token = self.transport.send_code(phone.as_str()).await?;
        self.state = SessionState::CodeRequested {
            phone: phone.as_str().to_string(),
            token,
            challenge: None,
        };
        info!("verification code requested");
        Ok(())
    }

    /// CodeRequested -> Authorized.
    ///
    /// `InvalidCode` and transport failures leave the state unchanged.
    /// `TwoFactorRequired` keeps the state but from then on only
    /// [`Authenticator::submit_password`] is accepted.
    pub async fn submit_code(&mut self, phone: &str, code: &str) -> Result<()> {
        let SessionState::CodeRequested {
            phone: requested_for,
            token,
            challenge,
        } = &mut self.state
        else {
            return Err(Error::InvalidState(
                "no verification code was requested".to_string(),
            ));
        };
        if challenge.is_some() {
            return Err(Error::InvalidState(
                "two-factor password pending; submit the password".to_string(),
            ));
        }

        let phone = validate_phone(phone)?;
        if phone.as_str() != requested_for.as_str() {
            return Err(Error::InvalidState(
                "code was requested for a different phone".to_string(),
            ));
        }

        let code = code.trim();
        if code.is_empty() {
            return Err(Error::InvalidCode);
        }

        let outcome = self.transport.sign_in(token, phone.as_str(), code).await?;
        match outcome {
            SignIn::Authorized => {
                self.state = SessionState::Authorized;
                info!("signed in");
                Ok(())
            }
            SignIn::PasswordRequired(p) => {
                *challenge = Some(p);
                info!("second factor required");
                Err(Error::TwoFactorRequired)
            }
        }
    }

    /// CodeRequested (after `TwoFactorRequired`) -> Authorized.
    pub async fn submit_password(&mut self, password: &str) -> Result<()> {
        let SessionState::CodeRequested {
            challenge: Some(challenge),
            ..
        } = &self.state
        else {
            return Err(Error::InvalidState(
                "no two-factor challenge is pending".to_string(),
            ));
        };

        self.transport.check_password(challenge, password).await?;
        self.state = SessionState::Authorized;
        info!("signed in with second factor");
        Ok(())
    }

    /// Any -> Disconnected. Drops any handshake token.
    pub async fn disconnect(&mut self) {
        let prev = std::mem::replace(&mut self.state, SessionState::Disconnected);
        if matches!(prev, SessionState::Disconnected) {
            return;
        }
        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "disconnect failed; dropping session state anyway");
        }
        info!("disconnected");
    }
}
