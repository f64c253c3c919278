//! Command handlers on top of the session manager.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::warn;

use gymtrack_core::{
    ApiClient, Config, KeyValueStore, SessionError, SessionManager, SessionStatus, User,
};

const SIGN_IN_FAILED: &str = "Could not sign in. Please try again later.";
const SIGN_UP_FAILED: &str = "Could not create the account. Please try again later.";
const LOAD_FAILED: &str = "Could not load exercises. Please try again later.";

pub struct App {
    config: Config,
    api: ApiClient,
    session: SessionManager<Box<dyn KeyValueStore>, ApiClient>,
}

impl App {
    /// Build the session manager and restore the stored session
    pub async fn start(config: Config) -> Result<Self> {
        let api = config.api_client()?;
        let backend = config.credential_backend()?;
        let (session, restored) =
            SessionManager::start(backend, api.clone(), config.sign_in_policy).await;
        if let Err(e) = restored {
            // Still usable, just signed out
            warn!(error = %e, "Could not restore stored session");
            eprintln!("Warning: stored session could not be read ({})", e);
        }
        Ok(Self {
            config,
            api,
            session,
        })
    }

    pub async fn sign_in(&mut self, email: Option<String>) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => Self::prompt_with_default("E-mail", self.config.last_email.as_deref())?,
        };
        let password = rpassword::prompt_password("Password: ")?;
        if email.is_empty() || password.is_empty() {
            return Err(anyhow::anyhow!("E-mail and password required"));
        }

        println!("\nSigning in...");
        self.session
            .sign_in(&email, &password)
            .await
            .map_err(|e| user_facing(e, SIGN_IN_FAILED))?;

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        let name = self
            .session
            .user()
            .map(|u| u.display_name().to_string())
            .unwrap_or_default();
        println!("Signed in as {}", name);
        Ok(())
    }

    pub async fn sign_up(&mut self) -> Result<()> {
        let name = Self::prompt("Name")?;
        let email = Self::prompt("E-mail")?;
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if password != confirm {
            return Err(anyhow::anyhow!("Passwords do not match"));
        }

        self.api
            .sign_up(&name, &email, &password)
            .await
            .map_err(|e| user_facing(e.into(), SIGN_UP_FAILED))?;
        println!("Account created. Signing in...");
        self.session
            .sign_in(&email, &password)
            .await
            .map_err(|e| user_facing(e, SIGN_IN_FAILED))?;
        println!("Signed in as {}", name);
        Ok(())
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        self.session
            .sign_out()
            .await
            .context("Signed out, but the stored session could not be removed")?;
        println!("Signed out");
        Ok(())
    }

    /// Show the signed-in user, refreshed from the server when reachable.
    pub async fn whoami(&self) -> Result<()> {
        let cached = match self.session.user() {
            Some(user) if self.session.snapshot().status() == SessionStatus::SignedIn => user,
            _ => {
                println!("Not signed in");
                return Ok(());
            }
        };

        let user = match self.api.fetch_profile().await {
            Ok(fresh) if fresh != cached => {
                if let Err(e) = self.session.update_user_profile(fresh.clone()).await {
                    warn!(error = %e, "Failed to store refreshed profile");
                }
                fresh
            }
            Ok(_) => cached,
            Err(e) => {
                warn!(error = %e, "Profile refresh failed, showing stored profile");
                cached
            }
        };

        println!("{}", user.display_name());
        println!("  e-mail: {}", user.email);
        if let Some(url) = user.avatar_url(self.api.base_url()) {
            println!("  avatar: {}", url);
        }
        Ok(())
    }

    pub async fn update_profile(&mut self, name: Option<String>, avatar: Option<String>) -> Result<()> {
        let mut user: User = self
            .session
            .user()
            .ok_or_else(|| anyhow::anyhow!("Not signed in"))?;
        if name.is_none() && avatar.is_none() {
            return Err(anyhow::anyhow!("Nothing to update; pass --name and/or --avatar"));
        }
        if let Some(name) = name {
            user.name = name;
        }
        if avatar.is_some() {
            user.avatar = avatar;
        }

        self.session
            .update_user_profile(user)
            .await
            .map_err(|e| user_facing(e, "Could not update the profile."))?;
        println!("Profile updated");
        Ok(())
    }

    pub async fn list_groups(&self) -> Result<()> {
        self.require_session()?;
        let groups = self
            .api
            .fetch_groups()
            .await
            .map_err(|e| user_facing(e.into(), LOAD_FAILED))?;
        for group in groups {
            println!("{}", group);
        }
        Ok(())
    }

    pub async fn list_exercises(&self, group: &str) -> Result<()> {
        self.require_session()?;
        let exercises = self
            .api
            .fetch_exercises_by_group(group)
            .await
            .map_err(|e| user_facing(e.into(), LOAD_FAILED))?;
        if exercises.is_empty() {
            println!("No exercises for {}", group);
        }
        for exercise in exercises {
            println!("{:>4}  {:<30} {}", exercise.id, exercise.name, exercise.summary());
        }
        Ok(())
    }

    pub async fn show_exercise(&self, id: &str) -> Result<()> {
        self.require_session()?;
        let exercise = self
            .api
            .fetch_exercise(id)
            .await
            .map_err(|e| user_facing(e.into(), LOAD_FAILED))?;
        println!("{} ({})", exercise.name, exercise.group);
        println!("  {}", exercise.summary());
        if let Some(url) = exercise.demo_url(self.api.base_url()) {
            println!("  demo: {}", url);
        }
        Ok(())
    }

    fn require_session(&self) -> Result<()> {
        if self.session.is_signed_in() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Not signed in. Run `gymtrack sign-in` first."))
        }
    }

    fn prompt(label: &str) -> Result<String> {
        Self::prompt_with_default(label, None)
    }

    fn prompt_with_default(label: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(default) => print!("{} [{}]: ", label, default),
            None => print!("{}: ", label),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();
        Ok(match default {
            Some(default) if input.is_empty() => default.to_string(),
            _ => input.to_string(),
        })
    }
}

/// Keep the source error in the chain but lead with what the user should see.
fn user_facing(err: SessionError, fallback: &str) -> anyhow::Error {
    let message = err.user_message_or(fallback);
    anyhow::Error::new(err).context(message)
}
