//! Account seeding and token issuance.
//!
//! Account sign-up lives outside MyMind; these commands exist so a fresh
//! install can be populated and tokens handed to clients.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use console::style;

use mymind_types::error::RepositoryError;
use mymind_types::participant::{ParticipantId, Role, UserProfile};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create an account and print its first token.
    Add {
        /// patient, therapist or admin.
        #[arg(long)]
        role: Role,

        #[arg(long)]
        first: String,

        #[arg(long)]
        last: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone: Option<String>,

        /// Profile image URL.
        #[arg(long)]
        img: Option<String>,

        /// Therapists: years in practice.
        #[arg(long)]
        years: Option<u32>,

        /// Therapists: listed price per session, in cents.
        #[arg(long)]
        cost: Option<u32>,
    },

    /// Issue another token for an existing account.
    Token {
        /// Account id (UUID).
        id: String,
    },
}

pub async fn handle_user_command(cmd: UserCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        UserCommand::Add {
            role,
            first,
            last,
            email,
            phone,
            img,
            years,
            cost,
        } => {
            let user = UserProfile {
                id: ParticipantId::new(),
                role,
                first_name: first,
                last_name: last,
                email,
                phone_num: phone,
                profile_img: img,
                years_experience: years,
                session_cost_cents: cost,
                num_sessions: 0,
                used_trial: false,
            };
            add_user(state, user, json).await
        }
        UserCommand::Token { id } => issue_token(state, &id, json).await,
    }
}

async fn add_user(state: &AppState, user: UserProfile, json: bool) -> Result<()> {
    let now = chrono::Utc::now();
    state
        .users
        .create_user(&user, now)
        .await
        .context("failed to create account")?;
    let token = state.tokens.issue(&user.id, now).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "account created");

    if json {
        let out = serde_json::json!({ "id": user.id, "role": user.role, "token": token });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Created {} {}",
        style("✓").green().bold(),
        user.role,
        style(user.full_name()).cyan()
    );
    println!("  Id:    {}", user.id);
    println!("  Token: {}", style(&token).yellow().bold());
    println!("  {}", style("Save the token; it won't be shown again.").dim());
    println!();
    Ok(())
}

async fn issue_token(state: &AppState, id: &str, json: bool) -> Result<()> {
    let user_id: ParticipantId = id.parse().with_context(|| format!("invalid account id '{id}'"))?;
    let token = match state.tokens.issue(&user_id, chrono::Utc::now()).await {
        Ok(token) => token,
        Err(RepositoryError::NotFound) => bail!("no account with id {user_id}"),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "token": token }))?);
    } else {
        println!("{}", token);
    }
    Ok(())
}
