use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

mod config {
    include!("../config.rs");
}

mod store {
    include!("../store.rs");
}

mod user_models {
    include!("../user_models.rs");
}

mod user_storage {
    include!("../user_storage.rs");
}

use user_models::{PlanTier, Role, Subscription, User};
use user_storage::UserStorage;

const SESSION_FILE: &str = ".admin-session";

#[derive(Parser)]
#[command(name = "admin")]
#[command(about = "Local administration for the exam-prep data directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a user account (the very first account becomes admin)")]
    Signup {
        #[arg(short, long, help = "Display name")]
        name: String,

        #[arg(short, long, help = "Email address")]
        email: String,

        #[arg(long, help = "Phone number")]
        phone: Option<String>,

        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log in to your account")]
    Login {
        #[arg(short, long, help = "Email address")]
        email: String,

        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log out of your account")]
    Logout,

    #[command(about = "Show current user")]
    Whoami,

    #[command(about = "List every registered user")]
    ListUsers,

    #[command(about = "Change a user's role")]
    SetRole {
        #[arg(short, long, help = "User ID")]
        user_id: String,

        #[arg(short, long, help = "Role: user or admin")]
        role: String,
    },

    #[command(about = "Change a user's subscription plan")]
    SetPlan {
        #[arg(short, long, help = "User ID")]
        user_id: String,

        #[arg(short, long, help = "Plan: free, pro or ultimate")]
        plan: String,

        #[arg(short, long, help = "Expiry (ISO 8601, e.g. 2026-12-31T00:00:00Z)")]
        expires: Option<String>,
    },

    #[command(about = "Grant extra subscription days")]
    GrantDays {
        #[arg(short, long, help = "User ID")]
        user_id: String,

        #[arg(short, long, help = "Days to add")]
        days: i64,
    },

    #[command(about = "Delete a user account")]
    DeleteUser {
        #[arg(short, long, help = "User ID")]
        user_id: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    user_id: String,
    email: String,
}

impl Session {
    fn save(&self) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(SESSION_FILE, json)?;
        Ok(())
    }

    fn load() -> Option<Self> {
        if Path::new(SESSION_FILE).exists() {
            let data = fs::read_to_string(SESSION_FILE).ok()?;
            serde_json::from_str(&data).ok()
        } else {
            None
        }
    }

    fn clear() -> Result<()> {
        if Path::new(SESSION_FILE).exists() {
            fs::remove_file(SESSION_FILE)?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_command(cli.command).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(command: Commands) -> Result<()> {
    let storage = UserStorage::new(&config::data_dir());

    match command {
        Commands::Signup {
            name,
            email,
            phone,
            password,
        } => {
            signup(&storage, name, email, phone, password).await?;
        }
        Commands::Login { email, password } => {
            login(&storage, email, password).await?;
        }
        Commands::Logout => {
            Session::clear()?;
            println!("✅ Logged out successfully!");
        }
        Commands::Whoami => {
            whoami()?;
        }
        Commands::ListUsers => {
            require_admin(&storage).await?;
            list_users(&storage).await?;
        }
        Commands::SetRole { user_id, role } => {
            require_admin(&storage).await?;
            set_role(&storage, user_id, role).await?;
        }
        Commands::SetPlan {
            user_id,
            plan,
            expires,
        } => {
            require_admin(&storage).await?;
            set_plan(&storage, user_id, plan, expires).await?;
        }
        Commands::GrantDays { user_id, days } => {
            require_admin(&storage).await?;
            grant_days(&storage, user_id, days).await?;
        }
        Commands::DeleteUser { user_id } => {
            require_admin(&storage).await?;
            delete_user(&storage, user_id).await?;
        }
    }

    Ok(())
}

async fn signup(
    storage: &UserStorage,
    name: String,
    email: String,
    phone: Option<String>,
    password: String,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Name cannot be empty");
    }
    if password.len() < 6 {
        bail!("Password must be at least 6 characters long");
    }

    let password_hash =
        bcrypt::hash(&password, bcrypt::DEFAULT_COST).context("Failed to hash password")?;

    let bootstrap_admin = storage.list().await.is_empty();
    let mut user = User::new(name, email.trim().to_lowercase(), phone, password_hash);
    if bootstrap_admin {
        user.role = Role::Admin;
    }

    let user = match storage.create_user(user).await? {
        Ok(user) => user,
        Err(message) => bail!(message),
    };

    println!("✅ Account created successfully!");
    println!("📧 Email: {}", user.email);
    println!("🆔 User ID: {}", user.id);
    if bootstrap_admin {
        println!("👑 First account: granted the admin role");
    }

    Ok(())
}

async fn login(storage: &UserStorage, email: String, password: String) -> Result<()> {
    let user = storage
        .get_by_email(&email)
        .await
        .ok_or_else(|| anyhow::anyhow!("Invalid email or password"))?;

    let valid =
        bcrypt::verify(&password, &user.password_hash).context("Failed to verify password")?;
    if !valid {
        bail!("Invalid email or password");
    }

    let session = Session {
        user_id: user.id.clone(),
        email: user.email.clone(),
    };
    session.save()?;

    println!("✅ Login successful!");
    println!("👤 Welcome back, {}!", user.name);

    Ok(())
}

fn whoami() -> Result<()> {
    match Session::load() {
        Some(session) => {
            println!("👤 Logged in as {} ({})", session.email, session.user_id);
        }
        None => {
            println!("🔒 Not logged in");
        }
    }
    Ok(())
}

async fn require_admin(storage: &UserStorage) -> Result<User> {
    let session = Session::load()
        .ok_or_else(|| anyhow::anyhow!("Not logged in. Use: admin login -e <email> -p <password>"))?;
    let user = storage
        .get(&session.user_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("Session user no longer exists; log in again"))?;
    if user.role != Role::Admin {
        bail!("This command requires the admin role");
    }
    Ok(user)
}

async fn list_users(storage: &UserStorage) -> Result<()> {
    let users = storage.list().await;

    if users.is_empty() {
        println!("📭 No users registered.");
        return Ok(());
    }

    println!("\n👥 Registered Users ({})\n", users.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Email"),
        Cell::new("Name"),
        Cell::new("Role"),
        Cell::new("Plan"),
        Cell::new("Expires"),
    ]));

    for user in users {
        let plan = match user.subscription.plan {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Ultimate => "ultimate",
        };
        let expires = user
            .subscription
            .expires_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let role = match user.role {
            Role::Admin => "admin",
            Role::User => "user",
        };

        table.add_row(Row::new(vec![
            Cell::new(&user.id[..8]),
            Cell::new(&user.email),
            Cell::new(&user.name),
            Cell::new(role),
            Cell::new(plan),
            Cell::new(&expires),
        ]));
    }

    table.printstd();
    println!();

    Ok(())
}

async fn set_role(storage: &UserStorage, user_id: String, role: String) -> Result<()> {
    let role = match role.to_lowercase().as_str() {
        "user" => Role::User,
        "admin" => Role::Admin,
        other => bail!("Unknown role '{}'. Use 'user' or 'admin'", other),
    };

    match storage.set_role(&user_id, role).await? {
        Some(user) => {
            println!("✅ {} is now {:?}", user.email, user.role);
            Ok(())
        }
        None => bail!("User not found: {}", user_id),
    }
}

async fn set_plan(
    storage: &UserStorage,
    user_id: String,
    plan: String,
    expires: Option<String>,
) -> Result<()> {
    let plan = match plan.to_lowercase().as_str() {
        "free" => PlanTier::Free,
        "pro" => PlanTier::Pro,
        "ultimate" => PlanTier::Ultimate,
        other => bail!("Unknown plan '{}'. Use 'free', 'pro' or 'ultimate'", other),
    };
    let expires_at: Option<DateTime<Utc>> = match expires {
        Some(raw) => Some(
            raw.parse()
                .context("Invalid expiry. Use ISO 8601 format (e.g., 2026-12-31T00:00:00Z)")?,
        ),
        None => None,
    };

    let subscription = Subscription { plan, expires_at };
    match storage.set_subscription(&user_id, subscription).await? {
        Some(user) => {
            println!("✅ Subscription updated for {}", user.email);
            Ok(())
        }
        None => bail!("User not found: {}", user_id),
    }
}

async fn grant_days(storage: &UserStorage, user_id: String, days: i64) -> Result<()> {
    if days <= 0 {
        bail!("Days must be positive");
    }

    match storage.extend_subscription(&user_id, days).await? {
        Some(user) => {
            let until = user
                .subscription
                .expires_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("✅ {} now has access until {}", user.email, until);
            Ok(())
        }
        None => bail!("User not found: {}", user_id),
    }
}

async fn delete_user(storage: &UserStorage, user_id: String) -> Result<()> {
    if !storage.delete(&user_id).await? {
        bail!("User not found: {}", user_id);
    }
    println!("✅ User deleted");
    Ok(())
}
