use ecoaction::missions::category::style_for;
use ecoaction::missions::dto::MissionCategory;
use ecoaction::missions::services::Unregistered;
use ecoaction::missions::{derived, repo};
use ecoaction::state::AppState;
use ecoaction::users::dto::User;
use ecoaction::users::repo as users_repo;
use ecoaction::Error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "ecoaction=debug,reqwest=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("missions") => {
            let search = args.get(1).map(String::as_str).unwrap_or("");
            let category = args.get(2).map(String::as_str);
            cmd_missions(&state, search, category).await
        }
        Some("mission") => cmd_mission(&state, arg(&args, 1, "mission id")?).await,
        Some("login") => {
            cmd_login(&state, arg(&args, 1, "email")?, arg(&args, 2, "password")?).await
        }
        Some("signup") => {
            cmd_signup(
                &state,
                arg(&args, 1, "name")?,
                arg(&args, 2, "email")?,
                arg(&args, 3, "password")?,
            )
            .await
        }
        Some("logout") => {
            state.auth().logout().await?;
            println!("Logged out.");
            Ok(())
        }
        Some("profile") => cmd_profile(&state).await,
        Some("register") => cmd_register(&state, arg(&args, 1, "mission id")?).await,
        Some("unregister") => cmd_unregister(&state, arg(&args, 1, "registration id")?).await,
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("usage: ecoaction <command> [args]");
    println!();
    println!("  missions [search] [category]   list missions with slots left");
    println!("  mission <id>                   show one mission");
    println!("  login <email> <password>       log in and persist the session");
    println!("  signup <name> <email> <pass>   create an account");
    println!("  logout                         delete the stored session");
    println!("  profile                        show the logged-in user");
    println!("  register <mission-id>          sign up for a mission");
    println!("  unregister <registration-id>   withdraw from a mission");
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing argument: {name}"))
}

async fn require_user(state: &AppState) -> anyhow::Result<User> {
    state
        .auth()
        .restore()
        .await?
        .ok_or_else(|| anyhow::anyhow!("not logged in; run `ecoaction login <email> <password>`"))
}

async fn cmd_missions(state: &AppState, search: &str, category: Option<&str>) -> anyhow::Result<()> {
    let category = category.map(str::parse::<MissionCategory>).transpose()?;
    let missions = repo::list_missions(state.gateway.as_ref(), &state.cache).await?;
    let registrations = repo::list_registrations(state.gateway.as_ref(), &state.cache).await?;

    for mission in derived::filter_missions(&missions, search, category) {
        let slots = derived::slots_left(&mission.id, mission.capacity, &registrations);
        let percent = derived::participation_percent(mission.capacity, slots);
        let style = style_for(mission.category);
        let availability = if slots > 0 {
            format!("{slots} slots left")
        } else {
            "full".to_string()
        };
        println!(
            "{}  [{}] {} - {} ({availability}, {percent}% full)",
            mission.id, style.label, mission.title, mission.location
        );
    }
    Ok(())
}

async fn cmd_mission(state: &AppState, id: &str) -> anyhow::Result<()> {
    let mission = repo::get_mission(state.gateway.as_ref(), &state.cache, id).await?;
    let registrations = repo::list_registrations(state.gateway.as_ref(), &state.cache).await?;
    let slots = derived::slots_left(&mission.id, mission.capacity, &registrations);
    let percent = derived::participation_percent(mission.capacity, slots);

    println!("{} [{}]", mission.title, style_for(mission.category).label);
    println!("{}", mission.location);
    println!("{}", mission.date);
    println!();
    println!("{}", mission.description);
    println!();
    if slots > 0 {
        println!("{slots}/{} slots left, {percent}% full", mission.capacity);
    } else {
        println!("full ({percent}%), registration closed");
    }
    Ok(())
}

async fn cmd_login(state: &AppState, email: &str, password: &str) -> anyhow::Result<()> {
    match state.auth().login(email, password).await? {
        Some(user) => println!("Welcome back, {}.", user.name),
        None => println!("Invalid credentials."),
    }
    Ok(())
}

async fn cmd_signup(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    match state.auth().register(name, email, password).await {
        Ok(user) => {
            println!("Account created for {}.", user.email);
            Ok(())
        }
        Err(Error::Conflict(msg)) | Err(Error::Validation(msg)) => {
            println!("{msg}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_profile(state: &AppState) -> anyhow::Result<()> {
    let stored = require_user(state).await?;
    // Prefer fresh stats; fall back to the stored session when offline.
    let user = users_repo::get_user(state.gateway.as_ref(), &stored.id)
        .await
        .map(User::without_password)
        .unwrap_or(stored);
    let registrations = repo::list_registrations(state.gateway.as_ref(), &state.cache).await?;
    let mine = registrations
        .iter()
        .filter(|r| r.user_id == user.id)
        .count();

    println!("{} <{}>", user.name, user.email);
    println!("completed missions: {}", user.stats.completed_missions);
    println!("current registrations: {mine}");
    Ok(())
}

async fn cmd_register(state: &AppState, mission_id: &str) -> anyhow::Result<()> {
    let user = require_user(state).await?;
    let sync = state.registration_sync();
    match sync.register(&user.id, mission_id).await {
        Ok(created) => {
            println!("Registered (id {}).", created.id);
            Ok(())
        }
        Err(Error::Conflict(msg)) => {
            println!("{msg}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_unregister(state: &AppState, registration_id: &str) -> anyhow::Result<()> {
    let sync = state.registration_sync();
    match sync.unregister(registration_id).await? {
        Unregistered::Removed => println!("Unregistered."),
        Unregistered::AlreadyAbsent => println!("No such registration; nothing to do."),
    }
    Ok(())
}
