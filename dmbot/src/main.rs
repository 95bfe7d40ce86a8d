//! AI Dungeon Master terminal game.
//!
//! A line-oriented interface for playing a text adventure run by a local
//! model. Pick a campaign and a character, then type actions; commands start
//! with `#`:
//!
//! ```bash
//! cargo run -p dmbot -- --campaign sunken_crypt --character wilhelmina
//! ```

use dm_core::persist::SaveInfo;
use dm_core::{
    list_saves, validate_campaign, CampaignStore, CharacterStore, DmAgent, DmConfig,
    GameDependencies, PlayerStats, SavedSession, TranscriptMessage, WorldState,
};
use ollama::Ollama;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default)]
struct Args {
    campaign: Option<String>,
    character: Option<String>,
    campaigns_dir: Option<PathBuf>,
    characters_dir: Option<PathBuf>,
    saves_dir: Option<PathBuf>,
    model: Option<String>,
    load: Option<PathBuf>,
    help: bool,
}

fn parse_args(argv: &[String]) -> Args {
    let mut args = Args::default();
    let mut it = argv.iter().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--campaign" => args.campaign = it.next().cloned(),
            "--character" => args.character = it.next().cloned(),
            "--campaigns-dir" => args.campaigns_dir = it.next().map(PathBuf::from),
            "--characters-dir" => args.characters_dir = it.next().map(PathBuf::from),
            "--saves-dir" => args.saves_dir = it.next().map(PathBuf::from),
            "--model" => args.model = it.next().cloned(),
            "--load" => args.load = it.next().map(PathBuf::from),
            "--help" | "-h" => args.help = true,
            _ => {}
        }
    }
    args
}

fn print_help() {
    println!("dmbot - AI Dungeon Master text adventure");
    println!();
    println!("USAGE:");
    println!("  dmbot [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  --campaign <NAME>       Campaign to play (skips the menu)");
    println!("  --character <NAME>      Character sheet to play (skips the menu)");
    println!("  --campaigns-dir <DIR>   Campaign YAML directory (default: campaigns)");
    println!("  --characters-dir <DIR>  Character YAML directory (default: characters)");
    println!("  --saves-dir <DIR>       Save directory (default: saves)");
    println!("  --model <NAME>          Ollama model to use");
    println!("  --load <PATH>           Resume from a save file");
    println!("  -h, --help              Show this help");
    println!();
    println!("IN-GAME COMMANDS:");
    println!("  #save [name]  - Save the session (named saves get their own file)");
    println!("  #status       - Show character status");
    println!("  #help         - Show in-game help");
    println!("  #quit         - Save and exit");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = parse_args(&std::env::args().collect::<Vec<_>>());
    if args.help {
        print_help();
        return Ok(());
    }

    let campaigns_dir = args
        .campaigns_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("campaigns"));
    let characters_dir = args
        .characters_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("characters"));
    let saves_dir = args
        .saves_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("saves"));

    let mut client = Ollama::from_env();
    if let Some(ref model) = args.model {
        client = client.with_model(model);
    }
    info!(model = client.model(), "using model");
    let agent = DmAgent::new(client).with_config(DmConfig::default());

    let campaign_store = CampaignStore::new(&campaigns_dir);
    let character_store = CharacterStore::new(&characters_dir);

    // Either resume a save or assemble a fresh game. Flags skip the menu.
    let choice = if let Some(path) = args.load.clone() {
        MenuChoice::Resume(path)
    } else if args.campaign.is_some() || args.character.is_some() {
        MenuChoice::New
    } else {
        main_menu(&saves_dir).await?
    };
    let (mut deps, mut transcript, campaign_name) = match choice {
        MenuChoice::New => new_session(&args, &campaign_store, &character_store).await?,
        MenuChoice::Resume(path) => resume_session(&path, &campaign_store).await?,
        MenuChoice::Quit => {
            println!("Farewell, adventurer.");
            return Ok(());
        }
    };

    println!();
    println!("=== {} ===", deps.player_stats.name);
    if let Some(ref name) = campaign_name {
        println!("Campaign: {name}");
    }
    println!(
        "HP: {}/{}  Location: {}",
        deps.player_stats.health, deps.player_stats.max_health, deps.world_state.location
    );
    println!();
    println!("Type your actions; #help for commands.");
    println!();

    if transcript.is_empty() {
        if let Some(ref data) = deps.campaign_data {
            if let Some(ref opening) = data.opening_narrative {
                println!("{opening}");
                println!();
                transcript.push(TranscriptMessage::assistant(opening.clone()));
            }
        }
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            prompt()?;
            continue;
        }

        if let Some(command) = input.strip_prefix('#') {
            match command.split_whitespace().next() {
                Some("quit") | Some("exit") => {
                    save_session(&saves_dir, None, &deps, &campaign_name, &transcript).await?;
                    println!("Saved. Farewell, adventurer.");
                    break;
                }
                Some("save") => {
                    let name = command.split_whitespace().nth(1);
                    let path =
                        save_session(&saves_dir, name, &deps, &campaign_name, &transcript)
                            .await?;
                    println!("[SAVED] {}", path.display());
                }
                Some("status") => {
                    println!(
                        "[STATUS] {} - HP {}/{} - {}",
                        deps.player_stats.name,
                        deps.player_stats.health,
                        deps.player_stats.max_health,
                        deps.world_state.location
                    );
                    if deps.player_stats.inventory.is_empty() {
                        println!("  Inventory: empty");
                    } else {
                        println!("  Inventory: {}", deps.player_stats.inventory.join(", "));
                    }
                }
                Some("help") => {
                    println!("[HELP] #save [name], #status, #quit");
                }
                _ => println!("[ERROR] Unknown command; try #help"),
            }
            prompt()?;
            continue;
        }

        match agent.run_turn(input, &transcript, &mut deps).await {
            Ok(result) => {
                println!();
                println!("{}", result.output.narrative);
                for roll in &result.output.dice_rolls {
                    println!(
                        "  [{}d{}: {:?} = {}]",
                        roll.count, roll.sides, roll.individual_rolls, roll.total
                    );
                }
                println!();
                // Retry artifacts are interaction-local; the baseline for the
                // next turn must not contain them.
                transcript = dm_core::strip_retry_prompts(&result.messages);

                if deps.player_stats.health == 0 {
                    println!("You have fallen. The adventure ends here.");
                    break;
                }
            }
            Err(e) => {
                eprintln!("[ERROR] The DM stumbled: {e}");
            }
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

#[derive(Debug)]
enum MenuChoice {
    New,
    Resume(PathBuf),
    Quit,
}

/// Main menu. Skipped entirely when there is nothing to resume.
async fn main_menu(saves_dir: &PathBuf) -> Result<MenuChoice, Box<dyn std::error::Error>> {
    let saves = list_saves(saves_dir).await?;
    if saves.is_empty() {
        return Ok(MenuChoice::New);
    }

    println!("1. Start new game");
    println!("2. Resume saved game");
    println!("3. Quit");
    loop {
        prompt()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(MenuChoice::Quit);
        }
        match line.trim() {
            "1" | "" => return Ok(MenuChoice::New),
            "2" => {
                println!("Saved games:");
                for (i, save) in saves.iter().enumerate() {
                    println!("  {}. {}", i + 1, format_save_entry(save));
                }
                prompt()?;
                let mut pick = String::new();
                io::stdin().read_line(&mut pick)?;
                match pick.trim().parse::<usize>() {
                    Ok(n) if n >= 1 && n <= saves.len() => {
                        return Ok(MenuChoice::Resume(PathBuf::from(&saves[n - 1].path)));
                    }
                    _ => println!("No such save."),
                }
            }
            "3" => return Ok(MenuChoice::Quit),
            _ => println!("Enter 1, 2, or 3."),
        }
    }
}

/// One line of the resume menu.
fn format_save_entry(save: &SaveInfo) -> String {
    let meta = &save.metadata;
    let campaign = meta.campaign_name.as_deref().unwrap_or("freeform");
    format!(
        "{} - HP {} - {} - {}",
        meta.character_name, meta.health, meta.location, campaign
    )
}

/// Build a fresh game from menus or flags.
async fn new_session(
    args: &Args,
    campaign_store: &CampaignStore,
    character_store: &CharacterStore,
) -> Result<
    (GameDependencies, Vec<TranscriptMessage>, Option<String>),
    Box<dyn std::error::Error>,
> {
    let player_stats = match pick(
        "character",
        args.character.clone(),
        character_store.list_characters().await?,
    )? {
        Some(name) => character_store.load(&name).await?.to_player_stats(),
        None => PlayerStats::new("Adventurer"),
    };

    let campaign = match pick(
        "campaign",
        args.campaign.clone(),
        campaign_store.list_campaigns().await?,
    )? {
        Some(name) => Some(campaign_store.load(&name).await?),
        None => None,
    };

    match campaign {
        Some(data) => {
            let report = validate_campaign(&data);
            if report.errors().next().is_some() {
                eprintln!("Campaign '{}' has authoring errors:", data.name);
                for violation in report.errors() {
                    eprintln!("  - {violation}");
                }
                return Err("campaign failed validation".into());
            }
            for warning in report.warnings() {
                info!(%warning, "campaign reachability note");
            }

            let state = data.initial_state();
            let location = data
                .room(&data.starting_room)
                .map(|r| r.name.clone())
                .unwrap_or_else(|_| data.starting_room.clone());
            let name = data.name.clone();
            Ok((
                GameDependencies::with_campaign(
                    player_stats,
                    WorldState::new(location),
                    data,
                    state,
                ),
                Vec::new(),
                Some(name),
            ))
        }
        None => Ok((
            GameDependencies::freeform(player_stats, WorldState::new("a quiet crossroads inn")),
            Vec::new(),
            None,
        )),
    }
}

/// Resume a saved session, reloading campaign content by name.
async fn resume_session(
    path: &PathBuf,
    campaign_store: &CampaignStore,
) -> Result<
    (GameDependencies, Vec<TranscriptMessage>, Option<String>),
    Box<dyn std::error::Error>,
> {
    let saved = SavedSession::load_json(path).await?;
    println!(
        "Resuming {} ({} messages)",
        saved.player.name,
        saved.transcript.len()
    );

    let campaign_data = match &saved.campaign_name {
        Some(name) => {
            let names = campaign_store.list_campaigns().await?;
            let stem = names
                .iter()
                .find(|n| {
                    campaign_loaded_name_matches(n, name, campaign_store).unwrap_or(false)
                })
                .cloned();
            match stem {
                Some(stem) => Some(campaign_store.load(&stem).await?),
                None => {
                    eprintln!("Campaign '{name}' not found; continuing freeform.");
                    None
                }
            }
        }
        None => None,
    };

    let deps = match (campaign_data, saved.campaign_state) {
        (Some(data), Some(state)) => {
            GameDependencies::with_campaign(saved.player, saved.world, data, state)
        }
        _ => GameDependencies::freeform(saved.player, saved.world),
    };

    Ok((deps, saved.transcript, saved.campaign_name))
}

// Matching by display name requires loading each file; campaign lists are
// small so this is fine.
fn campaign_loaded_name_matches(
    stem: &str,
    wanted: &str,
    store: &CampaignStore,
) -> Result<bool, Box<dyn std::error::Error>> {
    let path = store.directory().join(format!("{stem}.yaml"));
    let text = std::fs::read_to_string(path)?;
    let data = dm_core::CampaignData::from_yaml(&text)?;
    Ok(data.name == wanted)
}

/// Save the session, to a named file when `name` is given and to the
/// character's auto-save slot otherwise.
async fn save_session(
    saves_dir: &PathBuf,
    name: Option<&str>,
    deps: &GameDependencies,
    campaign_name: &Option<String>,
    transcript: &[TranscriptMessage],
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(saves_dir).await?;
    let path = match name {
        Some(name) => dm_core::persist::manual_save_path(saves_dir, name),
        None => dm_core::persist::auto_save_path(saves_dir, &deps.player_stats.name),
    };
    let session = SavedSession::new(
        deps.player_stats.clone(),
        deps.world_state.clone(),
        campaign_name.clone(),
        deps.campaign_state.clone(),
        transcript,
    );
    session.save_json(&path).await?;
    info!(path = %path.display(), "session saved");
    Ok(path)
}

/// Resolve a selection from a flag or an interactive numbered menu.
///
/// Returns `None` when there is nothing to pick from or the player skips.
fn pick(
    what: &str,
    flag: Option<String>,
    options: Vec<String>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    if let Some(name) = flag {
        if options.contains(&name) {
            return Ok(Some(name));
        }
        return Err(format!("unknown {what} '{name}'; available: {options:?}").into());
    }
    if options.is_empty() {
        return Ok(None);
    }

    println!("Choose a {what} (enter for none):");
    for (i, name) in options.iter().enumerate() {
        println!("  {}. {name}", i + 1);
    }
    prompt()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let choice = line.trim();
    if choice.is_empty() {
        return Ok(None);
    }
    match choice.parse::<usize>() {
        Ok(n) if n >= 1 && n <= options.len() => Ok(Some(options[n - 1].clone())),
        _ => {
            println!("No such option; continuing without a {what}.");
            Ok(None)
        }
    }
}
