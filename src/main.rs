//! CLI interface for rust-trip-planner

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_trip_planner::catalog::dedupe_by_key;
use rust_trip_planner::cities::{airport_label, AIRPORT_NOT_FOUND};
use rust_trip_planner::filters::liked_only;
use rust_trip_planner::identity::require_user;
use rust_trip_planner::likes::{like_activity, mark_liked};
use rust_trip_planner::{
    airport_city, closest_city, logging, normalize_city, open_default_store, ActivitySort,
    AmadeusClient, BrowseFilter, BrowseSort, Catalog, Config, IdentityProvider,
    LikedActivityStore, LodgingSort, OfferQuery, OpenAiNarrator, Services, Stage, StaticIdentity,
    TripAdvisorChat, TripDetails, TripError, WizardState,
};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

#[derive(Parser)]
#[command(name = "trip-planner")]
#[command(about = "Plan a trip: flights, places to stay, things to do and an AI itinerary")]
#[command(version)]
pub struct Cli {
    /// Catalog store path (overrides TRIP_CATALOG_PATH)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,
    /// Signed-in user id (overrides TRIP_USER_ID)
    #[arg(long, global = true)]
    pub user: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search flight offers
    SearchFlights {
        /// Origin airport code
        #[arg(short, long)]
        from: String,
        /// Destination airport code
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Resolve an airport code or a misspelled city name
    ResolveCity {
        /// Airport code (e.g. CPT) or city name (e.g. "kapetown")
        input: String,
    },
    /// Browse accommodation in a city
    BrowseLodging {
        /// City name
        city: String,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        min_rating: Option<f64>,
        /// Sort option (priceAsc, priceDesc, ratingDesc)
        #[arg(long)]
        sort: Option<String>,
    },
    /// Browse activities in a city
    BrowseActivities {
        /// City name
        city: String,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        min_rating: Option<f64>,
        /// Sort option (priceAsc, priceDesc, ratingDesc)
        #[arg(long)]
        sort: Option<String>,
        /// Only show activities you have liked
        #[arg(long)]
        liked_only: bool,
    },
    /// Like or unlike an activity
    LikeActivity {
        /// City the activity is in
        city: String,
        /// Activity name
        name: String,
    },
    /// Step through the itinerary wizard interactively
    Plan {
        /// Trip name
        #[arg(short, long)]
        name: String,
        /// Origin airport code
        #[arg(short, long)]
        from: String,
        /// Destination airport code
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date; makes the trip a round trip
        #[arg(short, long)]
        return_date: Option<String>,
    },
    /// Chat with the trip advisor
    Chat,
}

/// One line of input at the wizard prompt
#[derive(Debug, Clone, PartialEq)]
pub enum PlanCommand {
    /// 1-based position in the listed candidates
    Toggle(usize),
    Next,
    Back,
    Sort { location: String, key: String },
    Show,
    Submit,
    Quit,
    Help,
    Unknown(String),
}

pub fn parse_plan_command(line: &str) -> PlanCommand {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return PlanCommand::Show;
    };

    if let Ok(n) = first.parse::<usize>() {
        return if n == 0 {
            PlanCommand::Unknown(line.trim().to_string())
        } else {
            PlanCommand::Toggle(n)
        };
    }

    match first.to_lowercase().as_str() {
        "n" | "next" => PlanCommand::Next,
        "b" | "back" => PlanCommand::Back,
        "s" | "show" => PlanCommand::Show,
        "submit" => PlanCommand::Submit,
        "q" | "quit" | "exit" => PlanCommand::Quit,
        "h" | "help" | "?" => PlanCommand::Help,
        "sort" => match (words.next(), words.next()) {
            (Some(location), Some(key)) => PlanCommand::Sort {
                location: location.to_uppercase(),
                key: key.to_string(),
            },
            _ => PlanCommand::Unknown(line.trim().to_string()),
        },
        _ => PlanCommand::Unknown(line.trim().to_string()),
    }
}

fn browse_filter(
    mut filter: BrowseFilter,
    min_price: Option<f64>,
    max_price: Option<f64>,
    min_rating: Option<f64>,
    sort: Option<String>,
) -> Result<BrowseFilter, TripError> {
    if let Some(min) = min_price {
        filter.min_price = min;
    }
    if let Some(max) = max_price {
        filter.max_price = max;
    }
    filter.min_rating = min_rating;
    filter.sort = sort.as_deref().map(str::parse::<BrowseSort>).transpose()?;
    Ok(filter)
}

fn report(e: &TripError) {
    error!(error = %e, "Action failed");
    eprintln!("{}", e.user_message());
}

/// Selection keys in the order they are listed for the current stage
fn candidate_keys(state: &WizardState) -> Vec<String> {
    match state.stage() {
        Stage::Flights => state
            .flights()
            .iter()
            .chain(state.return_flights())
            .map(|f| f.id.clone())
            .collect(),
        Stage::Accommodations => state
            .arrival_places()
            .iter()
            .flat_map(|place| state.lodging_view(place))
            .map(|l| l.name)
            .collect(),
        Stage::Activities => state
            .arrival_places()
            .iter()
            .flat_map(|place| state.activities_view(place))
            .map(|a| a.name)
            .collect(),
        Stage::Review => Vec::new(),
    }
}

fn print_stage(state: &WizardState) {
    println!(
        "\n== Step {}/{}: {} ==",
        state.stage().index() + 1,
        Stage::ALL.len(),
        state.stage()
    );

    let mut n = 0;
    let mut mark = |selected: bool| {
        n += 1;
        format!("{:>3}. [{}]", n, if selected { "x" } else { " " })
    };

    match state.stage() {
        Stage::Flights => {
            if state.flights().is_empty() {
                println!("No flights found.");
            }
            for flight in state.flights() {
                println!("{} {}", mark(state.selected_flights().contains(&flight.id)), flight.summary());
            }
            if !state.return_flights().is_empty() {
                println!("Return flights:");
                for flight in state.return_flights() {
                    println!("{} {}", mark(state.selected_flights().contains(&flight.id)), flight.summary());
                }
            }
        }
        Stage::Accommodations => {
            for place in state.arrival_places() {
                println!("Accommodations in {} ({}):", airport_city(place), place);
                for stay in state.lodging_view(place) {
                    println!(
                        "{} {} | R{:.2} | rating {:.1}",
                        mark(state.selected_lodging().contains(&stay.name)),
                        stay.name,
                        stay.price,
                        stay.rating
                    );
                }
            }
        }
        Stage::Activities => {
            for place in state.arrival_places() {
                println!("Activities in {} ({}):", airport_city(place), place);
                for activity in state.activities_view(place) {
                    println!(
                        "{} {} | {} | {}",
                        mark(state.selected_activities().contains(&activity.name)),
                        activity.name,
                        activity.category,
                        activity.primary_sub_category()
                    );
                }
            }
        }
        Stage::Review => {
            println!("Trip: {}", state.trip().name);
            println!("Flights:");
            for flight in state.selected_flights() {
                println!("  {}", flight.summary());
            }
            println!("Accommodations:");
            for stay in state.selected_lodging() {
                println!("  {}", stay.name);
            }
            println!("Activities:");
            for activity in state.selected_activities() {
                println!("  {}", activity.name);
            }
        }
    }
}

const PLAN_HELP: &str = "Commands: <number> toggle, n(ext), b(ack), sort <AIRPORT> <key>, show, submit, q(uit)";

async fn run_plan(services: Services, trip: TripDetails) -> Result<()> {
    let mut state = WizardState::new(trip);
    match state.search_flights(&services).await {
        Ok(next) => state = next,
        Err(e) => report(&e),
    }

    println!("{}", PLAN_HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_stage(&state);
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let result = match parse_plan_command(&line) {
            PlanCommand::Toggle(n) => match candidate_keys(&state).get(n - 1) {
                Some(key) => match state.stage() {
                    Stage::Flights => state.toggle_flight(key),
                    Stage::Accommodations => state.toggle_lodging(key),
                    Stage::Activities => state.toggle_activity(key),
                    Stage::Review => continue,
                },
                None => Err(TripError::Validation(format!("No option numbered {}", n))),
            },
            PlanCommand::Next => state.advance(&services).await,
            PlanCommand::Back => state.retreat(),
            PlanCommand::Sort { location, key } => match state.stage() {
                Stage::Accommodations => key
                    .parse::<LodgingSort>()
                    .and_then(|key| state.sort_lodging(&location, key)),
                Stage::Activities => key
                    .parse::<ActivitySort>()
                    .and_then(|key| state.sort_activities(&location, key)),
                _ => Err(TripError::Validation(
                    "Sorting is available for accommodations and activities".to_string(),
                )),
            },
            PlanCommand::Submit => match state.submit(&services).await {
                Ok(record) => {
                    println!("\n{}", record.generated_itinerary);
                    println!("\nItinerary \"{}\" submitted.", record.itinerary_name);
                    break;
                }
                Err(e) => Err(e),
            },
            PlanCommand::Show => continue,
            PlanCommand::Help => {
                println!("{}", PLAN_HELP);
                continue;
            }
            PlanCommand::Quit => break,
            PlanCommand::Unknown(input) => {
                println!("Unknown command: {}. {}", input, PLAN_HELP);
                continue;
            }
        };

        match result {
            Ok(next) => state = next,
            Err(e) => report(&e),
        }
    }

    Ok(())
}

async fn run_chat(narrator: OpenAiNarrator) -> Result<()> {
    let mut chat = TripAdvisorChat::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Ask the trip advisor anything. An empty line or \"exit\" ends the chat.");

    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() || line.eq_ignore_ascii_case("exit") {
            break;
        }
        if let Some(reply) = chat.send(&narrator, line).await {
            println!("advisor> {}", reply);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_stderr_logging()?;

    let mut config = Config::from_env();
    if let Some(path) = cli.catalog {
        config.catalog_path = path;
    }
    if cli.user.is_some() {
        config.user_id = cli.user;
    }
    let identity = StaticIdentity::from_option(config.user_id.clone());

    match cli.command {
        Commands::SearchFlights {
            from,
            to,
            date,
            return_date,
            output,
        } => {
            let client = AmadeusClient::from_config(&config)?;
            println!("Searching for flights...");

            let mut offers = client.search_offers(&OfferQuery::new(&from, &to, &date)).await?;
            if let Some(return_date) = return_date {
                offers.extend(client.search_offers(&OfferQuery::new(&to, &from, &return_date)).await?);
            }

            let json = serde_json::to_string_pretty(&offers)?;
            if let Some(output_file) = output {
                fs::write(&output_file, &json)?;
                println!("Results saved to {}", output_file);
            }

            println!("Found {} flights", offers.len());
            for offer in &offers {
                println!("  [{}] {}", offer.id, offer.summary());
            }
        }
        Commands::ResolveCity { input } => {
            let code = input.trim().to_uppercase();
            let by_code = airport_city(&code);
            if by_code != AIRPORT_NOT_FOUND {
                let label = airport_label(&code).unwrap_or(by_code);
                println!("{} -> {}", input, label);
            } else {
                println!("{} -> {}", input, closest_city(&input));
            }
        }
        Commands::BrowseLodging {
            city,
            min_price,
            max_price,
            min_rating,
            sort,
        } => {
            let filter = browse_filter(BrowseFilter::lodging(), min_price, max_price, min_rating, sort)?;
            let store = open_default_store(&config).await?;
            let resolved = closest_city(&city);
            let stays = dedupe_by_key(store.lodging_by_city(&normalize_city(resolved)).await?);

            let stays = filter.apply(&stays);
            println!("{} places to stay in {}", stays.len(), resolved);
            for stay in &stays {
                println!("  {} | R{:.2} | rating {:.1} | {}", stay.name, stay.price, stay.rating, stay.link);
            }
        }
        Commands::BrowseActivities {
            city,
            min_price,
            max_price,
            min_rating,
            sort,
            liked_only: only_liked,
        } => {
            let filter = browse_filter(BrowseFilter::activities(), min_price, max_price, min_rating, sort)?;
            let store = open_default_store(&config).await?;
            let resolved = closest_city(&city);
            let activities = filter.apply(&dedupe_by_key(
                store.activities_by_city(&normalize_city(resolved)).await?,
            ));

            let liked = match identity.current_user() {
                Some(uid) => mark_liked(&activities, &store.liked_names(&uid).await?),
                None if only_liked => return Err(TripError::Unauthenticated.into()),
                None => vec![false; activities.len()],
            };

            let (activities, liked) = if only_liked {
                let kept = liked_only(&activities, &liked);
                let flags = vec![true; kept.len()];
                (kept, flags)
            } else {
                (activities, liked)
            };

            println!("{} things to do in {}", activities.len(), resolved);
            for (activity, liked) in activities.iter().zip(liked) {
                println!(
                    "  {}{} | {} | R{:.2} | {}",
                    if liked { "* " } else { "" },
                    activity.name,
                    activity.category,
                    activity.price,
                    activity.address
                );
            }
        }
        Commands::LikeActivity { city, name } => {
            require_user(&identity)?;
            let store = open_default_store(&config).await?;
            let activities = store
                .activities_by_city(&normalize_city(closest_city(&city)))
                .await?;
            let activity = activities
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(&name))
                .ok_or_else(|| TripError::UnknownCandidate(format!("activity {}", name)))?;

            if like_activity(&*store, &identity, activity).await? {
                println!("Liked {}", activity.name);
            } else {
                println!("Removed {} from your liked activities", activity.name);
            }
        }
        Commands::Plan {
            name,
            from,
            to,
            date,
            return_date,
        } => {
            let store = open_default_store(&config).await?;
            let services = Services::from_config(&config, store)?;
            let trip = TripDetails {
                name,
                origin: from.to_uppercase(),
                destination: to.to_uppercase(),
                departure_date: date,
                round_trip: return_date.is_some(),
                return_date,
            };
            if let Err(e) = trip.validate() {
                report(&e);
                std::process::exit(1);
            }
            run_plan(services, trip).await?;
        }
        Commands::Chat => {
            run_chat(OpenAiNarrator::from_config(&config)?).await?;
        }
    }

    Ok(())
}
