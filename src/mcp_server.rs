// src/mcp_server.rs

use anyhow::Result;
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use rust_trip_planner::cities::{airport_label, AIRPORT_NOT_FOUND};
use rust_trip_planner::{
    airport_city, closest_city, logging, open_default_store, ActivitySort, Config, FlightOffer,
    IdentityProvider, LodgingSort, Services, TripDetails, TripError, WizardState,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Itinerary wizard MCP server. Holds one planning session at a time.
#[derive(Clone)]
pub struct TripPlannerServer {
    services: Services,
    session: Arc<Mutex<Option<WizardState>>>,
}

impl TripPlannerServer {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            session: Arc::new(Mutex::new(None)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct StartTripParams {
    #[schemars(description = "Name for this itinerary")]
    pub name: String,
    #[schemars(description = "Origin airport code (e.g., JNB)")]
    pub origin: String,
    #[schemars(description = "Destination airport code (e.g., CPT)")]
    pub destination: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format")]
    pub departure_date: String,
    #[schemars(description = "Return date in YYYY-MM-DD format; makes the trip a round trip")]
    pub return_date: Option<String>,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct FlightParams {
    #[schemars(description = "Flight offer id as listed by show_state")]
    pub id: String,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct NameParams {
    #[schemars(description = "Exact name of the accommodation or activity")]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct SortParams {
    #[schemars(description = "Arrival airport code the list belongs to (e.g., CPT)")]
    pub location: String,
    #[schemars(description = "Sort key. Accommodations: price, rating, name. Activities: sub_category, category, name")]
    pub key: String,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct ResolveCityParams {
    #[schemars(description = "Airport code or (possibly misspelled) city name")]
    pub input: String,
}

fn error_json(action: &str, e: &TripError) -> String {
    error!(action, error = %e, "Tool call failed");
    json!({
        "error": e.user_message(),
        "kind": format!("{:?}", e.kind()),
    })
    .to_string()
}

fn no_session() -> String {
    warn!("Tool called without an active trip");
    json!({"error": "No trip in progress. Call start_trip first."}).to_string()
}

/// What an agent needs to see of the session: stage, candidates in display
/// order and current selections
fn state_view(state: &WizardState) -> Value {
    let flights = |offers: &[FlightOffer]| -> Vec<Value> {
        offers
            .iter()
            .map(|f| {
                json!({
                    "id": f.id,
                    "summary": f.summary(),
                    "selected": state.selected_flights().contains(&f.id),
                })
            })
            .collect()
    };

    let lodging: Vec<Value> = state
        .arrival_places()
        .iter()
        .filter(|place| state.lodging().iter().any(|l| &l.code == *place))
        .map(|place| {
            let items: Vec<Value> = state
                .lodging_view(place)
                .iter()
                .map(|l| {
                    json!({
                        "name": l.name,
                        "price": l.price,
                        "rating": l.rating,
                        "link": l.link,
                        "selected": state.selected_lodging().contains(&l.name),
                    })
                })
                .collect();
            json!({"location": place, "city": airport_city(place), "items": items})
        })
        .collect();

    let activities: Vec<Value> = state
        .arrival_places()
        .iter()
        .filter(|place| state.activities().iter().any(|a| &a.code == *place))
        .map(|place| {
            let items: Vec<Value> = state
                .activities_view(place)
                .iter()
                .map(|a| {
                    json!({
                        "name": a.name,
                        "category": a.category,
                        "sub_category": a.primary_sub_category(),
                        "price": a.price,
                        "selected": state.selected_activities().contains(&a.name),
                    })
                })
                .collect();
            json!({"location": place, "city": airport_city(place), "items": items})
        })
        .collect();

    json!({
        "stage": state.stage().to_string(),
        "step": state.stage().index() + 1,
        "trip": state.trip(),
        "flights": flights(state.flights()),
        "return_flights": flights(state.return_flights()),
        "arrival_places": state.arrival_places(),
        "accommodations": lodging,
        "activities": activities,
        "selected": {
            "flights": state.selected_flights().keys().collect::<Vec<_>>(),
            "accommodations": state.selected_lodging().keys().collect::<Vec<_>>(),
            "activities": state.selected_activities().keys().collect::<Vec<_>>(),
        },
    })
}

/// Store the new state on success; on failure the session keeps its
/// previous state so the call can be retried
fn commit(session: &mut Option<WizardState>, action: &str, result: Result<WizardState, TripError>) -> String {
    match result {
        Ok(next) => {
            info!(action, stage = %next.stage(), "Session updated");
            let view = state_view(&next).to_string();
            *session = Some(next);
            view
        }
        Err(e) => error_json(action, &e),
    }
}

#[tool(tool_box)]
impl TripPlannerServer {
    #[tool(description = "Start a new trip plan and search outbound (and, with a return date, return) flight offers. Replaces any trip in progress.")]
    async fn start_trip(&self, #[tool(aggr)] params: StartTripParams) -> String {
        info!(
            name = params.name,
            origin = params.origin,
            destination = params.destination,
            departure_date = params.departure_date,
            return_date = params.return_date.as_deref(),
            "Start trip request received"
        );

        let trip = TripDetails {
            name: params.name,
            origin: params.origin.trim().to_uppercase(),
            destination: params.destination.trim().to_uppercase(),
            departure_date: params.departure_date,
            round_trip: params.return_date.is_some(),
            return_date: params.return_date,
        };
        if let Err(e) = trip.validate() {
            return error_json("start_trip", &e);
        }

        let mut session = self.session.lock().await;
        let result = WizardState::new(trip).search_flights(&self.services).await;
        commit(&mut session, "start_trip", result)
    }

    #[tool(description = "Search flight offers again for the current trip")]
    async fn search_flights(&self) -> String {
        let mut session = self.session.lock().await;
        let result = match session.as_ref() {
            Some(state) => state.search_flights(&self.services).await,
            None => return no_session(),
        };
        commit(&mut session, "search_flights", result)
    }

    #[tool(description = "Select a flight offer, or deselect it if already selected")]
    async fn toggle_flight(&self, #[tool(aggr)] params: FlightParams) -> String {
        let mut session = self.session.lock().await;
        let result = match session.as_ref() {
            Some(state) => state.toggle_flight(&params.id),
            None => return no_session(),
        };
        commit(&mut session, "toggle_flight", result)
    }

    #[tool(description = "Select an accommodation by name, or deselect it if already selected")]
    async fn toggle_lodging(&self, #[tool(aggr)] params: NameParams) -> String {
        let mut session = self.session.lock().await;
        let result = match session.as_ref() {
            Some(state) => state.toggle_lodging(&params.name),
            None => return no_session(),
        };
        commit(&mut session, "toggle_lodging", result)
    }

    #[tool(description = "Select an activity by name, or deselect it if already selected")]
    async fn toggle_activity(&self, #[tool(aggr)] params: NameParams) -> String {
        let mut session = self.session.lock().await;
        let result = match session.as_ref() {
            Some(state) => state.toggle_activity(&params.name),
            None => return no_session(),
        };
        commit(&mut session, "toggle_activity", result)
    }

    #[tool(description = "Sort the accommodations listed for one arrival airport: price (cheapest first), rating (best first) or name")]
    async fn sort_lodging(&self, #[tool(aggr)] params: SortParams) -> String {
        let key = match params.key.parse::<LodgingSort>() {
            Ok(key) => key,
            Err(e) => return error_json("sort_lodging", &e),
        };
        let mut session = self.session.lock().await;
        let result = match session.as_ref() {
            Some(state) => state.sort_lodging(&params.location.to_uppercase(), key),
            None => return no_session(),
        };
        commit(&mut session, "sort_lodging", result)
    }

    #[tool(description = "Sort the activities listed for one arrival airport: sub_category, category or name")]
    async fn sort_activities(&self, #[tool(aggr)] params: SortParams) -> String {
        let key = match params.key.parse::<ActivitySort>() {
            Ok(key) => key,
            Err(e) => return error_json("sort_activities", &e),
        };
        let mut session = self.session.lock().await;
        let result = match session.as_ref() {
            Some(state) => state.sort_activities(&params.location.to_uppercase(), key),
            None => return no_session(),
        };
        commit(&mut session, "sort_activities", result)
    }

    #[tool(description = "Move to the next stage (Flights -> Accommodations -> Activities -> Review), fetching its options")]
    async fn next_stage(&self) -> String {
        let mut session = self.session.lock().await;
        let result = match session.as_ref() {
            Some(state) => state.advance(&self.services).await,
            None => return no_session(),
        };
        commit(&mut session, "next_stage", result)
    }

    #[tool(description = "Go back one stage, keeping everything already fetched and selected")]
    async fn previous_stage(&self) -> String {
        let mut session = self.session.lock().await;
        let result = match session.as_ref() {
            Some(state) => state.retreat(),
            None => return no_session(),
        };
        commit(&mut session, "previous_stage", result)
    }

    #[tool(description = "Show the current stage, the options for it and what is selected")]
    async fn show_state(&self) -> String {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(state) => state_view(state).to_string(),
            None => no_session(),
        }
    }

    #[tool(description = "From the Review stage, generate the day-by-day itinerary and save it")]
    async fn submit_itinerary(&self) -> String {
        let session = self.session.lock().await;
        let Some(state) = session.as_ref() else {
            return no_session();
        };

        match state.submit(&self.services).await {
            Ok(record) => {
                info!(
                    flights = record.flights.len(),
                    accommodations = record.accommodations.len(),
                    activities = record.activities.len(),
                    "Itinerary submitted"
                );
                serde_json::to_string_pretty(&record).unwrap_or_else(|e| {
                    format!(r#"{{"error": "Failed to serialize itinerary: {}"}}"#, e)
                })
            }
            Err(e) => error_json("submit_itinerary", &e),
        }
    }

    #[tool(description = "Resolve an airport code to its city, or a misspelled city name to the closest supported city")]
    async fn resolve_city(&self, #[tool(aggr)] params: ResolveCityParams) -> String {
        let code = params.input.trim().to_uppercase();
        let by_code = airport_city(&code);
        let airport = (by_code != AIRPORT_NOT_FOUND).then(|| airport_label(&code).unwrap_or(by_code));
        debug!(input = params.input, airport, "Resolving city");

        json!({
            "input": params.input,
            "airport": airport,
            "closest_city": closest_city(&params.input),
        })
        .to_string()
    }
}

#[tool(tool_box)]
impl ServerHandler for TripPlannerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("A trip planning server. Start a trip with start_trip, pick flights, move through accommodations and activities with next_stage, then submit_itinerary from the Review stage for an AI-written day-by-day plan. Every tool returns the session state or an error as JSON.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logging::init_file_logging("logs", "trip-planner-mcp.log") {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting MCP trip planner server");

    let config = Config::from_env();
    let store = open_default_store(&config).await?;
    let services = Services::from_config(&config, store)?;
    if services.identity.current_user().is_none() {
        warn!("TRIP_USER_ID is not set; catalog stages and submission will be refused");
    }

    let server = TripPlannerServer::new(services);
    let service = server.serve(stdio()).await?;

    info!("MCP service started, waiting for requests");
    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
