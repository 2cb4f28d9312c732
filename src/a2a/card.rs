//! Agent card served for A2A discovery.

// self
use crate::{_prelude::*, auth::TRAVEL_AGENT_SCOPE};

/// Path of the token endpoint advertised in the security scheme.
pub const TOKEN_PATH: &str = "/oauth/token";

/// Discovery document describing this agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
	/// Display name.
	pub name: String,
	/// Free-text description.
	pub description: String,
	/// Base URL of the JSON-RPC endpoint.
	pub url: String,
	/// Agent version.
	pub version: String,
	/// Optional protocol features.
	pub capabilities: AgentCapabilities,
	/// Advertised skills.
	pub skills: Vec<AgentSkill>,
	/// Accepted input MIME types.
	pub default_input_modes: Vec<String>,
	/// Produced output MIME types.
	pub default_output_modes: Vec<String>,
	/// Named security schemes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub security_schemes: Option<BTreeMap<String, SecurityScheme>>,
	/// Security requirements, scheme name to required scopes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub security: Option<Vec<BTreeMap<String, Vec<String>>>>,
}
impl AgentCard {
	/// Builds the travel agent card for `url`; the OAuth2 scheme is advertised only when enabled.
	pub fn travel_agent(version: impl Into<String>, url: impl Into<String>, oauth_enabled: bool) -> Self {
		let (security_schemes, security) = if oauth_enabled {
			let scheme = SecurityScheme {
				kind: "oauth2".into(),
				description: "OAuth2 Client Credentials authentication for agent-to-agent communication"
					.into(),
				flows: OAuthFlows {
					client_credentials: ClientCredentialsFlow {
						token_url: TOKEN_PATH.into(),
						scopes: BTreeMap::from([(
							TRAVEL_AGENT_SCOPE.to_owned(),
							"Access to Travel Agent A2A endpoints".to_owned(),
						)]),
					},
				},
			};

			(
				Some(BTreeMap::from([("oauth2".to_owned(), scheme)])),
				Some(vec![BTreeMap::from([(
					"oauth2".to_owned(),
					vec![TRAVEL_AGENT_SCOPE.to_owned()],
				)])]),
			)
		} else {
			(None, None)
		};
		let mut description = String::from(
			"An intelligent AI-powered travel agent that helps with trip planning, destination \
			 recommendations, budget calculation, itinerary creation, and travel information.",
		);

		if oauth_enabled {
			description.push_str(" Requires OAuth2 authentication (client_credentials flow).");
		}

		Self {
			name: "Travel Agent".into(),
			description,
			url: url.into(),
			version: version.into(),
			capabilities: AgentCapabilities::default(),
			skills: travel_skills(),
			default_input_modes: vec!["text/plain".into()],
			default_output_modes: vec!["text/plain".into()],
			security_schemes,
			security,
		}
	}
}

/// Optional protocol features; all disabled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
	/// `message/stream` support.
	pub streaming: bool,
	/// Push notification support.
	pub push_notifications: bool,
	/// Task state history support.
	pub state_transition_history: bool,
}

/// One advertised skill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
	/// Stable identifier.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Free-text description.
	pub description: String,
	/// Search tags.
	pub tags: Vec<String>,
	/// Example prompts.
	pub examples: Vec<String>,
}
impl AgentSkill {
	fn new(id: &str, name: &str, description: &str, tags: &[&str], examples: &[&str]) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			description: description.into(),
			tags: tags.iter().map(|&tag| tag.into()).collect(),
			examples: examples.iter().map(|&example| example.into()).collect(),
		}
	}
}

/// OAuth2 security scheme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityScheme {
	/// Always `oauth2`.
	#[serde(rename = "type")]
	pub kind: String,
	/// Free-text description.
	pub description: String,
	/// Supported flows.
	pub flows: OAuthFlows,
}

/// OAuth2 flows offered by the scheme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlows {
	/// Client-credentials flow.
	pub client_credentials: ClientCredentialsFlow,
}

/// Client-credentials flow description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredentialsFlow {
	/// Token endpoint, relative to the agent URL.
	pub token_url: String,
	/// Scope name to description.
	pub scopes: BTreeMap<String, String>,
}

/// Derives the public base URL from request headers.
///
/// Precedence: `X-Forwarded-Host`, `Host`, the configured public host, `localhost`. Any port on the
/// chosen host is dropped; loopback hosts are served over `http` on `local_port`, everything else
/// over `https` on the default port.
pub fn public_base_url(
	forwarded_host: Option<&str>,
	host: Option<&str>,
	public_host: Option<&str>,
	local_port: u16,
) -> String {
	let raw = [forwarded_host, host, public_host]
		.into_iter()
		.flatten()
		.map(|value| value.split(',').next().unwrap_or_default().trim())
		.find(|value| !value.is_empty())
		.unwrap_or("localhost");
	let hostname = strip_port(raw);

	match hostname {
		"localhost" | "127.0.0.1" => format!("http://{hostname}:{local_port}"),
		_ => format!("https://{hostname}"),
	}
}

fn strip_port(host: &str) -> &str {
	if let Some(rest) = host.strip_prefix('[') {
		// Keep the brackets of an IPv6 literal; an unterminated one is left as sent.
		return match rest.split_once(']') {
			Some((inner, _)) => &host[..inner.len() + 2],
			None => host,
		};
	}

	host.split(':').next().unwrap_or(host)
}

fn travel_skills() -> Vec<AgentSkill> {
	vec![
		AgentSkill::new(
			"plan_trip",
			"Plan Trip",
			"Plan a complete trip including destination recommendations, accommodations, \
			 activities, and budget estimation. Provide destination, dates, budget, and preferences \
			 for best results.",
			&["travel", "planning", "trip", "vacation"],
			&[
				"Plan a 7-day trip to Tokyo with a budget of $3000",
				"Help me plan a romantic getaway to Paris in spring",
				"I want to visit Bali for 10 days, budget-friendly options please",
			],
		),
		AgentSkill::new(
			"get_recommendations",
			"Get Travel Recommendations",
			"Get personalized travel recommendations for destinations, hotels, restaurants, and \
			 activities based on preferences and interests.",
			&["recommendations", "destinations", "hotels", "activities"],
			&[
				"What are the best beaches to visit in Thailand?",
				"Recommend family-friendly activities in Orlando",
				"Suggest romantic restaurants in Rome",
			],
		),
		AgentSkill::new(
			"calculate_budget",
			"Calculate Trip Budget",
			"Calculate a comprehensive travel budget including flights, accommodations, meals, \
			 activities, and transportation costs.",
			&["budget", "cost", "finance", "estimation"],
			&[
				"How much will a week in London cost?",
				"Calculate budget for 2 people visiting Japan for 14 days",
				"What's a realistic budget for backpacking through Europe?",
			],
		),
		AgentSkill::new(
			"create_itinerary",
			"Create Detailed Itinerary",
			"Create a day-by-day travel itinerary with activities, timings, and logistics for your \
			 trip.",
			&["itinerary", "schedule", "planning", "daily"],
			&[
				"Create a 5-day itinerary for New York City",
				"Plan my daily schedule for a week in Barcelona",
				"Make an itinerary for a road trip from LA to San Francisco",
			],
		),
		AgentSkill::new(
			"travel_info",
			"Travel Information",
			"Provide essential travel information including visa requirements, weather, cultural \
			 tips, safety information, and local customs for destinations.",
			&["visa", "weather", "culture", "safety", "information"],
			&[
				"Do I need a visa to visit Vietnam from USA?",
				"What's the best time to visit Iceland?",
				"Tell me about local customs in Japan",
			],
		),
		AgentSkill::new(
			"booking_assistance",
			"Booking Assistance",
			"Provide guidance and assistance with booking flights, hotels, and activities including \
			 tips for finding deals.",
			&["booking", "flights", "hotels", "deals"],
			&[
				"Help me find cheap flights to Hawaii",
				"Where should I book hotels in Amsterdam?",
				"Tips for booking activities in advance",
			],
		),
	]
}
