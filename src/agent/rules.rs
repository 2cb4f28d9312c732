//! Rule-based responder: keyword intent detection, trip-fact extraction, and template replies.

// crates.io
use regex::Regex;
// self
use crate::{
	_prelude::*,
	agent::{AgentError, AgentFuture, AgentHandler, AgentMode, ChatMessage, Conversation},
};

/// Destinations recognized by name, matched in this order.
pub const DESTINATIONS: &[&str] = &[
	"paris",
	"tokyo",
	"new york",
	"london",
	"rome",
	"barcelona",
	"dubai",
	"singapore",
	"sydney",
	"bali",
	"amsterdam",
	"berlin",
	"lisbon",
	"prague",
	"bangkok",
];

const FALLBACK_QUESTION: &str =
	"I'd love to help! Could you tell me more about what you're looking for?";
const BOOKING_GUIDANCE: &str = "I can help guide you through the booking process! 📝\n\n\
	Here's what I recommend:\n\n\
	**For Flights:**\n  \
	• Compare prices on: Skyscanner, Google Flights, Kayak\n  \
	• Book directly with airlines when possible\n\n\
	**For Accommodation:**\n  \
	• Hotels: Booking.com, Hotels.com, official hotel websites\n  \
	• Vacation rentals: Airbnb, Vrbo\n\n\
	**For Activities:**\n  \
	• GetYourGuide, Viator, local tour operators\n\n\
	I can provide specific recommendations and links based on your itinerary. \
	Would you like me to suggest specific options?";
const ITINERARY_MAX_DAYS: u32 = 30;

/// What the caller is asking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	/// Start or continue planning a trip.
	PlanTrip,
	/// Things to do at a destination.
	GetRecommendations,
	/// Day-by-day plan.
	CreateItinerary,
	/// Cost questions.
	CalculateBudget,
	/// Reservations.
	BookingAssistance,
	/// Visas and travel safety.
	TravelSupport,
	/// Anything else.
	General,
}
impl Intent {
	// First match wins.
	const KEYWORDS: [(Intent, &'static [&'static str]); 6] = [
		(Intent::PlanTrip, &["plan", "planning", "trip to", "visit", "going to"]),
		(Intent::GetRecommendations, &["recommend", "suggest", "what to do", "what should"]),
		(Intent::CreateItinerary, &["itinerary", "schedule", "day by day", "daily plan"]),
		(Intent::CalculateBudget, &["budget", "cost", "price", "how much", "expensive"]),
		(Intent::BookingAssistance, &["book", "booking", "reserve", "reservation"]),
		(Intent::TravelSupport, &["visa", "passport", "insurance", "safety", "emergency"]),
	];

	/// Detects the intent of `text` by keyword containment.
	pub fn detect(text: &str) -> Self {
		let lower = text.to_lowercase();

		Self::KEYWORDS
			.iter()
			.find(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(keyword)))
			.map(|(intent, _)| *intent)
			.unwrap_or(Self::General)
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Intent::PlanTrip => "plan_trip",
			Intent::GetRecommendations => "get_recommendations",
			Intent::CreateItinerary => "create_itinerary",
			Intent::CalculateBudget => "calculate_budget",
			Intent::BookingAssistance => "booking_assistance",
			Intent::TravelSupport => "travel_support",
			Intent::General => "general_inquiry",
		}
	}
}

/// Spending tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLevel {
	/// Economy options.
	Budget,
	/// Good value with comfort.
	Moderate,
	/// Premium experiences.
	Luxury,
}
impl BudgetLevel {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			BudgetLevel::Budget => "budget",
			BudgetLevel::Moderate => "moderate",
			BudgetLevel::Luxury => "luxury",
		}
	}
}

/// Preferred place to stay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accommodation {
	/// Hotel room.
	Hotel,
	/// Hostel bed.
	Hostel,
	/// Airbnb-style rental.
	VacationRental,
	/// All-inclusive resort.
	Resort,
}
impl Accommodation {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Accommodation::Hotel => "hotel",
			Accommodation::Hostel => "hostel",
			Accommodation::VacationRental => "vacation_rental",
			Accommodation::Resort => "resort",
		}
	}
}

/// Preferred way of getting around at the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalTransport {
	/// Buses and metro.
	PublicTransport,
	/// Self-driven rental car.
	RentalCar,
	/// Taxis and ride-hailing.
	RideSharing,
	/// On foot.
	Walking,
}
impl LocalTransport {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			LocalTransport::PublicTransport => "public_transport",
			LocalTransport::RentalCar => "rental_car",
			LocalTransport::RideSharing => "ride_sharing",
			LocalTransport::Walking => "walking",
		}
	}
}

/// Activity category the caller cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interest {
	/// Museums and history.
	Culture,
	/// Outdoor activities.
	Adventure,
	/// Dining and cuisine.
	Food,
	/// Beaches and spas.
	Relaxation,
	/// Bars and clubs.
	Nightlife,
	/// Markets and malls.
	Shopping,
}
impl Interest {
	const KEYWORDS: [(Interest, &'static [&'static str]); 6] = [
		(Interest::Culture, &["museum", "culture", "historical", "history", "art"]),
		(Interest::Adventure, &["adventure", "hiking", "outdoor", "nature", "trek", "trekking"]),
		(Interest::Food, &["food", "restaurant", "dining", "cuisine", "culinary"]),
		(Interest::Relaxation, &["relax", "relaxing", "beach", "spa", "peaceful", "quiet"]),
		(Interest::Nightlife, &["nightlife", "bar", "club", "party"]),
		(Interest::Shopping, &["shopping", "mall", "market", "boutique"]),
	];

	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Interest::Culture => "culture",
			Interest::Adventure => "adventure",
			Interest::Food => "food",
			Interest::Relaxation => "relaxation",
			Interest::Nightlife => "nightlife",
			Interest::Shopping => "shopping",
		}
	}

	fn highlight(self) -> &'static str {
		match self {
			Interest::Culture => "Museums and historic neighborhoods",
			Interest::Adventure => "Hikes and outdoor excursions",
			Interest::Food => "Local markets and signature dishes",
			Interest::Relaxation => "Beaches and spa time",
			Interest::Nightlife => "Bars and live music",
			Interest::Shopping => "Markets and boutiques",
		}
	}
}

/// Trip facts the agent asks for when they are missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripField {
	/// Where the trip goes.
	Destination,
	/// Departure city.
	Origin,
	/// Trip length.
	Duration,
	/// Amount or spending tier.
	Budget,
	/// Party size.
	Travelers,
	/// Spending tier.
	BudgetLevel,
	/// Activity categories.
	Interests,
}
impl TripField {
	/// Asked first, in this order.
	pub const ESSENTIAL: [TripField; 3] = [TripField::Destination, TripField::Duration, TripField::Budget];
	/// Asked once the essentials are known, in this order.
	pub const REQUIRED: [TripField; 7] = [
		TripField::Destination,
		TripField::Origin,
		TripField::Duration,
		TripField::Budget,
		TripField::Travelers,
		TripField::BudgetLevel,
		TripField::Interests,
	];

	/// Question asking the caller for this fact.
	pub const fn question(self) -> &'static str {
		match self {
			TripField::Destination => "Where would you like to travel to? 🌍",
			TripField::Origin => "Where will you be traveling from? (City/Airport) ✈️",
			TripField::Duration => "How many days do you have for this trip? 📅",
			TripField::Budget =>
				"What's your budget for this trip? 💰\n\
				You can tell me:\n\
				• A specific amount (e.g., '$5000')\n\
				• A budget level: Budget-Friendly 💰 | Moderate 💵 | Luxury 💎",
			TripField::Travelers => "How many people will be traveling? 👥",
			TripField::BudgetLevel =>
				"What's your preferred budget level? 💰\n\
				• Budget-Friendly 💰: Economy options, cost-saving focus\n\
				• Moderate 💵: Good value with comfort\n\
				• Luxury 💎: Premium experiences",
			TripField::Interests =>
				"What types of activities interest you most? 🎯\n\
				For example: culture, adventure, food, relaxation, nightlife, shopping",
		}
	}
}

/// Facts gathered from a conversation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripContext {
	/// Title-cased destination name.
	pub destination: Option<String>,
	/// Title-cased origin city.
	pub origin: Option<String>,
	/// Total budget amount in dollars.
	pub budget: Option<f64>,
	/// Spending tier.
	pub budget_level: Option<BudgetLevel>,
	/// Trip length in days.
	pub duration_days: Option<u32>,
	/// Party size.
	pub travelers: Option<u32>,
	/// Preferred place to stay.
	pub accommodation: Option<Accommodation>,
	/// Preferred way of getting around.
	pub local_transport: Option<LocalTransport>,
	/// Interests mentioned in the latest message that named any.
	pub interests: Vec<Interest>,
}
impl TripContext {
	/// Returns `true` when no fact has been gathered.
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}

	/// Returns `true` if the fact is known; a budget amount or level both count as a budget.
	pub fn has(&self, field: TripField) -> bool {
		match field {
			TripField::Destination => self.destination.is_some(),
			TripField::Origin => self.origin.is_some(),
			TripField::Duration => self.duration_days.is_some(),
			TripField::Budget => self.budget.is_some() || self.budget_level.is_some(),
			TripField::Travelers => self.travelers.is_some(),
			TripField::BudgetLevel => self.budget_level.is_some(),
			TripField::Interests => !self.interests.is_empty(),
		}
	}

	/// First missing fact: essentials first, then the remaining required facts.
	pub fn missing(&self) -> Option<TripField> {
		TripField::ESSENTIAL
			.into_iter()
			.chain(TripField::REQUIRED)
			.find(|field| !self.has(*field))
	}

	/// One-line `key: value` summary of the known facts, or `None` when nothing is known.
	pub fn summary(&self) -> Option<String> {
		let mut items = Vec::new();

		if let Some(destination) = &self.destination {
			items.push(format!("destination: {destination}"));
		}
		if let Some(origin) = &self.origin {
			items.push(format!("origin: {origin}"));
		}
		if let Some(budget) = self.budget {
			items.push(format!("budget: {budget}"));
		}
		if let Some(level) = self.budget_level {
			items.push(format!("budget_level: {}", level.as_str()));
		}
		if let Some(days) = self.duration_days {
			items.push(format!("duration: {days}"));
		}
		if let Some(travelers) = self.travelers {
			items.push(format!("travelers: {travelers}"));
		}
		if let Some(accommodation) = self.accommodation {
			items.push(format!("accommodation_type: {}", accommodation.as_str()));
		}
		if let Some(transport) = self.local_transport {
			items.push(format!("local_transport: {}", transport.as_str()));
		}
		if !self.interests.is_empty() {
			items.push(format!("interests: [{}]", self.interest_labels().join(", ")));
		}

		if items.is_empty() { None } else { Some(items.join(", ")) }
	}

	fn has_minimum(&self) -> bool {
		self.destination.is_some() && self.duration_days.is_some()
	}

	fn interest_labels(&self) -> Vec<&'static str> {
		self.interests.iter().map(|interest| interest.as_str()).collect()
	}
}

#[derive(Clone, Copy, Debug)]
enum DurationUnit {
	Days,
	Weeks,
	Nights,
}

/// Pulls trip facts out of free text.
#[derive(Clone, Debug)]
pub struct TripExtractor {
	origin: [Regex; 3],
	budget: [Regex; 3],
	duration: [(Regex, DurationUnit); 3],
	travelers: Regex,
}
impl TripExtractor {
	/// Compiles the extraction patterns.
	pub fn new() -> Result<Self, regex::Error> {
		Ok(Self {
			origin: [
				Regex::new(r"from\s+([a-zA-Z\s]+?)(?:\s+to\s|\s*$|,)")?,
				Regex::new(r"traveling\s+from\s+([a-zA-Z\s]+)")?,
				Regex::new(r"leaving\s+from\s+([a-zA-Z\s]+)")?,
			],
			budget: [
				Regex::new(r"\$\s*(\d+(?:,\d{3})*)")?,
				Regex::new(r"(\d+(?:,\d{3})*)\s*(?:dollars?|usd)")?,
				Regex::new(r"budget\s+(?:of\s+)?\$?\s*(\d+(?:,\d{3})*)")?,
			],
			duration: [
				(Regex::new(r"(\d+)\s*days?")?, DurationUnit::Days),
				(Regex::new(r"(\d+)\s*weeks?")?, DurationUnit::Weeks),
				(Regex::new(r"(\d+)\s*nights?")?, DurationUnit::Nights),
			],
			travelers: Regex::new(r"(\d+)\s*(?:people|person|traveler|passenger)")?,
		})
	}

	/// Merges the facts found in `text` into `trip`; facts not mentioned are left untouched.
	pub fn extract(&self, text: &str, trip: &mut TripContext) {
		let lower = text.to_lowercase();
		let words = lower
			.split(|c: char| !c.is_alphanumeric())
			.filter(|word| !word.is_empty())
			.collect::<Vec<_>>();
		let mentions = |keyword: &str| {
			words.iter().any(|word| *word == keyword || word.strip_suffix('s') == Some(keyword))
		};

		if let Some(destination) = DESTINATIONS.iter().find(|name| lower.contains(*name)) {
			trip.destination = Some(title_case(destination));
		}
		if let Some(captures) = self.origin.iter().find_map(|pattern| pattern.captures(&lower)) {
			let origin = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();

			if !origin.is_empty() && !DESTINATIONS.iter().any(|name| *name == origin) {
				trip.origin = Some(title_case(origin));
			}
		}
		if let Some(captures) = self.budget.iter().find_map(|pattern| pattern.captures(&lower)) {
			if let Ok(amount) = captures[1].replace(',', "").parse::<f64>() {
				trip.budget = Some(amount);
			}
		}

		if lower.contains("budget") || lower.contains("cheap") {
			trip.budget_level = Some(BudgetLevel::Budget);
		} else if lower.contains("luxury") || lower.contains("premium") || lower.contains("high-end")
		{
			trip.budget_level = Some(BudgetLevel::Luxury);
		} else if lower.contains("moderate") || lower.contains("mid-range") {
			trip.budget_level = Some(BudgetLevel::Moderate);
		}

		if let Some((captures, unit)) = self
			.duration
			.iter()
			.find_map(|(pattern, unit)| pattern.captures(&lower).map(|captures| (captures, *unit)))
		{
			let days = captures[1].parse::<u32>().ok().and_then(|value| match unit {
				DurationUnit::Days => Some(value),
				DurationUnit::Weeks => value.checked_mul(7),
				DurationUnit::Nights => value.checked_add(1),
			});

			if days.is_some() {
				trip.duration_days = days;
			}
		}
		if let Some(captures) = self.travelers.captures(&lower) {
			if let Ok(travelers) = captures[1].parse() {
				trip.travelers = Some(travelers);
			}
		}

		if mentions("hotel") {
			trip.accommodation = Some(Accommodation::Hotel);
		} else if mentions("hostel") {
			trip.accommodation = Some(Accommodation::Hostel);
		} else if mentions("airbnb") || lower.contains("vacation rental") {
			trip.accommodation = Some(Accommodation::VacationRental);
		} else if mentions("resort") {
			trip.accommodation = Some(Accommodation::Resort);
		}

		if lower.contains("public transport") || mentions("metro") || mentions("bus") {
			trip.local_transport = Some(LocalTransport::PublicTransport);
		} else if lower.contains("rental car") || lower.contains("car rental") {
			trip.local_transport = Some(LocalTransport::RentalCar);
		} else if mentions("taxi") || mentions("uber") || mentions("ride") {
			trip.local_transport = Some(LocalTransport::RideSharing);
		} else if mentions("walk") || mentions("walking") {
			trip.local_transport = Some(LocalTransport::Walking);
		}

		let interests = Interest::KEYWORDS
			.iter()
			.filter(|(_, keywords)| keywords.iter().any(|keyword| mentions(*keyword)))
			.map(|(interest, _)| *interest)
			.collect::<Vec<_>>();

		if !interests.is_empty() {
			trip.interests = interests;
		}
	}
}

/// Builds the template reply for `intent` given the facts gathered so far.
pub fn reply(intent: Intent, trip: &TripContext) -> String {
	match intent {
		Intent::PlanTrip => match trip.missing() {
			Some(field) => field.question().into(),
			None => trip_overview(trip),
		},
		Intent::GetRecommendations => match &trip.destination {
			Some(destination) => recommendations(destination, trip),
			None =>
				"I'd love to help you with recommendations! Where are you planning to travel?".into(),
		},
		Intent::CreateItinerary => match (&trip.destination, trip.duration_days) {
			(Some(destination), Some(days)) => itinerary(destination, days, &trip.interests),
			_ => clarifying_question(trip).into(),
		},
		Intent::CalculateBudget =>
			if trip.has_minimum() {
				budget_summary(trip)
			} else {
				format!(
					"To calculate your trip budget, I need some basic information. {}",
					clarifying_question(trip)
				)
			},
		Intent::BookingAssistance => BOOKING_GUIDANCE.into(),
		Intent::TravelSupport => match &trip.destination {
			Some(destination) => travel_support(destination),
			None =>
				"I can help with travel support! Which destination do you need information about?"
					.into(),
		},
		Intent::General => clarifying_question(trip).into(),
	}
}

/// Template responder that needs no upstream service.
#[derive(Clone, Debug)]
pub struct RuleBasedHandler {
	extractor: TripExtractor,
}
impl RuleBasedHandler {
	/// Compiles the extraction patterns.
	pub fn new() -> Result<Self, AgentError> {
		Ok(Self { extractor: TripExtractor::new()? })
	}

	/// Merges the facts in `text` into `trip`.
	pub fn extract(&self, text: &str, trip: &mut TripContext) {
		self.extractor.extract(text, trip);
	}

	/// Reply for `text` given facts already merged into `trip`.
	pub fn reply_to(&self, trip: &TripContext, text: &str) -> String {
		let intent = Intent::detect(text);

		tracing::debug!(intent = intent.as_str(), "Detected intent.");

		reply(intent, trip)
	}
}
impl AgentHandler for RuleBasedHandler {
	fn mode(&self) -> AgentMode {
		AgentMode::RuleBased
	}

	fn respond<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		text: &'a str,
	) -> AgentFuture<'a, String> {
		Box::pin(async move {
			self.extract(text, &mut conversation.trip);

			let reply = self.reply_to(&conversation.trip, text);

			conversation.history.push(ChatMessage::user(text));
			conversation.history.push(ChatMessage::assistant(reply.clone()));

			Ok(reply)
		})
	}
}

fn clarifying_question(trip: &TripContext) -> &'static str {
	trip.missing().map(TripField::question).unwrap_or(FALLBACK_QUESTION)
}

fn trip_overview(trip: &TripContext) -> String {
	let mut lines = vec!["Here's your trip so far:".to_owned(), String::new()];

	if let Some(destination) = &trip.destination {
		lines.push(format!("📍 Destination: {destination}"));
	}
	if let Some(origin) = &trip.origin {
		lines.push(format!("✈️ From: {origin}"));
	}
	if let Some(days) = trip.duration_days {
		lines.push(format!("📅 Duration: {days} days"));
	}
	if let Some(travelers) = trip.travelers {
		lines.push(format!("👥 Travelers: {travelers}"));
	}
	if let Some(budget) = trip.budget {
		lines.push(format!("💰 Budget: ${budget:.2}"));
	}
	if let Some(level) = trip.budget_level {
		lines.push(format!("💵 Budget level: {}", level.as_str()));
	}
	if !trip.interests.is_empty() {
		lines.push(format!("🎯 Interests: {}", trip.interest_labels().join(", ")));
	}
	if let Some(accommodation) = trip.accommodation {
		lines.push(format!("🏨 Stay: {}", accommodation.as_str()));
	}
	if let Some(transport) = trip.local_transport {
		lines.push(format!("🚇 Getting around: {}", transport.as_str()));
	}

	lines.push(String::new());
	lines.push("Ask me for recommendations, a day-by-day itinerary, or a budget breakdown.".into());

	lines.join("\n")
}

fn recommendations(destination: &str, trip: &TripContext) -> String {
	let mut lines = vec![format!("Based on your preferences, here are my recommendations for {destination}:\n")];

	lines.push("🎯 **Activities:**".into());

	if trip.interests.is_empty() {
		lines.push("  • Top sights and a walking tour of the city center".into());
	} else {
		lines.extend(trip.interests.iter().map(|interest| format!("  • {}", interest.highlight())));
	}
	if let Some(field) = trip.missing() {
		lines.push(String::new());
		lines.push(field.question().into());
	}

	lines.join("\n")
}

fn itinerary(destination: &str, days: u32, interests: &[Interest]) -> String {
	let shown = days.min(ITINERARY_MAX_DAYS);
	let mut lines = vec![format!("# {days}-Day {destination} Itinerary")];

	for day in 1..=shown {
		let theme = if day == 1 {
			"Arrival and orientation".to_owned()
		} else if day == days {
			"Last look and departure".to_owned()
		} else if interests.is_empty() {
			format!("Explore {destination}")
		} else {
			interests[(day as usize - 2) % interests.len()].highlight().to_owned()
		};

		lines.push(format!("\n## Day {day} - {theme}"));
	}
	if days > shown {
		lines.push(format!("\n*Showing the first {shown} days.*"));
	}

	lines.join("\n")
}

fn budget_summary(trip: &TripContext) -> String {
	let destination = trip.destination.as_deref().unwrap_or("your destination");
	let days = trip.duration_days.unwrap_or(1).max(1);

	match trip.budget {
		Some(amount) => {
			let per_day = amount / f64::from(days);
			let mut lines = vec![
				"# 💰 TRIP BUDGET".to_owned(),
				format!("Your Budget: ${amount:.2} for {days} days in {destination}"),
				format!("Per day: ${per_day:.2}"),
			];

			if let Some(travelers) = trip.travelers.filter(|count| *count > 1) {
				lines.push(format!(
					"Per traveler per day: ${:.2}",
					per_day / f64::from(travelers)
				));
			}

			lines.join("\n")
		},
		None => format!(
			"Planning a {}-level trip of {days} days in {destination}. Share a total amount \
			(e.g., '$5000') and I'll split it per day.",
			trip.budget_level.unwrap_or(BudgetLevel::Moderate).as_str()
		),
	}
}

fn travel_support(destination: &str) -> String {
	format!(
		"# 🛂 Travel Support Information\n\n\
		For {destination}, check visa and passport requirements with the official consulate before \
		you book, and buy travel insurance that covers medical emergencies. Save the local \
		emergency number before you land."
	)
}

fn title_case(value: &str) -> String {
	value
		.split_whitespace()
		.map(|word| {
			let mut chars = word.chars();

			match chars.next() {
				Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
				None => String::new(),
			}
		})
		.collect::<Vec<String>>()
		.join(" ")
}
