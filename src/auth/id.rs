//! Strongly typed identifiers for clients, tokens, and A2A correlation handles.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $validate:ident) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, token, task, context).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (client, token, task, context).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (client, token, task, context).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ClientId, "Identifier of a registered OAuth client.", "Client", validate_view }
def_id! {
	TokenId,
	"Unique identifier (`jti`) carried by an issued access token.",
	"Token",
	validate_view
}
def_id! {
	TaskId,
	"A2A task identifier echoed between request and response; any non-empty string.",
	"Task",
	validate_correlation
}
def_id! {
	ContextId,
	"A2A conversation context identifier; any non-empty string.",
	"Context",
	validate_correlation
}

impl TokenId {
	/// Generates a random 128-bit identifier encoded as URL-safe base64.
	pub fn generate() -> Self {
		let mut bytes = [0_u8; 16];

		rand::rng().fill(&mut bytes);

		Self(URL_SAFE_NO_PAD.encode(bytes))
	}
}
impl TaskId {
	/// Generates a fresh random task identifier.
	pub fn generate() -> Self {
		Self(uuid::Uuid::new_v4().to_string())
	}
}
impl ContextId {
	/// Generates a fresh random context identifier.
	pub fn generate() -> Self {
		Self(uuid::Uuid::new_v4().to_string())
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

// Correlation ids belong to the caller and are echoed verbatim.
fn validate_correlation(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_empty_values() {
		assert!(ClientId::new(" travel-agent-client").is_err(), "Leading whitespace must be rejected.");
		assert!(ClientId::new("travel-agent-client ").is_err(), "Trailing whitespace must be rejected.");

		let client =
			ClientId::new("travel-agent-client").expect("Client fixture should be considered valid.");

		assert_eq!(client.as_ref(), "travel-agent-client");
		assert!(TaskId::new("").is_err());
		assert!(ContextId::new("").is_err());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let payload = "\"ctx-42\"";
		let context: ContextId =
			serde_json::from_str(payload).expect("Context should deserialize successfully.");

		assert_eq!(context.as_ref(), "ctx-42");
		assert!(serde_json::from_str::<ClientId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<TokenId>("\" jti-42\"").is_err());
		assert!(serde_json::from_str::<TaskId>("\"\"").is_err());
	}

	#[test]
	fn correlation_ids_accept_any_non_empty_text() {
		let spaced = TaskId::new("task 1").expect("Task ids may contain whitespace.");
		let long = ContextId::new("c".repeat(200)).expect("Context ids have no length cap.");

		assert_eq!(spaced.as_ref(), "task 1");
		assert_eq!(long.len(), 200);
		assert_eq!(
			serde_json::from_str::<ContextId>("\" padded \"").expect("Padding is kept.").as_ref(),
			" padded "
		);
	}

	#[test]
	fn unicode_whitespace_and_length_limits() {
		let nbsp = format!("client{}id", '\u{00A0}');

		assert!(ClientId::new(&nbsp).is_err());

		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		ClientId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(ClientId::new(&too_long).is_err());
	}

	#[test]
	fn generated_identifiers_are_distinct_and_valid() {
		let first = TaskId::generate();
		let second = TaskId::generate();

		assert_ne!(first, second);
		assert!(TaskId::new(first.as_ref()).is_ok());
		assert!(ContextId::new(ContextId::generate().as_ref()).is_ok());

		let token_id = TokenId::generate();

		assert_eq!(token_id.len(), 22);
		assert_ne!(token_id, TokenId::generate());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ClientId, u8> = HashMap::from_iter([(
			ClientId::new("travel-agent-client").expect("Client used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("travel-agent-client"), Some(&7));
	}
}
