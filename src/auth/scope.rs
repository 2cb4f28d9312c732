//! Scope modeling helpers used by clients, tokens, and the auth middleware.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError, ser::SerializeSeq};
// self
use crate::_prelude::*;

/// Scope granting access to the travel agent's A2A endpoints.
pub const TRAVEL_AGENT_SCOPE: &str = "a2a:travel-agent";

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Normalized set of OAuth scopes.
///
/// Scopes are deduplicated and sorted so equality and subset checks do not depend on the order
/// in which a caller listed them. The wire form on the token endpoint is the RFC 6749
/// space-delimited string; inside JWT claims the set serializes as a JSON array.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Creates a normalized scope set from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		normalize(scopes).map(Self)
	}

	/// Scope set holding only [`TRAVEL_AGENT_SCOPE`].
	pub fn travel_agent() -> Self {
		Self(Arc::from(vec![TRAVEL_AGENT_SCOPE.to_owned()]))
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the normalized set contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Returns true when every scope in `self` is also present in `other`.
	///
	/// The empty set is a subset of every set.
	pub fn is_subset_of(&self, other: &Self) -> bool {
		self.iter().all(|scope| other.contains(scope))
	}

	/// Scopes present in `self` but missing from `other`.
	pub fn missing_from<'a>(&'a self, other: &'a Self) -> impl Iterator<Item = &'a str> {
		self.iter().filter(move |scope| !other.contains(scope))
	}

	/// Iterator over normalized scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Returns the normalized string representation (space-delimited).
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}

	/// Returns the underlying slice of scope strings.
	pub fn as_slice(&self) -> &[String] {
		&self.0
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		if s.chars().all(char::is_whitespace) {
			return Err(ScopeValidationError::Empty);
		}

		Self::new(s.split_whitespace())
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.0.len()))?;

		for scope in self.0.iter() {
			seq.serialize_element(scope)?;
		}

		seq.end()
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let values = <Vec<String>>::deserialize(deserializer)?;

		ScopeSet::new(values).map_err(DeError::custom)
	}
}

fn normalize<I, S>(scopes: I) -> Result<Arc<[String]>, ScopeValidationError>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut set = BTreeSet::new();

	for scope in scopes {
		let owned: String = scope.into();

		if owned.is_empty() {
			return Err(ScopeValidationError::Empty);
		}
		if owned.chars().any(char::is_whitespace) {
			return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
		}

		set.insert(owned);
	}

	Ok(Arc::from(set.into_iter().collect::<Vec<_>>()))
}
