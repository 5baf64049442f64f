// self
use crate::_prelude::*;

/// Token-endpoint grants spoken by the OAuth-backed providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code with PKCE; opens a user session.
	AuthorizationCode,
	/// Renews a user session from its stored refresh token.
	RefreshToken,
	/// App-only token minted from the client id and secret.
	ClientCredentials,
}
impl GrantType {
	/// Every grant, in bit order.
	pub const ALL: [Self; 3] = [Self::AuthorizationCode, Self::RefreshToken, Self::ClientCredentials];

	/// `grant_type` form value.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::AuthorizationCode => "authorization_code",
			Self::RefreshToken => "refresh_token",
			Self::ClientCredentials => "client_credentials",
		}
	}

	/// Returns `true` when the grant starts at the provider's authorization endpoint.
	pub fn needs_authorization_endpoint(self) -> bool {
		matches!(self, Self::AuthorizationCode)
	}

	fn bit(self) -> u8 {
		match self {
			Self::AuthorizationCode => 0b001,
			Self::RefreshToken => 0b010,
			Self::ClientCredentials => 0b100,
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Set of grants a descriptor enables; serializes as a list of grant names.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<GrantType>", into = "Vec<GrantType>")]
pub struct GrantSet(u8);
impl GrantSet {
	/// Returns a copy with `grant` enabled.
	pub fn with(self, grant: GrantType) -> Self {
		Self(self.0 | grant.bit())
	}

	/// Returns `true` if `grant` is enabled.
	pub fn contains(self, grant: GrantType) -> bool {
		self.0 & grant.bit() != 0
	}

	/// Returns `true` when no grant is enabled.
	pub fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Enabled grants, in bit order.
	pub fn iter(self) -> impl Iterator<Item = GrantType> {
		GrantType::ALL.into_iter().filter(move |grant| self.contains(*grant))
	}
}
impl FromIterator<GrantType> for GrantSet {
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = GrantType>,
	{
		iter.into_iter().fold(Self::default(), Self::with)
	}
}
impl From<Vec<GrantType>> for GrantSet {
	fn from(grants: Vec<GrantType>) -> Self {
		grants.into_iter().collect()
	}
}
impl From<GrantSet> for Vec<GrantType> {
	fn from(set: GrantSet) -> Self {
		set.iter().collect()
	}
}
impl Debug for GrantSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_set().entries(self.iter()).finish()
	}
}
