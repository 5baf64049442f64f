// self
use crate::_prelude::*;

/// Whether authorization requests to a provider must carry a PKCE challenge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PkceRequirement {
	/// PKCE parameters are sent when the caller supplies them.
	#[default]
	Optional,
	/// Blank challenges and verifiers are rejected before any request leaves the broker.
	Required,
}

/// Request-shaping differences between providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// PKCE policy for the Authorization Code grant.
	pub pkce: PkceRequirement,
	/// Separator placed between scopes in `scope` parameters.
	pub scope_delimiter: char,
}
impl ProviderQuirks {
	/// Quirks for a public client that must prove possession through PKCE.
	pub fn pkce_required() -> Self {
		Self { pkce: PkceRequirement::Required, ..Self::default() }
	}

	/// Returns `true` when the provider refuses authorization attempts without PKCE.
	pub fn requires_pkce(&self) -> bool {
		self.pkce == PkceRequirement::Required
	}

	/// Joins `scopes` with the provider's delimiter; `None` when there is nothing to request.
	pub fn join_scopes<S>(&self, scopes: &[S]) -> Option<String>
	where
		S: AsRef<str>,
	{
		let mut scopes = scopes.iter().map(AsRef::as_ref).filter(|scope| !scope.is_empty());
		let first = scopes.next()?;

		Some(scopes.fold(first.to_owned(), |mut joined, scope| {
			joined.push(self.scope_delimiter);
			joined.push_str(scope);

			joined
		}))
	}
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { pkce: PkceRequirement::Optional, scope_delimiter: ' ' }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_join_with_the_configured_delimiter() {
		let comma = ProviderQuirks { scope_delimiter: ',', ..Default::default() };

		assert_eq!(comma.join_scopes(&["r_usr", "", "w_usr"]).as_deref(), Some("r_usr,w_usr"));
		assert_eq!(ProviderQuirks::default().join_scopes(&["user.read"]).as_deref(), Some("user.read"));
		assert_eq!(ProviderQuirks::default().join_scopes::<&str>(&[]), None);
	}

	#[test]
	fn pkce_policy_deserializes_from_snake_case() {
		let quirks: ProviderQuirks =
			serde_json::from_str(r#"{"pkce":"required"}"#).expect("Quirks should deserialize.");

		assert!(quirks.requires_pkce());
		assert_eq!(quirks.scope_delimiter, ' ');
		assert!(!ProviderQuirks::default().requires_pkce());
	}
}
