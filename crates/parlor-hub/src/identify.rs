//! Identification hook for upgrade requests.
//!
//! Parlor does not manage accounts. Whoever owns the HTTP side (cookie
//! session, signed query token, reverse proxy header…) implements
//! [`Identifier`], and the server calls it once per upgrade.

use parlor_protocol::{Avatar, Language, Profile, UserId};
use parlor_transport::Handshake;

use crate::HubError;

/// Who an upgrade request belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: UserId,
    pub profile: Profile,
}

/// Resolves an upgrade request into an [`Identity`].
///
/// Returning an error rejects the connection before any participant is
/// created.
pub trait Identifier: Send + Sync + 'static {
    fn identify(
        &self,
        handshake: &Handshake,
    ) -> impl std::future::Future<Output = Result<Identity, HubError>> + Send;
}

/// Reads the identity straight from the request: `user` from the query
/// string or the `user` cookie, `name`, `avatar` and `lang` from the
/// query string. A request without a user id gets a fresh one.
///
/// Trusts the client completely. Meant for development and tests.
#[derive(Debug, Clone, Default)]
pub struct QueryIdentifier;

impl Identifier for QueryIdentifier {
    async fn identify(&self, handshake: &Handshake) -> Result<Identity, HubError> {
        let user_id = match handshake
            .query_param("user")
            .or_else(|| handshake.cookie_value("user"))
        {
            Some(id) => {
                UserId::new(id).map_err(|e| HubError::IdentificationFailed(e.to_string()))?
            }
            None => UserId::generate(),
        };

        let name = handshake
            .query_param("name")
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| user_id.to_string());
        let mut profile = Profile::new(name);
        if let Some(avatar) = handshake.query_param("avatar") {
            let avatar = avatar
                .parse::<u8>()
                .map_err(|_| HubError::IdentificationFailed(format!("invalid avatar {avatar}")))?;
            profile = profile.with_avatar(Avatar(avatar));
        }
        if let Some(lang) = handshake.query_param("lang") {
            let language = lang
                .parse::<Language>()
                .map_err(|e| HubError::IdentificationFailed(e.to_string()))?;
            profile = profile.with_language(language);
        }
        profile
            .validate()
            .map_err(|e| HubError::IdentificationFailed(e.to_string()))?;

        Ok(Identity { user_id, profile })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(query: &str) -> Handshake {
        Handshake {
            query: Some(query.into()),
            ..Handshake::default()
        }
    }

    #[tokio::test]
    async fn test_query_identifier_reads_user_and_name() {
        let identity = QueryIdentifier
            .identify(&query("user=AB12CD&name=Ada+Lovelace"))
            .await
            .unwrap();
        assert_eq!(identity.user_id.as_str(), "AB12CD");
        assert_eq!(identity.profile.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_query_identifier_rejects_separator_in_user_id() {
        let result = QueryIdentifier.identify(&query("user=GAME-AB")).await;
        assert!(matches!(result, Err(HubError::IdentificationFailed(_))));
    }
}
