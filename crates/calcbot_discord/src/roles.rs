//! Self-assignable role handling.
//!
//! The guild lookups and mutations sit behind [`RoleDirectory`] so the
//! assign/remove decisions can be exercised without a gateway connection.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{GuildId, Http, RoleId, UserId};
use tracing::{debug, info};

use crate::error::{DiscordError, Result};

/// Role lookups and mutations for one member of one guild.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Find a guild role by exact name.
    async fn find_role(&self, name: &str) -> Result<Option<RoleId>>;

    /// Whether the member currently holds `role`.
    async fn member_has_role(&self, role: RoleId) -> Result<bool>;

    async fn add_role(&self, role: RoleId) -> Result<()>;

    async fn remove_role(&self, role: RoleId) -> Result<()>;
}

/// [`RoleDirectory`] backed by the Discord HTTP API.
pub struct GuildRoles {
    http: Arc<Http>,
    guild_id: GuildId,
    user_id: UserId,
}

impl GuildRoles {
    pub fn new(http: Arc<Http>, guild_id: GuildId, user_id: UserId) -> Self {
        Self {
            http,
            guild_id,
            user_id,
        }
    }
}

#[async_trait]
impl RoleDirectory for GuildRoles {
    async fn find_role(&self, name: &str) -> Result<Option<RoleId>> {
        let roles = self.guild_id.roles(&self.http).await?;
        Ok(roles
            .into_values()
            .find(|role| role.name == name)
            .map(|role| role.id))
    }

    async fn member_has_role(&self, role: RoleId) -> Result<bool> {
        let member = self.guild_id.member(&self.http, self.user_id).await?;
        Ok(member.roles.contains(&role))
    }

    async fn add_role(&self, role: RoleId) -> Result<()> {
        self.http
            .add_member_role(self.guild_id, self.user_id, role, Some("self-assigned"))
            .await
            .map_err(|e| DiscordError::from_mutation("assign roles", e))
    }

    async fn remove_role(&self, role: RoleId) -> Result<()> {
        self.http
            .remove_member_role(self.guild_id, self.user_id, role, Some("self-removed"))
            .await
            .map_err(|e| DiscordError::from_mutation("remove roles", e))
    }
}

/// What happened to the member's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOutcome {
    Assigned,
    AlreadyHad,
    Removed,
    NeverHad,
    RoleMissing,
    MissingPermissions,
}

impl RoleOutcome {
    /// Channel reply for this outcome.
    pub fn message(&self, role: &str, mention: &str) -> String {
        match self {
            RoleOutcome::Assigned => format!("Role {} has been assigned to {}", role, mention),
            RoleOutcome::AlreadyHad => {
                format!("You already have the role {}, {}!", role, mention)
            }
            RoleOutcome::Removed => format!("Role {} has been removed from {}", role, mention),
            RoleOutcome::NeverHad => {
                format!("You don't have the role {}, {}, so there is nothing to remove.", role, mention)
            }
            RoleOutcome::RoleMissing => "Role does not exist.".to_string(),
            RoleOutcome::MissingPermissions => format!(
                "I don't have permission to manage the {} role. A server admin needs to give me Manage Roles and move my role above {}.",
                role, role
            ),
        }
    }
}

/// Give the member `role_name` unless they already hold it.
pub async fn assign_role<D>(directory: &D, role_name: &str) -> Result<RoleOutcome>
where
    D: RoleDirectory + ?Sized,
{
    let Some(role) = directory.find_role(role_name).await? else {
        debug!(role = role_name, "role not found in guild");
        return Ok(RoleOutcome::RoleMissing);
    };

    if directory.member_has_role(role).await? {
        return Ok(RoleOutcome::AlreadyHad);
    }

    match directory.add_role(role).await {
        Ok(()) => {
            info!(role = role_name, "assigned role");
            Ok(RoleOutcome::Assigned)
        }
        Err(DiscordError::MissingPermissions { .. }) => Ok(RoleOutcome::MissingPermissions),
        Err(e) => Err(e),
    }
}

/// Take `role_name` away from the member if they hold it.
pub async fn remove_role<D>(directory: &D, role_name: &str) -> Result<RoleOutcome>
where
    D: RoleDirectory + ?Sized,
{
    // A role that does not exist is one the member never had.
    let Some(role) = directory.find_role(role_name).await? else {
        return Ok(RoleOutcome::NeverHad);
    };

    if !directory.member_has_role(role).await? {
        return Ok(RoleOutcome::NeverHad);
    }

    match directory.remove_role(role).await {
        Ok(()) => {
            info!(role = role_name, "removed role");
            Ok(RoleOutcome::Removed)
        }
        Err(DiscordError::MissingPermissions { .. }) => Ok(RoleOutcome::MissingPermissions),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    fn role() -> RoleId {
        RoleId::new(7)
    }

    fn directory_with_role() -> MockRoleDirectory {
        let mut mock = MockRoleDirectory::new();
        mock.expect_find_role()
            .withf(|name| name == "Gay")
            .returning(|_| Ok(Some(role())));
        mock
    }

    #[tokio::test]
    async fn test_assign_twice_adds_once() {
        let mut mock = directory_with_role();
        let mut seq = Sequence::new();
        mock.expect_member_has_role()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));
        mock.expect_add_role()
            .withf(|id| *id == role())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_member_has_role()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));

        assert_eq!(assign_role(&mock, "Gay").await.unwrap(), RoleOutcome::Assigned);
        assert_eq!(assign_role(&mock, "Gay").await.unwrap(), RoleOutcome::AlreadyHad);
    }

    #[tokio::test]
    async fn test_remove_without_role_does_not_mutate() {
        let mut mock = directory_with_role();
        mock.expect_member_has_role().returning(|_| Ok(false));
        mock.expect_remove_role().never();

        assert_eq!(remove_role(&mock, "Gay").await.unwrap(), RoleOutcome::NeverHad);
    }

    #[tokio::test]
    async fn test_remove_held_role() {
        let mut mock = directory_with_role();
        mock.expect_member_has_role().returning(|_| Ok(true));
        mock.expect_remove_role().times(1).returning(|_| Ok(()));

        assert_eq!(remove_role(&mock, "Gay").await.unwrap(), RoleOutcome::Removed);
    }

    #[tokio::test]
    async fn test_missing_role() {
        let mut mock = MockRoleDirectory::new();
        mock.expect_find_role().returning(|_| Ok(None));
        mock.expect_member_has_role().never();
        mock.expect_add_role().never();
        mock.expect_remove_role().never();

        assert_eq!(assign_role(&mock, "Gay").await.unwrap(), RoleOutcome::RoleMissing);
        assert_eq!(remove_role(&mock, "Gay").await.unwrap(), RoleOutcome::NeverHad);
    }

    #[tokio::test]
    async fn test_permission_failure_is_an_outcome() {
        let mut mock = directory_with_role();
        mock.expect_member_has_role().returning(|_| Ok(false));
        mock.expect_add_role()
            .returning(|_| Err(DiscordError::missing_permissions("assign roles")));

        assert_eq!(
            assign_role(&mock, "Gay").await.unwrap(),
            RoleOutcome::MissingPermissions
        );
    }

    #[tokio::test]
    async fn test_other_failures_propagate() {
        let mut mock = directory_with_role();
        mock.expect_member_has_role()
            .returning(|_| Err(DiscordError::Serenity(serenity::Error::Other("offline"))));

        assert!(matches!(
            assign_role(&mock, "Gay").await,
            Err(DiscordError::Serenity(_))
        ));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            RoleOutcome::Assigned.message("Gay", "<@1>"),
            "Role Gay has been assigned to <@1>"
        );
        assert_eq!(
            RoleOutcome::AlreadyHad.message("Gay", "<@1>"),
            "You already have the role Gay, <@1>!"
        );
        assert_eq!(
            RoleOutcome::Removed.message("Gay", "<@1>"),
            "Role Gay has been removed from <@1>"
        );
        assert_eq!(RoleOutcome::RoleMissing.message("Gay", "<@1>"), "Role does not exist.");
    }
}
