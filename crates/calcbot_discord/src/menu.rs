//! Math menu state.
//!
//! The menu keeps no server-side state. Everything a later interaction
//! needs (who opened the menu, when it was last used, and which form was
//! chosen) travels in the component `custom_id`, so each event handler
//! decodes an immutable value and decides from it alone. Activity is
//! recorded by rewriting the menu message with a fresh `custom_id`.

use std::time::Duration;

use calcbot_core::{FormFields, Operation};
use chrono::{DateTime, Utc};
use serenity::all::{
    ActionRow, ActionRowComponent, CreateActionRow, CreateInputText, CreateModal,
    CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption, InputTextStyle, UserId,
};
use thiserror::Error;

pub const MENU_PREFIX: &str = "math-menu";
pub const FORM_PREFIX: &str = "math-form";

/// Discord's limit on message content.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Why an interaction with a menu was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MenuError {
    #[error("This math menu has expired. Run /math again.")]
    Expired,
    #[error("This menu belongs to someone else. Run /math to open your own.")]
    IdentityMismatch,
}

/// An open math menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuSession {
    pub owner: UserId,
    /// Last accepted interaction, or the moment the menu was opened.
    pub active_at: DateTime<Utc>,
}

impl MenuSession {
    /// Open a session. `active_at` is kept to whole seconds so it survives
    /// the trip through `custom_id`.
    pub fn new(owner: UserId, active_at: DateTime<Utc>) -> Self {
        let active_at = DateTime::from_timestamp(active_at.timestamp(), 0).unwrap_or(active_at);
        Self { owner, active_at }
    }

    /// The same session, marked active at `now`.
    pub fn refreshed(&self, now: DateTime<Utc>) -> Self {
        Self::new(self.owner, now)
    }

    pub fn custom_id(&self) -> String {
        format!(
            "{}:{}:{}",
            MENU_PREFIX,
            self.owner.get(),
            self.active_at.timestamp()
        )
    }

    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.split(':');
        if parts.next()? != MENU_PREFIX {
            return None;
        }
        let owner = parse_user_id(parts.next()?)?;
        let active_at = DateTime::from_timestamp(parts.next()?.parse().ok()?, 0)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { owner, active_at })
    }

    /// The menu goes idle `timeout` after its last activity.
    pub fn expires_at(&self, timeout: Duration) -> DateTime<Utc> {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        self.active_at
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expiry is checked before identity.
    pub fn check(
        &self,
        actor: UserId,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<(), MenuError> {
        if now >= self.expires_at(timeout) {
            return Err(MenuError::Expired);
        }
        if actor != self.owner {
            return Err(MenuError::IdentityMismatch);
        }
        Ok(())
    }
}

/// How long the expiry task should wait before looking at the menu again.
/// `None` once the menu has been idle for `timeout`, or when the message
/// no longer carries a session.
pub fn time_until_idle(
    session: Option<&MenuSession>,
    now: DateTime<Utc>,
    timeout: Duration,
) -> Option<Duration> {
    let expires_at = session?.expires_at(timeout);
    if now >= expires_at {
        return None;
    }
    (expires_at - now).to_std().ok()
}

/// The session carried by a menu message's select component.
pub fn session_in(rows: &[ActionRow]) -> Option<MenuSession> {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::SelectMenu(select) => select
                .custom_id
                .as_deref()
                .and_then(MenuSession::from_custom_id),
            _ => None,
        })
}

/// The modal opened for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormId {
    pub operation: Operation,
    pub owner: UserId,
}

impl FormId {
    pub fn custom_id(&self) -> String {
        format!("{}:{}:{}", FORM_PREFIX, self.operation.id(), self.owner.get())
    }

    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.split(':');
        if parts.next()? != FORM_PREFIX {
            return None;
        }
        let operation = Operation::from_id(parts.next()?)?;
        let owner = parse_user_id(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { operation, owner })
    }

    pub fn check(&self, actor: UserId) -> Result<(), MenuError> {
        if actor == self.owner {
            Ok(())
        } else {
            Err(MenuError::IdentityMismatch)
        }
    }
}

fn parse_user_id(raw: &str) -> Option<UserId> {
    match raw.parse::<u64>() {
        Ok(id) if id != 0 => Some(UserId::new(id)),
        _ => None,
    }
}

/// What to do with a select menu event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuStep {
    /// Show the form for this operation.
    OpenForm(Operation),
    /// Refuse privately, the menu stays as it is.
    Reject(MenuError),
    /// Acknowledge without a reply.
    Ignore,
}

/// Decide how to answer a selection of `values` by `actor`.
pub fn step_for_selection(
    session: &MenuSession,
    actor: UserId,
    values: &[String],
    now: DateTime<Utc>,
    timeout: Duration,
) -> MenuStep {
    match session.check(actor, now, timeout) {
        Err(MenuError::Expired) => MenuStep::Ignore,
        Err(err) => MenuStep::Reject(err),
        Ok(()) => match values {
            [value] => Operation::from_id(value).map_or(MenuStep::Ignore, MenuStep::OpenForm),
            _ => MenuStep::Ignore,
        },
    }
}

/// Select menu listing every operation.
pub fn menu_components(session: &MenuSession) -> Vec<CreateActionRow> {
    let options = Operation::ALL
        .iter()
        .map(|op| CreateSelectMenuOption::new(op.label(), op.id()).description(op.description()))
        .collect();

    let select = CreateSelectMenu::new(session.custom_id(), CreateSelectMenuKind::String { options })
        .placeholder("Choose an operation")
        .min_values(1)
        .max_values(1);

    vec![CreateActionRow::SelectMenu(select)]
}

/// Modal with one short text input per field of `operation`.
pub fn operation_modal(operation: Operation, owner: UserId) -> CreateModal {
    let rows = operation
        .fields()
        .iter()
        .map(|field| {
            let mut input = CreateInputText::new(InputTextStyle::Short, field.label, field.id)
                .placeholder(field.placeholder)
                .required(field.required);
            if let Some(default) = field.default {
                input = input.value(default);
            }
            CreateActionRow::InputText(input)
        })
        .collect();

    let form = FormId { operation, owner };
    CreateModal::new(form.custom_id(), operation.label()).components(rows)
}

/// Collect submitted text inputs by their field id.
pub fn modal_fields(rows: &[ActionRow]) -> FormFields {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|component| match component {
            ActionRowComponent::InputText(input) => Some((
                input.custom_id.clone(),
                input.value.clone().unwrap_or_default(),
            )),
            _ => None,
        })
        .collect()
}

/// Keep a reply within Discord's message limit.
pub fn fit_message(reply: String) -> String {
    let len = reply.chars().count();
    if len <= MAX_MESSAGE_LEN {
        return reply;
    }
    format!(
        "{} The result is too long to show ({} characters).",
        calcbot_core::FAILURE_MARKER,
        len
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const TIMEOUT: Duration = Duration::from_secs(120);

    fn opened() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn owner() -> UserId {
        UserId::new(1001)
    }

    fn session() -> MenuSession {
        MenuSession::new(owner(), opened())
    }

    fn after(secs: i64) -> DateTime<Utc> {
        opened() + chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_session_custom_id() {
        let session = session();
        let id = session.custom_id();
        assert_eq!(id, format!("math-menu:1001:{}", opened().timestamp()));
        assert_eq!(MenuSession::from_custom_id(&id), Some(session));
    }

    #[test]
    fn test_session_drops_subseconds() {
        let precise = opened() + chrono::Duration::milliseconds(750);
        let session = MenuSession::new(owner(), precise);
        assert_eq!(session.active_at, opened());
    }

    #[test]
    fn test_foreign_ids_are_not_sessions() {
        for id in [
            "math-form:derivative:1001",
            "math-menu:1001",
            "math-menu:abc:0",
            "math-menu:0:0",
            "math-menu:1001:12:extra",
            "",
        ] {
            assert_eq!(MenuSession::from_custom_id(id), None, "{}", id);
        }
    }

    #[test]
    fn test_form_custom_id() {
        let form = FormId {
            operation: Operation::EulerRotation,
            owner: owner(),
        };
        assert_eq!(form.custom_id(), "math-form:euler_rotation:1001");
        assert_eq!(FormId::from_custom_id(&form.custom_id()), Some(form));
        assert_eq!(FormId::from_custom_id("math-form:sum:1001"), None);
        assert_eq!(form.check(UserId::new(5)), Err(MenuError::IdentityMismatch));
        assert_eq!(form.check(owner()), Ok(()));
    }

    #[test]
    fn test_other_users_never_open_the_form() {
        let session = session();
        let stranger = UserId::new(2002);
        for op in Operation::ALL {
            let step =
                step_for_selection(&session, stranger, &[op.id().to_string()], after(5), TIMEOUT);
            assert_eq!(step, MenuStep::Reject(MenuError::IdentityMismatch));
        }
    }

    #[test]
    fn test_owner_opens_the_form() {
        let step = step_for_selection(
            &session(),
            owner(),
            &["integral".to_string()],
            after(119),
            TIMEOUT,
        );
        assert_eq!(step, MenuStep::OpenForm(Operation::Integral));
    }

    #[test]
    fn test_expiry_wins_over_identity() {
        let session = session();
        assert_eq!(
            session.check(UserId::new(2002), after(120), TIMEOUT),
            Err(MenuError::Expired)
        );
        assert_eq!(
            step_for_selection(&session, owner(), &["derivative".into()], after(120), TIMEOUT),
            MenuStep::Ignore
        );
    }

    #[test]
    fn test_activity_keeps_the_menu_open() {
        let session = session();
        let step = step_for_selection(&session, owner(), &["derivative".into()], after(100), TIMEOUT);
        assert_eq!(step, MenuStep::OpenForm(Operation::Derivative));

        let refreshed = session.refreshed(after(100));
        assert_eq!(session.check(owner(), after(150), TIMEOUT), Err(MenuError::Expired));
        assert_eq!(refreshed.check(owner(), after(150), TIMEOUT), Ok(()));
        assert_eq!(
            step_for_selection(&refreshed, owner(), &["integral".into()], after(150), TIMEOUT),
            MenuStep::OpenForm(Operation::Integral)
        );
        assert_eq!(refreshed.check(owner(), after(220), TIMEOUT), Err(MenuError::Expired));
        assert_eq!(
            MenuSession::from_custom_id(&refreshed.custom_id()),
            Some(refreshed)
        );
    }

    #[test]
    fn test_time_until_idle() {
        let session = session();
        assert_eq!(
            time_until_idle(Some(&session), after(0), TIMEOUT),
            Some(Duration::from_secs(120))
        );
        assert_eq!(
            time_until_idle(Some(&session), after(90), TIMEOUT),
            Some(Duration::from_secs(30))
        );
        assert_eq!(time_until_idle(Some(&session), after(120), TIMEOUT), None);

        // the expiry task waits again after activity
        let refreshed = session.refreshed(after(100));
        assert_eq!(
            time_until_idle(Some(&refreshed), after(120), TIMEOUT),
            Some(Duration::from_secs(100))
        );
        assert_eq!(time_until_idle(None, after(0), TIMEOUT), None);
    }

    #[test]
    fn test_unknown_or_multiple_values_are_ignored() {
        let session = session();
        for values in [vec![], vec!["sum".to_string()], vec!["derivative".into(), "integral".into()]] {
            assert_eq!(
                step_for_selection(&session, owner(), &values, after(1), TIMEOUT),
                MenuStep::Ignore
            );
        }
    }

    #[test]
    fn test_fit_message() {
        assert_eq!(fit_message("ok".to_string()), "ok");
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(
            fit_message(long),
            "❌ The result is too long to show (2001 characters)."
        );
    }
}
