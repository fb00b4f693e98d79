//! Discord slash command implementations

use std::sync::Arc;
use std::time::Duration;

use calcbot_core::{render_reply, run, FormFields, Limits, Operation, FAILURE_MARKER};
use chrono::Utc;
use miette::Result;
use serenity::{
    all::{ComponentInteraction, ComponentInteractionDataKind, ModalInteraction},
    builder::{
        CreateCommand, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse, EditMessage,
    },
    client::Context,
    http::Http,
    model::application::CommandInteraction,
};
use tracing::{debug, error, info, warn};

use crate::menu::{
    fit_message, menu_components, modal_fields, operation_modal, session_in,
    step_for_selection, time_until_idle, FormId, MenuSession, MenuStep,
};

pub const MATH_COMMAND: &str = "math";

/// Create all slash commands for registration
pub fn create_commands() -> Vec<CreateCommand> {
    vec![CreateCommand::new(MATH_COMMAND)
        .description("Open the math menu")
        .dm_permission(true)]
}

fn ephemeral(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

/// Handle the /math command
pub async fn handle_math_command(
    ctx: &Context,
    command: &CommandInteraction,
    timeout: Duration,
) -> Result<()> {
    let session = MenuSession::new(command.user.id, Utc::now());

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content("Pick an operation:")
                    .components(menu_components(&session)),
            ),
        )
        .await
        .map_err(|e| miette::miette!("Failed to send math menu: {}", e))?;

    info!(user = %command.user.id, "opened math menu");
    spawn_menu_expiry(ctx.http.clone(), command.clone(), timeout);

    Ok(())
}

/// Strip the select menu once the session has gone idle. Activity rewrites
/// the menu's session, so the task re-reads it before giving up.
fn spawn_menu_expiry(http: Arc<Http>, command: CommandInteraction, timeout: Duration) {
    tokio::spawn(async move {
        let mut wait = timeout;
        loop {
            tokio::time::sleep(wait).await;
            let session = match command.get_response(&http).await {
                Ok(message) => session_in(&message.components),
                Err(e) => {
                    warn!(user = %command.user.id, "failed to read math menu: {}", e);
                    None
                }
            };
            match time_until_idle(session.as_ref(), Utc::now(), timeout) {
                Some(remaining) => wait = remaining,
                None => break,
            }
        }

        let edit = EditInteractionResponse::new()
            .content("This math menu has expired. Run /math again.")
            .components(Vec::new());
        match command.edit_response(&http, edit).await {
            Ok(_) => debug!(user = %command.user.id, "math menu expired"),
            Err(e) => warn!(user = %command.user.id, "failed to expire math menu: {}", e),
        }
    });
}

/// Handle a selection on a math menu.
pub async fn handle_menu_selection(
    ctx: &Context,
    component: &ComponentInteraction,
    session: &MenuSession,
    timeout: Duration,
) -> Result<()> {
    let values: &[String] = match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values,
        _ => &[],
    };

    let now = Utc::now();
    let mut refreshed = None;
    let response = match step_for_selection(session, component.user.id, values, now, timeout) {
        MenuStep::OpenForm(operation) => {
            debug!(user = %component.user.id, %operation, "opening form");
            refreshed = Some(session.refreshed(now));
            CreateInteractionResponse::Modal(operation_modal(operation, session.owner))
        }
        MenuStep::Reject(err) => {
            debug!(user = %component.user.id, owner = %session.owner, "refused menu interaction: {}", err);
            ephemeral(err.to_string())
        }
        MenuStep::Ignore => CreateInteractionResponse::Acknowledge,
    };

    component
        .create_response(&ctx.http, response)
        .await
        .map_err(|e| miette::miette!("Failed to answer menu selection: {}", e))?;

    // the modal took the interaction response, so the menu is edited directly
    if let Some(refreshed) = refreshed {
        let edit = EditMessage::new().components(menu_components(&refreshed));
        if let Err(e) = component
            .channel_id
            .edit_message(&ctx.http, component.message.id, edit)
            .await
        {
            warn!(user = %component.user.id, "failed to refresh math menu: {}", e);
        }
    }

    Ok(())
}

/// Handle a submitted operation form.
///
/// The reply is deferred first so a slow calculation cannot outlive the
/// interaction's acknowledgement window.
pub async fn handle_form_submit(
    ctx: &Context,
    modal: &ModalInteraction,
    form: &FormId,
    limits: &Limits,
    compute_timeout: Duration,
) -> Result<()> {
    if let Err(err) = form.check(modal.user.id) {
        modal
            .create_response(&ctx.http, ephemeral(err.to_string()))
            .await
            .map_err(|e| miette::miette!("Failed to refuse math form: {}", e))?;
        return Ok(());
    }

    modal
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await
        .map_err(|e| miette::miette!("Failed to defer math result: {}", e))?;

    let fields = modal_fields(&modal.data.components);
    let reply = compute_reply(form.operation, fields, *limits, compute_timeout).await;

    modal
        .edit_response(&ctx.http, EditInteractionResponse::new().content(reply))
        .await
        .map_err(|e| miette::miette!("Failed to send math result: {}", e))?;

    Ok(())
}

/// Run one math request on the blocking pool and render its reply.
pub async fn compute_reply(
    operation: Operation,
    fields: FormFields,
    limits: Limits,
    timeout: Duration,
) -> String {
    run_bounded(operation, timeout, move || {
        render_reply(&run(operation, &fields, &limits))
    })
    .await
}

/// An abandoned job keeps its blocking thread until it returns.
async fn run_bounded<F>(operation: Operation, timeout: Duration, job: F) -> String
where
    F: FnOnce() -> String + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(job)).await {
        Ok(Ok(reply)) => fit_message(reply),
        Ok(Err(e)) => {
            error!(%operation, "math request panicked: {}", e);
            format!("{} Something went wrong with this calculation.", FAILURE_MARKER)
        }
        Err(_) => {
            warn!(%operation, ?timeout, "math request timed out");
            format!("{} The calculation took too long and was stopped.", FAILURE_MARKER)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcbot_core::dispatch::field;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_math_is_registered() {
        let commands = create_commands();
        assert_eq!(commands.len(), 1);
    }

    #[tokio::test]
    async fn test_compute_reply() {
        let fields = FormFields::new()
            .with(field::EXPRESSION, "x^3")
            .with(field::VARIABLE, "x");
        let reply = compute_reply(
            Operation::Derivative,
            fields,
            Limits::default(),
            Duration::from_secs(10),
        )
        .await;
        assert_eq!(reply, "Derivative of `x^3` with respect to x:\n```\n3*x^2\n```");
    }

    #[tokio::test]
    async fn test_runaway_derivative_gets_a_one_line_error() {
        let fields = FormFields::new()
            .with(field::EXPRESSION, "asin(x^x)")
            .with(field::VARIABLE, "x")
            .with(field::ORDER, "10");
        let reply = compute_reply(
            Operation::Derivative,
            fields,
            Limits::default(),
            Duration::from_secs(10),
        )
        .await;
        assert!(reply.starts_with("❌ "), "{}", reply);
        assert_eq!(reply.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_slow_job_times_out() {
        let reply = run_bounded(Operation::Integral, Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(300));
            "late".to_string()
        })
        .await;
        assert_eq!(reply, "❌ The calculation took too long and was stopped.");
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported() {
        let reply = run_bounded(Operation::EulerRotation, Duration::from_secs(1), || {
            panic!("boom")
        })
        .await;
        assert_eq!(reply, "❌ Something went wrong with this calculation.");
    }
}
