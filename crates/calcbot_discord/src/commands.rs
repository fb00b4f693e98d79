//! Prefix text commands.

use std::fmt;

/// A recognized text command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommand {
    /// Greet the author with a mention
    Hello,
    /// Add the configured role to the author
    Assign,
    /// Remove the configured role from the author
    Remove,
    /// Shut the bot down
    Logout,
}

impl TextCommand {
    pub const ALL: [TextCommand; 4] = [
        TextCommand::Hello,
        TextCommand::Assign,
        TextCommand::Remove,
        TextCommand::Logout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TextCommand::Hello => "hello",
            TextCommand::Assign => "assign",
            TextCommand::Remove => "remove",
            TextCommand::Logout => "logout",
        }
    }

    /// Parse `<prefix><name>`, ignoring anything after the first word.
    /// Returns `None` for ordinary chat and unknown commands.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        if prefix.is_empty() {
            return None;
        }
        let rest = content.trim_start().strip_prefix(prefix)?;
        let name = rest.split_whitespace().next()?;
        if !rest.starts_with(name) {
            // "! hello" is not a command
            return None;
        }
        Self::ALL.into_iter().find(|cmd| cmd.name() == name)
    }
}

impl fmt::Display for TextCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// True if `user_id` is listed in `admin_users`.
pub fn is_authorized_user(user_id: u64, admin_users: Option<&[String]>) -> bool {
    if let Some(admins) = admin_users {
        let user_id_str = user_id.to_string();
        return admins.iter().any(|s| s == &user_id_str);
    }
    false
}

/// Anyone may log the bot out unless an admin list is configured.
pub fn can_logout(user_id: u64, admin_users: Option<&[String]>) -> bool {
    admin_users.is_none() || is_authorized_user(user_id, admin_users)
}

pub fn greeting(mention: &str) -> String {
    format!("Hello {}!", mention)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_commands() {
        assert_eq!(TextCommand::parse("!hello", "!"), Some(TextCommand::Hello));
        assert_eq!(TextCommand::parse("  !assign please", "!"), Some(TextCommand::Assign));
        assert_eq!(TextCommand::parse("!remove", "!"), Some(TextCommand::Remove));
        assert_eq!(TextCommand::parse("!logout", "!"), Some(TextCommand::Logout));
        assert_eq!(TextCommand::parse("?hello", "?"), Some(TextCommand::Hello));
    }

    #[test]
    fn test_non_commands() {
        assert_eq!(TextCommand::parse("hello", "!"), None);
        assert_eq!(TextCommand::parse("!", "!"), None);
        assert_eq!(TextCommand::parse("! hello", "!"), None);
        assert_eq!(TextCommand::parse("!HELLO", "!"), None);
        assert_eq!(TextCommand::parse("!helloo", "!"), None);
        assert_eq!(TextCommand::parse("!eval 1+1", "!"), None);
        assert_eq!(TextCommand::parse("!hello", ""), None);
    }

    #[test]
    fn test_logout_authorization() {
        let admins = vec!["42".to_string()];
        assert!(can_logout(7, None));
        assert!(can_logout(42, Some(&admins)));
        assert!(!can_logout(7, Some(&admins)));
        assert!(!is_authorized_user(42, None));
    }

    #[test]
    fn test_greeting() {
        assert_eq!(greeting("<@42>"), "Hello <@42>!");
    }
}
