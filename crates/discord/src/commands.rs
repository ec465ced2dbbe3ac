use thiserror::Error;

use ticketdesk_core::Permissions;

/// Slash commands the bot answers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TicketCommand {
    SetupTickets,
    Ticket,
    CheckPermissions,
}

impl TicketCommand {
    pub const ALL: [Self; 3] = [Self::SetupTickets, Self::Ticket, Self::CheckPermissions];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('/') {
            "setup_tickets" => Some(Self::SetupTickets),
            "ticket" => Some(Self::Ticket),
            "check_permissions" => Some(Self::CheckPermissions),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetupTickets => "setup_tickets",
            Self::Ticket => "ticket",
            Self::CheckPermissions => "check_permissions",
        }
    }

    pub fn required_permissions(&self) -> Permissions {
        match self {
            Self::SetupTickets => Permissions::ADMINISTRATOR,
            Self::Ticket | Self::CheckPermissions => Permissions::empty(),
        }
    }

    /// Checks the invoker's permission bitfield against what the command needs.
    pub fn authorize(&self, invoker: Permissions) -> Result<(), CommandRouteError> {
        let required = self.required_permissions();
        if invoker.allows(required) {
            Ok(())
        } else {
            Err(CommandRouteError::MissingPermissions { command: *self, required })
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("missing permissions {missing:?} for /{name}", name = .command.name(), missing = .required.names())]
    MissingPermissions { command: TicketCommand, required: Permissions },
}

#[cfg(test)]
mod tests {
    use ticketdesk_core::Permissions;

    use super::{CommandRouteError, TicketCommand};

    #[test]
    fn parses_every_known_command_name() {
        for command in TicketCommand::ALL {
            assert_eq!(TicketCommand::parse(command.name()), Some(command));
        }
        assert_eq!(TicketCommand::parse("/ticket"), Some(TicketCommand::Ticket));
        assert_eq!(TicketCommand::parse("close"), None);
    }

    #[test]
    fn setup_requires_administrator() {
        let error = TicketCommand::SetupTickets
            .authorize(Permissions::MANAGE_CHANNELS)
            .expect_err("manage channels is not enough");
        assert!(matches!(error, CommandRouteError::MissingPermissions { .. }));
        assert!(error.to_string().contains("administrator"));

        TicketCommand::SetupTickets
            .authorize(Permissions::ADMINISTRATOR)
            .expect("administrator may run setup");
    }

    #[test]
    fn ticket_and_diagnostics_are_open_to_everyone() {
        TicketCommand::Ticket.authorize(Permissions::empty()).expect("ticket is public");
        TicketCommand::CheckPermissions.authorize(Permissions::empty()).expect("diagnostic");
    }
}
