use std::sync::Arc;

use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::presenter::ErrorPresenter;
use crate::subscriptions::SubscriptionService;

pub type BotResult<T> = Result<T, teloxide::RequestError>;

/// State shared across update handlers.
pub struct AppState {
    pub service: Arc<SubscriptionService>,
    pub presenter: ErrorPresenter,
    pub bot_username: Option<String>,
}

/// Commands with a fixed shape, parsed by teloxide itself. `/monitor` and
/// `/unmonitor` carry free-form arguments and are parsed by hand in the
/// handler instead.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Доступные команды:")]
pub enum GeneralCommand {
    #[command(description = "проверить, что бот запущен")]
    Start,
    #[command(description = "показать активные подписки")]
    Subscriptions,
}

/// Full command list for `setMyCommands`, including the hand-parsed ones.
pub fn command_list() -> Vec<BotCommand> {
    let mut commands = GeneralCommand::bot_commands();
    commands.extend([
        BotCommand::new("monitor", "добавить канал: /monitor {канал} {ЧЧ:ММ}"),
        BotCommand::new("unmonitor", "убрать канал: /unmonitor {канал} {ЧЧ:ММ}"),
    ]);
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_list_covers_every_user_command() {
        let names: Vec<String> = command_list()
            .into_iter()
            .map(|command| command.command)
            .collect();

        assert_eq!(names, vec!["start", "subscriptions", "monitor", "unmonitor"]);
    }
}
