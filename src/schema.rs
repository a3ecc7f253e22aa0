use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};

use crate::{
    commands::start,
    errors::BotError,
    handlers::{callback_received, text_received},
};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Show the welcome message
    Start,
}

pub fn schema() -> UpdateHandler<BotError> {
    use dptree::case;

    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    teloxide::filter_command::<Command, _>()
                        .branch(case![Command::Start].endpoint(start)),
                )
                .branch(Message::filter_text().endpoint(text_received)),
        )
        .branch(Update::filter_callback_query().endpoint(callback_received))
}
