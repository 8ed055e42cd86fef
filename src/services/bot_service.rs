//! Chat front-end: turns Telegram updates into service calls and replies.

use crate::config::GameConfig;
use crate::error::{AppError, AppResult};
use crate::external::Messenger;
use crate::models::telegram::{CallbackQuery, Message, Update};
use crate::models::{ClaimOutcome, RedeemOutcome};
use crate::services::{
    AllocationService, BacklogService, BroadcastService, EconomyService, PrizeService,
    UserService,
};
use crate::utils::messages;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Rating,
    Balance,
    Redeem,
    Missed,
    Collection,
    Unknown,
}

/// Parses `/name`, `/name@bot_name` and `/name args`. `None` when the text is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let word = text.split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    let command = match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "rating" => Command::Rating,
        "balance" => Command::Balance,
        "redeem" => Command::Redeem,
        "missed" => Command::Missed,
        "collection" => Command::Collection,
        _ => Command::Unknown,
    };
    Some(command)
}

#[derive(Clone)]
pub struct BotService {
    messenger: Arc<dyn Messenger>,
    users: UserService,
    allocation: AllocationService,
    economy: EconomyService,
    backlog: BacklogService,
    broadcast: BroadcastService,
    prizes: PrizeService,
    game: GameConfig,
}

impl BotService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        messenger: Arc<dyn Messenger>,
        users: UserService,
        allocation: AllocationService,
        economy: EconomyService,
        backlog: BacklogService,
        broadcast: BroadcastService,
        prizes: PrizeService,
        game: GameConfig,
    ) -> Self {
        Self {
            messenger,
            users,
            allocation,
            economy,
            backlog,
            broadcast,
            prizes,
            game,
        }
    }

    /// Handles one update. Failures are reported to the user when possible and
    /// returned to the caller for logging.
    pub async fn handle_update(&self, update: Update) -> AppResult<()> {
        let (chat_id, result) = if let Some(query) = update.callback_query {
            (query.from.id, self.handle_claim(&query).await)
        } else if let Some(message) = update.message {
            (message.chat.id, self.handle_message(&message).await)
        } else {
            log::debug!("Ignoring update {} without message", update.update_id);
            return Ok(());
        };

        if let Err(e) = &result {
            log::error!("Failed to handle update {}: {e}", update.update_id);
            if let Err(send_err) = self
                .messenger
                .send_text(chat_id, messages::INTERNAL_ERROR)
                .await
            {
                log::warn!("Failed to report error to {chat_id}: {send_err}");
            }
        }
        result
    }

    async fn handle_message(&self, message: &Message) -> AppResult<()> {
        let chat_id = message.chat.id;
        let Some(from) = &message.from else {
            return Ok(());
        };

        if let Some(photos) = &message.photo {
            return match self.prizes.upload(from.id, photos).await {
                Ok(prize) => {
                    self.messenger
                        .send_text(chat_id, &messages::upload_text(prize.id))
                        .await
                }
                Err(AppError::Forbidden) => {
                    self.messenger
                        .send_text(chat_id, messages::UPLOAD_FORBIDDEN)
                        .await
                }
                Err(e) => Err(e),
            };
        }

        let Some(command) = message.text.as_deref().and_then(parse_command) else {
            return Ok(());
        };
        let user_id = from.id;
        match command {
            Command::Start => {
                let outcome = self.users.register(user_id, &from.display_name()).await?;
                let text = messages::register_text(
                    outcome,
                    self.game.winner_cap,
                    self.game.broadcast_interval_secs,
                );
                self.messenger.send_text(chat_id, &text).await
            }
            Command::Rating => {
                let board = self.users.leaderboard().await?;
                if board.is_empty() {
                    self.messenger
                        .send_text(chat_id, messages::EMPTY_LEADERBOARD)
                        .await
                } else {
                    self.messenger
                        .send_html(chat_id, &messages::leaderboard_html(&board))
                        .await
                }
            }
            Command::Balance => {
                let coins = self.economy.balance(user_id).await?;
                self.messenger
                    .send_text(
                        chat_id,
                        &messages::balance_text(coins, self.game.redemption_cost),
                    )
                    .await
            }
            Command::Redeem => self.handle_redeem(chat_id, user_id).await,
            Command::Missed => self.handle_missed(chat_id, user_id).await,
            Command::Collection => {
                let images = self.users.won_images(user_id).await?;
                if !self.broadcast.deliver_collage(chat_id, &images).await? {
                    self.messenger
                        .send_text(chat_id, messages::EMPTY_COLLECTION)
                        .await?;
                }
                Ok(())
            }
            Command::Unknown => {
                self.messenger
                    .send_text(chat_id, messages::UNKNOWN_COMMAND)
                    .await
            }
        }
    }

    async fn handle_redeem(&self, chat_id: i64, user_id: i64) -> AppResult<()> {
        if !self.users.is_registered(user_id).await? {
            return self
                .messenger
                .send_text(chat_id, messages::NOT_REGISTERED)
                .await;
        }
        let outcome = self
            .economy
            .redeem(user_id, self.game.redemption_cost)
            .await?;
        let text = messages::redeem_text(&outcome);
        match &outcome {
            RedeemOutcome::Redeemed { image, .. } => {
                self.broadcast
                    .deliver_prize(chat_id, image, Some(&text))
                    .await
            }
            _ => self.messenger.send_text(chat_id, &text).await,
        }
    }

    async fn handle_missed(&self, chat_id: i64, user_id: i64) -> AppResult<()> {
        let granted = self.backlog.take_backlog(user_id).await?;
        if granted.is_empty() {
            return self
                .messenger
                .send_text(chat_id, messages::EMPTY_BACKLOG)
                .await;
        }
        // 已从 backlog 中移除，单张发送失败不再重试
        for prize in granted {
            if let Err(e) = self
                .broadcast
                .deliver_prize(chat_id, &prize.image, Some(messages::BACKLOG_CAPTION))
                .await
            {
                log::warn!("Failed to deliver missed prize {} to {chat_id}: {e}", prize.id);
            }
        }
        Ok(())
    }

    async fn handle_claim(&self, query: &CallbackQuery) -> AppResult<()> {
        let user_id = query.from.id;
        let Some(prize_id) = query.data.as_deref().and_then(|d| d.parse::<i32>().ok()) else {
            let text = messages::claim_text(&ClaimOutcome::Unavailable, self.game.winner_cap);
            return self
                .messenger
                .answer_callback(&query.id, text.as_deref())
                .await;
        };

        let outcome = match self.allocation.claim(user_id, prize_id).await {
            Ok(outcome) => outcome,
            Err(AppError::NotFound(_)) => {
                return self
                    .messenger
                    .answer_callback(&query.id, Some(messages::NOT_REGISTERED))
                    .await;
            }
            Err(e) => return Err(e),
        };

        let text = messages::claim_text(&outcome, self.game.winner_cap);
        self.messenger
            .answer_callback(&query.id, text.as_deref())
            .await?;
        match outcome {
            ClaimOutcome::Won { image, .. } => {
                self.broadcast
                    .deliver_prize(user_id, &image, Some(messages::WON_CAPTION))
                    .await
            }
            _ => Ok(()),
        }
    }
}
