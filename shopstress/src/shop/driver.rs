use crate::shop::client::{ShopClient, Token};
use rand::Rng;
use shopstress_macros::scenario;
use std::sync::Arc;
use tracing::{debug, trace};

/// Items bought by the receiving user on every iteration.
pub const ITEMS: [&str; 4] = ["t-shirt", "cup", "book", "pen"];

/// Coins moved by each transfer.
pub const TRANSFER_AMOUNT: u32 = 10;

/// Transfers made from the first user to the second on every iteration.
pub const TRANSFERS_PER_ITERATION: usize = 2;

const MAX_USER_ID: u32 = 1_000_000;

/// `user<N>` with N uniform in `[1, 1_000_000]`.
pub fn random_username() -> String {
    format!("user{}", rand::thread_rng().gen_range(1..=MAX_USER_ID))
}

/// Two usernames which are guaranteed to differ.
pub fn random_username_pair() -> (String, String) {
    let first = random_username();
    loop {
        let second = random_username();
        if second != first {
            return (first, second);
        }
    }
}

/// State shared by every virtual user.
#[derive(Debug)]
pub struct ShopContext {
    client: ShopClient,
    password: String,
}

impl ShopContext {
    pub fn new(client: ShopClient, password: impl Into<String>) -> Self {
        Self {
            client,
            password: password.into(),
        }
    }

    pub fn client(&self) -> &ShopClient {
        &self.client
    }

    /// A failed login yields an empty token, so the user's later requests fail their checks too.
    async fn login(&self, username: &str) -> Token {
        match self.client.auth(username, &self.password).await {
            Ok(token) => token,
            Err(err) => {
                debug!("Auth for {username} failed: {err}");
                Token::default()
            }
        }
    }

    /// Run one iteration for a freshly generated pair of users. Returns how many checks failed.
    pub async fn iteration(&self) -> usize {
        let (sender, receiver) = random_username_pair();
        self.iteration_for(&sender, &receiver).await
    }

    /// Run one iteration: `sender` transfers coins to `receiver`, who then reads their account
    /// and buys every item. No step is skipped when an earlier one fails.
    pub async fn iteration_for(&self, sender: &str, receiver: &str) -> usize {
        let mut failed = 0;

        let sender_token = self.login(sender).await;
        let receiver_token = self.login(receiver).await;
        failed += usize::from(sender_token.is_empty()) + usize::from(receiver_token.is_empty());

        for _ in 0..TRANSFERS_PER_ITERATION {
            if let Err(err) = self
                .client
                .send_coin(&sender_token, receiver, TRANSFER_AMOUNT)
                .await
            {
                debug!("Transfer from {sender} to {receiver} failed: {err}");
                failed += 1;
            }
        }

        match self.client.info(&receiver_token).await {
            Ok(info) => trace!("{receiver} holds {} coins", info.coins),
            Err(err) => {
                debug!("Info for {receiver} failed: {err}");
                failed += 1;
            }
        }

        for item in ITEMS {
            if let Err(err) = self.client.buy(&receiver_token, item).await {
                debug!("{receiver} could not buy {item}: {err}");
                failed += 1;
            }
        }

        if failed > 0 {
            trace!("Iteration for {sender} -> {receiver} had {failed} failed check(s)");
        }
        failed
    }
}

/// One virtual-user iteration against the coin shop.
#[scenario]
pub async fn shop_scenario(ctx: Arc<ShopContext>) {
    ctx.iteration().await;
}
